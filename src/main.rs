use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use resource_manager::auth::verify_token;
use resource_manager::provider::expand_path;
use resource_manager::status::{Availability, StatusOverview};
use resource_manager::sync::ProviderOutcome;
use resource_manager::{
    download_from_all, AuthResolver, Config, ConfigManager, DownloadOptions, GitHubEndpoints,
    ProviderKind, ProviderRegistry, ProviderStatus,
};

#[derive(Parser)]
#[command(name = "resource-manager")]
#[command(about = "Fetch and sync files from GitHub repositories and local directories")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration directory (defaults to ./.resource-manager)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        config_command: ConfigCommands,
    },

    /// Download resources from a provider, or from every provider with "all"
    Download(DownloadArgs),

    /// Show status of configured providers
    Status {
        /// Provider to show; all providers when omitted
        provider: Option<String>,

        /// Test connection to providers
        #[arg(short = 'c', long)]
        check_connection: bool,

        /// Show every provider setting and the active patterns
        #[arg(long)]
        details: bool,
    },

    /// Inspect GitHub authentication
    Auth {
        #[command(subcommand)]
        auth_command: AuthCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Write a sample configuration
    Init {
        /// Overwrite an existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Print the configuration
    Show {
        /// Summarise providers and patterns instead of dumping every key
        #[arg(short, long)]
        pretty: bool,
    },

    /// Validate the configuration file
    Validate,

    /// Print the value at a dotted path, e.g. providers.github[0].url
    Get { path: String },

    /// Set the value at a dotted path; JSON literals are parsed, anything
    /// else is stored as a string
    Set { path: String, value: String },
}

#[derive(Args)]
struct DownloadArgs {
    /// Provider name, or "all"
    provider: String,

    /// Target directory; falls back to the provider's target_dir
    target_dir: Option<String>,

    /// File name pattern, e.g. "*.md"
    #[arg(short, long, default_value = "*")]
    pattern: String,

    /// Download even if the target directory is not empty
    #[arg(short, long)]
    force: bool,

    /// Only top-level files
    #[arg(long)]
    no_recursive: bool,

    /// Keep existing files in the target directory
    #[arg(long)]
    no_clean: bool,
}

#[derive(Subcommand)]
enum AuthCommands {
    /// Show which token would be used
    Status {
        /// Check the token against the GitHub API
        #[arg(long)]
        verify: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose)?;
    info!("Starting resource-manager v{}", env!("CARGO_PKG_VERSION"));

    let manager = config_manager(cli.config_dir)?;

    match cli.command {
        Commands::Config { config_command } => cmd_config(config_command, &manager),
        Commands::Download(args) => cmd_download(args, &manager).await,
        Commands::Status {
            provider,
            check_connection,
            details,
        } => cmd_status(provider, check_connection, details, &manager).await,
        Commands::Auth { auth_command } => cmd_auth(auth_command, &manager).await,
    }
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    Ok(())
}

fn config_manager(config_dir: Option<PathBuf>) -> Result<ConfigManager> {
    match config_dir {
        Some(dir) => Ok(ConfigManager::new(dir)),
        None => ConfigManager::in_current_dir().context("Failed to locate configuration directory"),
    }
}

/// Load the configuration, failing when there is none
fn require_config(manager: &ConfigManager) -> Result<Config> {
    manager
        .load_config()
        .with_context(|| format!("Failed to load {:?}", manager.config_path()))?
        .ok_or_else(|| {
            anyhow!("No configuration found. Use 'config init' to create configuration.")
        })
}

fn cmd_config(command: ConfigCommands, manager: &ConfigManager) -> Result<()> {
    match command {
        ConfigCommands::Init { force } => {
            if manager.config_path().exists() && !force {
                bail!("Configuration already exists. Use --force to overwrite.");
            }
            let path = manager.create_sample_config()?;
            println!("✅ Configuration initialized at: {}", path.display());
        }
        ConfigCommands::Show { pretty } => {
            let config = require_config(manager)?;
            if pretty {
                print_config_summary(&config);
            } else {
                print_tree(config.as_value(), 0);
            }
        }
        ConfigCommands::Validate => {
            manager
                .validate_file()
                .context("Configuration is invalid")?;
            println!("✅ Configuration is valid");
        }
        ConfigCommands::Get { path } => {
            let config = require_config(manager)?;
            let value = config.get_or(&path, Value::Null);
            println!("{}", render_value(&value)?);
        }
        ConfigCommands::Set { path, value } => {
            let mut config = manager
                .load_config()
                .with_context(|| format!("Failed to load {:?}", manager.config_path()))?
                .unwrap_or_default();
            let parsed = serde_json::from_str(&value).unwrap_or(Value::String(value));
            config
                .set(&path, parsed.clone())
                .with_context(|| format!("Failed to set '{}'", path))?;
            manager.save_config(&config)?;
            println!("✅ Set {} = {}", path, render_value(&parsed)?);
        }
    }
    Ok(())
}

fn render_value(value: &Value) -> Result<String> {
    Ok(match value {
        Value::String(s) => s.clone(),
        other => serde_json::to_string_pretty(other)?,
    })
}

fn print_tree(value: &Value, indent: usize) {
    let pad = " ".repeat(indent);
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                match child {
                    Value::Object(_) | Value::Array(_) => {
                        println!("{}{}:", pad, key);
                        print_tree(child, indent + 2);
                    }
                    scalar => println!("{}{}: {}", pad, key, scalar_text(scalar)),
                }
            }
        }
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                match item {
                    Value::Object(_) | Value::Array(_) => {
                        println!("{}[{}]:", pad, index);
                        print_tree(item, indent + 2);
                    }
                    scalar => println!("{}[{}]: {}", pad, index, scalar_text(scalar)),
                }
            }
        }
        scalar => println!("{}{}", pad, scalar_text(scalar)),
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn print_config_summary(config: &Config) {
    println!("📋 Configuration");
    println!("   Auth method: {}", config.auth_method());

    println!("\n🐙 GitHub providers:");
    if config.github_entries().is_empty() {
        println!("   (none)");
    }
    for (index, entry) in config.github_entries().iter().enumerate() {
        println!("   [{}] {}", index, entry.name);
        println!("       URL: {}", entry.url);
        println!("       Enabled: {}", entry.enabled);
        println!("       Branch: {}", entry.default_branch);
        println!("       Resource Dir: {}", entry.resource_dir);
        println!("       Timeout: {}s", entry.timeout);
    }

    println!("\n📁 Local providers:");
    if config.local_entries().is_empty() {
        println!("   (none)");
    }
    for (index, entry) in config.local_entries().iter().enumerate() {
        println!("   [{}] {}", index, entry.name);
        println!("       Path: {}", entry.path);
        println!("       Enabled: {}", entry.enabled);
    }

    println!("\n🔍 Resource patterns:");
    if !config.include_patterns().is_empty() {
        println!("   Include: {}", config.include_patterns().join(", "));
    }
    if !config.exclude_patterns().is_empty() {
        println!("   Exclude: {}", config.exclude_patterns().join(", "));
    }
}

/// Refuse a file target, and a non-empty directory unless forced
fn check_target_dir(target: &Path, force: bool) -> Result<()> {
    if !target.exists() {
        return Ok(());
    }
    if !target.is_dir() {
        bail!("Target path is a file, not a directory: {}", target.display());
    }
    let non_empty = std::fs::read_dir(target)
        .with_context(|| format!("Failed to read {}", target.display()))?
        .next()
        .is_some();
    if non_empty && !force {
        bail!(
            "Target directory is not empty: {}\nUse --force to download anyway",
            target.display()
        );
    }
    Ok(())
}

async fn cmd_download(args: DownloadArgs, manager: &ConfigManager) -> Result<()> {
    let config = require_config(manager)?;
    let registry = ProviderRegistry::new();
    let options = DownloadOptions {
        file_pattern: args.pattern.clone(),
        recursive: !args.no_recursive,
        clean: !args.no_clean,
    };

    if args.provider.eq_ignore_ascii_case("all") {
        let raw_target = args
            .target_dir
            .ok_or_else(|| anyhow!("A target directory is required when downloading from all providers"))?;
        let target = expand_path(&raw_target)?;
        check_target_dir(&target, args.force)?;

        let providers = registry.get_all_providers(&config).await?;
        if providers.is_empty() {
            bail!("No enabled providers configured");
        }

        println!(
            "📥 Downloading from {} provider(s) to {}",
            providers.len(),
            target.display()
        );
        print_options(&options);

        let summary = download_from_all(&providers, &target, &options).await;
        for result in &summary.results {
            println!("\n▶ {} ({})", result.name, result.kind);
            match &result.outcome {
                ProviderOutcome::Downloaded { files } => {
                    print_files(files)
                }
                ProviderOutcome::Unavailable => {
                    println!("   ❌ Provider is not available")
                }
                ProviderOutcome::Skipped { reason } => {
                    println!("   ⏭️  Skipped: {}", reason)
                }
            }
        }

        println!("\n📈 Summary:");
        println!("   Total files downloaded: {}", summary.total_files);
        println!(
            "   Providers: {} succeeded, {} unavailable, {} skipped",
            summary.successful_providers, summary.unavailable_providers, summary.skipped_providers
        );
        println!("   Duration: {:.2}s", summary.duration.as_secs_f64());

        if summary.has_unavailable() {
            bail!("{} provider(s) were not available", summary.unavailable_providers);
        }
        return Ok(());
    }

    let Some(provider) = registry.find_provider(&config, &args.provider).await? else {
        let names: Vec<String> = config
            .github_entries()
            .iter()
            .map(|e| e.name.clone())
            .chain(config.local_entries().iter().map(|e| e.name.clone()))
            .collect();
        if names.is_empty() {
            bail!("Provider not found: {}", args.provider);
        }
        bail!(
            "Provider not found: {}\nAvailable providers: {}",
            args.provider,
            names.join(", ")
        );
    };

    let raw_target = args
        .target_dir
        .or_else(|| provider.default_target_dir().map(str::to_string))
        .ok_or_else(|| {
            anyhow!(
                "No target directory given and provider '{}' has no target_dir",
                provider.name()
            )
        })?;
    let target = expand_path(&raw_target)?;
    check_target_dir(&target, args.force)?;

    if !provider.enabled() {
        bail!("Provider '{}' is disabled", provider.name());
    }
    if !provider.is_available().await {
        bail!("Provider '{}' is not available", provider.name());
    }

    println!(
        "📥 Downloading from '{}' to {}",
        provider.name(),
        target.display()
    );
    print_options(&options);

    let files = provider.download_folder(&target, &options).await;
    print_files(&files);
    Ok(())
}

fn print_options(options: &DownloadOptions) {
    if options.file_pattern != "*" {
        println!("   Pattern: {}", options.file_pattern);
    }
    println!(
        "   Recursive: {}, Clean: {}",
        options.recursive, options.clean
    );
}

fn print_files(files: &[String]) {
    if files.is_empty() {
        println!("   No files downloaded (no matching files found or all files filtered out)");
        return;
    }
    let mut sorted = files.to_vec();
    sorted.sort();
    println!("   ✅ Downloaded {} file(s):", sorted.len());
    for file in sorted {
        println!("      - {}", file);
    }
}

async fn cmd_status(
    provider_name: Option<String>,
    check_connection: bool,
    details: bool,
    manager: &ConfigManager,
) -> Result<()> {
    let config = require_config(manager)?;
    let registry = ProviderRegistry::new();

    if let Some(name) = provider_name {
        let provider = registry
            .find_provider(&config, &name)
            .await?
            .ok_or_else(|| anyhow!("Provider not found: {}", name))?;
        // A named provider is always probed
        let status = ProviderStatus::collect(&provider, true).await;
        println!("Provider: {}", status.name);
        print_status(&status, true, "   ");
        return Ok(());
    }

    let mut statuses = Vec::new();
    for kind in ProviderKind::ALL {
        let names: Vec<String> = match kind {
            ProviderKind::GitHub => {
                config.github_entries().iter().map(|e| e.name.clone()).collect()
            }
            ProviderKind::Local => {
                config.local_entries().iter().map(|e| e.name.clone()).collect()
            }
        };
        for name in names {
            if let Some(provider) = registry.get_provider(&config, kind, &name).await? {
                statuses.push(ProviderStatus::collect(&provider, check_connection).await);
            }
        }
    }

    if statuses.is_empty() {
        bail!("No providers configured. Use 'config init' to create configuration.");
    }

    let overview = StatusOverview::from_statuses(&statuses);
    println!("📊 Provider Status Overview");
    println!("   Total providers: {}", overview.total);
    println!("   Enabled providers: {}", overview.enabled);
    if check_connection {
        println!("   Available providers: {}", overview.available);
    }

    for status in &statuses {
        println!("\n▶ {}", status.name);
        print_status(status, details, "   ");
    }
    Ok(())
}

fn print_status(status: &ProviderStatus, details: bool, prefix: &str) {
    println!("{}Type: {}", prefix, status.kind);
    println!(
        "{}Enabled: {}",
        prefix,
        if status.enabled { "Yes" } else { "No" }
    );
    if status.availability != Availability::Unknown {
        let icon = if status.availability == Availability::Available {
            "✅"
        } else {
            "❌"
        };
        println!("{}Status: {} {}", prefix, icon, status.availability);
    }

    if !details {
        if let Some((label, value)) = status.details.first() {
            println!("{}{}: {}", prefix, label, value);
        }
        return;
    }

    for (label, value) in &status.details {
        println!("{}{}: {}", prefix, label, value);
    }
    if !status.include_patterns.is_empty() {
        println!(
            "{}Include Patterns: {}",
            prefix,
            status.include_patterns.join(", ")
        );
    }
    if !status.exclude_patterns.is_empty() {
        println!(
            "{}Exclude Patterns: {}",
            prefix,
            status.exclude_patterns.join(", ")
        );
    }
}

async fn cmd_auth(command: AuthCommands, manager: &ConfigManager) -> Result<()> {
    match command {
        AuthCommands::Status { verify } => {
            let method = manager
                .load_config()
                .with_context(|| format!("Failed to load {:?}", manager.config_path()))?
                .map(|config| config.auth_method())
                .unwrap_or_default();

            println!("🔐 Auth method: {}", method);
            let Some(token) = AuthResolver::new().resolve(method).await else {
                println!("   No GitHub token found; requests will be unauthenticated");
                return Ok(());
            };

            println!("   Token: {} (from {})", token.masked(), token.origin);
            if verify {
                match verify_token(&GitHubEndpoints::default(), &token.token).await {
                    Some(identity) => {
                        println!("   ✅ Authenticated as {}", identity.login);
                        if !identity.scopes.is_empty() {
                            println!("   Scopes: {}", identity.scopes.join(", "));
                        }
                    }
                    None => bail!("Token was rejected by GitHub or could not be verified"),
                }
            }
            Ok(())
        }
    }
}
