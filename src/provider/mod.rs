//! Resource providers.
//!
//! A [`Provider`] is either a GitHub repository or a local directory. Both
//! variants honour the same contract:
//!
//! - a disabled provider reports unavailable, finds nothing, and downloads
//!   nothing, without touching the network or filesystem
//! - `download_folder` never fails; per-file problems are logged and the file
//!   is skipped, and precondition problems give an empty result
//! - files are processed one at a time, in enumeration order
//!
//! Providers are built fresh from a [`Config`] by the [`ProviderRegistry`] and
//! hold no state between calls.

pub mod github;
pub mod local;

use std::fs;
use std::path::{Path, PathBuf};

use path_clean::PathClean;
use tracing::{debug, info};

use crate::auth::{AuthResolver, ResolvedToken};
use crate::config::{Config, ProviderKind};
use crate::error::{ResourceError, Result};
use crate::filter::{FilePattern, PatternFilter};

pub use github::{GitHubEndpoints, GitHubProvider};
pub use local::LocalProvider;

/// Knobs for [`Provider::download_folder`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOptions {
    /// Wildcard matched against each file's base name
    pub file_pattern: String,
    /// Descend into subdirectories; `false` keeps top-level files only
    pub recursive: bool,
    /// Empty the target directory before writing
    pub clean: bool,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            file_pattern: "*".to_string(),
            recursive: true,
            clean: true,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Provider {
    GitHub(GitHubProvider),
    Local(LocalProvider),
}

impl Provider {
    pub fn name(&self) -> &str {
        match self {
            Provider::GitHub(p) => p.name(),
            Provider::Local(p) => p.name(),
        }
    }

    pub fn kind(&self) -> ProviderKind {
        match self {
            Provider::GitHub(_) => ProviderKind::GitHub,
            Provider::Local(_) => ProviderKind::Local,
        }
    }

    pub fn enabled(&self) -> bool {
        match self {
            Provider::GitHub(p) => p.enabled(),
            Provider::Local(p) => p.enabled(),
        }
    }

    pub fn filter(&self) -> &PatternFilter {
        match self {
            Provider::GitHub(p) => p.filter(),
            Provider::Local(p) => p.filter(),
        }
    }

    /// `target_dir` from the provider's config entry, if any
    pub fn default_target_dir(&self) -> Option<&str> {
        match self {
            Provider::GitHub(p) => p.target_dir(),
            Provider::Local(p) => p.target_dir(),
        }
    }

    /// Whether writing into `target` could clean or overwrite this
    /// provider's own source files
    pub fn overlaps(&self, target: &Path) -> bool {
        match self {
            Provider::GitHub(_) => false,
            Provider::Local(p) => p.overlaps(target),
        }
    }

    pub async fn is_available(&self) -> bool {
        match self {
            Provider::GitHub(p) => p.is_available().await,
            Provider::Local(p) => p.is_available().await,
        }
    }

    /// Whether `path`, relative to the provider's source root, exists
    pub async fn exists(&self, path: &str) -> bool {
        match self {
            Provider::GitHub(p) => p.exists(path).await,
            Provider::Local(p) => p.exists(path).await,
        }
    }

    /// Sync the provider's files into `target`, returning the relative paths
    /// actually written
    pub async fn download_folder(&self, target: &Path, options: &DownloadOptions) -> Vec<String> {
        match self {
            Provider::GitHub(p) => p.download_folder(target, options).await,
            Provider::Local(p) => p.download_folder(target, options).await,
        }
    }
}

/// Expand `~` and `$VAR` in a user supplied path and normalise it lexically
pub fn expand_path(raw: &str) -> Result<PathBuf> {
    let expanded = shellexpand::full(raw).map_err(|e| ResourceError::ConfigInvalid {
        field: raw.to_string(),
        message: e.to_string(),
    })?;
    Ok(PathBuf::from(expanded.as_ref()).clean())
}

/// Create `target` if needed and, when `clean` is set, remove everything
/// directly under it.
pub(crate) fn prepare_target(target: &Path, clean: bool) -> Result<()> {
    fs::create_dir_all(target).map_err(|e| ResourceError::io(target, e))?;

    if !clean {
        return Ok(());
    }

    let entries = fs::read_dir(target).map_err(|e| ResourceError::io(target, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| ResourceError::io(target, e))?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(|e| ResourceError::io(&path, e))?;
        if file_type.is_dir() {
            fs::remove_dir_all(&path).map_err(|e| ResourceError::io(&path, e))?;
        } else {
            fs::remove_file(&path).map_err(|e| ResourceError::io(&path, e))?;
        }
        debug!("Removed {:?}", path);
    }
    Ok(())
}

/// Narrow enumerated relative paths by base-name wildcard and depth, then by
/// the include/exclude filter.
pub(crate) fn select_candidates(
    paths: impl IntoIterator<Item = String>,
    file_pattern: &FilePattern,
    recursive: bool,
    filter: &PatternFilter,
) -> Vec<String> {
    let candidates: Vec<String> = paths
        .into_iter()
        .filter(|path| !path.is_empty())
        .filter(|path| recursive || !path.contains('/'))
        .filter(|path| file_pattern.matches(path))
        .collect();
    filter.apply(candidates)
}

/// Write `content` to `target/relative`, creating parent directories
pub(crate) async fn write_file(target: &Path, relative: &str, content: &[u8]) -> Result<PathBuf> {
    let destination = target.join(relative);
    if let Some(parent) = destination.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| ResourceError::io(parent, e))?;
    }
    tokio::fs::write(&destination, content)
        .await
        .map_err(|e| ResourceError::io(&destination, e))?;
    Ok(destination)
}

/// Builds providers from configuration
pub struct ProviderRegistry {
    auth: AuthResolver,
    endpoints: GitHubEndpoints,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::with_auth(AuthResolver::new(), GitHubEndpoints::default())
    }

    pub fn with_auth(auth: AuthResolver, endpoints: GitHubEndpoints) -> Self {
        Self { auth, endpoints }
    }

    pub fn endpoints(&self) -> &GitHubEndpoints {
        &self.endpoints
    }

    pub fn auth(&self) -> &AuthResolver {
        &self.auth
    }

    /// Look up the provider named `name` among entries of `kind`.
    ///
    /// Disabled entries are still returned; their operations are no-ops.
    pub async fn get_provider(
        &self,
        config: &Config,
        kind: ProviderKind,
        name: &str,
    ) -> Result<Option<Provider>> {
        let filter = pattern_filter(config)?;
        match kind {
            ProviderKind::GitHub => {
                let Some(entry) = config.github_entries().iter().find(|e| e.name == name) else {
                    return Ok(None);
                };
                let token = self.resolve_token(config).await;
                GitHubProvider::new(entry, filter, token, self.endpoints.clone())
                    .map(|p| Some(Provider::GitHub(p)))
            }
            ProviderKind::Local => {
                let Some(entry) = config.local_entries().iter().find(|e| e.name == name) else {
                    return Ok(None);
                };
                LocalProvider::new(entry, filter).map(|p| Some(Provider::Local(p)))
            }
        }
    }

    /// Look `name` up among GitHub entries first, then local ones
    pub async fn find_provider(&self, config: &Config, name: &str) -> Result<Option<Provider>> {
        for kind in ProviderKind::ALL {
            if let Some(provider) = self.get_provider(config, kind, name).await? {
                return Ok(Some(provider));
            }
        }
        Ok(None)
    }

    /// Every enabled provider, GitHub entries first, each in config order
    pub async fn get_all_providers(&self, config: &Config) -> Result<Vec<Provider>> {
        let filter = pattern_filter(config)?;
        let mut providers = Vec::new();

        let github: Vec<_> = config.github_entries().iter().filter(|e| e.enabled).collect();
        if !github.is_empty() {
            let token = self.resolve_token(config).await;
            for entry in github {
                providers.push(Provider::GitHub(GitHubProvider::new(
                    entry,
                    filter.clone(),
                    token.clone(),
                    self.endpoints.clone(),
                )?));
            }
        }

        for entry in config.local_entries().iter().filter(|e| e.enabled) {
            providers.push(Provider::Local(LocalProvider::new(entry, filter.clone())?));
        }

        info!("Loaded {} enabled provider(s)", providers.len());
        Ok(providers)
    }

    async fn resolve_token(&self, config: &Config) -> Option<ResolvedToken> {
        self.auth.resolve(config.auth_method()).await
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn pattern_filter(config: &Config) -> Result<PatternFilter> {
    PatternFilter::new(config.include_patterns(), config.exclude_patterns())
}
