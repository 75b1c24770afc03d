use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::error::{ResourceError, Result};
use crate::path::{kind_of, PathAddress};

/// Directory (relative to the working directory) holding the config file
pub const CONFIG_DIR_NAME: &str = ".resource-manager";

/// Default configuration file name
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Exclude patterns applied when `resources.exclude_patterns` is absent
pub const DEFAULT_EXCLUDE_PATTERNS: [&str; 3] = [".git", "__pycache__", "*.pyc"];

/// The two known provider families under `providers`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    GitHub,
    Local,
}

impl ProviderKind {
    /// Lookup order used wherever both kinds are scanned
    pub const ALL: [ProviderKind; 2] = [ProviderKind::GitHub, ProviderKind::Local];

    /// Key under `providers`
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::GitHub => "github",
            ProviderKind::Local => "local",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            ProviderKind::GitHub => "GitHub",
            ProviderKind::Local => "Local",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = ResourceError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "github" => Ok(ProviderKind::GitHub),
            "local" => Ok(ProviderKind::Local),
            other => Err(ResourceError::config(
                "providers",
                format!("Unknown provider type '{}'. Must be one of: github, local", other),
            )),
        }
    }
}

/// GitHub token resolution strategy (`auth.github.method`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMethod {
    /// No token; unauthenticated requests
    Default,
    /// Environment variables, then the git credential helper
    #[default]
    Auto,
    /// Environment variables only
    Dotenv,
    /// Git credential helper only
    Gitcli,
}

impl AuthMethod {
    pub const NAMES: [&'static str; 4] = ["default", "auto", "dotenv", "gitcli"];

    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMethod::Default => "default",
            AuthMethod::Auto => "auto",
            AuthMethod::Dotenv => "dotenv",
            AuthMethod::Gitcli => "gitcli",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "default" => Some(AuthMethod::Default),
            "auto" => Some(AuthMethod::Auto),
            "dotenv" => Some(AuthMethod::Dotenv),
            "gitcli" => Some(AuthMethod::Gitcli),
            _ => None,
        }
    }
}

impl fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed view of a validated configuration tree
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct ResourceManagerConfig {
    #[serde(default)]
    pub providers: ProvidersConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub resources: ResourcesConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub github: Vec<GitHubEntry>,

    #[serde(default)]
    pub local: Vec<LocalEntry>,
}

/// One `providers.github[]` entry
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct GitHubEntry {
    pub name: String,

    /// Repository URL, `https://github.com/{owner}/{repo}`
    pub url: String,

    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_branch")]
    pub default_branch: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Subtree of the repository served as the provider's root
    #[serde(default = "default_resource_dir")]
    pub resource_dir: String,

    /// Fallback target directory for downloads
    #[serde(default)]
    pub target_dir: Option<String>,
}

/// One `providers.local[]` entry
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LocalEntry {
    pub name: String,

    pub path: String,

    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub target_dir: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct AuthConfig {
    #[serde(default)]
    pub github: GitHubAuthConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct GitHubAuthConfig {
    #[serde(default)]
    pub method: AuthMethod,
}

/// Include/exclude patterns shared by every provider
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ResourcesConfig {
    #[serde(default)]
    pub include_patterns: Vec<String>,

    #[serde(default = "default_exclude_patterns")]
    pub exclude_patterns: Vec<String>,
}

impl Default for ResourcesConfig {
    fn default() -> Self {
        Self {
            include_patterns: Vec::new(),
            exclude_patterns: default_exclude_patterns(),
        }
    }
}

// Default value functions
fn default_true() -> bool {
    true
}
fn default_branch() -> String {
    "main".to_string()
}
fn default_timeout() -> u64 {
    10
}
fn default_resource_dir() -> String {
    "resources".to_string()
}
fn default_exclude_patterns() -> Vec<String> {
    DEFAULT_EXCLUDE_PATTERNS.iter().map(|p| p.to_string()).collect()
}

/// Validated configuration: the raw decoded tree plus its typed projection.
///
/// Every mutation goes through validation; a failed [`Config::set`] leaves
/// the previous state untouched.
#[derive(Debug, Clone)]
pub struct Config {
    data: Value,
    settings: ResourceManagerConfig,
}

impl Config {
    /// Validate decoded configuration data. `null` is treated as an empty
    /// mapping; missing `providers` and `auth` sections are filled in.
    pub fn new(data: Value) -> Result<Self> {
        let mut data = if data.is_null() {
            Value::Object(Map::new())
        } else {
            data
        };
        let settings = normalize_and_validate(&mut data)?;
        Ok(Self { data, settings })
    }

    /// Value at a dotted/indexed address. Malformed addresses, missing keys
    /// and out-of-range indices all yield `None`.
    pub fn get(&self, path: &str) -> Option<&Value> {
        match PathAddress::parse(path) {
            Ok(address) => address.get(&self.data),
            Err(e) => {
                debug!("Ignoring unreadable config path: {}", e);
                None
            }
        }
    }

    /// Like [`Config::get`], falling back to `default`
    pub fn get_or(&self, path: &str, default: Value) -> Value {
        self.get(path).cloned().unwrap_or(default)
    }

    /// Store `value` at `path`, creating intermediate structure, then
    /// re-validate. On failure the configuration is unchanged.
    pub fn set(&mut self, path: &str, value: Value) -> Result<()> {
        let address = PathAddress::parse(path)?;

        let mut candidate = self.data.clone();
        address.set(&mut candidate, value)?;
        let settings = normalize_and_validate(&mut candidate)?;

        self.data = candidate;
        self.settings = settings;
        Ok(())
    }

    /// Raw provider entries of one kind, in configuration order
    pub fn providers(&self, kind: ProviderKind) -> &[Value] {
        self.data
            .get("providers")
            .and_then(|p| p.get(kind.as_str()))
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Raw provider entries whose `enabled` flag is not `false`
    pub fn enabled_providers(&self, kind: ProviderKind) -> Vec<&Value> {
        self.providers(kind)
            .iter()
            .filter(|entry| entry.get("enabled").and_then(Value::as_bool) != Some(false))
            .collect()
    }

    pub fn settings(&self) -> &ResourceManagerConfig {
        &self.settings
    }

    pub fn github_entries(&self) -> &[GitHubEntry] {
        &self.settings.providers.github
    }

    pub fn local_entries(&self) -> &[LocalEntry] {
        &self.settings.providers.local
    }

    pub fn auth_method(&self) -> AuthMethod {
        self.settings.auth.github.method
    }

    pub fn include_patterns(&self) -> &[String] {
        &self.settings.resources.include_patterns
    }

    pub fn exclude_patterns(&self) -> &[String] {
        &self.settings.resources.exclude_patterns
    }

    /// The decoded tree, ready to be serialized
    pub fn as_value(&self) -> &Value {
        &self.data
    }

    pub fn into_value(self) -> Value {
        self.data
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data: json!({
                "providers": {"github": [], "local": []},
                "auth": {"github": {"method": "auto"}},
            }),
            settings: ResourceManagerConfig::default(),
        }
    }
}

#[derive(Clone, Copy)]
enum FieldType {
    Text,
    Flag,
    Seconds,
}

struct FieldRule {
    key: &'static str,
    label: &'static str,
    ty: FieldType,
    required: bool,
}

const GITHUB_FIELDS: &[FieldRule] = &[
    FieldRule { key: "name", label: "name", ty: FieldType::Text, required: true },
    FieldRule { key: "url", label: "URL", ty: FieldType::Text, required: true },
    FieldRule { key: "enabled", label: "enabled flag", ty: FieldType::Flag, required: false },
    FieldRule { key: "default_branch", label: "default branch", ty: FieldType::Text, required: false },
    FieldRule { key: "timeout", label: "timeout", ty: FieldType::Seconds, required: false },
    FieldRule { key: "resource_dir", label: "resource directory", ty: FieldType::Text, required: false },
    FieldRule { key: "target_dir", label: "target directory", ty: FieldType::Text, required: false },
];

const LOCAL_FIELDS: &[FieldRule] = &[
    FieldRule { key: "name", label: "name", ty: FieldType::Text, required: true },
    FieldRule { key: "path", label: "path", ty: FieldType::Text, required: true },
    FieldRule { key: "enabled", label: "enabled flag", ty: FieldType::Flag, required: false },
    FieldRule { key: "target_dir", label: "target directory", ty: FieldType::Text, required: false },
];

/// Fill in defaulted sections, check every invariant, and build the typed view
fn normalize_and_validate(data: &mut Value) -> Result<ResourceManagerConfig> {
    let root = match data {
        Value::Object(root) => root,
        other => {
            return Err(ResourceError::config(
                "<root>",
                format!("Configuration must be a mapping, found {}", kind_of(other)),
            ))
        }
    };

    let providers = root
        .entry("providers")
        .or_insert_with(|| json!({"github": [], "local": []}));
    let Value::Object(providers) = providers else {
        return Err(ResourceError::config("providers", "Providers must be a mapping"));
    };

    for kind in ProviderKind::ALL {
        let entries = providers
            .entry(kind.as_str())
            .or_insert_with(|| Value::Array(Vec::new()));
        let rules = match kind {
            ProviderKind::GitHub => GITHUB_FIELDS,
            ProviderKind::Local => LOCAL_FIELDS,
        };
        validate_entries(kind, entries, rules)?;
    }

    validate_auth(root)?;
    validate_resources(root)?;

    serde_json::from_value(Value::Object(root.clone()))
        .map_err(|e| ResourceError::config("<root>", e.to_string()))
}

fn validate_entries(kind: ProviderKind, entries: &Value, rules: &[FieldRule]) -> Result<()> {
    let field = format!("providers.{}", kind);
    let Value::Array(entries) = entries else {
        return Err(ResourceError::config(
            field,
            format!("{} providers must be a sequence", kind.label()),
        ));
    };

    for (index, entry) in entries.iter().enumerate() {
        let entry_field = format!("{}[{}]", field, index);
        let Value::Object(entry) = entry else {
            return Err(ResourceError::config(
                entry_field,
                format!("{} provider must be a mapping", kind.label()),
            ));
        };

        for rule in rules {
            let rule_field = format!("{}.{}", entry_field, rule.key);
            let Some(value) = entry.get(rule.key) else {
                if rule.required {
                    return Err(ResourceError::config(
                        rule_field,
                        format!("{} provider must have a {}", kind.label(), rule.label),
                    ));
                }
                continue;
            };

            let ok = match rule.ty {
                FieldType::Text => value.is_string(),
                FieldType::Flag => value.is_boolean(),
                FieldType::Seconds => value.is_u64(),
            };
            if !ok {
                let expected = match rule.ty {
                    FieldType::Text => "a string",
                    FieldType::Flag => "a boolean",
                    FieldType::Seconds => "a non-negative integer",
                };
                return Err(ResourceError::config(
                    rule_field,
                    format!(
                        "{} provider {} must be {}, found {}",
                        kind.label(),
                        rule.label,
                        expected,
                        kind_of(value)
                    ),
                ));
            }
        }
    }

    Ok(())
}

fn validate_auth(root: &mut Map<String, Value>) -> Result<()> {
    let auth = root
        .entry("auth")
        .or_insert_with(|| json!({"github": {"method": "auto"}}));
    let Value::Object(auth) = auth else {
        return Err(ResourceError::config("auth", "Auth must be a mapping"));
    };

    let github = auth
        .entry("github")
        .or_insert_with(|| json!({"method": "auto"}));
    let Value::Object(github) = github else {
        return Err(ResourceError::config("auth.github", "GitHub auth must be a mapping"));
    };

    let method = github
        .entry("method")
        .or_insert_with(|| Value::String(AuthMethod::default().as_str().to_string()));

    if method.as_str().and_then(AuthMethod::parse).is_none() {
        let shown = match method {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        return Err(ResourceError::config(
            "auth.github.method",
            format!(
                "Invalid auth method '{}'. Must be one of: {}",
                shown,
                AuthMethod::NAMES.join(", ")
            ),
        ));
    }

    Ok(())
}

fn validate_resources(root: &Map<String, Value>) -> Result<()> {
    let Some(resources) = root.get("resources") else {
        return Ok(());
    };
    let Value::Object(resources) = resources else {
        return Err(ResourceError::config("resources", "Resources must be a mapping"));
    };

    for key in ["include_patterns", "exclude_patterns"] {
        let Some(patterns) = resources.get(key) else {
            continue;
        };
        let field = format!("resources.{}", key);
        let Value::Array(patterns) = patterns else {
            return Err(ResourceError::config(field, "Patterns must be a sequence of strings"));
        };
        if let Some(index) = patterns.iter().position(|p| !p.is_string()) {
            return Err(ResourceError::config(
                format!("{}[{}]", field, index),
                "Pattern must be a string",
            ));
        }
    }

    Ok(())
}

/// Summary of the configuration file's state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigInfo {
    pub path: PathBuf,
    pub exists: bool,
    pub valid: bool,
    pub has_providers: bool,
}

/// Loads and saves [`Config`] as a JSON file
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_dir: PathBuf,
    config_file: String,
}

impl ConfigManager {
    pub fn new(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
            config_file: CONFIG_FILE_NAME.to_string(),
        }
    }

    /// `./.resource-manager/config.json`
    pub fn in_current_dir() -> Result<Self> {
        let cwd = std::env::current_dir().map_err(|e| ResourceError::io(".", e))?;
        Ok(Self::new(cwd.join(CONFIG_DIR_NAME)))
    }

    pub fn with_file_name(mut self, config_file: impl Into<String>) -> Self {
        self.config_file = config_file.into();
        self
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn config_path(&self) -> PathBuf {
        self.config_dir.join(&self.config_file)
    }

    /// Write an empty configuration
    pub fn init(&self) -> Result<()> {
        self.save_config(&Config::default())
    }

    /// Decoded file contents, `None` when the file does not exist
    pub fn load_raw(&self) -> Result<Option<Value>> {
        let path = self.config_path();
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&path).map_err(|e| ResourceError::io(&path, e))?;
        let data = serde_json::from_str(&content).map_err(|source| ResourceError::Json {
            path: path.clone(),
            source,
        })?;
        Ok(Some(data))
    }

    /// Load and validate the configuration, `None` when the file does not exist
    pub fn load_config(&self) -> Result<Option<Config>> {
        self.load_raw()?.map(Config::new).transpose()
    }

    pub fn save_config(&self, config: &Config) -> Result<()> {
        std::fs::create_dir_all(&self.config_dir)
            .map_err(|e| ResourceError::io(&self.config_dir, e))?;

        let path = self.config_path();
        let content = serde_json::to_string_pretty(config.as_value()).map_err(|source| {
            ResourceError::Json {
                path: path.clone(),
                source,
            }
        })?;
        std::fs::write(&path, content).map_err(|e| ResourceError::io(&path, e))?;

        debug!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Write a sample configuration with one provider of each kind
    pub fn create_sample_config(&self) -> Result<PathBuf> {
        let config = Config::new(json!({
            "auth": {"github": {"method": "auto"}},
            "providers": {
                "github": [{
                    "name": "example-github",
                    "enabled": true,
                    "url": "https://github.com/owner/repo",
                    "default_branch": "main",
                    "resource_dir": "resources",
                    "timeout": 10,
                }],
                "local": [{
                    "name": "example-local",
                    "enabled": true,
                    "path": "./local-resources",
                }],
            },
            "resources": {
                "include_patterns": ["*.txt", "*.md"],
                "exclude_patterns": DEFAULT_EXCLUDE_PATTERNS,
            },
        }))?;

        self.save_config(&config)?;
        tracing::info!("Created sample configuration at: {:?}", self.config_path());
        Ok(self.config_path())
    }

    /// Load the file and run full validation on it
    pub fn validate_file(&self) -> Result<()> {
        match self.load_raw()? {
            Some(data) => Config::new(data).map(|_| ()),
            None => Err(ResourceError::io(
                self.config_path(),
                std::io::Error::new(std::io::ErrorKind::NotFound, "configuration file not found"),
            )),
        }
    }

    pub fn config_info(&self) -> ConfigInfo {
        let path = self.config_path();
        let exists = path.exists();
        let loaded = self.load_config().ok().flatten();

        ConfigInfo {
            path,
            exists,
            valid: loaded.is_some(),
            has_providers: loaded
                .map(|config| {
                    ProviderKind::ALL
                        .iter()
                        .any(|kind| !config.providers(*kind).is_empty())
                })
                .unwrap_or(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use tempfile::TempDir;

    fn sample_data() -> Value {
        json!({
            "providers": {
                "github": [{
                    "name": "test-github",
                    "enabled": true,
                    "url": "https://github.com/crimson206/my-prompts",
                    "resource_dir": "prompts",
                    "timeout": 10,
                    "default_branch": "main"
                }],
                "local": [{
                    "name": "test-local",
                    "enabled": true,
                    "path": "./local-resources"
                }]
            },
            "cache": {"enabled": true, "ttl": 3600}
        })
    }

    fn field_of(err: ResourceError) -> String {
        match err {
            ResourceError::ConfigInvalid { field, .. } => field,
            other => panic!("expected ConfigInvalid, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_config_gets_provider_sections() {
        let config = Config::new(json!({})).unwrap();
        assert_eq!(config.get("providers.github"), Some(&json!([])));
        assert_eq!(config.get("providers.local"), Some(&json!([])));
        assert_eq!(config.get("auth.github.method"), Some(&json!("auto")));
        assert_eq!(config.auth_method(), AuthMethod::Auto);
    }

    #[test]
    fn test_null_config_is_treated_as_empty() {
        let config = Config::new(Value::Null).unwrap();
        assert_eq!(config.as_value(), Config::default().as_value());
    }

    #[test]
    fn test_missing_sub_keys_are_filled_in() {
        let config = Config::new(json!({"providers": {"github": []}, "auth": {"github": {}}})).unwrap();
        assert_eq!(config.get("providers.local"), Some(&json!([])));
        assert_eq!(config.get("auth.github.method"), Some(&json!("auto")));
    }

    #[test]
    fn test_typed_projection_applies_defaults() {
        let config = Config::new(json!({
            "providers": {"github": [{"name": "g", "url": "https://github.com/o/r"}]}
        }))
        .unwrap();

        let entry = &config.github_entries()[0];
        assert!(entry.enabled);
        assert_eq!(entry.default_branch, "main");
        assert_eq!(entry.timeout, 10);
        assert_eq!(entry.resource_dir, "resources");
        assert_eq!(entry.target_dir, None);
        assert!(config.include_patterns().is_empty());
        assert_eq!(config.exclude_patterns(), &[".git", "__pycache__", "*.pyc"]);
    }

    #[test]
    fn test_explicit_empty_excludes_are_kept() {
        let config = Config::new(json!({"resources": {"exclude_patterns": []}})).unwrap();
        assert!(config.exclude_patterns().is_empty());
    }

    #[test]
    fn test_root_must_be_mapping() {
        assert_eq!(field_of(Config::new(json!([1, 2])).unwrap_err()), "<root>");
    }

    #[test]
    fn test_providers_must_be_mapping() {
        let err = Config::new(json!({"providers": []})).unwrap_err();
        assert!(err.to_string().contains("Providers must be a mapping"));
    }

    #[test]
    fn test_github_entry_requires_name_and_url() {
        let err = Config::new(json!({
            "providers": {"github": [{"url": "https://github.com/test/repo"}]}
        }))
        .unwrap_err();
        assert!(err.to_string().contains("GitHub provider must have a name"));

        let err = Config::new(json!({"providers": {"github": [{"name": "x"}]}})).unwrap_err();
        assert_eq!(field_of(err), "providers.github[0].url");
    }

    #[test]
    fn test_local_entry_requires_name_and_path() {
        let err = Config::new(json!({"providers": {"local": [{"name": "x"}]}})).unwrap_err();
        assert!(err.to_string().contains("Local provider must have a path"));

        let err = Config::new(json!({"providers": {"local": [{"path": "/tmp"}]}})).unwrap_err();
        assert_eq!(field_of(err), "providers.local[0].name");
    }

    #[test]
    fn test_entry_field_types_are_checked() {
        let err = Config::new(json!({
            "providers": {"github": [{"name": "g", "url": "https://github.com/o/r", "timeout": "slow"}]}
        }))
        .unwrap_err();
        assert_eq!(field_of(err), "providers.github[0].timeout");

        let err = Config::new(json!({
            "providers": {"local": [{"name": "l", "path": "/tmp", "enabled": "yes"}]}
        }))
        .unwrap_err();
        assert_eq!(field_of(err), "providers.local[0].enabled");

        let err = Config::new(json!({"providers": {"local": ["not-a-mapping"]}})).unwrap_err();
        assert_eq!(field_of(err), "providers.local[0]");
    }

    #[test]
    fn test_auth_method_must_be_known() {
        for method in AuthMethod::NAMES {
            let config = Config::new(json!({"auth": {"github": {"method": method}}})).unwrap();
            assert_eq!(config.auth_method().as_str(), method);
        }

        let err = Config::new(json!({"auth": {"github": {"method": "magic"}}})).unwrap_err();
        assert!(err
            .to_string()
            .contains("Invalid auth method 'magic'. Must be one of: default, auto, dotenv, gitcli"));
    }

    #[test]
    fn test_resource_patterns_must_be_strings() {
        let err = Config::new(json!({"resources": {"include_patterns": ["*.md", 3]}})).unwrap_err();
        assert_eq!(field_of(err), "resources.include_patterns[1]");
    }

    #[test]
    fn test_get_with_dot_notation() {
        let config = Config::new(sample_data()).unwrap();
        assert_eq!(config.get("providers.github[0].name"), Some(&json!("test-github")));
        assert_eq!(config.get("providers.local[0].path"), Some(&json!("./local-resources")));
        assert_eq!(config.get("cache.enabled"), Some(&json!(true)));
        assert_eq!(config.get_or("nonexistent", json!("default")), json!("default"));
        assert_eq!(config.get_or("providers.github[7].name", json!(null)), json!(null));
        assert_eq!(config.get_or("providers.github[x", json!(1)), json!(1));
    }

    #[test]
    fn test_set_with_dot_notation() {
        let mut config = Config::new(sample_data()).unwrap();

        config.set("providers.github[0].timeout", json!(30)).unwrap();
        assert_eq!(config.get("providers.github[0].timeout"), Some(&json!(30)));
        assert_eq!(config.github_entries()[0].timeout, 30);

        config.set("new.key", json!("value")).unwrap();
        assert_eq!(config.get("new.key"), Some(&json!("value")));
    }

    #[test]
    fn test_set_rejects_malformed_path() {
        let mut config = Config::default();
        assert_matches!(
            config.set("providers.github[", json!(1)),
            Err(ResourceError::InvalidPath { .. })
        );
    }

    #[test]
    fn test_failed_set_leaves_config_unchanged() {
        let mut config = Config::new(sample_data()).unwrap();
        let before = config.as_value().clone();

        assert!(config.set("providers", json!([])).is_err());
        assert!(config.set("providers.local[3].name", json!("half-built")).is_err());
        assert!(config.set("auth.github.method", json!("token")).is_err());

        assert_eq!(config.as_value(), &before);
    }

    #[test]
    fn test_set_can_append_a_complete_provider() {
        let mut config = Config::default();
        config
            .set("providers.local[0]", json!({"name": "docs", "path": "/srv/docs"}))
            .unwrap();
        assert_eq!(config.local_entries()[0].name, "docs");
    }

    #[test]
    fn test_enabled_providers_filter() {
        let mut config = Config::new(sample_data()).unwrap();
        assert_eq!(config.providers(ProviderKind::GitHub).len(), 1);
        assert_eq!(config.enabled_providers(ProviderKind::GitHub).len(), 1);

        config.set("providers.github[0].enabled", json!(false)).unwrap();
        assert_eq!(config.providers(ProviderKind::GitHub).len(), 1);
        assert!(config.enabled_providers(ProviderKind::GitHub).is_empty());
    }

    #[test]
    fn test_provider_kind_parsing() {
        assert_eq!("github".parse::<ProviderKind>().unwrap(), ProviderKind::GitHub);
        assert_eq!("local".parse::<ProviderKind>().unwrap(), ProviderKind::Local);
        assert!("gitlab".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn test_config_manager_init_and_load() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let manager = ConfigManager::new(temp_dir.path().join(CONFIG_DIR_NAME));

        assert!(manager.load_config().unwrap().is_none());

        manager.init().unwrap();
        let config = manager.load_config().unwrap().expect("config should exist");
        assert!(config.providers(ProviderKind::GitHub).is_empty());
        assert!(config.providers(ProviderKind::Local).is_empty());
    }

    #[test]
    fn test_config_manager_save_and_load() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let manager = ConfigManager::new(temp_dir.path());

        let config = Config::new(sample_data()).unwrap();
        manager.save_config(&config).unwrap();

        let loaded = manager.load_config().unwrap().unwrap();
        assert_eq!(loaded.get("providers.github[0].name"), Some(&json!("test-github")));
        assert_eq!(loaded.get("providers.local[0].path"), Some(&json!("./local-resources")));
        assert_eq!(loaded.as_value(), config.as_value());
    }

    #[test]
    fn test_config_manager_sample_config() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let manager = ConfigManager::new(temp_dir.path());

        let path = manager.create_sample_config().unwrap();
        assert!(path.exists());

        let config = manager.load_config().unwrap().unwrap();
        assert!(!config.providers(ProviderKind::GitHub).is_empty());
        assert!(!config.providers(ProviderKind::Local).is_empty());
        assert_eq!(config.get("auth.github.method"), Some(&json!("auto")));

        let info = manager.config_info();
        assert!(info.exists && info.valid && info.has_providers);
    }

    #[test]
    fn test_config_manager_reports_invalid_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let manager = ConfigManager::new(temp_dir.path());
        std::fs::write(manager.config_path(), r#"{"providers": []}"#).unwrap();

        assert_matches!(manager.validate_file(), Err(ResourceError::ConfigInvalid { .. }));
        assert!(manager.load_config().is_err());

        let info = manager.config_info();
        assert!(info.exists);
        assert!(!info.valid);

        std::fs::write(manager.config_path(), "{ not json").unwrap();
        assert_matches!(manager.validate_file(), Err(ResourceError::Json { .. }));
    }

    #[test]
    fn test_config_manager_missing_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let manager = ConfigManager::new(temp_dir.path().join("nowhere"));

        assert_matches!(manager.validate_file(), Err(ResourceError::Io { .. }));
        let info = manager.config_info();
        assert!(!info.exists && !info.valid && !info.has_providers);
    }
}
