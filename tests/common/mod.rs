//! Common test utilities and helpers for resource-manager tests
#![allow(dead_code)]

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use resource_manager::auth::{AuthResolver, ResolvedToken, TokenOrigin, TokenSource};
use resource_manager::{Config, ConfigManager, GitHubEndpoints, ProviderRegistry};
use serde_json::Value;
use tempfile::TempDir;

/// Scratch directories for one test: a config dir, a source tree and a target
pub struct TestEnvironment {
    pub temp_dir: TempDir,
    pub config_dir: PathBuf,
    pub source_dir: PathBuf,
    pub target_dir: PathBuf,
}

impl TestEnvironment {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_dir = temp_dir.path().join(".resource-manager");
        let source_dir = temp_dir.path().join("source");
        let target_dir = temp_dir.path().join("target");
        std::fs::create_dir_all(&source_dir).expect("Failed to create source dir");

        Self {
            temp_dir,
            config_dir,
            source_dir,
            target_dir,
        }
    }

    pub fn manager(&self) -> ConfigManager {
        ConfigManager::new(&self.config_dir)
    }

    pub fn write_config(&self, data: Value) -> PathBuf {
        std::fs::create_dir_all(&self.config_dir).expect("Failed to create config dir");
        let path = self.config_dir.join("config.json");
        std::fs::write(&path, serde_json::to_string_pretty(&data).unwrap())
            .expect("Failed to write test config");
        path
    }

    pub fn write_source(&self, relative: &str, content: &str) {
        write_file(&self.source_dir, relative, content);
    }

    pub fn write_target(&self, relative: &str, content: &str) {
        write_file(&self.target_dir, relative, content);
    }

    /// Config with one local provider pointing at `source_dir`
    pub fn local_config(&self, extra_resources: Value) -> Config {
        let mut data = serde_json::json!({
            "providers": {
                "local": [{"name": "shared", "path": self.source_dir.display().to_string()}]
            },
            "auth": {"github": {"method": "default"}}
        });
        if !extra_resources.is_null() {
            data["resources"] = extra_resources;
        }
        Config::new(data).expect("Invalid test config")
    }
}

pub fn write_file(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).expect("Failed to create parent dir");
    std::fs::write(path, content).expect("Failed to write file");
}

/// Token source returning a fixed answer
pub struct StaticToken(pub Option<String>);

#[async_trait]
impl TokenSource for StaticToken {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn fetch(&self) -> Option<ResolvedToken> {
        self.0.clone().map(|token| ResolvedToken {
            token,
            origin: TokenOrigin::Environment("TEST_TOKEN".to_string()),
        })
    }
}

pub fn resolver_with_token(token: Option<&str>) -> AuthResolver {
    AuthResolver::with_sources(
        Box::new(StaticToken(token.map(str::to_string))),
        Box::new(StaticToken(None)),
    )
}

/// Endpoints that route every GitHub host to one mock server
pub fn mock_endpoints(base: &str) -> GitHubEndpoints {
    GitHubEndpoints::new(
        &format!("{}/api", base),
        &format!("{}/raw", base),
        &format!("{}/web", base),
    )
}

pub fn registry(endpoints: GitHubEndpoints, token: Option<&str>) -> ProviderRegistry {
    ProviderRegistry::with_auth(resolver_with_token(token), endpoints)
}

/// Sorted relative paths of every file under `root`
pub fn files_under(root: &Path) -> Vec<String> {
    let mut files: Vec<String> = walkdir::WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| {
            entry
                .path()
                .strip_prefix(root)
                .unwrap()
                .to_string_lossy()
                .replace('\\', "/")
        })
        .collect();
    files.sort();
    files
}

/// 40-character classic token accepted by the shape validator
pub const CLASSIC_TOKEN: &str = "0123456789abcdef0123456789abcdef01234567";
