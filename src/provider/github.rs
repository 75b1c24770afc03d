//! GitHub repository provider.
//!
//! Enumeration is a single Git Trees API call with `recursive=1`; file bodies
//! come from the raw content host so they do not count against the API rate
//! limit. A resolved token is sent as `Authorization: token ...` on API and
//! raw requests.

use std::path::Path;
use std::time::Duration;

use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::{prepare_target, select_candidates, write_file, DownloadOptions};
use crate::auth::ResolvedToken;
use crate::config::GitHubEntry;
use crate::error::{ResourceError, Result};
use crate::filter::{FilePattern, PatternFilter};

pub const DEFAULT_API_URL: &str = "https://api.github.com";
pub const DEFAULT_RAW_URL: &str = "https://raw.githubusercontent.com";
pub const DEFAULT_WEB_URL: &str = "https://github.com";

const REPOSITORY_URL_PREFIX: &str = "https://github.com/";
const AVAILABILITY_TIMEOUT: Duration = Duration::from_secs(5);
const USER_AGENT: &str = concat!("resource-manager/", env!("CARGO_PKG_VERSION"));

/// Base URLs for the three GitHub hosts a provider talks to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitHubEndpoints {
    pub api: String,
    pub raw: String,
    pub web: String,
}

impl GitHubEndpoints {
    pub fn new(api: &str, raw: &str, web: &str) -> Self {
        Self {
            api: api.trim_end_matches('/').to_string(),
            raw: raw.trim_end_matches('/').to_string(),
            web: web.trim_end_matches('/').to_string(),
        }
    }
}

impl Default for GitHubEndpoints {
    fn default() -> Self {
        Self::new(DEFAULT_API_URL, DEFAULT_RAW_URL, DEFAULT_WEB_URL)
    }
}

pub(crate) fn http_client() -> reqwest::Result<Client> {
    Client::builder().user_agent(USER_AGENT).build()
}

/// Split `https://github.com/{owner}/{repo}` into its owner and repo
pub fn parse_repository_url(url: &str) -> Option<(String, String)> {
    let rest = url.strip_prefix(REPOSITORY_URL_PREFIX)?;
    let mut parts = rest.trim_end_matches('/').split('/');
    let owner = parts.next().filter(|s| !s.is_empty())?;
    let repo = parts.next().filter(|s| !s.is_empty())?;
    if parts.next().is_some() {
        return None;
    }
    Some((owner.to_string(), repo.to_string()))
}

/// Append `segments` to `base`, percent-encoding each one
fn endpoint_url<'a>(base: &str, segments: impl IntoIterator<Item = &'a str>) -> Result<Url> {
    let mut url = Url::parse(base).map_err(|e| ResourceError::transfer(base, e))?;
    url.path_segments_mut()
        .map_err(|_| ResourceError::transfer(base, "URL cannot take path segments"))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

#[derive(Debug, Deserialize)]
struct TreeResponse {
    #[serde(default)]
    tree: Vec<TreeEntry>,
    #[serde(default)]
    truncated: bool,
}

#[derive(Debug, Deserialize)]
struct TreeEntry {
    path: String,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Clone)]
pub struct GitHubProvider {
    name: String,
    url: String,
    owner: String,
    repo: String,
    branch: String,
    resource_dir: String,
    timeout: Duration,
    enabled: bool,
    target_dir: Option<String>,
    token: Option<ResolvedToken>,
    filter: PatternFilter,
    endpoints: GitHubEndpoints,
    client: Client,
}

impl GitHubProvider {
    pub fn new(
        entry: &GitHubEntry,
        filter: PatternFilter,
        token: Option<ResolvedToken>,
        endpoints: GitHubEndpoints,
    ) -> Result<Self> {
        let (owner, repo) =
            parse_repository_url(&entry.url).ok_or_else(|| ResourceError::ProviderConstruction {
                name: entry.name.clone(),
                reason: format!(
                    "Invalid GitHub URL '{}'. Expected: https://github.com/owner/repo",
                    entry.url
                ),
            })?;

        let client = http_client().map_err(|e| ResourceError::ProviderConstruction {
            name: entry.name.clone(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            name: entry.name.clone(),
            url: entry.url.clone(),
            owner,
            repo,
            branch: entry.default_branch.clone(),
            resource_dir: entry.resource_dir.trim_matches('/').to_string(),
            timeout: Duration::from_secs(entry.timeout),
            enabled: entry.enabled,
            target_dir: entry.target_dir.clone(),
            token,
            filter,
            endpoints,
            client,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn repo(&self) -> &str {
        &self.repo
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    pub fn resource_dir(&self) -> &str {
        &self.resource_dir
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn target_dir(&self) -> Option<&str> {
        self.target_dir.as_deref()
    }

    pub fn filter(&self) -> &PatternFilter {
        &self.filter
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    /// Unauthenticated HEAD against the repository page
    pub async fn is_available(&self) -> bool {
        if !self.enabled {
            return false;
        }

        let url = format!("{}/{}/{}", self.endpoints.web, self.owner, self.repo);
        match self
            .client
            .head(&url)
            .timeout(AVAILABILITY_TIMEOUT)
            .send()
            .await
        {
            Ok(response) => response.status() == StatusCode::OK,
            Err(e) => {
                debug!("Availability check for {} failed: {}", url, e);
                false
            }
        }
    }

    /// Contents API lookup of `path` under the resource directory
    pub async fn exists(&self, path: &str) -> bool {
        if !self.enabled {
            return false;
        }

        let url = match self.contents_url(path) {
            Ok(url) => url,
            Err(e) => {
                debug!("Existence check for {} failed: {}", path, e);
                return false;
            }
        };
        let request = self
            .client
            .get(url.clone())
            .query(&[("ref", self.branch.as_str())])
            .timeout(self.timeout);

        match self.authorize(request).send().await {
            Ok(response) => response.status() == StatusCode::OK,
            Err(e) => {
                debug!("Existence check for {} failed: {}", url, e);
                false
            }
        }
    }

    /// Relative paths under the resource directory that a download with
    /// these settings would fetch
    pub async fn list_files(&self, file_pattern: &FilePattern, recursive: bool) -> Result<Vec<String>> {
        let tree = self.fetch_tree().await?;
        let relative = tree
            .into_iter()
            .filter_map(|path| self.relative_to_resource_dir(&path).map(str::to_string));
        Ok(select_candidates(relative, file_pattern, recursive, &self.filter))
    }

    pub async fn download_folder(&self, target: &Path, options: &DownloadOptions) -> Vec<String> {
        if !self.enabled {
            debug!("Provider '{}' is disabled; nothing to download", self.name);
            return Vec::new();
        }

        let file_pattern = match FilePattern::new(&options.file_pattern) {
            Ok(pattern) => pattern,
            Err(e) => {
                warn!("{}", e);
                return Vec::new();
            }
        };

        if let Err(e) = prepare_target(target, options.clean) {
            warn!("Cannot prepare target directory for '{}': {}", self.name, e);
            return Vec::new();
        }

        let files = match self.list_files(&file_pattern, options.recursive).await {
            Ok(files) => files,
            Err(e) => {
                warn!("Failed to list files from GitHub provider '{}': {}", self.name, e);
                return Vec::new();
            }
        };

        info!(
            "Downloading {} file(s) from {}/{}@{}",
            files.len(),
            self.owner,
            self.repo,
            self.branch
        );

        let mut downloaded = Vec::with_capacity(files.len());
        for relative in files {
            match self.download_file(target, &relative).await {
                Ok(()) => downloaded.push(relative),
                Err(e) => warn!("Skipping {}: {}", relative, e),
            }
        }
        downloaded
    }

    async fn download_file(&self, target: &Path, relative: &str) -> Result<()> {
        let content = self.fetch_raw(relative).await?;
        let destination = write_file(target, relative, &content).await?;
        debug!("Wrote {} bytes to {:?}", content.len(), destination);
        Ok(())
    }

    async fn fetch_tree(&self) -> Result<Vec<String>> {
        let url = format!(
            "{}/repos/{}/{}/git/trees/{}",
            self.endpoints.api, self.owner, self.repo, self.branch
        );
        let request = self
            .client
            .get(&url)
            .query(&[("recursive", "1")])
            .timeout(self.timeout);

        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| ResourceError::transfer(&url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ResourceError::transfer(&url, format!("HTTP {}", status)));
        }

        let tree: TreeResponse = response
            .json()
            .await
            .map_err(|e| ResourceError::transfer(&url, e))?;

        if tree.truncated {
            warn!(
                "Tree for {}/{}@{} was truncated by GitHub; some files will be missing",
                self.owner, self.repo, self.branch
            );
        }

        Ok(tree
            .tree
            .into_iter()
            .filter(|entry| entry.kind == "blob")
            .map(|entry| entry.path)
            .collect())
    }

    async fn fetch_raw(&self, relative: &str) -> Result<Vec<u8>> {
        let url = self.raw_url(relative)?;
        let request = self.client.get(url).timeout(self.timeout);

        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| ResourceError::transfer(relative, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ResourceError::transfer(relative, format!("HTTP {}", status)));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ResourceError::transfer(relative, e))?;
        Ok(bytes.to_vec())
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.header("Authorization", format!("token {}", token.token)),
            None => request,
        }
    }

    /// Raw content URL; the branch may itself contain `/`
    fn raw_url(&self, relative: &str) -> Result<Url> {
        let repository_path = self.repository_path(relative);
        let segments = [self.owner.as_str(), self.repo.as_str()]
            .into_iter()
            .chain(self.branch.split('/'))
            .chain(repository_path.split('/'));
        endpoint_url(&self.endpoints.raw, segments)
    }

    fn contents_url(&self, relative: &str) -> Result<Url> {
        let repository_path = self.repository_path(relative);
        let segments = ["repos", self.owner.as_str(), self.repo.as_str(), "contents"]
            .into_iter()
            .chain(repository_path.split('/'));
        endpoint_url(&self.endpoints.api, segments)
    }

    fn repository_path(&self, relative: &str) -> String {
        let relative = relative.trim_start_matches('/');
        if self.resource_dir.is_empty() {
            relative.to_string()
        } else {
            format!("{}/{}", self.resource_dir, relative)
        }
    }

    fn relative_to_resource_dir<'a>(&self, path: &'a str) -> Option<&'a str> {
        if self.resource_dir.is_empty() {
            return Some(path);
        }
        path.strip_prefix(self.resource_dir.as_str())?
            .strip_prefix('/')
            .filter(|rest| !rest.is_empty())
    }
}
