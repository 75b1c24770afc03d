//! GitHub token resolution.
//!
//! Tokens come from a layered chain selected by `auth.github.method`:
//! environment variables, then the git credential helper. Every failure in
//! the chain (unset variable, missing `git`, helper timeout, malformed token)
//! simply yields no token, and requests go out unauthenticated.

use std::env;
use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::io::AsyncWriteExt;
use tokio::process::Command as AsyncCommand;
use tracing::{debug, info};

use crate::config::AuthMethod;
use crate::provider::github::{http_client, GitHubEndpoints};

/// Environment variables scanned for a token, in priority order
pub const TOKEN_ENV_VARS: [&str; 4] = [
    "GITHUB_TOKEN",
    "GH_TOKEN",
    "GITHUB_ACCESS_TOKEN",
    "GH_ACCESS_TOKEN",
];

/// Request written to `git credential fill`
const CREDENTIAL_REQUEST: &str = "protocol=https\nhost=github.com\n\n";

const CREDENTIAL_TIMEOUT: Duration = Duration::from_secs(10);
const VERIFY_TIMEOUT: Duration = Duration::from_secs(10);

const TOKEN_PREFIXES: [&str; 5] = ["ghp_", "gho_", "ghu_", "ghs_", "ghr_"];

static CLASSIC_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-f0-9]{40}$").expect("classic token regex is valid"));
static TOKEN_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("token charset regex is valid"));

/// Where a resolved token came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenOrigin {
    /// Named environment variable
    Environment(String),
    /// `git credential fill`
    CredentialHelper,
}

impl fmt::Display for TokenOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenOrigin::Environment(var) => write!(f, "environment variable {}", var),
            TokenOrigin::CredentialHelper => f.write_str("git credential helper"),
        }
    }
}

/// A token that passed shape validation
#[derive(Clone, PartialEq, Eq)]
pub struct ResolvedToken {
    pub token: String,
    pub origin: TokenOrigin,
}

impl ResolvedToken {
    /// Token with everything but the last four characters hidden
    pub fn masked(&self) -> String {
        let visible: String = self
            .token
            .chars()
            .rev()
            .take(4)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        format!("****{}", visible)
    }
}

impl fmt::Debug for ResolvedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedToken")
            .field("token", &self.masked())
            .field("origin", &self.origin)
            .finish()
    }
}

/// Capability that may produce a GitHub token.
///
/// Implementations never fail; anything that goes wrong is `None`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Source name for logging
    fn name(&self) -> &'static str;

    /// Look for a token
    async fn fetch(&self) -> Option<ResolvedToken>;
}

/// Reads the first well-formed token from a list of environment variables
#[derive(Debug, Clone)]
pub struct EnvTokenSource {
    vars: Vec<String>,
}

impl EnvTokenSource {
    pub fn new() -> Self {
        Self::with_vars(TOKEN_ENV_VARS)
    }

    pub fn with_vars<I, S>(vars: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            vars: vars.into_iter().map(Into::into).collect(),
        }
    }
}

impl Default for EnvTokenSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TokenSource for EnvTokenSource {
    fn name(&self) -> &'static str {
        "environment"
    }

    async fn fetch(&self) -> Option<ResolvedToken> {
        for var in &self.vars {
            let Ok(token) = env::var(var) else {
                continue;
            };
            if is_valid_github_token(&token) {
                debug!("Found GitHub token in {}", var);
                return Some(ResolvedToken {
                    token,
                    origin: TokenOrigin::Environment(var.clone()),
                });
            }
            debug!("{} is set but does not look like a GitHub token", var);
        }
        None
    }
}

/// Asks `git credential fill` for github.com credentials
#[derive(Debug, Clone)]
pub struct GitCredentialSource {
    program: PathBuf,
    timeout: Duration,
}

impl GitCredentialSource {
    pub fn new() -> Self {
        Self::with_program("git")
    }

    /// Use a different executable in place of `git`
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            timeout: CREDENTIAL_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn run(&self) -> std::io::Result<Option<String>> {
        let mut child = AsyncCommand::new(&self.program)
            .args(["credential", "fill"])
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(CREDENTIAL_REQUEST.as_bytes()).await?;
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            debug!(
                "git credential fill exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
            return Ok(None);
        }

        Ok(parse_credential_output(&String::from_utf8_lossy(
            &output.stdout,
        )))
    }
}

impl Default for GitCredentialSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TokenSource for GitCredentialSource {
    fn name(&self) -> &'static str {
        "git credential helper"
    }

    async fn fetch(&self) -> Option<ResolvedToken> {
        match tokio::time::timeout(self.timeout, self.run()).await {
            Ok(Ok(Some(token))) => Some(ResolvedToken {
                token,
                origin: TokenOrigin::CredentialHelper,
            }),
            Ok(Ok(None)) => None,
            Ok(Err(e)) => {
                debug!("Could not run {:?}: {}", self.program, e);
                None
            }
            Err(_) => {
                debug!(
                    "git credential fill timed out after {}s",
                    self.timeout.as_secs()
                );
                None
            }
        }
    }
}

/// Pull a well-formed token out of `git credential fill` output
pub fn parse_credential_output(output: &str) -> Option<String> {
    output
        .lines()
        .filter_map(|line| line.strip_prefix("password="))
        .find(|token| is_valid_github_token(token))
        .map(str::to_string)
}

/// Shape check for GitHub tokens.
///
/// Accepts prefixed tokens (`ghp_` etc., 36+ chars), classic 40-char hex
/// tokens, fine-grained `github_pat_` tokens (50+ chars), and otherwise any
/// 20+ char token made of `[A-Za-z0-9_-]`.
pub fn is_valid_github_token(token: &str) -> bool {
    if token.len() < 20 {
        return false;
    }

    if TOKEN_PREFIXES.iter().any(|prefix| token.starts_with(prefix)) {
        return token.len() >= 36;
    }

    if CLASSIC_TOKEN.is_match(token) {
        return true;
    }

    if token.starts_with("github_pat_") {
        return token.len() >= 50;
    }

    TOKEN_CHARS.is_match(token)
}

/// Resolves a token according to an [`AuthMethod`]
pub struct AuthResolver {
    env: Box<dyn TokenSource>,
    credential_helper: Box<dyn TokenSource>,
}

impl AuthResolver {
    /// Resolver backed by the real environment and `git`
    pub fn new() -> Self {
        Self::with_sources(
            Box::new(EnvTokenSource::new()),
            Box::new(GitCredentialSource::new()),
        )
    }

    pub fn with_sources(
        env: Box<dyn TokenSource>,
        credential_helper: Box<dyn TokenSource>,
    ) -> Self {
        Self {
            env,
            credential_helper,
        }
    }

    /// First well-formed token from the chain `method` selects
    pub async fn resolve(&self, method: AuthMethod) -> Option<ResolvedToken> {
        let chain: Vec<&dyn TokenSource> = match method {
            AuthMethod::Default => Vec::new(),
            AuthMethod::Dotenv => vec![self.env.as_ref()],
            AuthMethod::Gitcli => vec![self.credential_helper.as_ref()],
            AuthMethod::Auto => vec![self.env.as_ref(), self.credential_helper.as_ref()],
        };

        for source in chain {
            match source.fetch().await {
                Some(resolved) if is_valid_github_token(&resolved.token) => {
                    info!("Using GitHub token from {}", resolved.origin);
                    return Some(resolved);
                }
                _ => debug!("No GitHub token from {}", source.name()),
            }
        }

        debug!("No GitHub token resolved for method '{}'; requests will be unauthenticated", method);
        None
    }
}

impl Default for AuthResolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Account a token belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenIdentity {
    pub login: String,
    /// OAuth scopes from `X-OAuth-Scopes`; empty for fine-grained tokens
    pub scopes: Vec<String>,
}

#[derive(serde::Deserialize)]
struct UserResponse {
    login: String,
}

/// Check a token against `GET /user`. Any failure is `None`.
pub async fn verify_token(endpoints: &GitHubEndpoints, token: &str) -> Option<TokenIdentity> {
    let client = match http_client() {
        Ok(client) => client,
        Err(e) => {
            debug!("Could not build HTTP client: {}", e);
            return None;
        }
    };

    let response = client
        .get(format!("{}/user", endpoints.api))
        .header("Authorization", format!("token {}", token))
        .timeout(VERIFY_TIMEOUT)
        .send()
        .await
        .map_err(|e| debug!("Token verification request failed: {}", e))
        .ok()?;

    if !response.status().is_success() {
        debug!("Token verification returned HTTP {}", response.status());
        return None;
    }

    let scopes = response
        .headers()
        .get("X-OAuth-Scopes")
        .and_then(|value| value.to_str().ok())
        .map(|value| {
            value
                .split(',')
                .map(str::trim)
                .filter(|scope| !scope.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let user: UserResponse = response
        .json()
        .await
        .map_err(|e| debug!("Unexpected /user response: {}", e))
        .ok()?;

    Some(TokenIdentity {
        login: user.login,
        scopes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const CLASSIC: &str = "0123456789abcdef0123456789abcdef01234567";

    fn ghp_token() -> String {
        format!("ghp_{}", "A".repeat(36))
    }

    fn resolved(token: &str, origin: TokenOrigin) -> ResolvedToken {
        ResolvedToken {
            token: token.to_string(),
            origin,
        }
    }

    fn block_on<F: std::future::Future>(future: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("Failed to build runtime")
            .block_on(future)
    }

    #[test]
    fn test_token_shape_accepts_known_formats() {
        assert!(is_valid_github_token(CLASSIC));
        assert!(is_valid_github_token(&ghp_token()));
        assert!(is_valid_github_token(&format!("gho_{}", "x".repeat(32))));
        assert!(is_valid_github_token(&format!("github_pat_{}", "a".repeat(40))));
        assert!(is_valid_github_token("future-format_token-1234"));
    }

    #[test]
    fn test_token_shape_rejects_bad_tokens() {
        assert!(!is_valid_github_token(""));
        assert!(!is_valid_github_token("0123456789"));
        // Prefixed but too short for its format
        assert!(!is_valid_github_token(&format!("ghp_{}", "A".repeat(20))));
        assert!(!is_valid_github_token(&format!("github_pat_{}", "a".repeat(20))));
        // Long enough but with characters no token uses
        assert!(!is_valid_github_token("this token has spaces in it"));
    }

    #[test]
    fn test_parse_credential_output() {
        let output = format!(
            "protocol=https\nhost=github.com\nusername=octocat\npassword={}\n",
            ghp_token()
        );
        assert_eq!(parse_credential_output(&output), Some(ghp_token()));

        assert_eq!(parse_credential_output("protocol=https\nhost=github.com\n"), None);
        assert_eq!(parse_credential_output("password=hunter2\n"), None);
    }

    #[test]
    fn test_masked_token_hides_secret() {
        let token = resolved(CLASSIC, TokenOrigin::CredentialHelper);
        assert_eq!(token.masked(), "****4567");
        assert!(!format!("{:?}", token).contains(CLASSIC));
    }

    #[tokio::test]
    async fn test_default_method_never_consults_sources() {
        let mut env = MockTokenSource::new();
        env.expect_fetch().never();
        env.expect_name().return_const("env");
        let mut helper = MockTokenSource::new();
        helper.expect_fetch().never();
        helper.expect_name().return_const("helper");

        let resolver = AuthResolver::with_sources(Box::new(env), Box::new(helper));
        assert_eq!(resolver.resolve(AuthMethod::Default).await, None);
    }

    #[tokio::test]
    async fn test_auto_prefers_environment() {
        let mut env = MockTokenSource::new();
        env.expect_fetch()
            .times(1)
            .returning(|| Some(resolved(CLASSIC, TokenOrigin::Environment("GH_TOKEN".into()))));
        env.expect_name().return_const("env");
        let mut helper = MockTokenSource::new();
        helper.expect_fetch().never();
        helper.expect_name().return_const("helper");

        let resolver = AuthResolver::with_sources(Box::new(env), Box::new(helper));
        let token = resolver.resolve(AuthMethod::Auto).await.unwrap();
        assert_eq!(token.origin, TokenOrigin::Environment("GH_TOKEN".into()));
    }

    #[tokio::test]
    async fn test_auto_falls_back_to_credential_helper() {
        let mut env = MockTokenSource::new();
        env.expect_fetch().times(1).returning(|| None);
        env.expect_name().return_const("env");
        let mut helper = MockTokenSource::new();
        helper
            .expect_fetch()
            .times(1)
            .returning(|| Some(resolved(CLASSIC, TokenOrigin::CredentialHelper)));
        helper.expect_name().return_const("helper");

        let resolver = AuthResolver::with_sources(Box::new(env), Box::new(helper));
        let token = resolver.resolve(AuthMethod::Auto).await.unwrap();
        assert_eq!(token.origin, TokenOrigin::CredentialHelper);
    }

    #[tokio::test]
    async fn test_single_source_methods() {
        let mut env = MockTokenSource::new();
        env.expect_fetch().times(1).returning(|| None);
        env.expect_name().return_const("env");
        let mut helper = MockTokenSource::new();
        helper
            .expect_fetch()
            .times(1)
            .returning(|| Some(resolved(CLASSIC, TokenOrigin::CredentialHelper)));
        helper.expect_name().return_const("helper");

        let resolver = AuthResolver::with_sources(Box::new(env), Box::new(helper));
        assert_eq!(resolver.resolve(AuthMethod::Dotenv).await, None);
        assert!(resolver.resolve(AuthMethod::Gitcli).await.is_some());
    }

    #[tokio::test]
    async fn test_resolver_drops_malformed_tokens() {
        let mut env = MockTokenSource::new();
        env.expect_fetch()
            .returning(|| Some(resolved("short", TokenOrigin::Environment("GITHUB_TOKEN".into()))));
        env.expect_name().return_const("env");
        let mut helper = MockTokenSource::new();
        helper.expect_fetch().returning(|| None);
        helper.expect_name().return_const("helper");

        let resolver = AuthResolver::with_sources(Box::new(env), Box::new(helper));
        assert_eq!(resolver.resolve(AuthMethod::Auto).await, None);
    }

    #[test]
    #[serial]
    fn test_env_source_scans_in_order_and_skips_malformed() {
        let token = ghp_token();
        temp_env::with_vars(
            [
                ("GITHUB_TOKEN", Some("too-short")),
                ("GH_TOKEN", None),
                ("GITHUB_ACCESS_TOKEN", Some(token.as_str())),
                ("GH_ACCESS_TOKEN", Some(CLASSIC)),
            ],
            || {
                let found = block_on(EnvTokenSource::new().fetch()).unwrap();
                assert_eq!(found.token, token);
                assert_eq!(
                    found.origin,
                    TokenOrigin::Environment("GITHUB_ACCESS_TOKEN".into())
                );
            },
        );
    }

    #[test]
    #[serial]
    fn test_env_source_without_variables() {
        temp_env::with_vars(
            TOKEN_ENV_VARS.map(|var| (var, None::<&str>)),
            || {
                assert_eq!(block_on(EnvTokenSource::new().fetch()), None);
            },
        );
    }

    #[tokio::test]
    async fn test_credential_source_missing_program() {
        let source = GitCredentialSource::with_program("/nonexistent/bin/git-does-not-exist");
        assert_eq!(source.fetch().await, None);
    }

    #[cfg(unix)]
    fn fake_git(dir: &std::path::Path, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("fake-git");
        std::fs::write(&path, format!("#!/bin/sh\ncat > /dev/null\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_credential_source_reads_password_line() {
        let dir = tempfile::TempDir::new().unwrap();
        let script = fake_git(
            dir.path(),
            &format!(
                "echo protocol=https\necho host=github.com\necho username=octocat\necho password={}",
                ghp_token()
            ),
        );

        let token = GitCredentialSource::with_program(script).fetch().await.unwrap();
        assert_eq!(token.token, ghp_token());
        assert_eq!(token.origin, TokenOrigin::CredentialHelper);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_credential_source_nonzero_exit() {
        let dir = tempfile::TempDir::new().unwrap();
        let script = fake_git(dir.path(), &format!("echo password={}\nexit 1", ghp_token()));
        assert_eq!(GitCredentialSource::with_program(script).fetch().await, None);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_credential_source_times_out() {
        let dir = tempfile::TempDir::new().unwrap();
        let script = fake_git(dir.path(), "sleep 5");
        let source =
            GitCredentialSource::with_program(script).with_timeout(Duration::from_millis(200));
        assert_eq!(source.fetch().await, None);
    }
}
