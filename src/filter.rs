//! Include/exclude path filtering and filename wildcards.
//!
//! Both include and exclude sets use gitignore syntax and are matched against
//! paths relative to a provider's source root. A path also matches when any
//! of its parent directories does, so `.git` excludes everything under it.

use std::path::Path;

use globset::{Glob, GlobMatcher};
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use tracing::debug;

use crate::error::{ResourceError, Result};

/// Two-stage path filter: include first, then exclude
#[derive(Debug, Clone)]
pub struct PatternFilter {
    include_patterns: Vec<String>,
    exclude_patterns: Vec<String>,
    include: Option<Gitignore>,
    exclude: Option<Gitignore>,
}

impl PatternFilter {
    pub fn new(include: &[String], exclude: &[String]) -> Result<Self> {
        Ok(Self {
            include_patterns: include.to_vec(),
            exclude_patterns: exclude.to_vec(),
            include: build_matcher(include)?,
            exclude: build_matcher(exclude)?,
        })
    }

    /// Filter that keeps everything
    pub fn allow_all() -> Self {
        Self {
            include_patterns: Vec::new(),
            exclude_patterns: Vec::new(),
            include: None,
            exclude: None,
        }
    }

    pub fn include_patterns(&self) -> &[String] {
        &self.include_patterns
    }

    pub fn exclude_patterns(&self) -> &[String] {
        &self.exclude_patterns
    }

    /// Whether a single relative path survives both stages
    pub fn allows(&self, relative_path: &str) -> bool {
        if let Some(include) = &self.include {
            if !matches(include, relative_path) {
                return false;
            }
        }
        match &self.exclude {
            Some(exclude) => !matches(exclude, relative_path),
            None => true,
        }
    }

    /// Keep the paths that survive, preserving their order
    pub fn apply(&self, paths: Vec<String>) -> Vec<String> {
        let before = paths.len();
        let kept: Vec<String> = paths.into_iter().filter(|p| self.allows(p)).collect();
        debug!("Pattern filter kept {} of {} paths", kept.len(), before);
        kept
    }
}

fn build_matcher(patterns: &[String]) -> Result<Option<Gitignore>> {
    if patterns.is_empty() {
        return Ok(None);
    }

    let mut builder = GitignoreBuilder::new(".");
    for pattern in patterns {
        builder
            .add_line(None, pattern)
            .map_err(|e| ResourceError::InvalidPattern {
                pattern: pattern.clone(),
                reason: e.to_string(),
            })?;
    }

    builder
        .build()
        .map(Some)
        .map_err(|e| ResourceError::InvalidPattern {
            pattern: patterns.join(", "),
            reason: e.to_string(),
        })
}

fn matches(matcher: &Gitignore, relative_path: &str) -> bool {
    let path = relative_path.trim_start_matches('/');
    matcher
        .matched_path_or_any_parents(Path::new(path), false)
        .is_ignore()
}

/// Single-segment wildcard applied to a file's base name
#[derive(Debug, Clone)]
pub enum FilePattern {
    Any,
    Glob(GlobMatcher),
}

impl FilePattern {
    pub fn new(pattern: &str) -> Result<Self> {
        if pattern.is_empty() || pattern == "*" {
            return Ok(FilePattern::Any);
        }
        let glob = Glob::new(pattern).map_err(|e| ResourceError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;
        Ok(FilePattern::Glob(glob.compile_matcher()))
    }

    /// Match the last component of `path` against the pattern
    pub fn matches(&self, path: &str) -> bool {
        match self {
            FilePattern::Any => true,
            FilePattern::Glob(matcher) => matcher.is_match(base_name(path)),
        }
    }
}

impl Default for FilePattern {
    fn default() -> Self {
        FilePattern::Any
    }
}

/// One-shot form of [`FilePattern::matches`]; an invalid pattern matches nothing
pub fn matches_pattern(filename: &str, pattern: &str) -> bool {
    match FilePattern::new(pattern) {
        Ok(file_pattern) => file_pattern.matches(filename),
        Err(e) => {
            debug!("{}", e);
            false
        }
    }
}

fn base_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
