//! Local directory provider.

use std::fs;
use std::path::{Path, PathBuf};

use filetime::FileTime;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::{expand_path, prepare_target, select_candidates, DownloadOptions};
use crate::config::LocalEntry;
use crate::error::{ResourceError, Result};
use crate::filter::{FilePattern, PatternFilter};

#[derive(Debug, Clone)]
pub struct LocalProvider {
    name: String,
    base_path: PathBuf,
    enabled: bool,
    target_dir: Option<String>,
    filter: PatternFilter,
}

impl LocalProvider {
    pub fn new(entry: &LocalEntry, filter: PatternFilter) -> Result<Self> {
        let base_path =
            expand_path(&entry.path).map_err(|e| ResourceError::ProviderConstruction {
                name: entry.name.clone(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            name: entry.name.clone(),
            base_path,
            enabled: entry.enabled,
            target_dir: entry.target_dir.clone(),
            filter,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn filter(&self) -> &PatternFilter {
        &self.filter
    }

    pub fn target_dir(&self) -> Option<&str> {
        self.target_dir.as_deref()
    }

    pub async fn is_available(&self) -> bool {
        self.enabled && self.base_path.exists()
    }

    pub async fn exists(&self, path: &str) -> bool {
        self.enabled && self.base_path.join(path.trim_start_matches('/')).exists()
    }

    /// Whether syncing into `target` would clean or write inside the source
    /// directory: the target is the source, an ancestor of it, or below it
    pub fn overlaps(&self, target: &Path) -> bool {
        nested_directories(&self.base_path, target)
    }

    /// Relative paths, `/`-separated, of files a download would copy
    pub fn list_files(&self, file_pattern: &FilePattern, recursive: bool) -> Result<Vec<String>> {
        let mut walker = WalkDir::new(&self.base_path).min_depth(1).sort_by_file_name();
        if !recursive {
            walker = walker.max_depth(1);
        }

        let mut relative_paths = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry under {:?}: {}", self.base_path, e);
                    continue;
                }
            };
            // Follows symlinks so linked files are copied by content
            if !entry.path().is_file() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(&self.base_path)
                .map_err(|e| ResourceError::transfer(entry.path().display().to_string(), e))?;
            relative_paths.push(to_slash_path(relative));
        }

        Ok(select_candidates(
            relative_paths,
            file_pattern,
            recursive,
            &self.filter,
        ))
    }

    pub async fn download_folder(&self, target: &Path, options: &DownloadOptions) -> Vec<String> {
        if !self.enabled {
            debug!("Provider '{}' is disabled; nothing to copy", self.name);
            return Vec::new();
        }

        if !self.base_path.exists() {
            warn!(
                "Source path {:?} of provider '{}' does not exist",
                self.base_path, self.name
            );
            return Vec::new();
        }

        if self.overlaps(target) {
            warn!(
                "Target {:?} overlaps the source directory {:?} of provider '{}'; refusing to sync",
                target, self.base_path, self.name
            );
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

        let files = match self.list_files(&file_pattern, options.recursive) {
            Ok(files) => files,
            Err(e) => {
                warn!("Failed to list files of local provider '{}': {}", self.name, e);
                return Vec::new();
            }
        };

        info!("Copying {} file(s) from {:?}", files.len(), self.base_path);

        let mut copied = Vec::with_capacity(files.len());
        for relative in files {
            match self.copy_file(target, &relative) {
                Ok(()) => copied.push(relative),
                Err(e) => warn!("Skipping {}: {}", relative, e),
            }
        }
        copied
    }

    fn copy_file(&self, target: &Path, relative: &str) -> Result<()> {
        let source = self.base_path.join(relative);
        let destination = target.join(relative);

        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).map_err(|e| ResourceError::io(parent, e))?;
        }
        fs::copy(&source, &destination).map_err(|e| ResourceError::io(&source, e))?;

        let metadata = fs::metadata(&source).map_err(|e| ResourceError::io(&source, e))?;
        filetime::set_file_times(
            &destination,
            FileTime::from_last_access_time(&metadata),
            FileTime::from_last_modification_time(&metadata),
        )
        .map_err(|e| ResourceError::io(&destination, e))?;

        debug!("Copied {:?} -> {:?}", source, destination);
        Ok(())
    }
}

fn to_slash_path(path: &Path) -> String {
    path.components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Whether one of the two existing directories contains the other
fn nested_directories(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a.starts_with(&b) || b.starts_with(&a),
        _ => false,
    }
}
