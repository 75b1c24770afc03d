//! Download orchestration across several providers.
//!
//! Providers are processed strictly one after another into a shared target
//! directory. When cleaning is requested the target is emptied once, before
//! the first provider runs, so later providers do not wipe earlier output.
//! A local provider whose source overlaps the target is skipped, and the
//! target is then left uncleaned.

use std::path::Path;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::config::ProviderKind;
use crate::provider::{prepare_target, DownloadOptions, Provider};

/// What happened to one provider during a multi-provider download
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderOutcome {
    Downloaded { files: Vec<String> },
    Unavailable,
    Skipped { reason: String },
}

#[derive(Debug, Clone)]
pub struct ProviderResult {
    pub name: String,
    pub kind: ProviderKind,
    pub outcome: ProviderOutcome,
}

/// Results from a complete multi-provider download
#[derive(Debug, Clone)]
pub struct DownloadSummary {
    pub total_providers: usize,
    pub successful_providers: usize,
    pub unavailable_providers: usize,
    pub skipped_providers: usize,
    pub total_files: usize,
    pub duration: Duration,
    pub results: Vec<ProviderResult>,
}

impl DownloadSummary {
    fn compile(results: Vec<ProviderResult>, duration: Duration) -> Self {
        let mut summary = Self {
            total_providers: results.len(),
            successful_providers: 0,
            unavailable_providers: 0,
            skipped_providers: 0,
            total_files: 0,
            duration,
            results: Vec::new(),
        };

        for result in &results {
            match &result.outcome {
                ProviderOutcome::Downloaded { files } => {
                    summary.successful_providers += 1;
                    summary.total_files += files.len();
                }
                ProviderOutcome::Unavailable => summary.unavailable_providers += 1,
                ProviderOutcome::Skipped { .. } => summary.skipped_providers += 1,
            }
        }

        summary.results = results;
        summary
    }

    pub fn has_unavailable(&self) -> bool {
        self.unavailable_providers > 0
    }
}

/// Download from each provider in turn into `target`
pub async fn download_from_all(
    providers: &[Provider],
    target: &Path,
    options: &DownloadOptions,
) -> DownloadSummary {
    let start_time = Instant::now();
    info!(
        "Downloading from {} provider(s) into {:?}",
        providers.len(),
        target
    );

    let overlaps: Vec<bool> = providers
        .iter()
        .map(|p| p.enabled() && p.overlaps(target))
        .collect();
    let overlapping: Vec<&str> = providers
        .iter()
        .zip(&overlaps)
        .filter(|(_, &overlap)| overlap)
        .map(|(p, _)| p.name())
        .collect();

    let mut per_provider = options.clone();
    per_provider.clean = false;
    if !overlapping.is_empty() {
        warn!(
            "Target {:?} overlaps the source of {}; skipping those providers and not cleaning",
            target,
            overlapping.join(", ")
        );
    } else if options.clean {
        if let Err(e) = prepare_target(target, true) {
            warn!("Could not clean {:?} before download: {}", target, e);
        }
    }

    let mut results = Vec::with_capacity(providers.len());
    for (provider, &overlap) in providers.iter().zip(&overlaps) {
        let outcome = if overlap {
            ProviderOutcome::Skipped {
                reason: "target overlaps the provider's source directory".to_string(),
            }
        } else {
            download_one(provider, target, &per_provider).await
        };
        results.push(ProviderResult {
            name: provider.name().to_string(),
            kind: provider.kind(),
            outcome,
        });
    }

    let summary = DownloadSummary::compile(results, start_time.elapsed());
    info!(
        "Download completed: {} file(s) from {}/{} provider(s) in {:.2}s",
        summary.total_files,
        summary.successful_providers,
        summary.total_providers,
        summary.duration.as_secs_f64()
    );
    summary
}

async fn download_one(
    provider: &Provider,
    target: &Path,
    options: &DownloadOptions,
) -> ProviderOutcome {
    if !provider.enabled() {
        return ProviderOutcome::Skipped {
            reason: "provider is disabled".to_string(),
        };
    }

    if !provider.is_available().await {
        warn!("Provider '{}' is not available; skipping", provider.name());
        return ProviderOutcome::Unavailable;
    }

    let files = provider.download_folder(target, options).await;
    info!("Provider '{}': {} file(s)", provider.name(), files.len());
    ProviderOutcome::Downloaded { files }
}
