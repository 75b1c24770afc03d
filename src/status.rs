//! Provider status reports.
//!
//! Gathers what the `status` command prints about a provider: its kind,
//! whether it is enabled, optionally whether it is reachable, and the
//! backend-specific settings it was built from.

use std::fmt;

use crate::config::ProviderKind;
use crate::provider::Provider;

/// Result of probing a provider's backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Available,
    Unavailable,
    /// Connection was not checked
    Unknown,
}

impl fmt::Display for Availability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Availability::Available => "Available",
            Availability::Unavailable => "Unavailable",
            Availability::Unknown => "Not checked",
        })
    }
}

/// Snapshot of one provider
#[derive(Debug, Clone)]
pub struct ProviderStatus {
    pub name: String,
    pub kind: ProviderKind,
    pub enabled: bool,
    pub availability: Availability,
    /// Label/value pairs specific to the provider kind
    pub details: Vec<(&'static str, String)>,
    pub include_patterns: Vec<String>,
    pub exclude_patterns: Vec<String>,
}

impl ProviderStatus {
    pub async fn collect(provider: &Provider, check_connection: bool) -> Self {
        let availability = if check_connection {
            if provider.is_available().await {
                Availability::Available
            } else {
                Availability::Unavailable
            }
        } else {
            Availability::Unknown
        };

        Self {
            name: provider.name().to_string(),
            kind: provider.kind(),
            enabled: provider.enabled(),
            availability,
            details: details(provider),
            include_patterns: provider.filter().include_patterns().to_vec(),
            exclude_patterns: provider.filter().exclude_patterns().to_vec(),
        }
    }

    /// The detail a non-verbose listing shows: URL or path
    pub fn location(&self) -> Option<&str> {
        self.details.first().map(|(_, value)| value.as_str())
    }
}

fn details(provider: &Provider) -> Vec<(&'static str, String)> {
    match provider {
        Provider::GitHub(p) => vec![
            ("URL", p.url().to_string()),
            ("Owner", p.owner().to_string()),
            ("Repository", p.repo().to_string()),
            ("Branch", p.branch().to_string()),
            ("Resource Directory", p.resource_dir().to_string()),
            ("Timeout", format!("{}s", p.timeout().as_secs())),
            (
                "Authentication",
                if p.is_authenticated() {
                    "token".to_string()
                } else {
                    "none".to_string()
                },
            ),
        ],
        Provider::Local(p) => {
            let base = p.base_path();
            let mut details = vec![("Path", base.display().to_string())];
            if base.is_dir() {
                details.push(("Path Status", "exists".to_string()));
                let count = std::fs::read_dir(base)
                    .map(|entries| entries.count().to_string())
                    .unwrap_or_else(|_| "Unable to count".to_string());
                details.push(("Files", count));
            } else if base.exists() {
                details.push(("Path Status", "not a directory".to_string()));
            } else {
                details.push(("Path Status", "missing".to_string()));
            }
            details
        }
    }
}

/// Aggregate counts over several statuses
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusOverview {
    pub total: usize,
    pub enabled: usize,
    pub available: usize,
}

impl StatusOverview {
    pub fn from_statuses(statuses: &[ProviderStatus]) -> Self {
        Self {
            total: statuses.len(),
            enabled: statuses.iter().filter(|s| s.enabled).count(),
            available: statuses
                .iter()
                .filter(|s| s.availability == Availability::Available)
                .count(),
        }
    }
}
