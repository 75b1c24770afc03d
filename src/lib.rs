//! resource-manager - fetch and sync files from configured providers
//!
//! A JSON config file declares named providers, either GitHub repositories or
//! local directories. Each provider can sync its files into a target
//! directory, narrowed by a filename wildcard and by gitignore-style
//! include/exclude patterns.
//!
//! ## Modules
//!
//! - [`path`]: dotted/indexed addressing into the raw config tree
//! - [`config`]: validated configuration and the config file boundary
//! - [`auth`]: GitHub token resolution
//! - [`filter`]: include/exclude and filename pattern matching
//! - [`provider`]: the provider contract, its two backends, and the registry
//! - [`sync`]: downloading from several providers in sequence
//! - [`status`]: per-provider status reports

pub mod auth;
pub mod config;
pub mod error;
pub mod filter;
pub mod path;
pub mod provider;
pub mod status;
pub mod sync;

pub use auth::{AuthResolver, ResolvedToken, TokenOrigin, TokenSource};
pub use config::{AuthMethod, Config, ConfigManager, ProviderKind};
pub use error::{ResourceError, Result};
pub use filter::{matches_pattern, PatternFilter};
pub use path::PathAddress;
pub use provider::{DownloadOptions, GitHubEndpoints, Provider, ProviderRegistry};
pub use status::ProviderStatus;
pub use sync::{download_from_all, DownloadSummary};
