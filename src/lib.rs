//! # git-label
//!
//! Create, update and remove labels across GitHub repositories
//!
//! ## Features
//! - Label create/update/remove from JSON or YAML lists
//! - Backup of labels attached to open issues before any change
//! - Confirmation before deleting labels that open issues still use
//! - Dry-run mode

pub mod config;
pub mod error;
pub mod github;
pub mod safe_delete;
pub mod snapshot;
pub mod sync;

use std::path::Path;
use std::sync::Arc;

pub use config::{Label, LabelLists, SyncConfig};
pub use error::{Error, Result};
pub use github::{GitHubClient, LabelService};
pub use safe_delete::{Confirmer, DialoguerConfirmer, ScriptedConfirmer};
pub use sync::LabelSyncer;

/// Apply label lists to one repository without any interactive prompt
///
/// The usage backup is written to `backup_dir`. Deletions that conflict
/// with labels in use are refused.
///
/// # Examples
///
/// ```rust,no_run
/// use git_label::{Label, LabelLists};
///
/// #[tokio::main]
/// async fn main() -> git_label::Result<()> {
///     let labels = LabelLists {
///         to_create: vec![Label::new("urgent", "#ff0000")?],
///         to_remove: vec![Label::named("wontfix")],
///         ..Default::default()
///     };
///
///     let result = git_label::sync_repository_labels(
///         "https://api.github.com",
///         "your_github_token",
///         "owner/repo",
///         labels,
///         std::path::Path::new("backups"),
///     )
///     .await?;
///
///     println!("Sync completed: {:?}", result);
///     Ok(())
/// }
/// ```
pub async fn sync_repository_labels(
    api_url: &str,
    access_token: &str,
    repository: &str,
    labels: LabelLists,
    backup_dir: &Path,
) -> Result<sync::SyncResult> {
    let config = SyncConfig {
        labels,
        backup_dir: backup_dir.to_path_buf(),
        dry_run: false,
    };
    config.validate()?;

    let client = GitHubClient::new(api_url, access_token)?;
    let syncer = LabelSyncer::new(
        Arc::new(client),
        Arc::new(ScriptedConfirmer::new(false)),
        config,
    );
    syncer.sync_repository(repository).await
}
