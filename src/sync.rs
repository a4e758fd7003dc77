//! Label Synchronization Functionality
//!
//! Applies the configured label lists to each repository: snapshot and
//! backup first, then update, create and delete phases in that order.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use colored::Colorize;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::{parse_repository, Label, SyncConfig};
use crate::error::{Error, Result};
use crate::github::LabelService;
use crate::safe_delete::{print_conflicts, Conflict, Confirmer, DeleteDecision, DeletePlan};
use crate::snapshot::UsageSnapshot;

/// Types of label synchronization operations
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOperation {
    /// Update (rename/recolor) the label named `current_name`
    Update { current_name: String, label: Label },

    /// Create a label
    Create { label: Label },

    /// Delete a label
    Delete { name: String },
}

impl SyncOperation {
    /// Short description used in logs and error messages
    pub fn describe(&self) -> String {
        match self {
            SyncOperation::Update {
                current_name,
                label,
            } => format!("update '{}' -> '{}'", current_name, label.name),
            SyncOperation::Create { label } => format!("create '{}'", label.name),
            SyncOperation::Delete { name } => format!("delete '{}'", name),
        }
    }
}

/// Synchronization result for one repository
///
/// Counts are labels attempted, not labels confirmed by the API; failed
/// calls are listed in `errors`.
#[derive(Debug, Clone)]
pub struct SyncResult {
    /// Target repository
    pub repository: String,

    /// Attempted operations, in phase order
    pub operations: Vec<SyncOperation>,

    /// Number of labels updated
    pub updated: u32,

    /// Number of labels created
    pub created: u32,

    /// Number of labels deleted
    pub deleted: u32,

    /// Open issues recorded in the usage snapshot
    pub issues_recorded: usize,

    /// Where the usage snapshot was written
    pub backup_path: Option<PathBuf>,

    /// Labels to remove that were found in use
    pub conflicts: Vec<Conflict>,

    /// Outcome of the delete gate (None in dry-run mode)
    pub delete_decision: Option<DeleteDecision>,

    /// Whether this is a dry run
    pub dry_run: bool,

    /// Operations that encountered errors
    pub errors: Vec<String>,
}

impl SyncResult {
    /// Create a new empty synchronization result
    pub fn new(repository: &str, dry_run: bool) -> Self {
        Self {
            repository: repository.to_string(),
            operations: Vec::new(),
            updated: 0,
            created: 0,
            deleted: 0,
            issues_recorded: 0,
            backup_path: None,
            conflicts: Vec::new(),
            delete_decision: None,
            dry_run,
            errors: Vec::new(),
        }
    }

    /// Add an operation and update statistics
    pub fn add_operation(&mut self, operation: SyncOperation) {
        match &operation {
            SyncOperation::Update { .. } => self.updated += 1,
            SyncOperation::Create { .. } => self.created += 1,
            SyncOperation::Delete { .. } => self.deleted += 1,
        }
        self.operations.push(operation);
    }

    /// Add an error
    pub fn add_error(&mut self, error: String) {
        self.errors.push(error);
    }

    /// Whether any change was attempted
    pub fn has_changes(&self) -> bool {
        self.updated > 0 || self.created > 0 || self.deleted > 0
    }

    /// Get total number of operations
    pub fn total_operations(&self) -> u32 {
        self.updated + self.created + self.deleted
    }
}

type PhaseHandle = JoinHandle<(SyncOperation, Result<()>)>;

/// Label Synchronization Engine
///
/// Holds the label lists, client and confirmation source of one invocation
pub struct LabelSyncer {
    service: Arc<dyn LabelService>,
    confirmer: Arc<dyn Confirmer>,
    config: SyncConfig,
}

impl LabelSyncer {
    /// Create a new label synchronization engine
    pub fn new(
        service: Arc<dyn LabelService>,
        confirmer: Arc<dyn Confirmer>,
        config: SyncConfig,
    ) -> Self {
        Self {
            service,
            confirmer,
            config,
        }
    }

    /// Synchronize every repository in turn
    ///
    /// Repositories are independent: a failed repository is reported and
    /// the next one still runs.
    pub async fn sync_all(&self, repositories: &[String]) -> Vec<(String, Result<SyncResult>)> {
        let mut outcomes = Vec::with_capacity(repositories.len());
        for repository in repositories {
            let outcome = self.sync_repository(repository).await;
            if let Err(e) = &outcome {
                warn!(repository = %repository, error = %e, "repository sync failed");
            }
            outcomes.push((repository.clone(), outcome));
        }
        outcomes
    }

    /// Synchronize labels of one repository
    ///
    /// # Errors
    /// Returns an error if the repository identifier is invalid or the
    /// usage backup cannot be written; no label is touched in that case
    pub async fn sync_repository(&self, repository: &str) -> Result<SyncResult> {
        parse_repository(repository)?;
        let mut result = SyncResult::new(repository, self.config.dry_run);

        println!("{} Syncing labels for {}", "•".blue(), repository.cyan());

        let snapshot = UsageSnapshot::capture(self.service.as_ref(), repository).await;
        let backup_path = snapshot.write_backup(&self.config.backup_dir, repository, Utc::now())?;
        println!(
            "{} Your labels were saved to '{}'",
            "✓".green(),
            backup_path.display().to_string().cyan()
        );
        result.issues_recorded = snapshot.len();
        result.backup_path = Some(backup_path);

        self.update_phase(repository, &mut result).await;
        self.create_phase(repository, &mut result).await;
        self.delete_phase(repository, &snapshot, &mut result).await;

        info!(
            repository,
            updated = result.updated,
            created = result.created,
            deleted = result.deleted,
            errors = result.errors.len(),
            "repository sync finished"
        );

        Ok(result)
    }

    async fn update_phase(&self, repository: &str, result: &mut SyncResult) {
        let operations = self
            .config
            .labels
            .to_update
            .iter()
            .map(|label| SyncOperation::Update {
                current_name: label.current_name.clone().unwrap_or_default(),
                label: label.clone(),
            })
            .collect();

        let count = self.execute_phase(repository, operations, result).await;
        println!("{} labels", self.summary("Updated", count));
    }

    async fn create_phase(&self, repository: &str, result: &mut SyncResult) {
        let operations = self
            .config
            .labels
            .to_create
            .iter()
            .map(|label| SyncOperation::Create {
                label: label.clone(),
            })
            .collect();

        let count = self.execute_phase(repository, operations, result).await;
        println!("{} labels", self.summary("Created", count));
    }

    async fn delete_phase(
        &self,
        repository: &str,
        snapshot: &UsageSnapshot,
        result: &mut SyncResult,
    ) {
        let to_remove = &self.config.labels.to_remove;
        let plan = DeletePlan::evaluate(to_remove, &snapshot.usage());
        result.conflicts = plan.conflicts().to_vec();

        let decision = if self.config.dry_run {
            if !result.conflicts.is_empty() {
                print_conflicts(repository, &result.conflicts);
                println!(
                    "{} Deletion would require confirmation",
                    "!".yellow()
                );
            }
            DeleteDecision::DeleteAll
        } else {
            let decision = plan
                .decide(repository, to_remove.len(), self.confirmer.as_ref())
                .await;
            result.delete_decision = Some(decision);
            decision
        };

        if decision == DeleteDecision::Abort {
            println!(
                "{} Deletion skipped for {}; no labels were removed",
                "!".yellow(),
                repository.cyan()
            );
            return;
        }

        let operations = to_remove
            .iter()
            .map(|label| SyncOperation::Delete {
                name: label.name.clone(),
            })
            .collect();

        let count = self.execute_phase(repository, operations, result).await;
        println!("{} labels", self.summary("Removed", count));
    }

    fn summary(&self, verb: &str, count: usize) -> String {
        if self.config.dry_run {
            format!("Would have {} {}", verb.to_lowercase(), count)
        } else {
            format!("{} {}", verb, count)
        }
    }

    /// Run one phase: one task per operation, all awaited before returning
    ///
    /// # Returns
    /// Number of operations attempted
    async fn execute_phase(
        &self,
        repository: &str,
        operations: Vec<SyncOperation>,
        result: &mut SyncResult,
    ) -> usize {
        let count = operations.len();
        let mut handles: Vec<PhaseHandle> = Vec::with_capacity(count);

        for operation in operations {
            result.add_operation(operation.clone());
            if self.config.dry_run {
                continue;
            }

            let service = Arc::clone(&self.service);
            let repository = repository.to_string();
            handles.push(tokio::spawn(async move {
                let outcome = execute_operation(service.as_ref(), &repository, &operation).await;
                (operation, outcome)
            }));
        }

        for handle in handles {
            match handle.await {
                Ok((_, Ok(()))) => {}
                Ok((operation, Err(e))) => {
                    warn!(repository, operation = %operation.describe(), error = %e, "label operation failed");
                    result.add_error(format!("Failed to {}: {}", operation.describe(), e));
                }
                Err(e) => {
                    let e = Error::from(e);
                    warn!(repository, error = %e, "label operation task failed");
                    result.add_error(e.to_string());
                }
            }
        }

        count
    }
}

/// Execute an operation
///
/// # Errors
/// Returns an error if the API call fails
async fn execute_operation(
    service: &dyn LabelService,
    repository: &str,
    operation: &SyncOperation,
) -> Result<()> {
    match operation {
        SyncOperation::Update { label, .. } => {
            service.update_label(repository, label).await?;
        }
        SyncOperation::Create { label } => {
            service.create_label(repository, label).await?;
        }
        SyncOperation::Delete { name } => {
            service.delete_label(repository, name).await?;
        }
    }

    Ok(())
}
