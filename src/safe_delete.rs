//! Safe Label Deletion
//!
//! Guards label removal against labels still attached to open issues.
//! A label to remove is flagged when its name appears anywhere inside the
//! name of a used label, so "bug" is flagged by "bug: confirmed". Any flag
//! turns the delete phase into a single yes/no confirmation.

use async_trait::async_trait;
use colored::Colorize;
use dialoguer::theme::ColorfulTheme;
use dialoguer::Confirm;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::warn;

use crate::config::Label;
use crate::snapshot::UsageSet;

/// A label scheduled for removal that matches labels in use
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    /// Name of the label to remove
    pub label: String,

    /// Used label names containing it
    pub used_by: Vec<String>,
}

/// Find every label to remove whose name is a substring of a used label name
pub fn find_conflicts(labels_to_remove: &[Label], usage: &UsageSet) -> Vec<Conflict> {
    labels_to_remove
        .iter()
        .filter_map(|label| {
            let used_by: Vec<String> = usage
                .names()
                .filter(|used| used.contains(label.name.as_str()))
                .map(str::to_string)
                .collect();

            (!used_by.is_empty()).then(|| Conflict {
                label: label.name.clone(),
                used_by,
            })
        })
        .collect()
}

/// What the delete phase has to do before deleting
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeletePlan {
    /// Nothing to remove is in use; delete right away
    NoConflict,

    /// Something to remove is in use; ask once before deleting anything
    NeedsConfirmation { conflicts: Vec<Conflict> },
}

/// Outcome of the delete phase gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteDecision {
    /// Delete the full removal list
    DeleteAll,

    /// Delete nothing
    Abort,
}

impl DeletePlan {
    /// Evaluate the removal list against current usage
    pub fn evaluate(labels_to_remove: &[Label], usage: &UsageSet) -> Self {
        let conflicts = find_conflicts(labels_to_remove, usage);
        if conflicts.is_empty() {
            DeletePlan::NoConflict
        } else {
            DeletePlan::NeedsConfirmation { conflicts }
        }
    }

    /// Flagged labels (empty when there is no conflict)
    pub fn conflicts(&self) -> &[Conflict] {
        match self {
            DeletePlan::NoConflict => &[],
            DeletePlan::NeedsConfirmation { conflicts } => conflicts,
        }
    }

    /// Resolve the plan, asking `confirmer` at most once
    ///
    /// A confirmed plan deletes every label of the removal list, flagged
    /// or not.
    pub async fn decide(
        &self,
        repository: &str,
        removal_count: usize,
        confirmer: &dyn Confirmer,
    ) -> DeleteDecision {
        let conflicts = match self {
            DeletePlan::NoConflict => return DeleteDecision::DeleteAll,
            DeletePlan::NeedsConfirmation { conflicts } => conflicts,
        };

        print_conflicts(repository, conflicts);

        let question = format!(
            "Delete all {} labels listed for removal from {} anyway?",
            removal_count, repository
        );
        if confirmer.confirm(&question).await {
            DeleteDecision::DeleteAll
        } else {
            DeleteDecision::Abort
        }
    }
}

/// Warn about every flagged label and point at the update list instead
pub fn print_conflicts(repository: &str, conflicts: &[Conflict]) {
    println!(
        "{} {} label(s) to remove are used by open issues in {}:",
        "!".yellow(),
        conflicts.len(),
        repository.cyan()
    );
    for conflict in conflicts {
        println!(
            "  {} {} (used as: {})",
            "•".yellow(),
            conflict.label.yellow().bold(),
            conflict.used_by.join(", ")
        );
    }
    println!(
        "  Deleting them detaches them from those issues. Consider renaming them through {} instead.",
        "labels-to-update.json".cyan()
    );
}

/// Source of yes/no answers for the delete confirmation
#[async_trait]
pub trait Confirmer: Send + Sync {
    /// Ask `question`; `true` means yes
    async fn confirm(&self, question: &str) -> bool;
}

/// Asks on the terminal; defaults to "no"
#[derive(Debug, Default, Clone, Copy)]
pub struct DialoguerConfirmer;

impl DialoguerConfirmer {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Confirmer for DialoguerConfirmer {
    async fn confirm(&self, question: &str) -> bool {
        let question = question.to_string();
        let answer = tokio::task::spawn_blocking(move || {
            Confirm::with_theme(&ColorfulTheme::default())
                .with_prompt(question)
                .default(false)
                .interact()
        })
        .await;

        match answer {
            Ok(Ok(answer)) => answer,
            Ok(Err(e)) => {
                warn!(error = %e, "confirmation prompt failed, treating as no");
                false
            }
            Err(e) => {
                warn!(error = %e, "confirmation prompt task failed, treating as no");
                false
            }
        }
    }
}

/// Gives the same answer every time and counts how often it was asked
#[derive(Debug, Default)]
pub struct ScriptedConfirmer {
    answer: bool,
    prompts: AtomicUsize,
}

impl ScriptedConfirmer {
    pub fn new(answer: bool) -> Self {
        Self {
            answer,
            prompts: AtomicUsize::new(0),
        }
    }

    /// Number of questions asked so far
    pub fn prompts(&self) -> usize {
        self.prompts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Confirmer for ScriptedConfirmer {
    async fn confirm(&self, question: &str) -> bool {
        self.prompts.fetch_add(1, Ordering::SeqCst);
        println!(
            "{} {} [{}]",
            "?".cyan(),
            question,
            if self.answer { "yes" } else { "no" }
        );
        self.answer
    }
}
