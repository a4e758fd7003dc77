//! Label Usage Snapshots
//!
//! Records which labels are attached to which open issues before any label
//! is changed, and writes that record to a timestamped backup file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::parse_repository;
use crate::error::Result;
use crate::github::{GitHubLabel, LabelService};

/// Labels attached to one issue at snapshot time
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IssueLabels {
    pub repository: String,
    pub issue: u64,
    pub labels: Vec<GitHubLabel>,
}

/// Point-in-time record of label usage in one repository
///
/// Best effort: issues whose labels could not be fetched are left out.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct UsageSnapshot {
    pub records: Vec<IssueLabels>,
}

impl UsageSnapshot {
    /// Capture the label usage of every open issue in `repository`
    ///
    /// Label lookups for all issues run concurrently. Failures are logged
    /// and never abort the snapshot.
    pub async fn capture(service: &dyn LabelService, repository: &str) -> Self {
        let issues = match service.list_issues(repository).await {
            Ok(issues) => issues,
            Err(e) => {
                warn!(repository, error = %e, "failed to list issues, snapshot will be empty");
                Vec::new()
            }
        };

        let lookups = issues.iter().map(|issue| async move {
            match service.list_issue_labels(repository, issue.number).await {
                Ok(labels) => Some(IssueLabels {
                    repository: repository.to_string(),
                    issue: issue.number,
                    labels,
                }),
                Err(e) => {
                    warn!(repository, issue = issue.number, error = %e, "failed to fetch issue labels");
                    None
                }
            }
        });

        let records: Vec<IssueLabels> = join_all(lookups).await.into_iter().flatten().collect();
        info!(
            repository,
            issues = issues.len(),
            recorded = records.len(),
            "captured label usage"
        );

        Self { records }
    }

    /// Number of issue records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the snapshot has no records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Deduplicated set of labels in use
    pub fn usage(&self) -> UsageSet {
        UsageSet::from_snapshot(self)
    }

    /// Write the snapshot as JSON into `dir`
    ///
    /// # Returns
    /// Path of the written backup file
    ///
    /// # Errors
    /// If the directory cannot be created or the file cannot be written
    pub fn write_backup(
        &self,
        dir: &Path,
        repository: &str,
        taken_at: DateTime<Utc>,
    ) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(backup_file_name(repository, taken_at)?);
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, content)?;
        Ok(path)
    }
}

/// Backup file name: `used-labels-{owner}-{repo}-{timestamp}.json.bak`
///
/// # Errors
/// If `repository` is not "owner/repo"
pub fn backup_file_name(repository: &str, taken_at: DateTime<Utc>) -> Result<String> {
    let (owner, repo) = parse_repository(repository)?;
    Ok(format!(
        "used-labels-{}-{}-{}.json.bak",
        owner,
        repo,
        taken_at.format("%Y-%m-%dT%H-%M-%S%.3fZ")
    ))
}

/// Labels attached to at least one open issue, keyed by name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UsageSet {
    labels: BTreeMap<String, GitHubLabel>,
}

impl UsageSet {
    /// Flatten a snapshot; a label shared by several issues appears once
    pub fn from_snapshot(snapshot: &UsageSnapshot) -> Self {
        let labels = snapshot
            .records
            .iter()
            .flat_map(|record| record.labels.iter())
            .map(|label| (label.name.clone(), label.clone()))
            .collect();

        Self { labels }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.labels.contains_key(name)
    }

    /// Used label names in sorted order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.labels.keys().map(String::as_str)
    }
}

impl<'a> FromIterator<&'a str> for UsageSet {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        let labels = iter
            .into_iter()
            .map(|name| {
                (
                    name.to_string(),
                    GitHubLabel {
                        id: 0,
                        name: name.to_string(),
                        color: String::new(),
                        description: None,
                        default: false,
                    },
                )
            })
            .collect();

        Self { labels }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::GitHubClient;
    use chrono::TimeZone;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn label(name: &str) -> GitHubLabel {
        GitHubLabel {
            id: 1,
            name: name.to_string(),
            color: "ededed".to_string(),
            description: None,
            default: false,
        }
    }

    fn record(issue: u64, names: &[&str]) -> IssueLabels {
        IssueLabels {
            repository: "owner/repo".to_string(),
            issue,
            labels: names.iter().map(|n| label(n)).collect(),
        }
    }

    #[test]
    fn test_usage_set_deduplicates_shared_labels() {
        let snapshot = UsageSnapshot {
            records: vec![
                record(1, &["bug", "help wanted"]),
                record(2, &["bug"]),
                record(3, &[]),
            ],
        };

        let usage = snapshot.usage();
        assert_eq!(usage.len(), 2);
        assert!(usage.contains("bug"));
        assert!(usage.contains("help wanted"));
        assert_eq!(usage.names().collect::<Vec<_>>(), vec!["bug", "help wanted"]);
    }

    #[test]
    fn test_empty_snapshot_has_empty_usage() {
        let usage = UsageSnapshot::default().usage();
        assert!(usage.is_empty());
    }

    #[test]
    fn test_backup_file_name() {
        let taken_at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 45).unwrap();
        assert_eq!(
            backup_file_name("owner/repo", taken_at).unwrap(),
            "used-labels-owner-repo-2024-05-01T12-30-45.000Z.json.bak"
        );
        assert!(backup_file_name("invalid", taken_at).is_err());
    }

    #[test]
    fn test_write_backup_round_trips_records() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = UsageSnapshot {
            records: vec![record(4, &["bug: confirmed"])],
        };
        let taken_at = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();

        let path = snapshot
            .write_backup(&dir.path().join("backups"), "owner/repo", taken_at)
            .unwrap();
        assert!(path.exists());

        let content = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(value[0]["issue"], 4);
        assert_eq!(value[0]["repository"], "owner/repo");
        assert_eq!(value[0]["labels"][0]["name"], "bug: confirmed");
    }

    #[tokio::test]
    async fn test_capture_collects_labels_per_issue() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/repos/owner/repo/issues"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"number": 1}, {"number": 2}
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/owner/repo/issues/1/labels"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"name": "bug", "color": "d73a4a"},
                {"name": "help wanted", "color": "008672"}
            ])))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/owner/repo/issues/2/labels"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"name": "bug", "color": "d73a4a"}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let client = GitHubClient::new(&server.uri(), "token").unwrap();
        let snapshot = UsageSnapshot::capture(&client, "owner/repo").await;

        assert_eq!(snapshot.len(), 2);
        let issues: Vec<u64> = snapshot.records.iter().map(|r| r.issue).collect();
        assert!(issues.contains(&1) && issues.contains(&2));
        assert_eq!(snapshot.usage().len(), 2);
    }

    #[tokio::test]
    async fn test_capture_skips_failed_issue_lookups() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/repos/owner/repo/issues"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"number": 1}, {"number": 2}
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/owner/repo/issues/1/labels"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"name": "bug", "color": "d73a4a"}
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/owner/repo/issues/2/labels"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = GitHubClient::new(&server.uri(), "token").unwrap();
        let snapshot = UsageSnapshot::capture(&client, "owner/repo").await;

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.records[0].issue, 1);
    }

    #[tokio::test]
    async fn test_capture_tolerates_issue_listing_failure() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/repos/owner/repo/issues"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "message": "Not Found"
            })))
            .mount(&server)
            .await;

        let client = GitHubClient::new(&server.uri(), "token").unwrap();
        let snapshot = UsageSnapshot::capture(&client, "owner/repo").await;
        assert!(snapshot.is_empty());
    }
}
