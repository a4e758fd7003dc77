//! Configuration Management
//!
//! Label definitions, label list files and run configuration

use std::path::{Path, PathBuf};

use jsonschema::JSONSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::{Error, Result};

/// Default GitHub REST API base URL
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Repository list read by `--repositories-json`
pub const REPOSITORIES_FILE: &str = "repositories.json";

/// Supported label list file extensions, searched in order
pub const LABEL_FILE_EXTENSIONS: &[&str] = &["json", "yaml", "yml"];

/// Label Definition
///
/// One entry of a label list file. `current_name` is only meaningful for
/// updates; any field not modelled here (e.g. `description`) is kept in
/// `extra` and forwarded on update.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Label {
    /// Label name
    pub name: String,

    /// Label color (6-digit hex code, with or without #)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,

    /// Name of the existing label to update
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_name: Option<String>,

    /// Remaining fields, in input order
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Label {
    /// Create a new label definition
    ///
    /// # Errors
    /// Returns an error if the name is empty or the color format is invalid
    pub fn new(name: impl Into<String>, color: impl Into<String>) -> Result<Self> {
        let label = Self {
            name: name.into(),
            color: Some(color.into()),
            current_name: None,
            extra: Map::new(),
        };

        LabelListKind::Create.validate_label(&label)?;
        Ok(label)
    }

    /// Create an update definition renaming/recoloring `current_name`
    pub fn update(
        current_name: impl Into<String>,
        name: impl Into<String>,
        color: impl Into<String>,
    ) -> Result<Self> {
        let label = Self {
            name: name.into(),
            color: Some(color.into()),
            current_name: Some(current_name.into()),
            extra: Map::new(),
        };

        LabelListKind::Update.validate_label(&label)?;
        Ok(label)
    }

    /// Create a removal entry (only the name matters)
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            color: None,
            current_name: None,
            extra: Map::new(),
        }
    }

    /// Normalize color (strip the leading #, keep the digits as given)
    pub fn normalize_color(color: &str) -> String {
        color.trim_start_matches('#').to_string()
    }

    /// Request body for creating this label: exactly `name` and `color`
    ///
    /// # Errors
    /// If the label has no color
    pub fn create_payload(&self) -> Result<Value> {
        let color = self.color.as_deref().ok_or_else(|| {
            Error::label_validation(format!("Label '{}' has no color", self.name))
        })?;

        Ok(json!({
            "name": self.name,
            "color": Self::normalize_color(color),
        }))
    }

    /// Target name and request body for updating this label
    ///
    /// The body carries every field except `currentName`, with the color
    /// normalized and extra fields forwarded verbatim.
    ///
    /// # Errors
    /// If the label has no `currentName`
    pub fn update_payload(&self) -> Result<(&str, Value)> {
        let current_name = self.current_name.as_deref().ok_or_else(|| {
            Error::label_validation(format!(
                "Label '{}' has no currentName to update",
                self.name
            ))
        })?;

        let mut body = Map::new();
        body.insert("name".to_string(), Value::String(self.name.clone()));
        if let Some(color) = &self.color {
            body.insert(
                "color".to_string(),
                Value::String(Self::normalize_color(color)),
            );
        }
        for (key, value) in &self.extra {
            body.insert(key.clone(), value.clone());
        }

        Ok((current_name, Value::Object(body)))
    }
}

/// Which label list a definition belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelListKind {
    Create,
    Update,
    Remove,
}

impl LabelListKind {
    /// File name without extension, looked up in the working directory
    pub fn file_stem(self) -> &'static str {
        match self {
            LabelListKind::Create => "labels-to-create",
            LabelListKind::Update => "labels-to-update",
            LabelListKind::Remove => "labels-to-remove",
        }
    }

    fn required_fields(self) -> &'static [&'static str] {
        match self {
            LabelListKind::Create => &["name", "color"],
            LabelListKind::Update => &["currentName", "name"],
            LabelListKind::Remove => &["name"],
        }
    }

    /// JSON Schema every list file of this kind must satisfy
    ///
    /// Removal entries are matched by name only, so their color is not
    /// constrained.
    pub fn schema(self) -> Value {
        let mut properties = json!({
            "name": { "type": "string", "minLength": 1 },
            "currentName": { "type": "string", "minLength": 1 },
            "description": { "type": ["string", "null"] }
        });
        if self != LabelListKind::Remove {
            properties["color"] = json!({ "type": "string" });
        }

        json!({
            "type": "array",
            "items": {
                "type": "object",
                "required": self.required_fields(),
                "properties": properties
            }
        })
    }

    /// Drop fields this kind ignores before deserializing
    fn strip_ignored(self, value: &mut Value) {
        if self != LabelListKind::Remove {
            return;
        }
        if let Some(items) = value.as_array_mut() {
            for item in items.iter_mut().filter_map(Value::as_object_mut) {
                item.remove("color");
            }
        }
    }

    /// Validate a single definition for this kind
    ///
    /// # Errors
    /// - If a required name is empty
    /// - If a required color is missing or any given color is invalid
    pub fn validate_label(self, label: &Label) -> Result<()> {
        if label.name.trim().is_empty() {
            return Err(Error::label_validation("Label name cannot be empty"));
        }

        match self {
            LabelListKind::Create => {
                let color = label.color.as_deref().ok_or_else(|| {
                    Error::label_validation(format!("Label '{}' requires a color", label.name))
                })?;
                validate_color(color)?;
            }
            LabelListKind::Update => {
                match label.current_name.as_deref() {
                    Some(current) if !current.trim().is_empty() => {}
                    _ => {
                        return Err(Error::label_validation(format!(
                            "Label '{}' requires a non-empty currentName",
                            label.name
                        )))
                    }
                }
                if let Some(color) = label.color.as_deref() {
                    validate_color(color)?;
                }
            }
            // Removal only looks at the name
            LabelListKind::Remove => {}
        }

        Ok(())
    }
}

/// The three label lists of one invocation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabelLists {
    pub to_create: Vec<Label>,
    pub to_update: Vec<Label>,
    pub to_remove: Vec<Label>,
}

impl LabelLists {
    /// Load all three lists from `dir`; a missing file is an empty list
    ///
    /// # Errors
    /// If an existing file cannot be read, parsed or validated
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        let load = |kind: LabelListKind| -> Result<Vec<Label>> {
            match find_label_file_in(dir, kind) {
                Some(path) => load_label_list(&path, kind),
                None => Ok(Vec::new()),
            }
        };

        Ok(Self {
            to_create: load(LabelListKind::Create)?,
            to_update: load(LabelListKind::Update)?,
            to_remove: load(LabelListKind::Remove)?,
        })
    }

    /// Validate every definition against its list kind
    pub fn validate(&self) -> Result<()> {
        for label in &self.to_create {
            LabelListKind::Create.validate_label(label)?;
        }
        for label in &self.to_update {
            LabelListKind::Update.validate_label(label)?;
        }
        for label in &self.to_remove {
            LabelListKind::Remove.validate_label(label)?;
        }
        Ok(())
    }

    /// Whether no list has any entry
    pub fn is_empty(&self) -> bool {
        self.to_create.is_empty() && self.to_update.is_empty() && self.to_remove.is_empty()
    }
}

/// Sync Configuration
///
/// Everything one invocation applies to each repository
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Label lists shared by all repositories
    pub labels: LabelLists,

    /// Directory receiving usage snapshot backups
    pub backup_dir: PathBuf,

    /// Dry-run mode (snapshot only, no label changes)
    pub dry_run: bool,
}

impl SyncConfig {
    /// Validate configuration
    ///
    /// # Errors
    /// If any label definition is invalid
    pub fn validate(&self) -> Result<()> {
        self.labels.validate()
    }
}

/// Parse repository string into owner and name
///
/// # Arguments
/// - `repo`: Repository string in "owner/repo" format
///
/// # Errors
/// Returns an error if the format is invalid
pub fn parse_repository(repo: &str) -> Result<(String, String)> {
    let parts: Vec<&str> = repo.split('/').collect();
    if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
        return Err(Error::InvalidRepositoryFormat(repo.to_string()));
    }
    Ok((parts[0].to_string(), parts[1].to_string()))
}

/// Load a repository list (JSON array of "owner/repo" strings)
///
/// # Errors
/// If the file cannot be read or an entry is not "owner/repo"
pub fn load_repositories<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&content)?;

    let schema = json!({ "type": "array", "items": { "type": "string" } });
    validate_against_schema(&schema, &value, path)?;

    let repositories: Vec<String> = serde_json::from_value(value)?;
    for repository in &repositories {
        parse_repository(repository)?;
    }

    Ok(repositories)
}

/// Search `dir` for the list file of `kind`, trying [`LABEL_FILE_EXTENSIONS`] in order
pub fn find_label_file_in(dir: &Path, kind: LabelListKind) -> Option<PathBuf> {
    LABEL_FILE_EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("{}.{}", kind.file_stem(), ext)))
        .find(|path| path.exists())
}

/// Load a label list file, detecting format by extension
///
/// # Errors
/// If file reading, parsing or validation fails, or the extension is unsupported
pub fn load_label_list<P: AsRef<Path>>(path: P, kind: LabelListKind) -> Result<Vec<Label>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;
    parse_label_list(&content, path, kind)
}

/// Parse label list content, detecting format by the extension of `path`
///
/// Whitespace-only content is an empty list.
///
/// # Errors
/// If parsing, schema validation or label validation fails
pub fn parse_label_list(content: &str, path: &Path, kind: LabelListKind) -> Result<Vec<Label>> {
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut value: Value = match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => serde_json::from_str(content)?,
        Some("yaml") | Some("yml") => serde_yaml::from_str(content)?,
        _ => {
            return Err(Error::config_validation(format!(
                "Label file must be .json, .yaml, or .yml: {}",
                path.display()
            )))
        }
    };

    validate_against_schema(&kind.schema(), &value, path)?;
    kind.strip_ignored(&mut value);

    let labels: Vec<Label> = serde_json::from_value(value)?;
    for label in &labels {
        kind.validate_label(label)?;
    }

    Ok(labels)
}

fn validate_against_schema(schema: &Value, instance: &Value, path: &Path) -> Result<()> {
    let compiled = JSONSchema::compile(schema).map_err(|e| Error::SchemaValidation {
        file: path.display().to_string(),
        message: e.to_string(),
    })?;

    let messages: Vec<String> = match compiled.validate(instance) {
        Ok(()) => return Ok(()),
        Err(errors) => errors
            .map(|e| format!("{} (at '{}')", e, e.instance_path))
            .collect(),
    };

    Err(Error::SchemaValidation {
        file: path.display().to_string(),
        message: messages.join("; "),
    })
}

/// Validate a color given with or without the leading #
fn validate_color(color: &str) -> Result<()> {
    if is_valid_hex_color(&Label::normalize_color(color)) {
        Ok(())
    } else {
        Err(Error::InvalidLabelColor(color.to_string()))
    }
}

/// Validate hex color code
///
/// # Arguments
/// - `color`: Color code (6-digit hex without #)
///
/// # Returns
/// True if valid
fn is_valid_hex_color(color: &str) -> bool {
    if color.len() != 6 {
        return false;
    }

    color.chars().all(|c| c.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_hex_color() {
        assert!(is_valid_hex_color("ff0000"));
        assert!(is_valid_hex_color("00FF00"));
        assert!(is_valid_hex_color("123abc"));

        assert!(!is_valid_hex_color("ff00")); // Too short
        assert!(!is_valid_hex_color("ff0000x")); // Invalid character
        assert!(!is_valid_hex_color("#ff0000")); // With #
    }

    #[test]
    fn test_parse_repository() {
        assert!(parse_repository("owner/repo").is_ok());
        assert!(parse_repository("org/project").is_ok());

        assert!(parse_repository("repo").is_err()); // No slash
        assert!(parse_repository("/repo").is_err()); // No owner
        assert!(parse_repository("owner/").is_err()); // No repo name
        assert!(parse_repository("owner/repo/sub").is_err()); // Too many parts
    }

    #[test]
    fn test_normalize_color_strips_only_the_hash() {
        assert_eq!(Label::normalize_color("#ff0000"), "ff0000");
        assert_eq!(Label::normalize_color("ff0000"), "ff0000");
        assert_eq!(Label::normalize_color("#D93F0B"), "D93F0B");
    }

    #[test]
    fn test_label_new_accepts_both_color_forms() {
        assert!(Label::new("bug", "#ff0000").is_ok());
        assert!(Label::new("bug", "ff0000").is_ok());

        assert!(Label::new("bug", "invalid").is_err());
        assert!(Label::new("bug", "#fff").is_err());
        assert!(Label::new("  ", "#ff0000").is_err());
    }

    #[test]
    fn test_create_payload() {
        let label = Label::new("urgent", "#ff0000").unwrap();
        assert_eq!(
            label.create_payload().unwrap(),
            json!({"name": "urgent", "color": "ff0000"})
        );
    }

    #[test]
    fn test_create_payload_ignores_current_name_and_extras() {
        let label: Label = serde_json::from_str(
            r##"{"currentName":"old","name":"urgent","color":"#ff0000","description":"x"}"##,
        )
        .unwrap();
        assert_eq!(
            label.create_payload().unwrap(),
            json!({"name": "urgent", "color": "ff0000"})
        );
    }

    #[test]
    fn test_create_payload_requires_color() {
        assert!(Label::named("bug").create_payload().is_err());
    }

    #[test]
    fn test_update_payload_forwards_extra_fields() {
        let label: Label = serde_json::from_str(
            r##"{"currentName":"bug","name":"type: bug","color":"#d73a4a","description":"Something isn't working"}"##,
        )
        .unwrap();

        let (current, body) = label.update_payload().unwrap();
        assert_eq!(current, "bug");
        assert_eq!(
            body,
            json!({
                "name": "type: bug",
                "color": "d73a4a",
                "description": "Something isn't working"
            })
        );
        assert!(body.get("currentName").is_none());
    }

    #[test]
    fn test_update_payload_without_color() {
        let label: Label =
            serde_json::from_str(r##"{"currentName":"bug","name":"defect"}"##).unwrap();
        let (_, body) = label.update_payload().unwrap();
        assert_eq!(body, json!({"name": "defect"}));
    }

    #[test]
    fn test_update_payload_requires_current_name() {
        let label = Label::new("bug", "#ff0000").unwrap();
        assert!(label.update_payload().is_err());
    }

    #[test]
    fn test_update_validation() {
        assert!(Label::update("bug", "defect", "#ff0000").is_ok());
        assert!(Label::update("", "defect", "#ff0000").is_err());
        assert!(Label::update("bug", "defect", "red").is_err());
    }

    #[test]
    fn test_remove_validation_ignores_color() {
        let mut label = Label::named("wontfix");
        label.color = Some("not a color".to_string());
        assert!(LabelListKind::Remove.validate_label(&label).is_ok());
        assert!(LabelListKind::Remove
            .validate_label(&Label::named(""))
            .is_err());
    }

    #[test]
    fn test_parse_create_list_json() {
        let content = r##"[
            {"name":"closed: completed","color":"#d93f0b"},
            {"name":"urgent","color":"ff0000"}
        ]"##;
        let labels =
            parse_label_list(content, Path::new("labels.json"), LabelListKind::Create).unwrap();
        assert_eq!(labels.len(), 2);
        assert_eq!(labels[0].name, "closed: completed");
        assert_eq!(labels[0].color.as_deref(), Some("#d93f0b"));
    }

    #[test]
    fn test_parse_update_list_yaml() {
        let content = "- currentName: bug\n  name: \"type: bug\"\n  color: \"#d73a4a\"\n";
        let labels =
            parse_label_list(content, Path::new("labels.yaml"), LabelListKind::Update).unwrap();
        assert_eq!(labels.len(), 1);
        assert_eq!(labels[0].current_name.as_deref(), Some("bug"));
        assert_eq!(labels[0].name, "type: bug");
    }

    #[test]
    fn test_parse_remove_list_without_color() {
        let content = r##"[{"name":"wontfix"},{"name":"invalid","color":"#fff"}]"##;
        let labels =
            parse_label_list(content, Path::new("labels.json"), LabelListKind::Remove).unwrap();
        assert_eq!(labels.len(), 2);
    }

    #[test]
    fn test_parse_remove_list_ignores_color_type() {
        let content = r##"[{"name":"wontfix","color":123}]"##;
        let labels =
            parse_label_list(content, Path::new("labels.json"), LabelListKind::Remove).unwrap();
        assert_eq!(labels.len(), 1);
        assert_eq!(labels[0].name, "wontfix");
        assert_eq!(labels[0].color, None);

        let content = "- name: wontfix\n  color: 123\n";
        let labels =
            parse_label_list(content, Path::new("labels.yml"), LabelListKind::Remove).unwrap();
        assert_eq!(labels[0].color, None);

        // create entries still need a string color
        let result = parse_label_list(
            r##"[{"name":"bug","color":123}]"##,
            Path::new("labels.json"),
            LabelListKind::Create,
        );
        assert!(matches!(result, Err(Error::SchemaValidation { .. })));
    }

    #[test]
    fn test_parse_rejects_schema_violations() {
        // create entries need a color
        let result = parse_label_list(
            r##"[{"name":"bug"}]"##,
            Path::new("labels.json"),
            LabelListKind::Create,
        );
        assert!(matches!(result, Err(Error::SchemaValidation { .. })));

        // not an array
        let result = parse_label_list(
            r##"{"name":"bug"}"##,
            Path::new("labels.json"),
            LabelListKind::Remove,
        );
        assert!(matches!(result, Err(Error::SchemaValidation { .. })));

        // update entries need currentName
        let result = parse_label_list(
            "- name: bug\n  color: \"#ff0000\"\n",
            Path::new("labels.yml"),
            LabelListKind::Update,
        );
        assert!(matches!(result, Err(Error::SchemaValidation { .. })));
    }

    #[test]
    fn test_parse_rejects_invalid_color() {
        let result = parse_label_list(
            r##"[{"name":"bug","color":"#invalid"}]"##,
            Path::new("labels.json"),
            LabelListKind::Create,
        );
        assert!(matches!(result, Err(Error::InvalidLabelColor(_))));
    }

    #[test]
    fn test_parse_empty_content_is_empty_list() {
        let labels =
            parse_label_list("  \n", Path::new("labels.json"), LabelListKind::Create).unwrap();
        assert!(labels.is_empty());
    }

    #[test]
    fn test_parse_unsupported_extension() {
        let result = parse_label_list("[]", Path::new("labels.toml"), LabelListKind::Create);
        assert!(matches!(result, Err(Error::ConfigValidation(_))));
    }

    #[test]
    fn test_load_from_dir_missing_files_are_empty() {
        let dir = tempfile::tempdir().unwrap();
        let lists = LabelLists::load_from_dir(dir.path()).unwrap();
        assert!(lists.is_empty());
    }

    #[test]
    fn test_load_from_dir_reads_all_lists() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("labels-to-create.json"),
            r##"[{"name":"urgent","color":"#ff0000"}]"##,
        )
        .unwrap();
        std::fs::write(
            dir.path().join("labels-to-update.yml"),
            "- currentName: bug\n  name: defect\n  color: \"#00ff00\"\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("labels-to-remove.json"),
            r##"[{"name":"wontfix"}]"##,
        )
        .unwrap();

        let lists = LabelLists::load_from_dir(dir.path()).unwrap();
        assert_eq!(lists.to_create.len(), 1);
        assert_eq!(lists.to_update.len(), 1);
        assert_eq!(lists.to_remove.len(), 1);
        assert_eq!(lists.to_remove[0].name, "wontfix");
    }

    #[test]
    fn test_find_label_file_prefers_json() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("labels-to-remove.yaml"), "[]").unwrap();
        std::fs::write(dir.path().join("labels-to-remove.json"), "[]").unwrap();

        let found = find_label_file_in(dir.path(), LabelListKind::Remove).unwrap();
        assert_eq!(found.file_name().unwrap(), "labels-to-remove.json");
        assert!(find_label_file_in(dir.path(), LabelListKind::Create).is_none());
    }

    #[test]
    fn test_load_repositories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(REPOSITORIES_FILE);
        std::fs::write(&path, r#"["owner/one", "owner/two"]"#).unwrap();
        let repositories = load_repositories(&path).unwrap();
        assert_eq!(repositories, vec!["owner/one", "owner/two"]);
    }

    #[test]
    fn test_load_repositories_rejects_bad_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(REPOSITORIES_FILE);

        std::fs::write(&path, r#"["not-a-repo"]"#).unwrap();
        assert!(matches!(
            load_repositories(&path),
            Err(Error::InvalidRepositoryFormat(_))
        ));

        std::fs::write(&path, r#"[1, 2]"#).unwrap();
        assert!(matches!(
            load_repositories(&path),
            Err(Error::SchemaValidation { .. })
        ));
    }

    #[test]
    fn test_sync_config_validate() {
        let mut config = SyncConfig {
            labels: LabelLists {
                to_create: vec![Label::new("urgent", "#ff0000").unwrap()],
                ..Default::default()
            },
            backup_dir: PathBuf::from("."),
            dry_run: false,
        };
        assert!(config.validate().is_ok());

        config.labels.to_update.push(Label::named("no-current-name"));
        assert!(config.validate().is_err());
    }
}
