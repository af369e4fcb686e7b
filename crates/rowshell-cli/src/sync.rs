//! Component sync between a local directory and the components table.
//!
//! Config file (default `rowshell_sync.config.json`):
//!
//! ```json
//! {
//!   "envs": {
//!     "dev": {
//!       "base_url": "https://docs.example.org",
//!       "doc_id": "abc123",
//!       "api_key_env": "ROWSHELL_API_KEY_DEV",
//!       "table_id": "Application_Composants"
//!     }
//!   },
//!   "components_dir": "components"
//! }
//! ```
//!
//! A file's name is the template id of the component it holds.

use rowshell_host::{HostDocument, HostError, RestConfig};
use rowshell_model::row::{cell_string, row_id_of};
use rowshell_model::{ComponentSchema, Row, RowId};
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub const DEFAULT_CONFIG_PATH: &str = "rowshell_sync.config.json";
pub const DEFAULT_DOTENV_PATH: &str = ".env";
pub const DEFAULT_COMPONENTS_DIR: &str = "components";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    NotFound(PathBuf),
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("environment `{0}` is not defined in the config")]
    UnknownEnv(String),
    #[error("missing key `{key}` for environment `{env}`")]
    MissingKey { env: String, key: &'static str },
    #[error("environment variable {0} is not set")]
    MissingApiKey(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EnvConfig {
    pub base_url: Option<String>,
    pub doc_id: Option<String>,
    pub api_key_env: Option<String>,
    pub table_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub envs: BTreeMap<String, EnvConfig>,
    #[serde(default = "default_components_dir")]
    pub components_dir: PathBuf,
}

fn default_components_dir() -> PathBuf {
    PathBuf::from(DEFAULT_COMPONENTS_DIR)
}

/// A fully specified environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEnv {
    pub rest: RestConfig,
    pub table_id: String,
}

impl SyncConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Check `env` and read its API key through `lookup`.
    pub fn resolve(
        &self,
        env: &str,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<ResolvedEnv, ConfigError> {
        let config = self
            .envs
            .get(env)
            .ok_or_else(|| ConfigError::UnknownEnv(env.to_string()))?;
        let required = |value: &Option<String>, key: &'static str| {
            value.clone().ok_or_else(|| ConfigError::MissingKey {
                env: env.to_string(),
                key,
            })
        };
        let base_url = required(&config.base_url, "base_url")?;
        let doc_id = required(&config.doc_id, "doc_id")?;
        let api_key_env = required(&config.api_key_env, "api_key_env")?;
        let table_id = required(&config.table_id, "table_id")?;

        let api_key = lookup(&api_key_env)
            .filter(|key| !key.is_empty())
            .ok_or(ConfigError::MissingApiKey(api_key_env))?;

        Ok(ResolvedEnv {
            rest: RestConfig::new(&base_url, &doc_id, &api_key),
            table_id,
        })
    }
}

// ============================================================================
// .env
// ============================================================================

/// `KEY=value` pairs of a dotenv file. Blank lines, comments and lines
/// without `=` are skipped; surrounding quotes are removed.
pub fn parse_dotenv(text: &str) -> Vec<(String, String)> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let (key, value) = line.split_once('=')?;
            let key = key.trim();
            let value = value.trim().trim_matches('"').trim_matches('\'');
            (!key.is_empty()).then(|| (key.to_string(), value.to_string()))
        })
        .collect()
}

/// Export the pairs of `path` that are not already set. A missing file is
/// not an error. Returns how many variables were set.
pub fn load_dotenv(path: &Path) -> Result<usize, ConfigError> {
    if !path.exists() {
        return Ok(0);
    }
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut count = 0;
    for (key, value) in parse_dotenv(&text) {
        if std::env::var_os(&key).is_none() {
            std::env::set_var(&key, value);
            count += 1;
        }
    }
    tracing::debug!(path = %path.display(), count, "dotenv loaded");
    Ok(count)
}

// ============================================================================
// Files
// ============================================================================

/// Regular files directly inside `dir`, sorted.
pub fn list_component_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .collect();
    files.sort();
    files
}

pub fn template_id_from_path(path: &Path) -> Option<String> {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .filter(|name| !name.is_empty())
}

// ============================================================================
// Push / diff
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Updated(RowId),
    Created(RowId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffStatus {
    Identical,
    Different,
    NotFound,
}

impl DiffStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DiffStatus::Identical => "identical",
            DiffStatus::Different => "different",
            DiffStatus::NotFound => "not found",
        }
    }
}

async fn find_component(
    document: &dyn HostDocument,
    table: &str,
    schema: &ComponentSchema,
    template_id: &str,
) -> Result<Option<Row>, HostError> {
    let matches = document.find_by_field(table, &schema.id, template_id).await?;
    if matches.len() > 1 {
        tracing::warn!(
            table = %table,
            template_id,
            count = matches.len(),
            "several rows share this template id, using the first"
        );
    }
    Ok(matches.into_iter().next())
}

/// Replace the source of the row with `template_id`, or create that row.
pub async fn push_component(
    document: &dyn HostDocument,
    table: &str,
    schema: &ComponentSchema,
    template_id: &str,
    code: &str,
) -> Result<PushOutcome, HostError> {
    let existing = find_component(document, table, schema, template_id).await?;
    match existing.as_ref().and_then(row_id_of) {
        Some(row_id) => {
            let mut fields = Row::new();
            fields.insert(schema.source_code.clone(), json!(code));
            document.update_row(table, row_id, fields).await?;
            Ok(PushOutcome::Updated(row_id))
        }
        None => {
            let mut fields = Row::new();
            fields.insert(schema.id.clone(), json!(template_id));
            fields.insert(schema.source_code.clone(), json!(code));
            let row_id = document.add_row(table, fields).await?;
            Ok(PushOutcome::Created(row_id))
        }
    }
}

/// Compare the stored source of `template_id` with `code`.
pub async fn diff_component(
    document: &dyn HostDocument,
    table: &str,
    schema: &ComponentSchema,
    template_id: &str,
    code: &str,
) -> Result<DiffStatus, HostError> {
    let Some(row) = find_component(document, table, schema, template_id).await? else {
        return Ok(DiffStatus::NotFound);
    };
    let remote = cell_string(row.get(&schema.source_code)).unwrap_or_default();
    Ok(if remote == code {
        DiffStatus::Identical
    } else {
        DiffStatus::Different
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowshell_host::MemoryDocument;
    use serde_json::Value;

    const TABLE: &str = "Application_Composants";

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            other => panic!("not an object: {other}"),
        }
    }

    fn config(text: &str) -> SyncConfig {
        serde_json::from_str(text).unwrap()
    }

    #[test]
    fn resolve_reads_the_api_key_variable() {
        let cfg = config(
            r#"{"envs": {"dev": {"base_url": "https://docs.example.org/", "doc_id": "d1",
                "api_key_env": "KEY_DEV", "table_id": "Application_Composants"}}}"#,
        );
        assert_eq!(cfg.components_dir, PathBuf::from(DEFAULT_COMPONENTS_DIR));

        let env = cfg
            .resolve("dev", |name| (name == "KEY_DEV").then(|| "secret".to_string()))
            .unwrap();
        assert_eq!(env.table_id, TABLE);
        assert_eq!(env.rest.api_key, "secret");
        assert_eq!(env.rest.doc_id, "d1");

        assert!(matches!(
            cfg.resolve("dev", |_| None),
            Err(ConfigError::MissingApiKey(name)) if name == "KEY_DEV"
        ));
        assert!(matches!(
            cfg.resolve("prod", |_| None),
            Err(ConfigError::UnknownEnv(_))
        ));
    }

    #[test]
    fn resolve_names_the_missing_key() {
        let cfg = config(r#"{"envs": {"dev": {"base_url": "x", "doc_id": "d"}}}"#);
        assert!(matches!(
            cfg.resolve("dev", |_| None),
            Err(ConfigError::MissingKey { key: "api_key_env", .. })
        ));
    }

    #[test]
    fn load_reports_missing_and_malformed_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sync.json");
        assert!(matches!(SyncConfig::load(&path), Err(ConfigError::NotFound(_))));

        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(SyncConfig::load(&path), Err(ConfigError::Parse { .. })));

        std::fs::write(&path, r#"{"envs": {}, "components_dir": "src/pages"}"#).unwrap();
        let cfg = SyncConfig::load(&path).unwrap();
        assert_eq!(cfg.components_dir, PathBuf::from("src/pages"));
    }

    #[test]
    fn dotenv_lines() {
        let pairs = parse_dotenv(
            "# comment\n\nKEY_DEV=\"abc\"\n  OTHER = 'x=y' \nnot a pair\n=orphan\n",
        );
        assert_eq!(
            pairs,
            [
                ("KEY_DEV".to_string(), "abc".to_string()),
                ("OTHER".to_string(), "x=y".to_string()),
            ]
        );
    }

    #[test]
    fn dotenv_does_not_override_existing_variables() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::env::set_var("ROWSHELL_TEST_DOTENV_KEPT", "original");
        std::fs::write(
            &path,
            "ROWSHELL_TEST_DOTENV_KEPT=replaced\nROWSHELL_TEST_DOTENV_NEW=added\n",
        )
        .unwrap();

        assert_eq!(load_dotenv(&path).unwrap(), 1);
        assert_eq!(std::env::var("ROWSHELL_TEST_DOTENV_KEPT").unwrap(), "original");
        assert_eq!(std::env::var("ROWSHELL_TEST_DOTENV_NEW").unwrap(), "added");
        assert_eq!(load_dotenv(&dir.path().join("missing")).unwrap(), 0);
    }

    #[test]
    fn lists_files_by_name() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("zeta"), "z").unwrap();
        std::fs::write(dir.path().join("home"), "h").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested").join("deep"), "d").unwrap();

        let names: Vec<_> = list_component_files(dir.path())
            .iter()
            .filter_map(|p| template_id_from_path(p))
            .collect();
        assert_eq!(names, ["home", "zeta"]);
    }

    #[tokio::test]
    async fn push_updates_first_match_or_creates() {
        let doc = MemoryDocument::new().with_rows(
            TABLE,
            vec![
                row(json!({"template_id": "home", "component_code": "old"})),
                row(json!({"template_id": "home", "component_code": "dup"})),
            ],
        );
        let schema = ComponentSchema::default();

        let outcome = push_component(&doc, TABLE, &schema, "home", "new").await.unwrap();
        assert_eq!(outcome, PushOutcome::Updated(1));
        assert_eq!(doc.rows(TABLE)[0]["component_code"], "new");
        assert_eq!(doc.rows(TABLE)[1]["component_code"], "dup");

        let outcome = push_component(&doc, TABLE, &schema, "about", "src").await.unwrap();
        assert_eq!(outcome, PushOutcome::Created(3));
        assert_eq!(doc.rows(TABLE)[2]["template_id"], "about");
    }

    #[tokio::test]
    async fn diff_statuses() {
        let doc = MemoryDocument::new().with_rows(
            TABLE,
            vec![row(json!({"template_id": "home", "component_code": "same"}))],
        );
        let schema = ComponentSchema::default();
        let status = |id, code| diff_component(&doc, TABLE, &schema, id, code);
        assert_eq!(status("home", "same").await.unwrap(), DiffStatus::Identical);
        assert_eq!(status("home", "other").await.unwrap(), DiffStatus::Different);
        assert_eq!(status("missing", "x").await.unwrap(), DiffStatus::NotFound);
        assert_eq!(DiffStatus::NotFound.as_str(), "not found");
    }
}
