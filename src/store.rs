use crate::errors::{AppError, AppResult};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub const TODOS: &str = "todos";
pub const PROJECTS: &str = "projects";
pub const EPICS: &str = "epics";
pub const WELL_KNOWN_DOCUMENTS: [&str; 3] = [TODOS, PROJECTS, EPICS];

const DOCUMENT_EXTENSION: &str = "json";
const MAX_NAME_LENGTH: usize = 128;

static DOCUMENT_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]*$").expect("valid document name regex"));

pub fn validate_name(name: &str) -> AppResult<()> {
    if name.is_empty() {
        return Err(AppError::Validation("Document name must not be empty".to_string()));
    }
    if name.len() > MAX_NAME_LENGTH {
        return Err(AppError::Validation(format!(
            "Document name exceeds {} characters",
            MAX_NAME_LENGTH
        )));
    }
    if name.contains(['/', '\\']) || name == "." || name == ".." {
        return Err(AppError::Validation(format!(
            "Document name {:?} must not contain path separators or parent segments",
            name
        )));
    }
    if !DOCUMENT_NAME_RE.is_match(name) {
        return Err(AppError::Validation(format!(
            "Document name {:?} may only use letters, digits, '-', '_' and '.'",
            name
        )));
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct DocumentStore {
    root: PathBuf,
}

impl DocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn ensure_root(&self) -> AppResult<()> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|error| AppError::Io(format!("{}: {}", self.root.display(), error)))
    }

    pub async fn save(&self, name: &str, value: &Value) -> AppResult<()> {
        let target = self.document_path(name)?;
        self.ensure_root().await?;

        let mut contents = serde_json::to_string_pretty(value)?;
        contents.push('\n');

        let tmp_path = self
            .root
            .join(format!(".{}-{}.tmp", name, Uuid::new_v4()));
        if let Err(error) = tokio::fs::write(&tmp_path, contents.as_bytes()).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(AppError::Io(format!("{}: {}", tmp_path.display(), error)));
        }
        if let Err(error) = tokio::fs::rename(&tmp_path, &target).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(AppError::Io(format!("{}: {}", target.display(), error)));
        }

        tracing::debug!(name = %name, bytes = contents.len(), "document saved");
        Ok(())
    }

    /// `Ok(None)` means the document has never been written.
    pub async fn load(&self, name: &str) -> AppResult<Option<Value>> {
        let target = self.document_path(name)?;
        let raw = match tokio::fs::read_to_string(&target).await {
            Ok(raw) => raw,
            Err(error) if error.kind() == IoErrorKind::NotFound => {
                tracing::debug!(name = %name, "document absent");
                return Ok(None);
            }
            Err(error) => return Err(AppError::Io(format!("{}: {}", target.display(), error))),
        };

        let value = serde_json::from_str::<Value>(&raw)
            .map_err(|error| AppError::Parse(format!("{}: {}", target.display(), error)))?;
        tracing::debug!(name = %name, "document loaded");
        Ok(Some(value))
    }

    pub async fn exists(&self, name: &str) -> AppResult<bool> {
        let target = self.document_path(name)?;
        match tokio::fs::metadata(&target).await {
            Ok(metadata) => Ok(metadata.is_file()),
            Err(error) if error.kind() == IoErrorKind::NotFound => Ok(false),
            Err(error) => Err(AppError::Io(format!("{}: {}", target.display(), error))),
        }
    }

    pub async fn list(&self) -> AppResult<Vec<String>> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(error) if error.kind() == IoErrorKind::NotFound => return Ok(Vec::new()),
            Err(error) => return Err(AppError::Io(format!("{}: {}", self.root.display(), error))),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(DOCUMENT_EXTENSION) {
                continue;
            }
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            if validate_name(stem).is_ok() {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    fn document_path(&self, name: &str) -> AppResult<PathBuf> {
        if let Err(error) = validate_name(name) {
            tracing::warn!(name = %name, error = %error, "rejected document name");
            return Err(error);
        }
        let path = self.root.join(format!("{}.{}", name, DOCUMENT_EXTENSION));
        if !path.starts_with(&self.root) {
            return Err(AppError::Validation(
                "Resolved document path escaped the data directory".to_string(),
            ));
        }
        Ok(path)
    }
}
