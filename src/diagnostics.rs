use crate::errors::{AppError, AppResult, BridgeError};
use crate::models::{DiagnosticSnapshot, RestoreRequest, RestoreResponse};
use crate::settings::{SettingsStore, ACK_NOTICE_KEY};
use crate::store::{validate_name, DocumentStore};
use chrono::Utc;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Clone)]
pub struct DiagnosticConsole {
    store: DocumentStore,
    settings: Arc<dyn SettingsStore>,
}

impl DiagnosticConsole {
    pub fn new(store: DocumentStore, settings: Arc<dyn SettingsStore>) -> Self {
        Self { store, settings }
    }

    pub async fn current_state(&self) -> AppResult<DiagnosticSnapshot> {
        let mut documents = BTreeMap::new();
        let mut unreadable = BTreeMap::new();
        for name in self.store.list().await? {
            match self.store.load(&name).await {
                Ok(Some(value)) => {
                    documents.insert(name, value);
                }
                Ok(None) => {}
                Err(error) => {
                    unreadable.insert(name, BridgeError::from(error));
                }
            }
        }

        Ok(DiagnosticSnapshot {
            captured_at: Utc::now(),
            notice_acknowledged: self.settings.get_flag(ACK_NOTICE_KEY)?.unwrap_or(false),
            data_dir: self.store.root().to_string_lossy().to_string(),
            documents,
            unreadable,
        })
    }

    /// Writes every document back. All names are checked before the first
    /// write so a bad name leaves the store untouched.
    pub async fn restore(&self, request: RestoreRequest) -> AppResult<RestoreResponse> {
        for name in request.documents.keys() {
            validate_name(name)?;
        }

        let mut restored = Vec::with_capacity(request.documents.len());
        for (name, value) in &request.documents {
            self.store.save(name, value).await.map_err(|error| {
                AppError::Io(format!(
                    "restore stopped at {} after {} document(s): {}",
                    name,
                    restored.len(),
                    error
                ))
            })?;
            restored.push(name.clone());
        }

        if let Some(acknowledged) = request.notice_acknowledged {
            self.settings.set(ACK_NOTICE_KEY, Value::Bool(acknowledged))?;
        }

        tracing::info!(count = restored.len(), "diagnostic restore completed");
        Ok(RestoreResponse {
            restored,
            notice_acknowledged: self.settings.get_flag(ACK_NOTICE_KEY)?.unwrap_or(false),
        })
    }

    pub fn reset_notice(&self) -> AppResult<()> {
        self.settings.remove(ACK_NOTICE_KEY)?;
        tracing::info!("data-loss notice acknowledgment cleared");
        Ok(())
    }
}
