use super::{BridgeOperation, BridgeRequest, BridgeResponse};
use crate::errors::{AppError, ErrorKind};
use crate::models::Envelope;
use crate::store::DocumentStore;
use serde_json::Value;

const ENCODE_FAILURE_RESPONSE: &str =
    r#"{"success":false,"error":{"kind":"internal","message":"Failed to encode bridge response"}}"#;

#[derive(Debug, Clone)]
pub struct BridgeGateway {
    store: DocumentStore,
    app_version: String,
}

impl BridgeGateway {
    pub fn new(store: DocumentStore, app_version: impl Into<String>) -> Self {
        Self {
            store,
            app_version: app_version.into(),
        }
    }

    pub fn operations(&self) -> &'static [BridgeOperation] {
        &BridgeOperation::ALL
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    pub async fn dispatch(&self, request: BridgeRequest) -> BridgeResponse {
        match request {
            BridgeRequest::SaveData { name, value } => {
                BridgeResponse::Envelope(self.save_data(&name, &value).await)
            }
            BridgeRequest::LoadData { name } => BridgeResponse::Envelope(self.load_data(&name).await),
            BridgeRequest::GetAppVersion => BridgeResponse::Version(self.app_version()),
        }
    }

    // Undecodable input answers with a validation envelope.
    pub async fn handle_raw(&self, raw: &str) -> String {
        let response = match serde_json::from_str::<BridgeRequest>(raw) {
            Ok(request) => self.dispatch(request).await,
            Err(error) => {
                tracing::warn!(error = %error, "rejected malformed bridge request");
                BridgeResponse::Envelope(Envelope::failed_with(
                    ErrorKind::Validation,
                    format!("Unsupported bridge request: {}", error),
                ))
            }
        };

        match serde_json::to_string(&response) {
            Ok(encoded) => encoded,
            Err(error) => {
                tracing::error!(error = %error, "failed to encode bridge response");
                ENCODE_FAILURE_RESPONSE.to_string()
            }
        }
    }

    async fn save_data(&self, name: &str, value: &Value) -> Envelope {
        match self.store.save(name, value).await {
            Ok(()) => Envelope::saved(),
            Err(error) => failure(BridgeOperation::SaveData, name, error),
        }
    }

    async fn load_data(&self, name: &str) -> Envelope {
        match self.store.load(name).await {
            Ok(data) => Envelope::loaded(data),
            Err(error) => failure(BridgeOperation::LoadData, name, error),
        }
    }

    fn app_version(&self) -> String {
        self.app_version.clone()
    }
}

fn failure(operation: BridgeOperation, name: &str, error: AppError) -> Envelope {
    tracing::warn!(
        operation = operation.as_str(),
        name = %name,
        kind = error.kind().as_str(),
        error = %error,
        "bridge operation failed"
    );
    Envelope::from(error)
}
