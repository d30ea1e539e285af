use crate::errors::{AppError, BridgeError, ErrorKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<BridgeError>,
}

impl Envelope {
    pub fn saved() -> Self {
        Self {
            success: true,
            data: None,
            error: None,
        }
    }

    pub fn loaded(data: Option<Value>) -> Self {
        Self {
            success: true,
            data: Some(data.unwrap_or(Value::Null)),
            error: None,
        }
    }

    pub fn failed(error: impl Into<BridgeError>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }

    pub fn failed_with(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::failed(BridgeError::new(kind, message))
    }

    pub fn into_data(self) -> Result<Option<Value>, BridgeError> {
        if self.success {
            Ok(self.data.filter(|value| !value.is_null()))
        } else {
            Err(self
                .error
                .unwrap_or_else(|| BridgeError::new(ErrorKind::Internal, "failed envelope carried no error")))
        }
    }
}

impl From<AppError> for Envelope {
    fn from(value: AppError) -> Self {
        Self::failed(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NoticeState {
    Unacknowledged,
    Acknowledged,
}

impl NoticeState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unacknowledged => "unacknowledged",
            Self::Acknowledged => "acknowledged",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoticeStatus {
    pub state: NoticeState,
    pub visible: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticSnapshot {
    pub captured_at: DateTime<Utc>,
    pub notice_acknowledged: bool,
    pub data_dir: String,
    pub documents: BTreeMap<String, Value>,
    pub unreadable: BTreeMap<String, BridgeError>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreRequest {
    #[serde(default)]
    pub documents: BTreeMap<String, Value>,
    #[serde(default)]
    pub notice_acknowledged: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreResponse {
    pub restored: Vec<String>,
    pub notice_acknowledged: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BooleanResponse {
    pub success: bool,
}
