pub mod client;
pub mod gateway;

use crate::models::Envelope;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BridgeOperation {
    SaveData,
    LoadData,
    GetAppVersion,
}

impl BridgeOperation {
    pub const ALL: [BridgeOperation; 3] = [Self::SaveData, Self::LoadData, Self::GetAppVersion];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::SaveData => "save-data",
            Self::LoadData => "load-data",
            Self::GetAppVersion => "get-app-version",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "kebab-case")]
pub enum BridgeRequest {
    SaveData { name: String, value: Value },
    LoadData { name: String },
    GetAppVersion,
}

impl BridgeRequest {
    pub fn operation(&self) -> BridgeOperation {
        match self {
            Self::SaveData { .. } => BridgeOperation::SaveData,
            Self::LoadData { .. } => BridgeOperation::LoadData,
            Self::GetAppVersion => BridgeOperation::GetAppVersion,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BridgeResponse {
    Version(String),
    Envelope(Envelope),
}
