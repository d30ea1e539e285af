use crate::errors::{AppError, AppResult};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

pub const ACK_NOTICE_KEY: &str = "dataLossNoticeAcknowledged";

pub trait SettingsStore: Send + Sync {
    fn get(&self, key: &str) -> AppResult<Option<Value>>;
    fn set(&self, key: &str, value: Value) -> AppResult<()>;
    fn remove(&self, key: &str) -> AppResult<()>;

    fn get_flag(&self, key: &str) -> AppResult<Option<bool>> {
        Ok(self.get(key)?.and_then(|value| value.as_bool()))
    }
}

#[derive(Debug, Default)]
pub struct MemorySettings {
    values: Mutex<HashMap<String, Value>>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for MemorySettings {
    fn get(&self, key: &str) -> AppResult<Option<Value>> {
        let values = self
            .values
            .lock()
            .map_err(|_| AppError::Internal("settings mutex poisoned".to_string()))?;
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> AppResult<()> {
        let mut values = self
            .values
            .lock()
            .map_err(|_| AppError::Internal("settings mutex poisoned".to_string()))?;
        values.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> AppResult<()> {
        let mut values = self
            .values
            .lock()
            .map_err(|_| AppError::Internal("settings mutex poisoned".to_string()))?;
        values.remove(key);
        Ok(())
    }
}
