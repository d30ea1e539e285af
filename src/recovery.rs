use crate::errors::AppResult;
use crate::models::{NoticeState, NoticeStatus};
use crate::settings::{SettingsStore, ACK_NOTICE_KEY};
use serde_json::Value;
use std::sync::{Arc, Mutex};

pub trait RecoveryHandoff: Send + Sync {
    fn on_close(&self);
    fn on_open_data_recovery(&self);
}

pub struct RecoveryNotifier {
    settings: Arc<dyn SettingsStore>,
    handoff: Arc<dyn RecoveryHandoff>,
    state: Mutex<NoticeState>,
}

impl RecoveryNotifier {
    pub fn new(settings: Arc<dyn SettingsStore>, handoff: Arc<dyn RecoveryHandoff>) -> Self {
        let state = read_state(settings.as_ref());
        tracing::info!(state = state.as_str(), "data-loss notice initialized");
        Self {
            settings,
            handoff,
            state: Mutex::new(state),
        }
    }

    pub fn state(&self) -> NoticeState {
        match self.state.lock() {
            Ok(state) => *state,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    pub fn is_visible(&self) -> bool {
        self.state() == NoticeState::Unacknowledged
    }

    pub fn status(&self) -> NoticeStatus {
        let state = self.state();
        NoticeStatus {
            state,
            visible: state == NoticeState::Unacknowledged,
        }
    }

    pub fn refresh(&self) -> NoticeState {
        let state = read_state(self.settings.as_ref());
        self.set_state(state);
        state
    }

    /// Marks the notice acknowledged and closes it. `on_close` runs even
    /// when persisting the record fails; that error is returned afterwards.
    pub fn acknowledge(&self) -> AppResult<()> {
        self.set_state(NoticeState::Acknowledged);
        let persisted = self.settings.set(ACK_NOTICE_KEY, Value::Bool(true));
        match &persisted {
            Ok(()) => tracing::info!("data-loss notice acknowledged"),
            Err(error) => tracing::warn!(error = %error, "failed to persist notice acknowledgment"),
        }
        self.handoff.on_close();
        persisted
    }

    pub fn acknowledge_and_recover(&self) -> AppResult<()> {
        let acknowledged = self.acknowledge();
        tracing::info!("handing off to data recovery");
        self.handoff.on_open_data_recovery();
        acknowledged
    }

    fn set_state(&self, next: NoticeState) {
        match self.state.lock() {
            Ok(mut state) => *state = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
    }
}

fn read_state(settings: &dyn SettingsStore) -> NoticeState {
    match settings.get_flag(ACK_NOTICE_KEY) {
        Ok(Some(true)) => NoticeState::Acknowledged,
        Ok(_) => NoticeState::Unacknowledged,
        Err(error) => {
            tracing::warn!(error = %error, "failed to read notice acknowledgment; showing notice");
            NoticeState::Unacknowledged
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{RecoveryHandoff, RecoveryNotifier};
    use crate::errors::{AppError, AppResult};
    use crate::models::NoticeState;
    use crate::settings::{MemorySettings, SettingsStore, ACK_NOTICE_KEY};
    use serde_json::{json, Value};
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct RecordingHandoff {
        settings: Option<Arc<dyn SettingsStore>>,
        calls: Mutex<Vec<String>>,
    }

    impl RecordingHandoff {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().expect("calls").clone()
        }

        fn record(&self, name: &str) {
            let acknowledged = self
                .settings
                .as_ref()
                .and_then(|settings| settings.get_flag(ACK_NOTICE_KEY).ok().flatten())
                .unwrap_or(false);
            self.calls
                .lock()
                .expect("calls")
                .push(format!("{}:{}", name, acknowledged));
        }
    }

    impl RecoveryHandoff for RecordingHandoff {
        fn on_close(&self) {
            self.record("close");
        }

        fn on_open_data_recovery(&self) {
            self.record("recover");
        }
    }

    struct FailingSettings;

    impl SettingsStore for FailingSettings {
        fn get(&self, _key: &str) -> AppResult<Option<Value>> {
            Err(AppError::Io("settings unavailable".to_string()))
        }

        fn set(&self, _key: &str, _value: Value) -> AppResult<()> {
            Err(AppError::Io("settings unavailable".to_string()))
        }

        fn remove(&self, _key: &str) -> AppResult<()> {
            Ok(())
        }
    }

    #[test]
    fn starts_unacknowledged_without_record() {
        let notifier = RecoveryNotifier::new(
            Arc::new(MemorySettings::new()),
            Arc::new(RecordingHandoff::default()),
        );
        assert_eq!(notifier.state(), NoticeState::Unacknowledged);
        assert!(notifier.is_visible());
    }

    #[test]
    fn poisoned_state_lock_still_reports_last_state() {
        let notifier = Arc::new(RecoveryNotifier::new(
            Arc::new(MemorySettings::new()),
            Arc::new(RecordingHandoff::default()),
        ));
        notifier.acknowledge().expect("acknowledge");

        let poisoner = notifier.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.state.lock().expect("lock");
            panic!("poison notice state");
        })
        .join();

        assert!(notifier.state.is_poisoned());
        assert_eq!(notifier.state(), NoticeState::Acknowledged);
        assert!(!notifier.is_visible());
        assert_eq!(notifier.refresh(), NoticeState::Acknowledged);
    }

    #[test]
    fn acknowledgment_survives_restart() {
        let settings: Arc<dyn SettingsStore> = Arc::new(MemorySettings::new());
        let handoff = Arc::new(RecordingHandoff::default());

        let first = RecoveryNotifier::new(settings.clone(), handoff.clone());
        first.acknowledge().expect("acknowledge");
        assert!(!first.is_visible());
        assert_eq!(handoff.calls(), vec!["close:false"]);

        let restarted = RecoveryNotifier::new(settings.clone(), handoff);
        assert_eq!(restarted.state(), NoticeState::Acknowledged);
        assert!(!restarted.status().visible);
    }

    #[test]
    fn acknowledge_is_idempotent_and_rewrites_record() {
        let settings: Arc<dyn SettingsStore> = Arc::new(MemorySettings::new());
        let handoff = Arc::new(RecordingHandoff::default());
        let notifier = RecoveryNotifier::new(settings.clone(), handoff.clone());

        notifier.acknowledge().expect("first");
        settings.set(ACK_NOTICE_KEY, json!(false)).expect("tamper");
        notifier.acknowledge().expect("second");

        assert_eq!(notifier.state(), NoticeState::Acknowledged);
        assert_eq!(settings.get_flag(ACK_NOTICE_KEY).expect("flag"), Some(true));
        assert_eq!(handoff.calls().len(), 2);
    }

    #[test]
    fn recover_acknowledges_before_opening_recovery() {
        let settings: Arc<dyn SettingsStore> = Arc::new(MemorySettings::new());
        let handoff = Arc::new(RecordingHandoff {
            settings: Some(settings.clone()),
            calls: Mutex::new(Vec::new()),
        });
        let notifier = RecoveryNotifier::new(settings.clone(), handoff.clone());

        notifier.acknowledge_and_recover().expect("recover");

        assert_eq!(handoff.calls(), vec!["close:true", "recover:true"]);
        assert_eq!(notifier.state(), NoticeState::Acknowledged);
    }

    #[test]
    fn refresh_observes_external_clear() {
        let settings: Arc<dyn SettingsStore> = Arc::new(MemorySettings::new());
        settings.set(ACK_NOTICE_KEY, json!(true)).expect("seed");
        let notifier = RecoveryNotifier::new(settings.clone(), Arc::new(RecordingHandoff::default()));
        assert_eq!(notifier.state(), NoticeState::Acknowledged);

        settings.remove(ACK_NOTICE_KEY).expect("clear");
        assert_eq!(notifier.refresh(), NoticeState::Unacknowledged);
        assert!(notifier.is_visible());
    }

    #[test]
    fn persistence_failure_still_closes_and_hands_off() {
        let handoff = Arc::new(RecordingHandoff::default());
        let notifier = RecoveryNotifier::new(Arc::new(FailingSettings), handoff.clone());
        assert_eq!(notifier.state(), NoticeState::Unacknowledged);

        let error = notifier.acknowledge_and_recover().expect_err("persist fails");
        assert!(error.to_string().contains("settings unavailable"));
        assert_eq!(handoff.calls(), vec!["close:false", "recover:false"]);
        assert_eq!(notifier.state(), NoticeState::Acknowledged);
    }
}
