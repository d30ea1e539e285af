pub mod bridge;
pub mod config;
pub mod db;
pub mod diagnostics;
pub mod errors;
pub mod models;
pub mod recovery;
pub mod settings;
pub mod store;

use crate::bridge::gateway::BridgeGateway;
use crate::bridge::{BridgeRequest, BridgeResponse};
use crate::config::ShellConfig;
use crate::db::SettingsDb;
use crate::diagnostics::DiagnosticConsole;
use crate::errors::AppError;
use crate::models::{BooleanResponse, DiagnosticSnapshot, NoticeStatus, RestoreRequest, RestoreResponse};
use crate::recovery::{RecoveryHandoff, RecoveryNotifier};
use crate::settings::SettingsStore;
use crate::store::DocumentStore;
use anyhow::Context;
use std::sync::Arc;
use tauri::{AppHandle, Emitter, Manager};
use tracing_appender::non_blocking::WorkerGuard;

static LOG_GUARD: std::sync::OnceLock<WorkerGuard> = std::sync::OnceLock::new();

pub const NOTICE_CLOSED_EVENT: &str = "recovery-notice://closed";
pub const OPEN_DATA_RECOVERY_EVENT: &str = "recovery-notice://open-data-recovery";

#[derive(Clone)]
struct AppState {
    gateway: Arc<BridgeGateway>,
    notifier: Arc<RecoveryNotifier>,
    console: DiagnosticConsole,
}

struct WindowHandoff {
    app: AppHandle,
}

impl WindowHandoff {
    fn emit(&self, event: &str) {
        if let Err(error) = self.app.emit(event, ()) {
            tracing::warn!(event = event, error = %error, "failed to emit recovery notice event");
        }
    }
}

impl RecoveryHandoff for WindowHandoff {
    fn on_close(&self) {
        self.emit(NOTICE_CLOSED_EVENT);
    }

    fn on_open_data_recovery(&self) {
        self.emit(OPEN_DATA_RECOVERY_EVENT);
    }
}

// Sole document entry point for the webview.
#[tauri::command]
async fn bridge(state: tauri::State<'_, AppState>, request: BridgeRequest) -> Result<BridgeResponse, String> {
    Ok(state.gateway.dispatch(request).await)
}

#[tauri::command]
fn recovery_notice_state(state: tauri::State<'_, AppState>) -> NoticeStatus {
    state.notifier.status()
}

#[tauri::command]
fn recovery_notice_acknowledge(state: tauri::State<'_, AppState>) -> Result<NoticeStatus, String> {
    state.notifier.acknowledge().map_err(to_client_error)?;
    Ok(state.notifier.status())
}

#[tauri::command]
fn recovery_notice_acknowledge_and_recover(state: tauri::State<'_, AppState>) -> Result<NoticeStatus, String> {
    state
        .notifier
        .acknowledge_and_recover()
        .map_err(to_client_error)?;
    Ok(state.notifier.status())
}

#[tauri::command]
async fn diagnostics_current_state(state: tauri::State<'_, AppState>) -> Result<DiagnosticSnapshot, String> {
    ensure_diagnostics_enabled()?;
    state.console.current_state().await.map_err(to_client_error)
}

#[tauri::command]
async fn diagnostics_restore(
    state: tauri::State<'_, AppState>,
    payload: RestoreRequest,
) -> Result<RestoreResponse, String> {
    ensure_diagnostics_enabled()?;
    let response = state.console.restore(payload).await.map_err(to_client_error)?;
    state.notifier.refresh();
    Ok(response)
}

#[tauri::command]
fn diagnostics_reset_notice(state: tauri::State<'_, AppState>) -> Result<BooleanResponse, String> {
    ensure_diagnostics_enabled()?;
    state.console.reset_notice().map_err(to_client_error)?;
    state.notifier.refresh();
    Ok(BooleanResponse { success: true })
}

pub fn run() {
    tauri::Builder::default()
        .setup(|app| {
            let app_data_dir = app.path().app_data_dir().map_err(|error| error.to_string())?;
            std::fs::create_dir_all(&app_data_dir).map_err(|error| error.to_string())?;
            let config = ShellConfig::load(&app_data_dir).map_err(|error| error.to_string())?;
            init_tracing(&config).map_err(|error| error.to_string())?;

            let app_version = app.package_info().version.to_string();
            let handoff = Arc::new(WindowHandoff {
                app: app.handle().clone(),
            });
            let state = build_state(&config, app_version, handoff).map_err(|error| format!("{:#}", error))?;
            tracing::info!(
                data_dir = %config.data_dir.display(),
                settings_db = %config.settings_db.display(),
                notice = state.notifier.state().as_str(),
                "taskboard shell started"
            );

            app.manage(state);
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            bridge,
            // notice state lives privileged-side, outside the bridge protocol
            recovery_notice_state,
            recovery_notice_acknowledge,
            recovery_notice_acknowledge_and_recover,
            diagnostics_current_state,
            diagnostics_restore,
            diagnostics_reset_notice
        ])
        .run(tauri::generate_context!())
        .expect("failed to run tauri app");
}

fn build_state(
    config: &ShellConfig,
    app_version: String,
    handoff: Arc<dyn RecoveryHandoff>,
) -> anyhow::Result<AppState> {
    let store = DocumentStore::new(config.data_dir.clone());
    std::fs::create_dir_all(store.root())
        .with_context(|| format!("creating data directory {}", store.root().display()))?;

    let settings: Arc<dyn SettingsStore> = Arc::new(
        SettingsDb::new(&config.settings_db)
            .with_context(|| format!("opening settings database {}", config.settings_db.display()))?,
    );

    Ok(AppState {
        gateway: Arc::new(BridgeGateway::new(store.clone(), app_version)),
        notifier: Arc::new(RecoveryNotifier::new(settings.clone(), handoff)),
        console: DiagnosticConsole::new(store, settings),
    })
}

fn init_tracing(config: &ShellConfig) -> Result<(), String> {
    std::fs::create_dir_all(&config.log_dir).map_err(|error| error.to_string())?;
    let file_appender = tracing_appender::rolling::daily(&config.log_dir, "taskboard.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let _ = LOG_GUARD.set(guard);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_filter)),
        )
        .json()
        .with_writer(non_blocking)
        .try_init()
        .map_err(|error| error.to_string())
}

fn ensure_diagnostics_enabled() -> Result<(), String> {
    if cfg!(debug_assertions) {
        Ok(())
    } else {
        Err(to_client_error(AppError::Validation(
            "Diagnostics are only available in debug builds".to_string(),
        )))
    }
}

fn to_client_error(error: impl std::fmt::Display) -> String {
    error.to_string()
}

#[cfg(test)]
mod tests {
    use super::build_state;
    use crate::bridge::{BridgeRequest, BridgeResponse};
    use crate::config::ShellConfig;
    use crate::models::Envelope;
    use crate::models::NoticeState;
    use crate::recovery::RecoveryHandoff;
    use serde_json::json;
    use std::sync::Arc;

    struct NoopHandoff;

    impl RecoveryHandoff for NoopHandoff {
        fn on_close(&self) {}
        fn on_open_data_recovery(&self) {}
    }

    #[tokio::test]
    async fn state_wires_gateway_notifier_and_console_to_same_storage() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = ShellConfig::default_for(dir.path());

        let state = build_state(&config, "0.1.0".to_string(), Arc::new(NoopHandoff)).expect("state");
        assert!(config.data_dir.is_dir());
        assert_eq!(state.notifier.state(), NoticeState::Unacknowledged);

        let request: BridgeRequest =
            serde_json::from_value(json!({ "op": "save-data", "name": "todos", "value": { "todos": [] } }))
                .expect("request");
        assert_eq!(
            state.gateway.dispatch(request).await,
            BridgeResponse::Envelope(Envelope::saved())
        );
        state.notifier.acknowledge().expect("acknowledge");

        let snapshot = state.console.current_state().await.expect("snapshot");
        assert!(snapshot.notice_acknowledged);
        assert_eq!(snapshot.documents.get("todos"), Some(&json!({ "todos": [] })));
        drop(state);

        let restarted = build_state(&config, "0.1.0".to_string(), Arc::new(NoopHandoff)).expect("restart");
        assert_eq!(restarted.notifier.state(), NoticeState::Acknowledged);
        assert_eq!(
            restarted.gateway.dispatch(BridgeRequest::GetAppVersion).await,
            BridgeResponse::Version("0.1.0".to_string())
        );
    }

    #[tokio::test]
    async fn webview_invoke_args_decode_into_bridge_requests() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = ShellConfig::default_for(dir.path());
        let state = build_state(&config, "0.1.0".to_string(), Arc::new(NoopHandoff)).expect("state");

        let request: BridgeRequest =
            serde_json::from_value(json!({ "op": "load-data", "name": "nonexistent" })).expect("request");
        let response = state.gateway.dispatch(request).await;
        assert_eq!(
            serde_json::to_value(&response).expect("encode"),
            json!({ "success": true, "data": null })
        );

        let escape: BridgeRequest =
            serde_json::from_value(json!({ "op": "save-data", "name": "../escape", "value": {} })).expect("request");
        let BridgeResponse::Envelope(envelope) = state.gateway.dispatch(escape).await else {
            panic!("save-data must answer with an envelope");
        };
        assert!(!envelope.success);
        assert!(!dir.path().join("escape.json").exists());

        assert!(serde_json::from_value::<BridgeRequest>(json!({ "op": "read-file", "path": "/etc/passwd" })).is_err());
    }

    #[test]
    fn unusable_data_dir_fails_bootstrap_with_context() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = ShellConfig::default_for(dir.path());
        std::fs::write(&config.data_dir, "not a directory").expect("blocker");

        let error = build_state(&config, "0.1.0".to_string(), Arc::new(NoopHandoff))
            .err()
            .expect("bootstrap fails");
        assert!(format!("{:#}", error).contains("creating data directory"));
    }
}
