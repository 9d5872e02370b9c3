use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::{error, info};

use crate::application::use_cases::chat_assistant::ChatAssistantUseCase;
use crate::application::use_cases::notes::NotesUseCase;
use crate::application::use_cases::page_virtualizer::PageVirtualizer;
use crate::application::use_cases::recent_files::RecentFilesCache;
use crate::application::use_cases::text_extraction::TextExtractionUseCase;
use crate::application::use_cases::viewer_session::ViewerSession;
use crate::infrastructure::config::{AppConfig, ConfigService};
use crate::infrastructure::llm_clients::{LLMClient, OpenAIClient};
use crate::infrastructure::ocr::TesseractEngine;
use crate::infrastructure::pdf::{LopdfBackend, PdfToolsConfig};
use crate::infrastructure::storage::FileStorage;
use crate::interfaces::http::{add_log, start_server, ExtractionTracker, HttpState, LogEntry};
use crate::interfaces::state::AppState;

type Logs = Arc<Mutex<Vec<LogEntry>>>;

/// Load configuration, wire every adapter and serve the HTTP API until shutdown.
pub async fn serve(config: AppConfig) -> Result<(), Box<dyn Error>> {
    let logs: Logs = Arc::new(Mutex::new(Vec::new()));

    let app_state = build_state(config.clone(), &logs).map_err(|err| {
        error!(error = %err, "Failed to initialize application state");
        err
    })?;

    let http_state = HttpState {
        app_state: Arc::new(app_state),
        logs: logs.clone(),
        progress: Arc::new(ExtractionTracker::default()),
    };

    let server = start_server(
        http_state,
        &config.server.host,
        config.server.port,
        config.server.max_upload_bytes,
    )?;
    add_log(
        &logs,
        "INFO",
        "HttpApi",
        &format!(
            "Listening on http://{}:{}/api",
            config.server.host, config.server.port
        ),
    );
    server.await?;
    info!("HTTP server stopped");
    Ok(())
}

pub fn build_state(mut config: AppConfig, logs: &Logs) -> Result<AppState, Box<dyn Error>> {
    configure_ocr_tools(&mut config.extraction.tools, logs);

    let keys = ConfigService::new();
    let chat_config = keys.resolve_llm_config(&config.chat);
    let notes_config = keys.resolve_llm_config(&config.notes);
    add_log(
        logs,
        "INFO",
        "Config",
        &format!(
            "Chat model {} via {:?}, notes model {} via {:?}",
            chat_config.model, chat_config.provider, notes_config.model, notes_config.provider
        ),
    );

    let storage = FileStorage::open(&config.storage)?;
    add_log(
        logs,
        "INFO",
        "Storage",
        &format!("Data directory: {}", config.storage.data_dir.display()),
    );

    let llm_client: Arc<dyn LLMClient> = Arc::new(OpenAIClient::new());
    let ocr = Arc::new(TesseractEngine::new(config.extraction.tools.tesseract_cmd.clone()));

    Ok(AppState {
        session: Mutex::new(ViewerSession::new(PageVirtualizer::new(config.viewer.clone()))),
        pdf_backend: Arc::new(LopdfBackend::new(config.extraction.tools.clone())),
        extraction: TextExtractionUseCase::new(ocr, config.extraction.pipeline.clone()),
        chat: ChatAssistantUseCase::new(llm_client.clone(), chat_config),
        notes: NotesUseCase::new(llm_client, notes_config),
        recent_files: RecentFilesCache::new(Arc::new(storage), config.recent_files.clone()),
    })
}

fn bundled_ocr_root() -> Option<PathBuf> {
    let beside_exe = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join("resources").join("ocr")));
    let from_manifest = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("resources")
        .join("ocr");

    beside_exe
        .into_iter()
        .chain(std::iter::once(from_manifest))
        .find(|dir| dir.exists())
}

fn binary_name(name: &str) -> String {
    if std::env::consts::OS == "windows" {
        format!("{}.exe", name)
    } else {
        name.to_string()
    }
}

/// Prefer OCR tools shipped under `resources/ocr/<os>/` when present.
fn configure_ocr_tools(tools: &mut PdfToolsConfig, logs: &Logs) {
    let Some(ocr_root) = bundled_ocr_root() else {
        add_log(
            logs,
            "INFO",
            "OCR",
            &format!(
                "Using system tools: {} and {}",
                tools.pdftoppm_cmd, tools.tesseract_cmd
            ),
        );
        return;
    };
    let os_dir = ocr_root.join(std::env::consts::OS);

    let use_bundled = |path: PathBuf, slot: &mut String| {
        if path.exists() {
            add_log(
                logs,
                "INFO",
                "OCR",
                &format!("Using bundled {}", path.display()),
            );
            *slot = path.to_string_lossy().to_string();
        }
    };
    use_bundled(os_dir.join(binary_name("tesseract")), &mut tools.tesseract_cmd);
    use_bundled(os_dir.join(binary_name("pdftoppm")), &mut tools.pdftoppm_cmd);

    let tessdata = ocr_root.join("tessdata");
    if tessdata.exists() && std::env::var_os("TESSDATA_PREFIX").is_none() {
        std::env::set_var("TESSDATA_PREFIX", &tessdata);
        add_log(
            logs,
            "INFO",
            "OCR",
            &format!("Using bundled tessdata at {}", tessdata.display()),
        );
    }
    prepend_library_path(&os_dir.join("lib"), logs);
}

fn prepend_library_path(lib_dir: &Path, logs: &Logs) {
    let env_key = match std::env::consts::OS {
        "macos" => "DYLD_LIBRARY_PATH",
        "linux" => "LD_LIBRARY_PATH",
        _ => return,
    };
    if !lib_dir.exists() {
        return;
    }
    let value = match std::env::var(env_key) {
        Ok(existing) if !existing.is_empty() => format!("{}:{}", lib_dir.display(), existing),
        _ => lib_dir.display().to_string(),
    };
    std::env::set_var(env_key, value);
    add_log(
        logs,
        "INFO",
        "OCR",
        &format!("Using bundled OCR libraries at {}", lib_dir.display()),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::storage::StorageConfig;

    #[test]
    fn test_build_state_wires_configured_storage() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig {
            storage: StorageConfig {
                data_dir: dir.path().join("data"),
                quota_bytes: 1024 * 1024,
            },
            ..AppConfig::default()
        };
        let logs: Logs = Arc::new(Mutex::new(Vec::new()));

        let state = build_state(config, &logs).unwrap();
        assert!(dir.path().join("data").is_dir());
        assert!(state.recent_files.list().is_empty());
        assert!(state.session().unwrap().document().is_none());
        assert!(!logs.lock().unwrap().is_empty());
    }
}
