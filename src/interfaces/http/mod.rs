mod progress;

pub use progress::ExtractionTracker;

use crate::application::use_cases::page_virtualizer::Viewport;
use crate::application::use_cases::recent_files::CacheOutcome;
use crate::application::use_cases::viewer_session::SessionView;
use crate::domain::chat::ChatTurn;
use crate::domain::document::DocumentHandle;
use crate::domain::error::{AppError, RemoteErrorKind, Result};
use crate::domain::extracted_text::PageText;
use crate::interfaces::state::AppState;
use actix_cors::Cors;
use actix_web::http::header;
use actix_web::{dev::Server, get, post, web, App, HttpResponse, HttpServer, Responder};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use validator::Validate;

const MAX_LOG_ENTRIES: usize = 100;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LogEntry {
    pub time: String,
    pub level: String,
    pub source: String,
    pub message: String,
}

pub struct HttpState {
    pub app_state: Arc<AppState>,
    pub logs: Arc<Mutex<Vec<LogEntry>>>,
    pub progress: Arc<ExtractionTracker>,
}

#[derive(Deserialize, Validate)]
pub struct UploadQuery {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
}

#[derive(Deserialize, Validate)]
pub struct OpenRecentRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
}

#[derive(Deserialize)]
pub struct SplitRequest {
    pub start: u32,
    pub end: u32,
}

#[derive(Deserialize, Validate)]
pub struct ViewportRequest {
    #[validate(range(min = 0.0))]
    pub scroll_top: f64,
    #[validate(range(min = 1.0))]
    pub width: f64,
    #[validate(range(min = 0.0))]
    pub height: f64,
}

#[derive(Deserialize)]
pub struct JumpRequest {
    pub page: u32,
}

#[derive(Deserialize, Validate)]
pub struct ChatBody {
    #[validate(length(max = 4000))]
    pub question: String,
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Serialize)]
pub struct LoadResponse {
    pub view: SessionView,
    pub cache: Option<CacheOutcome>,
    pub warning: Option<String>,
}

#[derive(Serialize)]
pub struct SplitResponse {
    pub applied: bool,
    pub view: SessionView,
}

#[derive(Serialize)]
pub struct ExtractResponse {
    pub applied: bool,
    pub pages: Vec<PageText>,
    pub ocr_pages: usize,
    pub text: String,
}

#[derive(Serialize)]
pub struct ChatResponse {
    pub turns: Vec<ChatTurn>,
    pub failure: Option<RemoteErrorKind>,
}

fn error_response(err: &AppError) -> HttpResponse {
    let body = ErrorBody {
        error: match err {
            AppError::ValidationError(msg) | AppError::NotFound(msg) => msg.clone(),
            other => other.to_string(),
        },
    };
    match err {
        AppError::ValidationError(_) | AppError::ParseError(_) => {
            HttpResponse::BadRequest().json(body)
        }
        AppError::NotFound(_) => HttpResponse::NotFound().json(body),
        _ => HttpResponse::InternalServerError().json(body),
    }
}

fn validate(input: &impl Validate) -> Result<()> {
    input
        .validate()
        .map_err(|e| AppError::ValidationError(e.to_string()))
}

fn attachment_name(name: &str) -> String {
    name.chars()
        .map(|c| if c == '"' || c.is_control() { '_' } else { c })
        .collect()
}

/// Parse, open and cache a document. Caching problems only produce a warning.
async fn load_document(data: &HttpState, name: &str, bytes: Vec<u8>) -> Result<LoadResponse> {
    if bytes.is_empty() {
        return Err(AppError::ValidationError("The file is empty".to_string()));
    }
    let num_pages = data.app_state.pdf_backend.page_count(&bytes).await?;

    let (cache, warning) = match data.app_state.recent_files.insert(name, &bytes) {
        Ok(outcome) => {
            let warning = outcome.warning();
            (Some(outcome), warning)
        }
        Err(e) => {
            add_log(&data.logs, "WARN", "RecentFiles", &e.to_string());
            (None, Some("Recent files could not be saved and were cleared.".to_string()))
        }
    };

    let document = DocumentHandle::new(name, bytes, num_pages);
    let view = {
        let mut session = data.app_state.session()?;
        session.load_document(document);
        session.view()
    };

    add_log(
        &data.logs,
        "INFO",
        "Viewer",
        &format!("Opened {} ({} pages)", name, num_pages),
    );
    Ok(LoadResponse {
        view,
        cache,
        warning,
    })
}

#[post("/documents")]
async fn upload_document(
    data: web::Data<HttpState>,
    query: web::Query<UploadQuery>,
    body: web::Bytes,
) -> impl Responder {
    if let Err(e) = validate(&*query) {
        return error_response(&e);
    }
    match load_document(&data, &query.name, body.to_vec()).await {
        Ok(response) => HttpResponse::Ok().json(response),
        Err(e) => {
            add_log(
                &data.logs,
                "ERROR",
                "Viewer",
                &format!("Failed to open {}: {}", query.name, e),
            );
            error_response(&e)
        }
    }
}

#[get("/documents/current")]
async fn current_document(data: web::Data<HttpState>) -> impl Responder {
    match data.app_state.session() {
        Ok(session) => HttpResponse::Ok().json(session.view()),
        Err(e) => error_response(&e),
    }
}

#[get("/documents/current/download")]
async fn download_document(data: web::Data<HttpState>) -> impl Responder {
    let document = match data.app_state.session() {
        Ok(session) => session.document().cloned(),
        Err(e) => return error_response(&e),
    };
    match document {
        Some(document) => HttpResponse::Ok()
            .content_type("application/pdf")
            .insert_header((
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", attachment_name(&document.name)),
            ))
            .body(document.bytes.to_vec()),
        None => error_response(&AppError::NotFound("No document is open".to_string())),
    }
}

#[get("/recent")]
async fn list_recent(data: web::Data<HttpState>) -> impl Responder {
    HttpResponse::Ok().json(data.app_state.recent_files.list())
}

#[post("/recent/open")]
async fn open_recent(
    data: web::Data<HttpState>,
    req: web::Json<OpenRecentRequest>,
) -> impl Responder {
    if let Err(e) = validate(&*req) {
        return error_response(&e);
    }
    let result = match data.app_state.recent_files.open(&req.name) {
        Ok(bytes) => load_document(&data, &req.name, bytes).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(response) => HttpResponse::Ok().json(response),
        Err(e) => {
            add_log(
                &data.logs,
                "WARN",
                "RecentFiles",
                &format!("Could not reopen {}: {}", req.name, e),
            );
            error_response(&e)
        }
    }
}

#[post("/split")]
async fn split(data: web::Data<HttpState>, req: web::Json<SplitRequest>) -> impl Responder {
    let mut session = match data.app_state.session() {
        Ok(session) => session,
        Err(e) => return error_response(&e),
    };
    let applied = session.split(req.start, req.end);
    let view = session.view();
    drop(session);

    if applied {
        add_log(
            &data.logs,
            "INFO",
            "Viewer",
            &format!("Showing pages {}-{}", req.start, req.end),
        );
    }
    HttpResponse::Ok().json(SplitResponse { applied, view })
}

#[post("/viewport")]
async fn update_viewport(
    data: web::Data<HttpState>,
    req: web::Json<ViewportRequest>,
) -> impl Responder {
    if let Err(e) = validate(&*req) {
        return error_response(&e);
    }
    let viewport = Viewport {
        scroll_top: req.scroll_top,
        width: req.width,
        height: req.height,
    };
    let result = data
        .app_state
        .session()
        .and_then(|mut session| session.update_viewport(viewport));
    match result {
        Ok(window) => HttpResponse::Ok().json(window),
        Err(e) => error_response(&e),
    }
}

#[post("/jump")]
async fn jump(data: web::Data<HttpState>, req: web::Json<JumpRequest>) -> impl Responder {
    let result = data
        .app_state
        .session()
        .and_then(|mut session| session.jump_to_page(req.page));
    match result {
        Ok(jump) => HttpResponse::Ok().json(jump),
        Err(e) => error_response(&e),
    }
}

async fn run_extraction(data: &HttpState) -> Result<ExtractResponse> {
    let request = data.app_state.session()?.begin_extraction()?;
    let renderer = data.app_state.pdf_backend.open(&request.document)?;
    if !data.progress.try_start() {
        return Err(AppError::ValidationError(
            "An extraction is already running".to_string(),
        ));
    }

    add_log(
        &data.logs,
        "INFO",
        "Extraction",
        &format!("Extracting {} pages", request.pages.len()),
    );
    let result = data
        .app_state
        .extraction
        .extract(renderer.as_ref(), &request.pages, data.progress.as_ref())
        .await;
    data.progress.finish();
    let text = result?;

    let response = ExtractResponse {
        applied: false,
        ocr_pages: text.ocr_page_count(),
        text: text.to_document(),
        pages: text.pages.clone(),
    };
    let applied = data
        .app_state
        .session()?
        .apply_extraction(request.ticket, text);
    if !applied {
        add_log(
            &data.logs,
            "WARN",
            "Extraction",
            "Selection changed during extraction, result discarded",
        );
    }
    Ok(ExtractResponse {
        applied,
        ..response
    })
}

#[post("/extract")]
async fn extract(data: web::Data<HttpState>) -> impl Responder {
    match run_extraction(&data).await {
        Ok(response) => HttpResponse::Ok().json(response),
        Err(e) => {
            add_log(
                &data.logs,
                "ERROR",
                "Extraction",
                &format!("Text extraction failed: {}", e),
            );
            error_response(&e)
        }
    }
}

#[get("/extract/progress")]
async fn extract_progress(data: web::Data<HttpState>) -> impl Responder {
    HttpResponse::Ok().json(data.progress.snapshot())
}

#[get("/chat")]
async fn get_chat(data: web::Data<HttpState>) -> impl Responder {
    match data.app_state.session() {
        Ok(session) => HttpResponse::Ok().json(session.transcript().turns()),
        Err(e) => error_response(&e),
    }
}

async fn run_chat(data: &HttpState, question: &str) -> Result<ChatResponse> {
    let request = data.app_state.session()?.begin_chat(question)?;
    let reply = data.app_state.chat.ask(&request).await;
    if let Some(kind) = reply.failure {
        add_log(
            &data.logs,
            "ERROR",
            "Chat",
            &format!("Assistant request failed ({:?})", kind),
        );
    }

    let mut session = data.app_state.session()?;
    session.finish_chat(request.ticket, request.placeholder_id, &reply.content);
    Ok(ChatResponse {
        turns: session.transcript().turns().to_vec(),
        failure: reply.failure,
    })
}

#[post("/chat")]
async fn post_chat(data: web::Data<HttpState>, req: web::Json<ChatBody>) -> impl Responder {
    if let Err(e) = validate(&*req) {
        return error_response(&e);
    }
    match run_chat(&data, &req.question).await {
        Ok(response) => HttpResponse::Ok().json(response),
        Err(e) => error_response(&e),
    }
}

#[post("/notes")]
async fn generate_notes(data: web::Data<HttpState>) -> impl Responder {
    let prepared = data
        .app_state
        .session()
        .and_then(|session| Ok((session.begin_request(), session.extracted_context()?)));
    let (ticket, context) = match prepared {
        Ok(prepared) => prepared,
        Err(e) => return error_response(&e),
    };

    let notes = match data.app_state.notes.generate(&context).await {
        Ok(notes) => notes,
        Err(e) => {
            add_log(
                &data.logs,
                "ERROR",
                "Notes",
                &format!("Notes generation failed: {}", e),
            );
            return error_response(&e);
        }
    };
    add_log(
        &data.logs,
        "INFO",
        "Notes",
        &format!("Notes generated ({:?})", notes.source),
    );

    match data.app_state.session() {
        Ok(mut session) => {
            session.apply_notes(ticket, notes.clone());
            HttpResponse::Ok().json(notes)
        }
        Err(e) => error_response(&e),
    }
}

#[get("/notes/download")]
async fn download_notes(data: web::Data<HttpState>) -> impl Responder {
    let (notes, name) = match data.app_state.session() {
        Ok(session) => (
            session.notes().cloned(),
            session
                .document()
                .map(|d| d.name.clone())
                .unwrap_or_else(|| "document".to_string()),
        ),
        Err(e) => return error_response(&e),
    };
    let notes = match notes {
        Some(notes) => notes,
        None => {
            return error_response(&AppError::NotFound(
                "No notes have been generated yet".to_string(),
            ))
        }
    };

    let stem = name.strip_suffix(".pdf").unwrap_or(&name);
    let page = format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{} notes</title>\n</head>\n<body>\n{}\n</body>\n</html>\n",
        html_escape::encode_text(stem),
        notes.html
    );
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .insert_header((
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}-notes.html\"", attachment_name(stem)),
        ))
        .body(page)
}

#[get("/logs")]
async fn get_logs(data: web::Data<HttpState>) -> impl Responder {
    match data.logs.lock() {
        Ok(logs) => HttpResponse::Ok().json(&*logs),
        Err(_) => error_response(&AppError::Internal("Log buffer poisoned".to_string())),
    }
}

pub fn add_log_entry(
    logs: &Mutex<Vec<LogEntry>>,
    level: &str,
    source: &str,
    message: &str,
) -> LogEntry {
    let entry = LogEntry {
        time: Local::now().format("%H:%M:%S").to_string(),
        level: level.to_string(),
        source: source.to_string(),
        message: message.to_string(),
    };
    match level {
        "ERROR" => tracing::error!(source, "{}", message),
        "WARN" => tracing::warn!(source, "{}", message),
        "DEBUG" => tracing::debug!(source, "{}", message),
        _ => tracing::info!(source, "{}", message),
    }
    if let Ok(mut logs) = logs.lock() {
        logs.push(entry.clone());
        if logs.len() > MAX_LOG_ENTRIES {
            logs.remove(0);
        }
    }
    entry
}

pub fn add_log(logs: &Mutex<Vec<LogEntry>>, level: &str, source: &str, message: &str) {
    add_log_entry(logs, level, source, message);
}

/// Routes under `/api`.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .service(upload_document)
            .service(download_document)
            .service(current_document)
            .service(list_recent)
            .service(open_recent)
            .service(split)
            .service(update_viewport)
            .service(jump)
            .service(extract_progress)
            .service(extract)
            .service(get_chat)
            .service(post_chat)
            .service(download_notes)
            .service(generate_notes)
            .service(get_logs),
    );
}

pub fn start_server(
    state: HttpState,
    host: &str,
    port: u16,
    max_upload_bytes: usize,
) -> std::io::Result<Server> {
    let state = web::Data::new(state);

    let server = HttpServer::new(move || {
        let cors = Cors::permissive(); // local tool, UI may be served from anywhere

        App::new()
            .wrap(cors)
            .app_data(state.clone())
            .app_data(web::PayloadConfig::new(max_upload_bytes))
            .app_data(web::JsonConfig::default().limit(64 * 1024))
            .configure(configure)
    })
    .bind((host, port))?
    .run();

    Ok(server)
}
