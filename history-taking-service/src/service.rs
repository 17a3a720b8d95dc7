use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{delete, get, post},
};
use interview_flow::{
    ConversationSession, GeminiPatient, InMemorySessionStore, InterviewError, PatientModel, Role,
    SessionPhase, SessionStore, TurnLog, run_exchange,
};
use serde_json::{Value, json};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::case_store::{CaseStore, GithubCaseStore};
use crate::extract::extract_docx_text;
use crate::models::{
    CaseListResponse, CreateSessionResponse, LatestExchangeResponse, ReferenceFile,
    ReferenceListResponse, SelectCaseRequest, SelectCaseResponse, SendMessageRequest,
    SendMessageResponse,
};

/// Repository folder holding case documents.
const CASE_FOLDER: &str = "case";
/// Repository folder holding reference/explanation documents.
const REFERENCE_FOLDER: &str = "reference";

const DEFAULT_CASE_REPO: &str = "jhlee409/amcgi_hx_taking_gemini";
const DEFAULT_CASE_BRANCH: &str = "main";

type ApiResult<T> = Result<Json<T>, ApiError>;
type ApiError = (StatusCode, Json<Value>);

fn bad_request_error(message: &str) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message })))
}

fn not_found_error(message: &str, id: &str) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": message,
            "session_id": id
        })),
    )
}

fn internal_error(message: &str, details: &str) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "error": message,
            "details": details
        })),
    )
}

/// Model failures are surfaced instead of silently dropped; nothing was
/// logged for the attempt, so the client may simply retry.
fn exchange_error(e: InterviewError) -> ApiError {
    match e {
        InterviewError::ModelCallFailed(details) => (
            StatusCode::BAD_GATEWAY,
            Json(json!({
                "error": "Patient model call failed",
                "details": details
            })),
        ),
        InterviewError::EmptyModelReply => (
            StatusCode::BAD_GATEWAY,
            Json(json!({ "error": "Patient model returned no text" })),
        ),
        other => internal_error("Exchange failed", &other.to_string()),
    }
}

#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<dyn SessionStore>,
    pub turn_log: TurnLog,
    pub case_store: Arc<dyn CaseStore>,
    pub model: Arc<dyn PatientModel>,
}

pub async fn create_app() -> Router {
    let app_state = create_app_state().await;
    build_router(app_state)
}

async fn create_app_state() -> AppState {
    let model = GeminiPatient::from_env().unwrap_or_else(|e| {
        error!("Failed to initialize Gemini client: {}", e);
        std::process::exit(1);
    });

    let db_url =
        std::env::var("CHAT_DB_URL").unwrap_or_else(|_| "sqlite:chat_history.db?mode=rwc".into());
    let turn_log = TurnLog::connect(&db_url).await.unwrap_or_else(|e| {
        error!("Failed to open turn log at {}: {}", db_url, e);
        std::process::exit(1);
    });

    let repo = std::env::var("CASE_REPO").unwrap_or_else(|_| DEFAULT_CASE_REPO.into());
    let branch = std::env::var("CASE_BRANCH").unwrap_or_else(|_| DEFAULT_CASE_BRANCH.into());

    AppState {
        sessions: Arc::new(InMemorySessionStore::new()),
        turn_log,
        case_store: Arc::new(GithubCaseStore::new(repo, branch)),
        model: Arc::new(model),
    }
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/cases", get(list_cases))
        .route("/references", get(list_references))
        .route("/sessions", post(create_session))
        .route("/sessions/{session_id}/case", post(select_case))
        .route("/sessions/{session_id}/message", post(send_message))
        .route("/sessions/{session_id}/latest", get(latest_exchange))
        .route("/sessions/{session_id}", delete(delete_session))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

async fn root() -> Json<Value> {
    Json(json!({
        "service": "AI History-Taking Interview Service",
        "version": "1.0.0",
        "description": "Role-play a medical history-taking interview against an AI patient persona",
        "usage": [
            "증례 파일을 선택하고 AI가 다 읽으면 인터뷰를 시작하세요.",
            "첫 질문은 어디가 불편해서 오셨나요? 이고 마치는 질문은 궁금한 점이 있으신가요? 입니다.",
            "질문과 답변은 한 쌍씩만 보여집니다."
        ],
        "endpoints": {
            "GET /cases": "List available case documents",
            "GET /references": "List reference documents with download links",
            "POST /sessions": "Create an interview session",
            "POST /sessions/{session_id}/case": "Select a case and run the seed exchange",
            "POST /sessions/{session_id}/message": "Send one interviewer question",
            "GET /sessions/{session_id}/latest": "Latest visible interviewer/patient pair",
            "DELETE /sessions/{session_id}": "Evict a session",
            "GET /health": "Health check"
        }
    }))
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn list_cases(State(state): State<AppState>) -> ApiResult<CaseListResponse> {
    let files = state
        .case_store
        .list_files(CASE_FOLDER)
        .await
        .map_err(|e| internal_error("Failed to list case files", &e.to_string()))?;
    Ok(Json(CaseListResponse { files }))
}

async fn list_references(State(state): State<AppState>) -> ApiResult<ReferenceListResponse> {
    let names = state
        .case_store
        .list_files(REFERENCE_FOLDER)
        .await
        .map_err(|e| internal_error("Failed to list reference files", &e.to_string()))?;

    let files = names
        .into_iter()
        .map(|name| {
            let download_url = state.case_store.download_url(REFERENCE_FOLDER, &name);
            ReferenceFile { name, download_url }
        })
        .collect();
    Ok(Json(ReferenceListResponse { files }))
}

async fn create_session(State(state): State<AppState>) -> ApiResult<CreateSessionResponse> {
    let session = ConversationSession::new(Uuid::new_v4().to_string());
    let session_id = session.id.clone();

    state.sessions.save(session).await.map_err(|e| {
        error!("Failed to create session: {}", e);
        internal_error("Failed to create session", &e.to_string())
    })?;

    info!("Session {} created", session_id);
    Ok(Json(CreateSessionResponse { session_id }))
}

/// Select a case document and run the seed exchange. A missing document or
/// one with no usable text skips the seed entirely: no model call, no log
/// rows, session stays where it was.
async fn select_case(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(request): Json<SelectCaseRequest>,
) -> ApiResult<SelectCaseResponse> {
    if request.file_name.trim().is_empty() {
        return Err(bad_request_error("file_name is required"));
    }

    let mut session = load_session(&state, &session_id).await?;

    let bytes = match state
        .case_store
        .fetch_file(CASE_FOLDER, &request.file_name)
        .await
    {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("Case fetch failed for {}: {}", request.file_name, e);
            return Ok(Json(skipped(session_id, "case document could not be fetched")));
        }
    };

    let doc_text = match extract_docx_text(&bytes) {
        Ok(text) => text,
        Err(e) => {
            warn!("Extraction failed for {}: {}", request.file_name, e);
            return Ok(Json(skipped(session_id, "case document could not be read")));
        }
    };

    if doc_text.trim().is_empty() {
        info!("Case {} has no usable content, seed skipped", request.file_name);
        return Ok(Json(skipped(session_id, "case document has no usable content")));
    }

    session.phase = SessionPhase::AwaitingSeed;
    session.case_file = Some(request.file_name.clone());

    run_exchange(state.model.as_ref(), &state.turn_log, &mut session, &doc_text)
        .await
        .map_err(exchange_error)?;

    save_session(&state, session).await?;

    info!("Session {} seeded with case {}", session_id, request.file_name);
    Ok(Json(SelectCaseResponse {
        session_id,
        status: "seeded".to_string(),
        case_file: Some(request.file_name),
        reason: None,
    }))
}

fn skipped(session_id: String, reason: &str) -> SelectCaseResponse {
    SelectCaseResponse {
        session_id,
        status: "skipped".to_string(),
        case_file: None,
        reason: Some(reason.to_string()),
    }
}

async fn send_message(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(request): Json<SendMessageRequest>,
) -> ApiResult<SendMessageResponse> {
    if request.content.trim().is_empty() {
        return Err(bad_request_error("content cannot be empty"));
    }

    let mut session = load_session(&state, &session_id).await?;

    let exchange = run_exchange(
        state.model.as_ref(),
        &state.turn_log,
        &mut session,
        &request.content,
    )
    .await
    .map_err(exchange_error)?;

    save_session(&state, session).await?;

    Ok(Json(SendMessageResponse {
        session_id,
        reply: exchange.reply,
    }))
}

/// The newest interviewer/patient pair. Shown only when both rows exist and
/// both are visible; hidden instruction exchanges stay in the log but render
/// as an empty pair.
async fn latest_exchange(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<LatestExchangeResponse> {
    // Confirms the session exists before reading the shared log.
    load_session(&state, &session_id).await?;

    let interviewer = state
        .turn_log
        .latest(Role::Interviewer)
        .await
        .map_err(|e| internal_error("Failed to read turn log", &e.to_string()))?;
    let patient = state
        .turn_log
        .latest(Role::Patient)
        .await
        .map_err(|e| internal_error("Failed to read turn log", &e.to_string()))?;

    let response = match (interviewer, patient) {
        (Some(q), Some(a)) if q.visible && a.visible => LatestExchangeResponse {
            interviewer: Some(q.message),
            patient: Some(a.message),
        },
        _ => LatestExchangeResponse {
            interviewer: None,
            patient: None,
        },
    };
    Ok(Json(response))
}

async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<Value> {
    load_session(&state, &session_id).await?;

    state.sessions.delete(&session_id).await.map_err(|e| {
        error!("Failed to delete session {}: {}", session_id, e);
        internal_error("Failed to delete session", &e.to_string())
    })?;

    info!("Session {} deleted", session_id);
    Ok(Json(json!({
        "session_id": session_id,
        "status": "deleted"
    })))
}

async fn load_session(state: &AppState, session_id: &str) -> Result<ConversationSession, ApiError> {
    match state.sessions.get(session_id).await {
        Ok(Some(session)) => Ok(session),
        Ok(None) => Err(not_found_error("Session not found", session_id)),
        Err(e) => {
            error!("Failed to load session {}: {}", session_id, e);
            Err(internal_error("Failed to load session", &e.to_string()))
        }
    }
}

async fn save_session(state: &AppState, session: ConversationSession) -> Result<(), ApiError> {
    state.sessions.save(session).await.map_err(|e| {
        error!("Failed to save session: {}", e);
        internal_error("Failed to save session", &e.to_string())
    })
}
