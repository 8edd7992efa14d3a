//! HTTP surface: the page, the session API and the streaming chat endpoint.

use std::convert::Infallible;
use std::error::Error;
use std::fmt;
use std::sync::{Arc, PoisonError};

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::stream::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, info};

use crate::core::constants::COMPLETION_ERROR_BANNER;
use crate::core::message::Message;
use crate::core::session::{SessionError, SessionId, SessionStore};
use crate::core::turn::{TurnEvent, TurnRunner};
use crate::ui::{render_page, CardItem, PageView, CARDS};


#[derive(Clone)]
pub struct AppState {
    sessions: Arc<SessionStore>,
    turns: TurnRunner,
    api_key_configured: bool,
    model: Arc<str>,
}

impl AppState {
    pub fn new(turns: TurnRunner, api_key_configured: bool, model: &str) -> Self {
        Self {
            sessions: Arc::new(SessionStore::new()),
            turns,
            api_key_configured,
            model: Arc::from(model),
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }
}

#[derive(Deserialize)]
pub struct MessageInput {
    pub text: String,
}

#[derive(Serialize)]
pub struct SessionView {
    pub id: String,
    pub messages: Vec<Message>,
}

#[derive(Debug)]
pub enum ApiError {
    SessionNotFound,
    Session(SessionError),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::SessionNotFound => write!(f, "session not found"),
            ApiError::Session(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ApiError {}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        ApiError::Session(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::SessionNotFound => StatusCode::NOT_FOUND,
            ApiError::Session(SessionError::Busy) => StatusCode::CONFLICT,
            ApiError::Session(SessionError::EmptyMessage) => StatusCode::BAD_REQUEST,
        };
        let body = serde_json::json!({ "message": self.to_string() });
        (status, Json(body)).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/cards", get(list_cards))
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/:id", get(get_session))
        .route("/api/sessions/:id/messages", post(post_message))
        .with_state(state)
}

pub async fn serve(state: AppState, bind: &str) -> Result<(), Box<dyn Error>> {
    let listener = TcpListener::bind(bind).await?;
    info!(address = %listener.local_addr()?, "listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down");
        })
        .await?;
    Ok(())
}

async fn index(State(state): State<AppState>) -> Html<String> {
    let context = state.turns.load_context().await;
    Html(render_page(&PageView {
        cards: CARDS,
        context_warnings: context.warnings(),
        api_key_configured: state.api_key_configured,
        model: &state.model,
    }))
}

async fn list_cards() -> Json<&'static [CardItem]> {
    Json(CARDS)
}

async fn create_session(State(state): State<AppState>) -> (StatusCode, Json<SessionView>) {
    let (id, session) = state.sessions.create();
    debug!(session = %id, "session created");
    let messages = session
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .all()
        .to_vec();
    (
        StatusCode::CREATED,
        Json(SessionView {
            id: id.to_string(),
            messages,
        }),
    )
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionView>, ApiError> {
    let session = state
        .sessions
        .get(&SessionId::from(id.clone()))
        .ok_or(ApiError::SessionNotFound)?;
    let messages = session
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .all()
        .to_vec();
    Ok(Json(SessionView { id, messages }))
}

async fn post_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<MessageInput>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let session_id = SessionId::from(id);
    let session = state
        .sessions
        .get(&session_id)
        .ok_or(ApiError::SessionNotFound)?;
    session
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .begin_turn(&input.text)?;
    info!(session = %session_id, question_chars = input.text.chars().count(), "turn started");

    let (tx, rx) = mpsc::unbounded_channel();
    let runner = state.turns.clone();
    tokio::spawn(async move {
        runner.run(session, input.text, tx).await;
    });

    let events = UnboundedReceiverStream::new(rx)
        .map(|event| Ok::<Event, Infallible>(to_sse_event(event)));
    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

fn to_sse_event(event: TurnEvent) -> Event {
    match event {
        TurnEvent::Chunk(text) => Event::default()
            .event("chunk")
            .data(serde_json::json!({ "text": text }).to_string()),
        TurnEvent::Done { reply } => Event::default()
            .event("done")
            .data(serde_json::json!({ "reply": reply }).to_string()),
        TurnEvent::Failed { reply, .. } => Event::default().event("error").data(
            serde_json::json!({ "message": COMPLETION_ERROR_BANNER, "reply": reply }).to_string(),
        ),
    }
}
