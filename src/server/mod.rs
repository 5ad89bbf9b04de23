//! HTTP surface: the static chat page plus a single JSON endpoint.
//!
//! `POST /chat` always answers 200 with `{"response": ...}`. Offline state,
//! quota exhaustion and remote failures are folded into the `response` text.

use std::error::Error as _;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    Json, Router,
    extract::{ConnectInfo, Request, State},
    response::Html,
    routing::{get, post},
};
use http_body_util::LengthLimitError;
use serde::{Deserialize, Serialize};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::llm::provider::LlmProvider;
use crate::quota::QuotaScope;
use crate::relay::{Conversation, RelayService};

const INDEX_HTML: &str = include_str!("../../static/index.html");
const MAX_BODY_BYTES: usize = 64 * 1024;

type SharedRelay<P> = Arc<RelayService<P>>;

#[derive(Debug, Default, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatResponse {
    pub response: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthResponse {
    pub status: String,
    pub remaining: Option<u32>,
}

pub fn build_router<P>(relay: SharedRelay<P>, assets_dir: &Path) -> Router
where
    P: LlmProvider + Send + Sync + 'static,
{
    Router::new()
        .route("/", get(index_handler))
        .route("/chat", post(chat_handler::<P>))
        .route("/health", get(health_handler::<P>))
        .nest_service("/assets", ServeDir::new(assets_dir))
        .layer(TraceLayer::new_for_http())
        .with_state(relay)
}

pub async fn serve<P>(relay: SharedRelay<P>, config: &ServerConfig) -> Result<()>
where
    P: LlmProvider + Send + Sync + 'static,
{
    if let Some(reason) = relay.offline_reason() {
        warn!(?reason, "serving in offline mode, chat requests will be refused");
    }

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(%addr, "chat server listening");

    let app = build_router(relay, &config.assets_dir);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("chat server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(%err, "unable to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

async fn index_handler() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn chat_handler<P>(State(relay): State<SharedRelay<P>>, request: Request) -> Json<ChatResponse>
where
    P: LlmProvider + Send + Sync + 'static,
{
    let client = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string());

    let message = match axum::body::to_bytes(request.into_body(), MAX_BODY_BYTES).await {
        Ok(body) => parse_message(&body),
        Err(err) if exceeds_body_limit(&err) => {
            warn!(limit = MAX_BODY_BYTES, "chat request body too large");
            return respond(relay.notices().message_too_long());
        }
        Err(err) => {
            warn!(%err, "unable to read chat request body");
            None
        }
    };
    let Some(message) = message else {
        return respond(relay.notices().empty_message());
    };

    // Every request is a fresh, history-less exchange.
    let mut conversation = Conversation::new();
    let outcome = relay
        .exchange(client.as_deref(), &mut conversation, &message)
        .await;
    respond(relay.render(&outcome))
}

async fn health_handler<P>(State(relay): State<SharedRelay<P>>) -> Json<HealthResponse>
where
    P: LlmProvider + Send + Sync + 'static,
{
    if relay.offline_reason().is_some() {
        return Json(HealthResponse {
            status: "offline".to_string(),
            remaining: None,
        });
    }

    let remaining = match relay.quota().scope() {
        QuotaScope::Global => relay.quota().ledger_for(None).remaining().ok(),
        QuotaScope::PerClient => None,
    };
    Json(HealthResponse {
        status: "ok".to_string(),
        remaining,
    })
}

fn parse_message(body: &[u8]) -> Option<String> {
    match serde_json::from_slice::<ChatRequest>(body) {
        Ok(request) => request.message.filter(|message| !message.trim().is_empty()),
        Err(err) => {
            warn!(%err, "malformed chat request body");
            None
        }
    }
}

fn exceeds_body_limit(err: &axum::Error) -> bool {
    let mut source = err.source();
    while let Some(inner) = source {
        if inner.is::<LengthLimitError>() {
            return true;
        }
        source = inner.source();
    }
    false
}

fn respond(response: String) -> Json<ChatResponse> {
    Json(ChatResponse { response })
}

#[cfg(test)]
mod tests {
    use super::{ChatResponse, HealthResponse, MAX_BODY_BYTES, build_router, parse_message};
    use crate::corpus::Corpus;
    use crate::llm::provider::{AssistantInput, AssistantOutput, LlmProvider, LlmResult};
    use crate::prompt::PersonaTemplate;
    use crate::quota::{MemoryQuotaStore, QuotaPolicy, QuotaScope};
    use crate::relay::RelayService;
    use axum::Router;
    use axum::body::Body;
    use axum::extract::ConnectInfo;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use std::net::SocketAddr;
    use std::path::Path;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tower::ServiceExt;

    #[derive(Clone, Default)]
    struct EchoProvider {
        calls: Arc<AtomicUsize>,
    }

    impl LlmProvider for EchoProvider {
        async fn generate(&self, input: AssistantInput) -> LlmResult<AssistantOutput> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(AssistantOutput {
                text: format!("echo: {}", input.user_message),
            })
        }
    }

    fn app(
        provider: &EchoProvider,
        store: &MemoryQuotaStore,
        corpus: Corpus,
        scope: QuotaScope,
    ) -> Router {
        let relay = RelayService::assemble(
            &corpus,
            &PersonaTemplate::default(),
            Ok(provider.clone()),
            QuotaPolicy::new(Arc::new(store.clone()), 3, scope),
            Duration::from_secs(5),
        );
        build_router(Arc::new(relay), Path::new("assets"))
    }

    fn corpus() -> Corpus {
        Corpus::Loaded {
            sources: vec!["1.txt".to_string()],
            text: "listing".to_string(),
        }
    }

    fn chat_request(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/chat")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn send_chat(app: Router, request: Request<Body>) -> String {
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let parsed: ChatResponse = serde_json::from_slice(&body).unwrap();
        parsed.response
    }

    #[tokio::test]
    async fn serves_index_page() {
        let app = app(
            &EchoProvider::default(),
            &MemoryQuotaStore::new(),
            corpus(),
            QuotaScope::Global,
        );

        let req = Request::builder().uri("/").body(Body::empty()).unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let text = String::from_utf8_lossy(&body);
        assert!(text.contains("<!DOCTYPE html>"));
        assert!(text.contains("/chat"));
    }

    #[tokio::test]
    async fn chat_relays_reply_and_charges_quota() {
        let provider = EchoProvider::default();
        let store = MemoryQuotaStore::new();
        let app = app(&provider, &store, corpus(), QuotaScope::Global);

        let response = send_chat(app, chat_request(r#"{"message":"halo"}"#)).await;

        assert_eq!(response, "echo: halo");
        assert_eq!(store.raw().as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn blank_or_malformed_messages_are_refused_politely() {
        let provider = EchoProvider::default();
        let store = MemoryQuotaStore::new();

        for body in [r#"{"message":"   "}"#, r#"{}"#, "not json", r#"{"message":42}"#] {
            let app = app(&provider, &store, corpus(), QuotaScope::Global);
            assert_eq!(send_chat(app, chat_request(body)).await, "Please enter a message.");
        }
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.raw(), None);
    }

    #[tokio::test]
    async fn oversized_body_is_reported_as_too_long() {
        let provider = EchoProvider::default();
        let store = MemoryQuotaStore::new();
        let app = app(&provider, &store, corpus(), QuotaScope::Global);
        let body = format!(r#"{{"message":"{}"}}"#, "a".repeat(MAX_BODY_BYTES + 1));

        let response = send_chat(app, chat_request(&body)).await;

        assert_eq!(
            response,
            "Your message is too long. Please shorten it and try again."
        );
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.raw(), None);
    }

    #[tokio::test]
    async fn offline_corpus_answers_fixed_message_every_time() {
        let provider = EchoProvider::default();
        let store = MemoryQuotaStore::new();

        for _ in 0..3 {
            let app = app(&provider, &store, Corpus::NotLoaded, QuotaScope::Global);
            let response = send_chat(app, chat_request(r#"{"message":"halo"}"#)).await;
            assert_eq!(
                response,
                "Adam is offline. Property data files could not be loaded. Please contact support."
            );
        }
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.raw(), None);
    }

    #[tokio::test]
    async fn exhausted_quota_is_reported_in_response_field() {
        let provider = EchoProvider::default();
        let store = MemoryQuotaStore::with_remaining(0);
        let app = app(&provider, &store, corpus(), QuotaScope::Global);

        let response = send_chat(app, chat_request(r#"{"message":"halo"}"#)).await;

        assert!(response.contains("usage limit of 3 requests"));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn per_client_scope_keys_quota_by_peer_ip() {
        let provider = EchoProvider::default();
        let store = MemoryQuotaStore::with_remaining(0);

        let mut request = chat_request(r#"{"message":"halo"}"#);
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([10, 0, 0, 7], 40000))));
        let app = app(&provider, &store, corpus(), QuotaScope::PerClient);

        let response = send_chat(app, request).await;

        assert_eq!(response, "echo: halo", "exhausted global counter must not apply");
        assert_eq!(store.raw().as_deref(), Some("0"));
    }

    #[tokio::test]
    async fn health_reports_remaining_and_offline_state() {
        let store = MemoryQuotaStore::with_remaining(2);
        let ready = app(&EchoProvider::default(), &store, corpus(), QuotaScope::Global);
        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let body = ready
            .oneshot(req)
            .await
            .unwrap()
            .into_body()
            .collect()
            .await
            .unwrap()
            .to_bytes();
        let health: HealthResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(
            health,
            HealthResponse {
                status: "ok".to_string(),
                remaining: Some(2)
            }
        );

        let offline = app(
            &EchoProvider::default(),
            &store,
            Corpus::NotLoaded,
            QuotaScope::Global,
        );
        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let body = offline
            .oneshot(req)
            .await
            .unwrap()
            .into_body()
            .collect()
            .await
            .unwrap()
            .to_bytes();
        let health: HealthResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(health.status, "offline");
        assert_eq!(health.remaining, None);
    }

    #[test]
    fn parse_message_requires_non_blank_string() {
        assert_eq!(parse_message(br#"{"message":"hi"}"#), Some("hi".to_string()));
        assert_eq!(parse_message(br#"{"message":""}"#), None);
        assert_eq!(parse_message(b"{"), None);
    }
}
