use std::io;
use std::net::SocketAddr;

use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::{StreamExt, stream};
use serde::Deserialize;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::completion::CompletionClient;
use crate::error::GatewayError;

/// Where the gateway listens.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GatewayConfig {
    /// Socket address to bind.
    pub addr: SocketAddr,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 3001)),
        }
    }
}

/// State shared across requests.
#[derive(Clone, Debug)]
pub struct GatewayState {
    client: CompletionClient,
}

impl GatewayState {
    /// Creates the state around a completion client.
    #[inline]
    pub fn new(client: CompletionClient) -> Self {
        Self { client }
    }
}

#[derive(Debug, Deserialize)]
struct AskRequest {
    question: Option<String>,
}

/// Builds the gateway routes.
pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route("/ask", post(ask))
        .route("/health", get(|| async { "OK" }))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serves the gateway until Ctrl-C.
pub async fn serve(config: GatewayConfig, state: GatewayState) -> io::Result<()> {
    let listener = TcpListener::bind(config.addr).await?;
    serve_with_listener(listener, state, async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!("failed to listen for Ctrl-C: {err}");
            std::future::pending::<()>().await;
        }
    })
    .await
}

/// Serves the gateway on an already bound listener until `shutdown`
/// resolves. In-flight requests are allowed to finish.
pub async fn serve_with_listener(
    listener: TcpListener,
    state: GatewayState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> io::Result<()> {
    info!("gateway listening on {}", listener.local_addr()?);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            shutdown.await;
            info!("gateway shutting down");
        })
        .await
}

async fn ask(
    State(state): State<GatewayState>,
    payload: Result<Json<AskRequest>, JsonRejection>,
) -> Result<Response, GatewayError> {
    let question = match payload {
        Ok(Json(AskRequest {
            question: Some(question),
        })) if !question.trim().is_empty() => question,
        Ok(_) => return Err(GatewayError::MissingInput),
        Err(rejection) => {
            debug!("malformed request body: {rejection}");
            return Err(GatewayError::MissingInput);
        }
    };
    info!("answering: {question}");

    let mut fragments = state.client.ask(&question).await?;
    // Hold the status back until the provider has produced something, so
    // that early failures still get a proper error response.
    let first = match fragments.next().await {
        Some(Ok(fragment)) => Some(fragment),
        Some(Err(err)) => return Err(err.into()),
        None => None,
    };
    let body = stream::iter(first.map(Ok)).chain(fragments);

    let headers = [
        (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
        (header::CACHE_CONTROL, "no-cache"),
        (header::CONNECTION, "keep-alive"),
    ];
    Ok((headers, Body::from_stream(body)).into_response())
}
