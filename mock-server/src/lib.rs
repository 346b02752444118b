use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use axum::{
    extract::State,
    http::{header, HeaderMap, Method, StatusCode},
    response::IntoResponse,
    routing::{any, get},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;

/// What `/echo` saw of the request.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Echo {
    pub method: String,
    pub body: String,
    pub content_type: Option<String>,
}

pub type Counter = Arc<AtomicU64>;

pub fn app() -> Router {
    let counter: Counter = Arc::new(AtomicU64::new(0));
    Router::new()
        .route("/hello", get(hello))
        .route("/redirect", get(|| async { redirect(StatusCode::FOUND, "/hello") }))
        .route("/chain", get(|| async { redirect(StatusCode::MOVED_PERMANENTLY, "/redirect") }))
        .route("/loop", get(|| async { redirect(StatusCode::FOUND, "/loop") }))
        .route("/missing", get(missing))
        .route("/empty", get(|| async { StatusCode::NO_CONTENT }))
        .route("/agent", get(agent))
        .route("/echo", any(echo))
        .route("/counter", get(counter_value))
        .with_state(counter)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn hello() -> &'static str {
    "hello"
}

fn redirect(status: StatusCode, location: &'static str) -> impl IntoResponse {
    (status, [(header::LOCATION, location)])
}

async fn missing() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "not found")
}

async fn agent(headers: HeaderMap) -> String {
    headers
        .get(header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

async fn echo(method: Method, headers: HeaderMap, body: String) -> Json<Echo> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    Json(Echo {
        method: method.to_string(),
        body,
        content_type,
    })
}

async fn counter_value(State(counter): State<Counter>) -> String {
    (counter.fetch_add(1, Ordering::SeqCst) + 1).to_string()
}
