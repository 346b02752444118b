use axum::http::{self, Request, StatusCode};
use http_body_util::BodyExt;
use mock_server::{app, Echo};
use tower::ServiceExt;

async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn get_request(uri: &str) -> Request<String> {
    Request::builder().uri(uri).body(String::new()).unwrap()
}

// --- plain ---

#[tokio::test]
async fn hello_returns_body() {
    let resp = app().oneshot(get_request("/hello")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_bytes(resp).await, "hello");
}

#[tokio::test]
async fn empty_returns_204_without_body() {
    let resp = app().oneshot(get_request("/empty")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert!(body_bytes(resp).await.is_empty());
}

#[tokio::test]
async fn missing_returns_404_with_body() {
    let resp = app().oneshot(get_request("/missing")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_bytes(resp).await, "not found");
}

// --- redirects ---

#[tokio::test]
async fn redirect_points_at_hello() {
    let resp = app().oneshot(get_request("/redirect")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(resp.headers()[http::header::LOCATION], "/hello");
}

#[tokio::test]
async fn chain_points_at_redirect() {
    let resp = app().oneshot(get_request("/chain")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::MOVED_PERMANENTLY);
    assert_eq!(resp.headers()[http::header::LOCATION], "/redirect");
}

#[tokio::test]
async fn loop_points_at_itself() {
    let resp = app().oneshot(get_request("/loop")).await.unwrap();
    assert_eq!(resp.headers()[http::header::LOCATION], "/loop");
}

// --- echo ---

#[tokio::test]
async fn echo_reports_method_body_and_content_type() {
    let resp = app()
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/echo")
                .header(http::header::CONTENT_TYPE, "text/plain")
                .body("payload".to_string())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let echo: Echo = body_json(resp).await;
    assert_eq!(
        echo,
        Echo {
            method: "PUT".to_string(),
            body: "payload".to_string(),
            content_type: Some("text/plain".to_string()),
        }
    );
}

#[tokio::test]
async fn echo_accepts_custom_methods() {
    let resp = app()
        .oneshot(
            Request::builder()
                .method("PATCH")
                .uri("/echo")
                .body(String::new())
                .unwrap(),
        )
        .await
        .unwrap();
    let echo: Echo = body_json(resp).await;
    assert_eq!(echo.method, "PATCH");
    assert!(echo.content_type.is_none());
}

// --- headers ---

#[tokio::test]
async fn agent_echoes_user_agent() {
    let resp = app()
        .oneshot(
            Request::builder()
                .uri("/agent")
                .header(http::header::USER_AGENT, "probe/1.0")
                .body(String::new())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(body_bytes(resp).await, "probe/1.0");
}

// --- counter ---

#[tokio::test]
async fn counter_increments_per_request() {
    use tower::Service;

    let mut app = app().into_service();

    for expected in ["1", "2", "3"] {
        let resp = ServiceExt::ready(&mut app)
            .await
            .unwrap()
            .call(get_request("/counter"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_bytes(resp).await, expected);
    }
}
