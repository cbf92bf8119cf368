use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderValue, Method};
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::http::middleware::{owner_auth, search_query_limit};
use crate::http::routes::{health, prompts, search, tags};
use crate::state::AppState;

pub fn build(state: AppState) -> Router {
    let cors = build_cors(&state);
    let owner_routes = Router::new()
        .route(
            "/api/prompts",
            get(prompts::list_prompts).post(prompts::create_prompt),
        )
        .route(
            "/api/prompts/search",
            get(search::search_prompts)
                .layer(middleware::from_fn(search_query_limit::enforce_search_query_length)),
        )
        .route(
            "/api/prompts/{id}",
            get(prompts::get_prompt)
                .put(prompts::update_prompt)
                .delete(prompts::delete_prompt),
        )
        .route("/api/prompts/{id}/copy", post(prompts::copy_prompt))
        .route("/api/tags", get(tags::list_tags))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            owner_auth::require_owner,
        ));
    let mut router = Router::new()
        .route("/api/health", get(health::health))
        .merge(owner_routes)
        .with_state(state);
    if let Some(cors) = cors {
        router = router.layer(cors);
    }
    router
}

fn build_cors(state: &AppState) -> Option<CorsLayer> {
    let mut origins = Vec::new();
    let mut allow_any = false;
    for origin in state.config.cors_allow_origins.iter() {
        if is_wildcard_origin(origin) {
            allow_any = true;
            break;
        }
        match HeaderValue::from_str(origin.trim()) {
            Ok(value) => origins.push(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "invalid CORS origin ignored");
            }
        }
    }

    if !should_enable_cors(allow_any, &origins) {
        return None;
    }

    let cors = CorsLayer::new().allow_methods([
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::DELETE,
        Method::OPTIONS,
    ]);
    if allow_any {
        Some(cors.allow_origin(Any).allow_headers(Any))
    } else {
        Some(
            cors.allow_origin(AllowOrigin::list(origins))
                .allow_credentials(true)
                .allow_headers([CONTENT_TYPE, AUTHORIZATION]),
        )
    }
}

fn is_wildcard_origin(origin: &str) -> bool {
    origin.trim() == "*"
}

fn should_enable_cors(allow_any: bool, origins: &[HeaderValue]) -> bool {
    allow_any || !origins.is_empty()
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::{to_bytes, Body};
    use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
    use axum::http::{HeaderValue, Request, StatusCode};
    use axum::response::Response;
    use tower::ServiceExt;

    use super::{build, is_wildcard_origin, should_enable_cors};
    use crate::config::AppConfig;
    use crate::http::middleware::owner_auth::issue_token;
    use crate::state::AppState;
    use prompt_manager_infra::db::connect_lazy;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    // Nothing listens on the database url; requests under test are answered
    // before a connection is needed.
    fn test_state() -> AppState {
        let config = AppConfig {
            http_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            database_url: "postgres://127.0.0.1:1/prompts".to_string(),
            db_max_connections: 1,
            token_secret: SECRET.to_string(),
            token_ttl: Duration::from_secs(60),
            cors_allow_origins: Vec::new(),
        };
        let db = connect_lazy(&config.database_url, 1).unwrap();
        AppState {
            config: Arc::new(config),
            db,
        }
    }

    async fn send(request: Request<Body>) -> Response {
        build(test_state()).oneshot(request).await.unwrap()
    }

    fn authorized(method: &str, uri: &str) -> axum::http::request::Builder {
        let token = issue_token(SECRET, 1, 60).unwrap();
        Request::builder()
            .method(method)
            .uri(uri)
            .header(AUTHORIZATION, format!("Bearer {token}"))
    }

    async fn error_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        body["error"].as_str().unwrap_or_default().to_string()
    }

    #[tokio::test]
    async fn copy_route_is_registered_behind_auth() {
        let response = send(
            Request::builder()
                .method("POST")
                .uri("/api/prompts/7/copy")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = send(
            authorized("POST", "/api/prompts/abc/copy")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = send(
            authorized("GET", "/api/prompts/7/copy")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn malformed_create_body_is_a_bad_request() {
        let response = send(
            authorized("POST", "/api/prompts")
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"title": "#))
                .unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(error_text(response).await.starts_with("invalid request body"));
    }

    #[tokio::test]
    async fn update_body_of_wrong_shape_is_a_bad_request() {
        let response = send(
            authorized("PUT", "/api/prompts/3")
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"is_liked": "yes"}"#))
                .unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(error_text(response).await.starts_with("invalid request body"));

        let response = send(
            authorized("PUT", "/api/prompts/3")
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(error_text(response).await, "update has no fields");
    }

    #[test]
    fn wildcard_origin_matches_trimmed_star() {
        assert!(is_wildcard_origin("*"));
        assert!(is_wildcard_origin(" * "));
        assert!(!is_wildcard_origin("https://example.com"));
    }

    #[test]
    fn cors_enablement_requires_origin_or_wildcard() {
        assert!(!should_enable_cors(false, &[]));
        assert!(should_enable_cors(true, &[]));
        assert!(should_enable_cors(false, &[HeaderValue::from_static("https://example.com")]));
    }
}
