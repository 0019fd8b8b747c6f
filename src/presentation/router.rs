// Route table and HTTP middleware
use crate::presentation::app_state::AppState;
use crate::presentation::handlers::{
    ADMIN_KEY_HEADER, add_point, create_track, delete_track, get_track, health_check,
    list_tracks, stop_track,
};
use crate::presentation::ws::live_updates;
use axum::{
    Router,
    extract::Request,
    http::{HeaderName, Method, StatusCode, header},
    middleware::{self, Next},
    response::Response,
    routing::{get, post, put},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(health_check))
        .route("/api/tracks", get(list_tracks).post(create_track))
        .route("/api/tracks/:id", get(get_track).delete(delete_track))
        .route("/api/tracks/:id/points", post(add_point))
        .route("/api/tracks/:id/stop", put(stop_track))
        .route("/ws", get(live_updates))
        .with_state(state)
        .layer(cors_layer())
        .layer(middleware::from_fn(preflight_no_content))
        .layer(TraceLayer::new_for_http())
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, HeaderName::from_static(ADMIN_KEY_HEADER)])
}

/// Preflight answers carry no body, so report them as 204.
async fn preflight_no_content(request: Request, next: Next) -> Response {
    let is_preflight = request.method() == Method::OPTIONS;
    let mut response = next.run(request).await;
    if is_preflight && response.status() == StatusCode::OK {
        *response.status_mut() = StatusCode::NO_CONTENT;
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::live_relay::LiveRelay;
    use crate::application::track_service::TrackService;
    use crate::application::track_store::TrackStore;
    use crate::domain::track::TrackEvent;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    struct TestApp {
        router: Router,
        relay: LiveRelay,
    }

    impl TestApp {
        fn new(admin_key: Option<&str>, default_clients: &[&str]) -> Self {
            let relay = LiveRelay::new(32);
            let track_service = TrackService::new(
                Arc::new(TrackStore::new()),
                relay.clone(),
                default_clients.iter().map(|c| c.to_string()).collect(),
            );
            let state = Arc::new(AppState {
                track_service,
                relay: relay.clone(),
                admin_key: admin_key.map(str::to_string),
            });
            Self {
                router: build_router(state),
                relay,
            }
        }

        async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
            let response = self.router.clone().oneshot(request).await.unwrap();
            let status = response.status();
            let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            let value = if bytes.is_empty() {
                Value::Null
            } else {
                serde_json::from_slice(&bytes).unwrap_or(Value::Null)
            };
            (status, value)
        }

        async fn call(&self, method: &str, uri: &str, payload: Option<Value>) -> (StatusCode, Value) {
            let builder = Request::builder().method(method).uri(uri);
            let request = match payload {
                Some(payload) => builder
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(payload.to_string())),
                None => builder.body(Body::empty()),
            };
            self.send(request.unwrap()).await
        }

        async fn create(&self, user_id: &str, name: &str) -> Value {
            let (status, track) = self
                .call("POST", "/api/tracks", Some(json!({ "userId": user_id, "name": name })))
                .await;
            assert_eq!(status, StatusCode::CREATED);
            track
        }
    }

    #[tokio::test]
    async fn test_track_lifecycle_over_http() {
        let app = TestApp::new(None, &[]);

        let track = app.create("abc123", "Track 1").await;
        assert_eq!(track["isActive"], true);
        let id = track["id"].as_str().unwrap().to_string();
        assert!(!id.is_empty());

        let (status, _) = app
            .call(
                "POST",
                &format!("/api/tracks/{id}/points"),
                Some(json!({ "lat": 59.9139, "lon": 10.7522, "timestamp": 1_700_000_000_000_i64 })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);

        let (status, fetched) = app.call("GET", &format!("/api/tracks/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        let points = fetched["points"].as_array().unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0]["lat"], 59.9139);
        assert_eq!(points[0]["lon"], 10.7522);

        let (status, stopped) = app.call("PUT", &format!("/api/tracks/{id}/stop"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(stopped["isActive"], false);
        assert!(stopped["endTime"].is_i64());

        let (status, _) = app.call("DELETE", &format!("/api/tracks/{id}"), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, body) = app.call("GET", &format!("/api/tracks/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_create_requires_fields() {
        let app = TestApp::new(None, &[]);

        let (status, body) = app
            .call("POST", "/api/tracks", Some(json!({ "name": "No user" })))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "userId is required");

        let (status, _) = app
            .call("POST", "/api/tracks", Some(json!({ "userId": "abc123" })))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = app.call("POST", "/api/tracks", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_malformed_query_returns_json_error() {
        let app = TestApp::new(None, &[]);

        let (status, body) = app.call("GET", "/api/tracks?historical=1", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_point_validation_and_missing_track() {
        let app = TestApp::new(None, &[]);
        let track = app.create("abc123", "Track 1").await;
        let id = track["id"].as_str().unwrap();

        let (status, _) = app
            .call("POST", &format!("/api/tracks/{id}/points"), Some(json!({ "lat": 1.0 })))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = app
            .call(
                "POST",
                &format!("/api/tracks/{id}/points"),
                Some(json!({ "lat": 95.0, "lon": 10.0 })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = app
            .call(
                "POST",
                "/api/tracks/missing/points",
                Some(json!({ "lat": 1.0, "lon": 1.0, "timestamp": 5 })),
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = app.call("PUT", "/api/tracks/missing/stop", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = app.call("DELETE", "/api/tracks/missing", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, fetched) = app.call("GET", &format!("/api/tracks/{id}"), None).await;
        assert!(fetched["points"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_points_rejected_after_stop() {
        let app = TestApp::new(None, &[]);
        let track = app.create("abc123", "Track 1").await;
        let id = track["id"].as_str().unwrap();

        app.call("PUT", &format!("/api/tracks/{id}/stop"), None).await;
        let (status, _) = app
            .call(
                "POST",
                &format!("/api/tracks/{id}/points"),
                Some(json!({ "lat": 1.0, "lon": 1.0 })),
            )
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_list_filters_by_clients() {
        let app = TestApp::new(None, &[]);
        app.create("x", "a").await;
        app.create("y", "b").await;

        let (status, all) = app.call("GET", "/api/tracks", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(all.as_array().unwrap().len(), 2);

        let (_, only_x) = app.call("GET", "/api/tracks?clients=x", None).await;
        let only_x = only_x.as_array().unwrap();
        assert_eq!(only_x.len(), 1);
        assert_eq!(only_x[0]["userId"], "x");
    }

    #[tokio::test]
    async fn test_admin_gated_listing() {
        let app = TestApp::new(Some("s3cret"), &["family"]);
        app.create("family", "a").await;
        let stranger = app.create("stranger", "b").await;
        let stranger_id = stranger["id"].as_str().unwrap();
        app.call("PUT", &format!("/api/tracks/{stranger_id}/stop"), None).await;

        let (_, anonymous) = app.call("GET", "/api/tracks?historical=true", None).await;
        assert_eq!(anonymous.as_array().unwrap().len(), 1);

        let admin_request = |key: &str| {
            Request::builder()
                .uri("/api/tracks?historical=true")
                .header(ADMIN_KEY_HEADER, key)
                .body(Body::empty())
                .unwrap()
        };

        let (status, admin) = app.send(admin_request("s3cret")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(admin["admin"], true);
        assert_eq!(admin["tracks"].as_array().unwrap().len(), 2);

        let (status, _) = app.send(admin_request("wrong")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_any_key_rejected_without_configured_admin() {
        let app = TestApp::new(None, &[]);
        let request = Request::builder()
            .uri("/api/tracks")
            .header(ADMIN_KEY_HEADER, "guess")
            .body(Body::empty())
            .unwrap();
        let (status, _) = app.send(request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_preflight_returns_no_content_with_cors_headers() {
        let app = TestApp::new(None, &[]);
        let request = Request::builder()
            .method("OPTIONS")
            .uri("/api/tracks")
            .header(header::ORIGIN, "http://localhost:3000")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .body(Body::empty())
            .unwrap();

        let response = app.router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "*"
        );
        assert!(
            response
                .headers()
                .contains_key(header::ACCESS_CONTROL_ALLOW_METHODS)
        );
    }

    #[tokio::test]
    async fn test_rest_mutations_reach_relay() {
        let app = TestApp::new(None, &[]);
        let mut events = app.relay.subscribe();

        let track = app.create("abc123", "Track 1").await;
        let id = track["id"].as_str().unwrap();
        app.call(
            "POST",
            &format!("/api/tracks/{id}/points"),
            Some(json!({ "lat": 59.9, "lon": 10.7, "timestamp": 1 })),
        )
        .await;
        app.call("PUT", &format!("/api/tracks/{id}/stop"), None).await;

        assert!(matches!(events.recv().await.unwrap(), TrackEvent::TrackStarted { .. }));
        assert!(matches!(events.recv().await.unwrap(), TrackEvent::TrackUpdate { .. }));
        match events.recv().await.unwrap() {
            TrackEvent::TrackStopped { track_id, user_id } => {
                assert_eq!(track_id, id);
                assert_eq!(user_id, "abc123");
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_health_check() {
        let app = TestApp::new(None, &[]);
        let response = app
            .router
            .clone()
            .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
