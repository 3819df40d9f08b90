//! App API router.
//!
//! Returns a composable `Router` with every route under `/app/`.
//!
//! Middleware stack (outermost → innermost):
//! 1. CORS → 2. Access logger → 3. Loading gate (view routes only)

use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::api::endpoints;
use crate::api::middleware;
use crate::api::types::ApiContext;
use crate::config::DEFAULT_WEB_ORIGIN;

/// Build the app API router.
///
/// Middleware uses `Extension<ApiContext>` (injected as the outermost layer
/// of the gated routes). Endpoint handlers use `State<ApiContext>`.
pub fn app_router(ctx: ApiContext) -> Router {
    let cors = cors_layer(&ctx.config.web_origin);

    // View and operation routes: 503 LOADING until auth resolves.
    let gated = Router::new()
        .route("/session", get(endpoints::auth::current))
        .route("/onboarding", post(endpoints::onboarding::save))
        .route("/triage", post(endpoints::triage::submit))
        .route("/result", get(endpoints::triage::last))
        .route("/dashboard", get(endpoints::dashboard::view))
        .route(
            "/chat",
            get(endpoints::chat::transcript).post(endpoints::chat::send),
        )
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::loading::require_resolved))
        // Extension must be outermost so the gate can extract ApiContext
        .layer(axum::Extension(ctx.clone()));

    // Always served: health and identity provider events.
    let open = Router::new()
        .route("/health", get(endpoints::health::check))
        .route("/auth/signed-in", post(endpoints::auth::signed_in))
        .route("/auth/signed-out", post(endpoints::auth::signed_out))
        .with_state(ctx);

    Router::new()
        .nest("/app", gated)
        .nest("/app", open)
        .layer(axum::middleware::from_fn(middleware::audit::log_access))
        .layer(cors)
}

/// CORS for the web shell origin. An unparseable origin falls back to the
/// default one.
fn cors_layer(origin: &str) -> CorsLayer {
    let origin = HeaderValue::from_str(origin).unwrap_or_else(|e| {
        tracing::warn!(origin, error = %e, "Invalid web origin, using default");
        HeaderValue::from_static(DEFAULT_WEB_ORIGIN)
    });
    CorsLayer::new()
        .allow_origin(AllowOrigin::exact(origin))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use base64::Engine;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use crate::context::tests::{harness, identity, Harness, TEST_UID};
    use crate::models::result::fixtures::full_result;
    use crate::models::Demographics;
    use crate::models::Gender;
    use crate::triage_api::MockTriageApi;

    struct TestApp {
        ctx: ApiContext,
        api: Arc<MockTriageApi>,
    }

    fn test_app(api: MockTriageApi) -> TestApp {
        let Harness { ctx, api, .. } = harness(api);
        TestApp {
            ctx: Arc::new(ctx),
            api,
        }
    }

    /// Signed in with demographics, as after onboarding.
    async fn ready_app(api: MockTriageApi) -> TestApp {
        let app = test_app(api);
        crate::session::sign_in(&app.ctx, identity()).await.unwrap();
        app.ctx
            .state
            .set_demographics(Some(Demographics {
                age: 58,
                gender: Gender::Male,
            }))
            .unwrap();
        app
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, json: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("Content-Type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap()
    }

    async fn send(app: &TestApp, req: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = app_router(app.ctx.clone()).oneshot(req).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json = if body.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&body).unwrap()
        };
        (status, json)
    }

    fn triage_body() -> serde_json::Value {
        serde_json::json!({
            "symptoms": ["Chest pain", "Shortness of breath"],
            "conditions": ["Hypertension"],
            "blood_pressure": "150/95",
            "heart_rate": "118",
            "temperature": "37.1"
        })
    }

    // ── Loading gate ────────────────────────────────────────

    #[tokio::test]
    async fn view_routes_answer_loading_until_resolved() {
        let app = test_app(MockTriageApi::new());
        for uri in ["/app/session", "/app/result", "/app/dashboard", "/app/chat"] {
            let (status, json) = send(&app, get_req(uri)).await;
            assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE, "{uri}");
            assert_eq!(json["error"]["code"], "LOADING");
        }
        let (status, _) = send(&app, post_json("/app/triage", triage_body())).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn health_is_served_while_loading() {
        let app = test_app(MockTriageApi::new());
        let (status, json) = send(&app, get_req("/app/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["triage_service"], "API Online");
        assert_eq!(json["auth_resolved"], false);
    }

    // ── Auth events ─────────────────────────────────────────

    #[tokio::test]
    async fn sign_in_then_sign_out() {
        let app = test_app(MockTriageApi::new());
        let (status, json) = send(
            &app,
            post_json("/app/auth/signed-in", serde_json::to_value(identity()).unwrap()),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["restored"]["source"], "defaults");
        assert_eq!(json["session"]["auth"]["status"], "signed_in");
        assert_eq!(json["session"]["auth"]["user"]["uid"], TEST_UID);

        let (status, json) = send(&app, post_json("/app/auth/signed-out", serde_json::json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["auth"]["status"], "signed_out");
        assert!(!app.ctx.has_dashboard());

        // Resolved but signed out: views need a user.
        let (status, json) = send(&app, get_req("/app/dashboard")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json["error"]["code"], "AUTH_REQUIRED");
    }

    #[tokio::test]
    async fn onboarding_validates_and_saves() {
        let app = test_app(MockTriageApi::new());
        crate::session::sign_in(&app.ctx, identity()).await.unwrap();

        let (status, json) = send(
            &app,
            post_json("/app/onboarding", serde_json::json!({"age": "200", "gender": "Male"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(json["error"]["code"], "VALIDATION");

        let (status, json) = send(
            &app,
            post_json("/app/onboarding", serde_json::json!({"age": "44", "gender": "female"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["demographics"]["gender"], "Female");
        assert_eq!(json["saved_remotely"], true);
    }

    // ── Triage ──────────────────────────────────────────────

    #[tokio::test]
    async fn triage_without_symptoms_is_422_and_makes_no_call() {
        let app = ready_app(MockTriageApi::new().with_result(full_result())).await;
        let (status, json) = send(
            &app,
            post_json("/app/triage", serde_json::json!({"heart_rate": "80"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(json["error"]["code"], "VALIDATION");
        assert_eq!(
            json["error"]["message"],
            "Please select at least one symptom or upload a medical report"
        );
        assert_eq!(app.api.analyze_calls(), 0);
    }

    #[tokio::test]
    async fn triage_success_returns_view_and_feeds_dashboard() {
        let app = ready_app(MockTriageApi::new().with_result(full_result())).await;

        let (status, json) = send(&app, post_json("/app/triage", triage_body())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["recommendation"]["risk_level"], "High");
        assert_eq!(json["recommendation"]["tone"], "high");
        assert_eq!(json["ml"]["risk_confidence_pct"], 87);
        assert_eq!(app.api.analyze_calls(), 1);

        let (status, json) = send(&app, get_req("/app/result")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["recommendation"]["department"], "Cardiology");

        tokio::time::sleep(Duration::from_millis(50)).await;
        let (status, json) = send(&app, get_req("/app/dashboard")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["entries"].as_array().unwrap().len(), 1);
        assert_eq!(json["session_count"], 1);
        assert!(json.get("empty_state").is_none());
    }

    #[tokio::test]
    async fn triage_upstream_failure_is_502_with_exact_message() {
        let app = ready_app(MockTriageApi::new().with_failure(503, "no capacity")).await;
        let (status, json) = send(&app, post_json("/app/triage", triage_body())).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(json["error"]["code"], "UPSTREAM");
        assert_eq!(json["error"]["message"], "no capacity");

        let (status, _) = send(&app, get_req("/app/result")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn triage_rejects_text_attachment() {
        let app = ready_app(MockTriageApi::new().with_result(full_result())).await;
        let mut body = triage_body();
        body["attachment"] = serde_json::json!({
            "file_name": "notes.txt",
            "mime_type": "text/plain",
            "data_base64": base64::engine::general_purpose::STANDARD.encode(b"hello"),
        });
        let (status, json) = send(&app, post_json("/app/triage", body)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(json["error"]["code"], "ATTACHMENT");
        assert_eq!(app.api.analyze_calls(), 0);
    }

    #[tokio::test]
    async fn empty_dashboard_shows_guidance() {
        let app = ready_app(MockTriageApi::new()).await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        let (status, json) = send(&app, get_req("/app/dashboard")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["loading"], false);
        assert_eq!(json["empty_state"]["title"], "No triage history yet");
    }

    // ── Chat ────────────────────────────────────────────────

    #[tokio::test]
    async fn chat_round_trip() {
        let app = ready_app(MockTriageApi::new().with_chat_reply("Stay hydrated.")).await;

        let (status, json) = send(&app, get_req("/app/chat")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["suggestions"].as_array().unwrap().len(), 4);

        let (status, json) = send(
            &app,
            post_json("/app/chat", serde_json::json!({"message": "  Any advice?  "})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["reply"]["role"], "assistant");
        assert_eq!(json["reply"]["content"], "Stay hydrated.");

        let (_, json) = send(&app, get_req("/app/chat")).await;
        assert_eq!(json["messages"][0]["content"], "Any advice?");
        assert!(json.get("suggestions").is_none());
    }

    #[tokio::test]
    async fn empty_chat_message_is_422() {
        let app = ready_app(MockTriageApi::new()).await;
        let (status, _) = send(&app, post_json("/app/chat", serde_json::json!({"message": "  "}))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(app.api.chat_calls(), 0);
    }

    // ── CORS ────────────────────────────────────────────────

    #[tokio::test]
    async fn cors_allows_web_origin() {
        let app = test_app(MockTriageApi::new());
        let req = Request::builder()
            .uri("/app/health")
            .header("Origin", DEFAULT_WEB_ORIGIN)
            .body(Body::empty())
            .unwrap();
        let response = app_router(app.ctx.clone()).oneshot(req).await.unwrap();
        assert_eq!(
            response.headers().get("access-control-allow-origin").unwrap(),
            DEFAULT_WEB_ORIGIN
        );
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let app = test_app(MockTriageApi::new());
        let (status, _) = send(&app, get_req("/app/nonexistent")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
