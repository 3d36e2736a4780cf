pub mod handlers;

use axum::{
    middleware,
    routing::{get, MethodRouter},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::directory::ResourceDirectory;
use crate::gate::{guard, screen, with_security_headers, Access, Gatekeeper, RouteGuard};
use crate::models::Role;

const ADMIN_ONLY: &[Role] = &[Role::Admin];

#[derive(Clone)]
pub struct AppState {
    pub gate: Arc<Gatekeeper>,
    pub directory: Arc<ResourceDirectory>,
}

fn gated(gate: &Arc<Gatekeeper>, access: Access, route: MethodRouter<AppState>) -> MethodRouter<AppState> {
    route.route_layer(middleware::from_fn_with_state(
        RouteGuard::new(Arc::clone(gate), access),
        guard,
    ))
}

pub fn build_router(state: AppState) -> Router {
    let gate = Arc::clone(&state.gate);

    let router = Router::new()
        .route("/health", gated(&gate, Access::Public, get(handlers::health)))
        .route("/api/me", gated(&gate, Access::Authenticated, get(handlers::me)))
        .route(
            "/api/users/:user_id/settings",
            gated(
                &gate,
                Access::Authenticated,
                get(handlers::get_settings)
                    .put(handlers::update_settings)
                    .post(handlers::update_settings),
            ),
        )
        .route("/api/projects/:id", gated(&gate, Access::Authenticated, get(handlers::get_project)))
        .route("/api/tasks/:id", gated(&gate, Access::Authenticated, get(handlers::get_task)))
        .route("/api/files/:id", gated(&gate, Access::Authenticated, get(handlers::get_file)))
        .route("/api/admin/stats", gated(&gate, Access::Roles(ADMIN_ONLY), get(handlers::admin_stats)))
        // Router-wide, so the 404 fallback and 405s are screened as well.
        .layer(middleware::from_fn_with_state(Arc::clone(&gate), screen))
        .with_state(state);

    with_security_headers(router).layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RateBudget;
    use crate::gate::SECURITY_HEADERS;
    use crate::models::{ProjectRef, SessionClaims};
    use crate::rate_limit::{LocalCounterStore, RateLimiter};
    use crate::security::StaticTokenVerifier;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, Response, StatusCode};
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use tower::ServiceExt;

    const HOST: &str = "app.example.com";

    fn claims(sub: &str, role: Option<&str>) -> SessionClaims {
        SessionClaims {
            sub: Some(sub.to_string()),
            role: role.map(String::from),
            email: None,
        }
    }

    fn app(read_max: u64, write_max: u64) -> Router {
        let mut sessions = HashMap::new();
        sessions.insert("tok-a".to_string(), claims("A", Some("STUDENT")));
        sessions.insert("tok-b".to_string(), claims("B", Some("STUDENT")));
        sessions.insert("tok-c".to_string(), claims("C", Some("COUNSELOR")));
        sessions.insert("tok-admin".to_string(), claims("Z", Some("ADMIN")));
        sessions.insert("tok-norole".to_string(), claims("N", None));

        let directory = ResourceDirectory::new();
        directory.insert_project(
            "p1",
            ProjectRef {
                student_id: "A".to_string(),
                counselor_id: Some("C".to_string()),
            },
        );
        directory.insert_milestone("m1", "p1");
        directory.insert_task("t1", "m1");
        directory.insert_file("f-linked", "A", Some("p1"));
        directory.insert_file("f-orphan", "A", None);

        let gate = Gatekeeper::new(
            RateLimiter::local_only(LocalCounterStore::new()),
            Arc::new(StaticTokenVerifier::new(sessions)),
            RateBudget {
                read_max,
                write_max,
                window_ms: 60_000,
            },
        );

        build_router(AppState {
            gate: Arc::new(gate),
            directory: Arc::new(directory),
        })
    }

    fn get_request(uri: &str, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method("GET").uri(uri).header("host", HOST);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        builder.body(Body::empty()).unwrap()
    }

    fn mutation(method: &str, uri: &str, token: &str, origin: Option<&str>, body: Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("host", HOST)
            .header("content-type", "application/json")
            .header("authorization", format!("Bearer {}", token));
        if let Some(origin) = origin {
            builder = builder.header("origin", origin);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn send(app: &Router, req: Request<Body>) -> Response<Body> {
        app.clone().oneshot(req).await.unwrap()
    }

    async fn json_body(response: Response<Body>) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn assert_security_headers(response: &Response<Body>) {
        for (name, value) in SECURITY_HEADERS {
            assert_eq!(
                response.headers().get(name).and_then(|v| v.to_str().ok()),
                Some(value),
                "missing {}",
                name
            );
        }
    }

    #[tokio::test]
    async fn test_unauthenticated_request_is_401() {
        let app = app(100, 100);
        let response = send(&app, get_request("/api/me", None)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_security_headers(&response);
        assert_eq!(json_body(response).await, json!({ "error": "Unauthorized" }));

        let response = send(&app, get_request("/api/me", Some("forged"))).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_student_on_admin_route_is_403() {
        let app = app(100, 100);
        let response = send(&app, get_request("/api/admin/stats", Some("tok-a"))).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_security_headers(&response);
        assert_eq!(json_body(response).await, json!({ "error": "Forbidden" }));

        // No role claim at all lands on the least privileged role.
        let response = send(&app, get_request("/api/admin/stats", Some("tok-norole"))).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let response = send(&app, get_request("/api/me", Some("tok-norole"))).await;
        assert_eq!(json_body(response).await["role"], "STUDENT");
    }

    #[tokio::test]
    async fn test_admin_stats() {
        let app = app(100, 100);
        send(&app, get_request("/api/me", None)).await;
        let response = send(&app, get_request("/api/admin/stats", Some("tok-admin"))).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["unauthenticated"], 1);
        assert_eq!(body["admitted"], 1);
        assert_eq!(body["shared_backend"], false);
    }

    #[tokio::test]
    async fn test_self_scoped_settings() {
        let app = app(100, 100);

        let response = send(&app, get_request("/api/users/A/settings", Some("tok-a"))).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_security_headers(&response);
        assert_eq!(json_body(response).await["user_id"], "A");

        let response = send(&app, get_request("/api/users/B/settings", Some("tok-a"))).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(json_body(response).await, json!({ "error": "Forbidden" }));

        let response = send(&app, get_request("/api/users/B/settings", Some("tok-admin"))).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_same_origin_update_passes() {
        let app = app(100, 100);
        let origin = format!("https://{}", HOST);

        let response = send(
            &app,
            mutation("PUT", "/api/users/A/settings", "tok-a", Some(&origin), json!({ "locale": "fr" })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        // Non-browser client: no Origin header at all.
        let response = send(
            &app,
            mutation("POST", "/api/users/A/settings", "tok-a", None, json!({ "locale": "de" })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = send(&app, get_request("/api/users/A/settings", Some("tok-a"))).await;
        assert_eq!(json_body(response).await["settings"]["locale"], "de");
    }

    #[tokio::test]
    async fn test_cross_origin_post_is_rejected_first() {
        // With a write budget of 1 the second POST would be 429 and the forged
        // token would be 401 if either check ran; CSRF must answer first.
        let app = app(100, 1);

        for _ in 0..3 {
            let response = send(
                &app,
                mutation("POST", "/api/users/A/settings", "forged", Some("https://evil.example.net"), json!({})),
            )
            .await;
            assert_eq!(response.status(), StatusCode::FORBIDDEN);
            assert_security_headers(&response);
            assert_eq!(
                json_body(response).await,
                json!({ "error": "CSRF validation failed: origin mismatch" })
            );
        }

        let response = send(&app, get_request("/api/admin/stats", Some("tok-admin"))).await;
        let body = json_body(response).await;
        assert_eq!(body["csrf_rejected"], 3);
        assert_eq!(body["rate_limited"], 0);
        assert_eq!(body["unauthenticated"], 0);
    }

    #[tokio::test]
    async fn test_read_budget_exhausts_on_21st_get() {
        let app = app(20, 5);
        for i in 0..20 {
            let response = send(&app, get_request("/api/me", Some("tok-a"))).await;
            assert_eq!(response.status(), StatusCode::OK, "request {} should pass", i + 1);
        }

        let response = send(&app, get_request("/api/me", Some("tok-a"))).await;
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_security_headers(&response);
        assert_eq!(
            json_body(response).await,
            json!({ "error": "Too many requests. Please try again later." })
        );

        // Another client address has its own budget.
        let mut req = get_request("/api/me", Some("tok-a"));
        req.headers_mut().insert("x-forwarded-for", "203.0.113.7".parse().unwrap());
        assert_eq!(send(&app, req).await.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_project_not_found_and_forbidden_are_distinct() {
        let app = app(100, 100);

        let response = send(&app, get_request("/api/projects/missing", Some("tok-b"))).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(response).await, json!({ "error": "Project not found" }));

        let response = send(&app, get_request("/api/projects/p1", Some("tok-b"))).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        for token in ["tok-a", "tok-c", "tok-admin"] {
            let response = send(&app, get_request("/api/projects/p1", Some(token))).await;
            assert_eq!(response.status(), StatusCode::OK, "{} should see p1", token);
        }
    }

    #[tokio::test]
    async fn test_task_and_file_access() {
        let app = app(100, 100);

        assert_eq!(send(&app, get_request("/api/tasks/t1", Some("tok-c"))).await.status(), StatusCode::OK);
        assert_eq!(send(&app, get_request("/api/tasks/t1", Some("tok-b"))).await.status(), StatusCode::FORBIDDEN);
        assert_eq!(send(&app, get_request("/api/tasks/t9", Some("tok-a"))).await.status(), StatusCode::NOT_FOUND);

        assert_eq!(send(&app, get_request("/api/files/f-linked", Some("tok-c"))).await.status(), StatusCode::OK);
        assert_eq!(send(&app, get_request("/api/files/f-orphan", Some("tok-a"))).await.status(), StatusCode::OK);
        assert_eq!(
            send(&app, get_request("/api/files/f-orphan", Some("tok-c"))).await.status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(send(&app, get_request("/api/files/f-orphan", Some("tok-admin"))).await.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_public_health_carries_security_headers() {
        let app = app(100, 100);
        let response = send(&app, get_request("/health", None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_security_headers(&response);
        assert_eq!(json_body(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn test_unmatched_paths_are_rate_limited() {
        let app = app(1, 1);

        let response = send(&app, get_request("/nope", None)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_security_headers(&response);

        for _ in 0..2 {
            let response = send(&app, get_request("/nope", None)).await;
            assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
            assert_security_headers(&response);
        }
    }

    #[tokio::test]
    async fn test_cross_origin_unrouted_method_is_csrf_rejected() {
        let app = app(100, 100);

        let response = send(
            &app,
            mutation("DELETE", "/api/projects/p1", "tok-a", Some("https://evil.example.net"), json!({})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_security_headers(&response);
        assert_eq!(
            json_body(response).await,
            json!({ "error": "CSRF validation failed: origin mismatch" })
        );

        // Same origin gets through the screen and meets the router's 405.
        let origin = format!("https://{}", HOST);
        let response = send(&app, mutation("DELETE", "/api/projects/p1", "tok-a", Some(&origin), json!({}))).await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
