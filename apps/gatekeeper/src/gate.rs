// [[GATEKEEPER]]/apps/gatekeeper/src/gate.rs
// Purpose: Per-request admission. CSRF -> rate limit (every request) -> principal -> role gate (matched routes).
// Architecture: API Layer
// Dependencies: Axum, Tower-HTTP, Tracing, Uuid

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, HeaderName, HeaderValue, Method, Request, Uri},
    middleware::Next,
    response::{IntoResponse, Response},
    Router,
};
use std::sync::Arc;
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::RateBudget;
use crate::csrf;
use crate::error::GateError;
use crate::models::{Principal, Role};
use crate::observability::GateStats;
use crate::rate_limit::{RateDecision, RateLimiter};
use crate::role_gate;
use crate::security::SessionVerifier;

/// Used when neither forwarding header names the client.
pub const FALLBACK_CLIENT_IP: &str = "127.0.0.1";

/// Sent on every response, whatever the gate decided.
pub const SECURITY_HEADERS: [(&str, &str); 5] = [
    ("x-content-type-options", "nosniff"),
    ("x-frame-options", "DENY"),
    ("referrer-policy", "strict-origin-when-cross-origin"),
    ("strict-transport-security", "max-age=63072000; includeSubDomains"),
    ("permissions-policy", "camera=(), microphone=(), geolocation=()"),
];

/// What a route demands of its caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// CSRF and rate limiting only.
    Public,
    /// Any role, as long as someone is signed in.
    Authenticated,
    Roles(&'static [Role]),
}

pub struct Gatekeeper {
    limiter: RateLimiter,
    verifier: Arc<dyn SessionVerifier>,
    budget: RateBudget,
    stats: GateStats,
}

impl Gatekeeper {
    pub fn new(limiter: RateLimiter, verifier: Arc<dyn SessionVerifier>, budget: RateBudget) -> Self {
        Gatekeeper {
            limiter,
            verifier,
            budget,
            stats: GateStats::default(),
        }
    }

    pub fn stats(&self) -> &GateStats {
        &self.stats
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Request-wide stage: CSRF, then rate limit. Runs for every request,
    /// matched route or not.
    pub async fn screen(&self, method: &Method, uri: &Uri, headers: &HeaderMap) -> Result<(), GateError> {
        let outcome = self.check_origin_and_budget(method, uri, headers).await;
        if let Err(e) = &outcome {
            self.stats.record_rejection(e);
        }
        outcome
    }

    /// Route stage: principal and role gate for what the matched route demands.
    pub async fn authorize(&self, headers: &HeaderMap, access: Access) -> Result<Option<Principal>, GateError> {
        let outcome = self.resolve_principal(headers, access).await;
        match &outcome {
            Ok(_) => self.stats.record_admitted(),
            Err(e) => self.stats.record_rejection(e),
        }
        outcome
    }

    async fn check_origin_and_budget(&self, method: &Method, uri: &Uri, headers: &HeaderMap) -> Result<(), GateError> {
        // 1. CSRF, before anything else is spent on the request
        let host = request_host(uri, headers);
        if csrf::is_mutating(method) && !csrf::is_same_origin(header_str(headers, "origin"), host) {
            tracing::warn!(
                "CSRF rejected: origin {:?} does not match host {:?}",
                header_str(headers, "origin"),
                host
            );
            return Err(GateError::CsrfRejected);
        }

        // 2. Rate limit
        let (key, max_requests) = self.rate_key(method, headers);
        if self.limiter.check(&key, max_requests, self.budget.window_ms).await == RateDecision::Limited {
            tracing::warn!("Rate limit exceeded for {}", key);
            return Err(GateError::RateLimited);
        }

        Ok(())
    }

    async fn resolve_principal(&self, headers: &HeaderMap, access: Access) -> Result<Option<Principal>, GateError> {
        let allowed_roles = match access {
            Access::Public => return Ok(None),
            Access::Authenticated => None,
            Access::Roles(roles) => Some(roles),
        };

        let principal = match self.verifier.verify(headers).await {
            Some(claims) => Principal::from_claims(&claims),
            None => None,
        };

        let principal = role_gate::authorize(principal, allowed_roles)
            .into_result()
            .map_err(|e| {
                tracing::warn!("Role gate rejected request: {}", e);
                e
            })?;

        tracing::debug!("Admitted {} as {}", principal.user_id, principal.role);
        Ok(Some(principal))
    }

    fn rate_key(&self, method: &Method, headers: &HeaderMap) -> (String, u64) {
        let (class, max_requests) = if csrf::is_mutating(method) {
            ("write", self.budget.write_max)
        } else {
            ("read", self.budget.read_max)
        };
        (format!("{}:{}", client_ip(headers), class), max_requests)
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// `Host` header, else the request-target authority (HTTP/2 `:authority`).
fn request_host<'a>(uri: &'a Uri, headers: &'a HeaderMap) -> Option<&'a str> {
    header_str(headers, "host").or_else(|| uri.authority().map(|a| a.as_str()))
}

/// First `X-Forwarded-For` hop, else `X-Real-IP`, else loopback.
pub fn client_ip(headers: &HeaderMap) -> String {
    header_str(headers, "x-forwarded-for")
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .or_else(|| {
            header_str(headers, "x-real-ip")
                .map(str::trim)
                .filter(|ip| !ip.is_empty())
        })
        .unwrap_or(FALLBACK_CLIENT_IP)
        .to_string()
}

/// Router-wide middleware. Unknown paths and unrouted methods are screened
/// too; only the role check waits for a matched route.
pub async fn screen(State(gate): State<Arc<Gatekeeper>>, req: Request<Body>, next: Next) -> Response {
    let span = tracing::info_span!(
        "gate",
        request_id = %Uuid::new_v4(),
        method = %req.method(),
        path = %req.uri().path()
    );

    async move {
        let outcome = gate.screen(req.method(), req.uri(), req.headers()).await;
        match outcome {
            Ok(()) => next.run(req).await,
            Err(e) => e.into_response(),
        }
    }
    .instrument(span)
    .await
}

/// Middleware state for one route: the shared gate plus that route's demand.
#[derive(Clone)]
pub struct RouteGuard {
    gate: Arc<Gatekeeper>,
    access: Access,
}

impl RouteGuard {
    pub fn new(gate: Arc<Gatekeeper>, access: Access) -> Self {
        RouteGuard { gate, access }
    }
}

pub async fn guard(State(guard): State<RouteGuard>, mut req: Request<Body>, next: Next) -> Response {
    let outcome = guard.gate.authorize(req.headers(), guard.access).await;
    match outcome {
        Ok(principal) => {
            if let Some(principal) = principal {
                req.extensions_mut().insert(principal);
            }
            next.run(req).await
        }
        Err(e) => e.into_response(),
    }
}

pub fn with_security_headers<S>(mut router: Router<S>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    for (name, value) in SECURITY_HEADERS {
        router = router.layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        ));
    }
    router
}
