// [[GATEKEEPER]]/apps/gatekeeper/src/security.rs
// Purpose: Upstream session verification seam and the principal extractor for handlers.
// Architecture: API Boundary
// Dependencies: Axum, async-trait, serde_json

use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use std::collections::HashMap;
use std::fs;

use crate::error::{ConfigError, GateError};
use crate::models::{Principal, SessionClaims};

/// The one place this service talks to identity. Credential checks, token
/// formats and sessions all live behind it.
#[async_trait]
pub trait SessionVerifier: Send + Sync {
    async fn verify(&self, headers: &HeaderMap) -> Option<SessionClaims>;
}

/// Bearer token -> claims table. Stands in for the identity provider in
/// local deployments and tests.
#[derive(Debug, Default)]
pub struct StaticTokenVerifier {
    sessions: HashMap<String, SessionClaims>,
}

impl StaticTokenVerifier {
    pub fn new(sessions: HashMap<String, SessionClaims>) -> Self {
        Self { sessions }
    }

    pub fn load_from_disk(path: &str) -> Result<Self, ConfigError> {
        let data = match fs::read_to_string(path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!("Session file not found at '{}'. No tokens will verify.", path);
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_string(),
                    source,
                })
            }
        };

        let sessions: HashMap<String, SessionClaims> =
            serde_json::from_str(&data).map_err(|source| ConfigError::Parse {
                path: path.to_string(),
                source,
            })?;

        tracing::info!("Loaded {} static sessions from {}", sessions.len(), path);
        Ok(Self::new(sessions))
    }
}

#[async_trait]
impl SessionVerifier for StaticTokenVerifier {
    async fn verify(&self, headers: &HeaderMap) -> Option<SessionClaims> {
        let token = bearer_token(headers)?;
        self.sessions.get(token).cloned()
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Principal admitted by the route guard.
pub struct AuthedPrincipal(pub Principal);

#[async_trait]
impl<S> FromRequestParts<S> for AuthedPrincipal
where
    S: Send + Sync,
{
    type Rejection = GateError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Only present when the route guard ran and admitted the caller.
        parts
            .extensions
            .get::<Principal>()
            .cloned()
            .map(AuthedPrincipal)
            .ok_or(GateError::Unauthenticated)
    }
}
