//! Session resolution
//!
//! Turns an incoming request's credentials into a [`Session`], or nothing.
//! The resolver is an injected capability so the route guard and the billing
//! endpoints can be exercised with fakes; the production implementation
//! validates a Rentfold-issued JWT carried in a cookie or bearer header.
//!
//! Resolution always fails closed: a missing, malformed, or expired token —
//! or a role string outside the closed role set — yields no session.

use async_trait::async_trait;
use axum::http::{header, HeaderMap};
use uuid::Uuid;

use rentfold_shared::UserRole;

use crate::auth::jwt::JwtManager;

/// Name of the session cookie set at sign-in
pub const SESSION_COOKIE: &str = "rentfold_session";

/// An authenticated session, derived per-request and read-only
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: Uuid,
    pub role: UserRole,
    pub needs_profile_setup: bool,
}

/// Capability for turning request headers into a session
#[async_trait]
pub trait SessionResolver: Send + Sync {
    /// Resolve the session for a request, or `None` if unauthenticated.
    async fn resolve(&self, headers: &HeaderMap) -> Option<Session>;
}

/// JWT-backed session resolver
pub struct JwtSessionResolver {
    jwt: JwtManager,
}

impl JwtSessionResolver {
    pub fn new(jwt: JwtManager) -> Self {
        Self { jwt }
    }

    /// Pull the session token from the cookie header, falling back to a
    /// bearer Authorization header (used by API clients).
    fn extract_token(headers: &HeaderMap) -> Option<String> {
        if let Some(cookie_header) = headers.get(header::COOKIE).and_then(|v| v.to_str().ok()) {
            for pair in cookie_header.split(';') {
                let mut parts = pair.trim().splitn(2, '=');
                if parts.next() == Some(SESSION_COOKIE) {
                    if let Some(value) = parts.next() {
                        if !value.is_empty() {
                            return Some(value.to_string());
                        }
                    }
                }
            }
        }

        headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::to_string)
    }
}

#[async_trait]
impl SessionResolver for JwtSessionResolver {
    async fn resolve(&self, headers: &HeaderMap) -> Option<Session> {
        let token = Self::extract_token(headers)?;

        let claims = match self.jwt.validate_token(&token) {
            Ok(claims) => claims,
            Err(e) => {
                tracing::debug!(error = %e, "Session token rejected");
                return None;
            }
        };

        let role = match UserRole::parse(&claims.role) {
            Some(role) => role,
            None => {
                tracing::warn!(role = %claims.role, "Session token carried unknown role");
                return None;
            }
        };

        Some(Session {
            user_id: claims.sub,
            role,
            needs_profile_setup: claims.needs_profile_setup,
        })
    }
}
