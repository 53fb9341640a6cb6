//! Route guard
//!
//! Decides, before any protected content is served, whether a request passes
//! through or gets redirected, based only on the path's classification and
//! the resolved session. The policy is an ordered rule table evaluated
//! top-to-bottom with first-match-wins: the two security gates come first
//! and short-circuit before any of the convenience redirects can fire.
//!
//! The guard itself is synchronous and side-effect free; the middleware
//! adapter owns the single async step (session resolution) and the redirect
//! response.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};

use rentfold_shared::UserRole;

use crate::auth::Session;
use crate::state::AppState;

/// Well-known page paths
pub const LANDING_PATH: &str = "/";
pub const SIGN_IN_PATH: &str = "/sign-in";
pub const PROFILE_SETUP_PATH: &str = "/complete-profile";
pub const DASHBOARD_PATH: &str = "/dashboard";

/// Classification of a request path, computed per request and never persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    /// The public landing page
    Landing,
    /// Sign-in / sign-up / password-reset pages
    Auth,
    /// The one-time post-signup profile completion page
    ProfileSetup,
    /// Pages requiring any authenticated session
    Protected,
    /// Pages requiring an admin session
    Admin,
    /// Anything else (public content)
    Other,
}

impl RouteClass {
    pub fn classify(path: &str) -> Self {
        if path == LANDING_PATH {
            return Self::Landing;
        }
        if matches_prefix(path, SIGN_IN_PATH)
            || matches_prefix(path, "/sign-up")
            || matches_prefix(path, "/forgot-password")
        {
            return Self::Auth;
        }
        if matches_prefix(path, PROFILE_SETUP_PATH) {
            return Self::ProfileSetup;
        }
        if matches_prefix(path, "/admin") {
            return Self::Admin;
        }
        if matches_prefix(path, DASHBOARD_PATH) {
            return Self::Protected;
        }
        Self::Other
    }

    fn requires_session(&self) -> bool {
        matches!(self, Self::Protected | Self::Admin)
    }
}

/// `/admin` matches, `/admin/users` matches, `/administrate` does not.
fn matches_prefix(path: &str, prefix: &str) -> bool {
    path == prefix
        || (path.starts_with(prefix) && path.as_bytes().get(prefix.len()) == Some(&b'/'))
}

/// Paths the guard never sees: static assets and API/infrastructure routes,
/// which carry their own auth.
pub fn is_excluded(path: &str) -> bool {
    matches_prefix(path, "/api")
        || matches_prefix(path, "/health")
        || matches_prefix(path, "/assets")
        || path == "/favicon.ico"
        || path == "/robots.txt"
}

/// Outcome of evaluating the guard for one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// Let the request through unmodified
    Allow,
    /// Send to sign-in, carrying the original path so the user returns there
    ToSignIn { callback: String },
    /// Send to the default dashboard
    ToDashboard,
    /// Send to the profile completion page
    ToProfileSetup,
}

impl GuardDecision {
    /// The redirect target URL, or `None` for [`GuardDecision::Allow`].
    pub fn redirect_target(&self) -> Option<String> {
        match self {
            Self::Allow => None,
            Self::ToSignIn { callback } => {
                let encoded: String =
                    url::form_urlencoded::byte_serialize(callback.as_bytes()).collect();
                Some(format!("{}?callbackUrl={}", SIGN_IN_PATH, encoded))
            }
            Self::ToDashboard => Some(DASHBOARD_PATH.to_string()),
            Self::ToProfileSetup => Some(PROFILE_SETUP_PATH.to_string()),
        }
    }
}

struct GuardContext<'a> {
    path: &'a str,
    class: RouteClass,
    session: Option<&'a Session>,
}

impl GuardContext<'_> {
    fn role(&self) -> Option<UserRole> {
        self.session.map(|s| s.role)
    }

    fn needs_profile_setup(&self) -> bool {
        self.session.map(|s| s.needs_profile_setup).unwrap_or(false)
    }
}

/// One entry in the guard's decision policy
struct GuardRule {
    name: &'static str,
    matches: fn(&GuardContext) -> bool,
    decide: fn(&GuardContext) -> GuardDecision,
}

/// The decision policy, in strict priority order. Rules 1-2 are the
/// security gates; rules 3-5 are UX redirects that only apply once a
/// session is confirmed present (and, for admin paths, authorized).
///
/// The admin exemption in `complete-profile` is deliberate: admin accounts
/// are provisioned without the consumer-facing profile-completion flow.
const RULES: &[GuardRule] = &[
    GuardRule {
        name: "require-session",
        matches: |ctx| ctx.class.requires_session() && ctx.session.is_none(),
        decide: |ctx| GuardDecision::ToSignIn {
            callback: ctx.path.to_string(),
        },
    },
    GuardRule {
        name: "admin-only",
        matches: |ctx| {
            ctx.class == RouteClass::Admin
                && ctx.session.is_some()
                && ctx.role() != Some(UserRole::Admin)
        },
        decide: |_| GuardDecision::ToDashboard,
    },
    GuardRule {
        name: "complete-profile",
        matches: |ctx| {
            ctx.session.is_some()
                && ctx.needs_profile_setup()
                && ctx.role() != Some(UserRole::Admin)
                && ctx.class != RouteClass::ProfileSetup
                && ctx.class != RouteClass::Auth
        },
        decide: |_| GuardDecision::ToProfileSetup,
    },
    GuardRule {
        name: "profile-already-complete",
        matches: |ctx| {
            ctx.session.is_some()
                && !ctx.needs_profile_setup()
                && ctx.class == RouteClass::ProfileSetup
        },
        decide: |_| GuardDecision::ToDashboard,
    },
    GuardRule {
        name: "already-authenticated",
        matches: |ctx| {
            ctx.session.is_some()
                && !ctx.needs_profile_setup()
                && matches!(ctx.class, RouteClass::Auth | RouteClass::Landing)
        },
        decide: |_| GuardDecision::ToDashboard,
    },
];

/// Evaluate the guard for a path and session. Every branch terminates in a
/// defined decision; the guard never errors.
pub fn evaluate(path: &str, session: Option<&Session>) -> GuardDecision {
    let ctx = GuardContext {
        path,
        class: RouteClass::classify(path),
        session,
    };

    for rule in RULES {
        if (rule.matches)(&ctx) {
            let decision = (rule.decide)(&ctx);
            tracing::debug!(
                path = %path,
                rule = rule.name,
                decision = ?decision,
                "Route guard matched"
            );
            return decision;
        }
    }

    GuardDecision::Allow
}

/// Axum middleware adapter: resolve the session once, evaluate, and either
/// pass the request through or answer with the redirect.
pub async fn route_guard(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let path = req.uri().path().to_string();

    if is_excluded(&path) {
        return next.run(req).await;
    }

    let session = state.sessions.resolve(req.headers()).await;

    match evaluate(&path, session.as_ref()).redirect_target() {
        None => next.run(req).await,
        Some(target) => Redirect::temporary(&target).into_response(),
    }
}
