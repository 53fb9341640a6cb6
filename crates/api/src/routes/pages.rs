//! Placeholder page handlers
//!
//! The real pages are server-rendered elsewhere; these handlers exist so the
//! route guard has a surface to protect and so redirect behavior can be
//! exercised end-to-end.

use axum::response::Html;

pub async fn landing() -> Html<&'static str> {
    Html("<h1>Rentfold</h1><p>Property management for landlords, tenants, and vendors.</p>")
}

pub async fn sign_in() -> Html<&'static str> {
    Html("<h1>Sign in</h1>")
}

pub async fn sign_up() -> Html<&'static str> {
    Html("<h1>Create your account</h1>")
}

pub async fn complete_profile() -> Html<&'static str> {
    Html("<h1>Complete your profile</h1>")
}

pub async fn dashboard() -> Html<&'static str> {
    Html("<h1>Dashboard</h1>")
}

pub async fn admin_overview() -> Html<&'static str> {
    Html("<h1>System overview</h1>")
}
