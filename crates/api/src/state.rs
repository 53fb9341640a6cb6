//! Shared application state

use std::sync::Arc;

use sqlx::PgPool;

use rentfold_billing::{BillingStore, Reconciler};

use crate::auth::SessionResolver;
use crate::config::Config;

/// Billing services, present only when billing is enabled
pub struct BillingService {
    pub reconciler: Reconciler,
    pub store: Arc<dyn BillingStore>,
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
    pub sessions: Arc<dyn SessionResolver>,
    pub billing: Option<Arc<BillingService>>,
}
