//! Rentfold API Library
//!
//! This crate contains the HTTP surface for Rentfold: the route guard,
//! session resolution, configuration, and the billing reconcile endpoint.

pub mod auth;
pub mod config;
pub mod error;
pub mod guard;
pub mod routes;
pub mod state;

pub use config::Config;
pub use error::{ApiError, ApiResult};
pub use state::{AppState, BillingService};
