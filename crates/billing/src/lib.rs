//! Rentfold Billing
//!
//! Subscription state reconciliation for landlord billing records: the named
//! billing actions, the Stripe-backed provider interface, the billing-record
//! store, and the append-only billing event log.

pub mod action;
pub mod client;
pub mod error;
pub mod events;
pub mod provider;
pub mod reconciler;
pub mod store;

pub use action::ReconcileAction;
pub use client::{StripeClient, StripeConfig};
pub use error::{BillingError, BillingResult};
pub use events::{BillingEvent, BillingEventLogger};
pub use provider::{ProviderSubscription, StripeSubscriptionProvider, SubscriptionProvider};
pub use reconciler::{ReconcileOutcome, Reconciler};
pub use store::{BillingPatch, BillingStore, SqlxBillingStore};
