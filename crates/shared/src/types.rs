//! Core domain types shared across the Rentfold platform

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Platform-level user role
///
/// Roles are closed: a persisted or token-borne role string that does not
/// parse to one of these variants is treated as invalid by callers (the
/// session layer drops the session rather than guessing).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    Landlord,
    Tenant,
    Vendor,
}

impl UserRole {
    /// Parse a role from its wire/database form. Unknown strings are an
    /// error, not a default: authorization code must fail closed.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "admin" => Some(Self::Admin),
            "landlord" => Some(Self::Landlord),
            "tenant" => Some(Self::Tenant),
            "vendor" => Some(Self::Vendor),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Landlord => "landlord",
            Self::Tenant => "tenant",
            Self::Vendor => "vendor",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Self::Admin)
    }

    pub fn is_landlord(&self) -> bool {
        matches!(self, Self::Landlord)
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Subscription status mirrored from the billing provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Trialing,
    Active,
    PastDue,
    Canceled,
}

impl Default for SubscriptionStatus {
    fn default() -> Self {
        Self::Trialing
    }
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trialing => "trialing",
            Self::Active => "active",
            Self::PastDue => "past_due",
            Self::Canceled => "canceled",
        }
    }

    /// Parse a status from its wire/database form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "trialing" => Some(Self::Trialing),
            "active" => Some(Self::Active),
            "past_due" => Some(Self::PastDue),
            "canceled" => Some(Self::Canceled),
            _ => None,
        }
    }

    /// Whether the subscription currently grants access to paid features.
    pub fn is_usable(&self) -> bool {
        matches!(self, Self::Trialing | Self::Active)
    }

    /// Check whether a transition to `to` is allowed by the billing state
    /// machine. Same-status transitions are always allowed so that
    /// re-applying the current state (force-sync, repeated set-active) is a
    /// no-op rather than an error.
    ///
    /// Canceled is terminal for normal billing events; it can only be left
    /// through the explicit administrative reset back to Trialing.
    pub fn can_transition_to(&self, to: SubscriptionStatus) -> bool {
        if *self == to {
            return true;
        }

        match self {
            Self::Trialing => matches!(to, Self::Active | Self::PastDue | Self::Canceled),
            Self::Active => matches!(to, Self::PastDue | Self::Canceled),
            Self::PastDue => matches!(to, Self::Active | Self::Canceled),
            Self::Canceled => matches!(to, Self::Trialing),
        }
    }
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A landlord's billing record, mirrored from the billing provider
///
/// Mutated exclusively by the subscription reconciler. `status` always
/// reflects the most recent provider event applied; `force-sync` repairs any
/// drift by overwriting the row from provider state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct BillingRecord {
    pub landlord_id: Uuid,
    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
    pub status: SubscriptionStatus,
    pub trial_ends_at: Option<OffsetDateTime>,
    pub past_due_since: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl BillingRecord {
    /// Whether the landlord ever subscribed. A record without an external
    /// subscription identifier has nothing to reconcile.
    pub fn has_subscription(&self) -> bool {
        self.stripe_subscription_id.is_some()
    }
}
