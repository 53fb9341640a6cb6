//! Billing provider interface
//!
//! The reconciler talks to the external billing provider through the
//! `SubscriptionProvider` capability so it can be exercised with fakes. The
//! production implementation wraps Stripe subscription operations keyed by
//! the external subscription identifier.

use async_trait::async_trait;
use stripe::{
    CancelSubscription, Scheduled, Subscription, SubscriptionId, UpdateSubscription,
};
use time::OffsetDateTime;

use rentfold_shared::SubscriptionStatus;

use crate::client::StripeClient;
use crate::error::{BillingError, BillingResult};

/// Provider-side view of a subscription
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderSubscription {
    pub id: String,
    pub status: SubscriptionStatus,
    pub trial_end: Option<OffsetDateTime>,
    pub cancel_at_period_end: bool,
}

/// Subscription operations the reconciler needs from the billing provider
///
/// Every operation returns the provider's acknowledged subscription state;
/// the reconciler never persists a transition the provider has not
/// acknowledged.
#[async_trait]
pub trait SubscriptionProvider: Send + Sync {
    /// Read the authoritative subscription state.
    async fn fetch(&self, subscription_id: &str) -> BillingResult<ProviderSubscription>;

    /// End the trial immediately, triggering the first collection attempt.
    async fn end_trial_now(&self, subscription_id: &str) -> BillingResult<ProviderSubscription>;

    /// Resume collection / clear a scheduled cancellation.
    async fn resume(&self, subscription_id: &str) -> BillingResult<ProviderSubscription>;

    /// Cancel the subscription immediately.
    async fn cancel_now(&self, subscription_id: &str) -> BillingResult<ProviderSubscription>;

    /// Restart a fresh trial ending at the given time.
    async fn restart_trial(
        &self,
        subscription_id: &str,
        trial_end: OffsetDateTime,
    ) -> BillingResult<ProviderSubscription>;
}

/// Stripe-backed subscription provider
pub struct StripeSubscriptionProvider {
    stripe: StripeClient,
}

impl StripeSubscriptionProvider {
    pub fn new(stripe: StripeClient) -> Self {
        Self { stripe }
    }

    fn parse_id(subscription_id: &str) -> BillingResult<SubscriptionId> {
        subscription_id
            .parse::<SubscriptionId>()
            .map_err(|e| BillingError::StripeApi(format!("Invalid subscription ID: {}", e)))
    }
}

/// Map Stripe's subscription status onto the platform's closed set.
///
/// `unpaid` and `incomplete` are collection failures (past due for our
/// purposes); `incomplete_expired` and `paused` both mean the provider gave
/// up on collecting, which this platform records as canceled.
fn map_status(status: stripe::SubscriptionStatus) -> SubscriptionStatus {
    use stripe::SubscriptionStatus as S;
    match status {
        S::Trialing => SubscriptionStatus::Trialing,
        S::Active => SubscriptionStatus::Active,
        S::PastDue | S::Unpaid | S::Incomplete => SubscriptionStatus::PastDue,
        S::Canceled | S::IncompleteExpired | S::Paused => SubscriptionStatus::Canceled,
    }
}

fn into_provider_subscription(subscription: Subscription) -> ProviderSubscription {
    ProviderSubscription {
        id: subscription.id.to_string(),
        status: map_status(subscription.status),
        trial_end: subscription
            .trial_end
            .and_then(|ts| OffsetDateTime::from_unix_timestamp(ts).ok()),
        cancel_at_period_end: subscription.cancel_at_period_end,
    }
}

#[async_trait]
impl SubscriptionProvider for StripeSubscriptionProvider {
    async fn fetch(&self, subscription_id: &str) -> BillingResult<ProviderSubscription> {
        let id = Self::parse_id(subscription_id)?;
        let subscription = Subscription::retrieve(self.stripe.inner(), &id, &[]).await?;
        Ok(into_provider_subscription(subscription))
    }

    async fn end_trial_now(&self, subscription_id: &str) -> BillingResult<ProviderSubscription> {
        let id = Self::parse_id(subscription_id)?;
        let params = UpdateSubscription {
            trial_end: Some(Scheduled::now()),
            ..Default::default()
        };
        let subscription = Subscription::update(self.stripe.inner(), &id, params).await?;

        tracing::info!(
            subscription_id = %subscription.id,
            status = %subscription.status,
            "Ended trial on Stripe subscription"
        );

        Ok(into_provider_subscription(subscription))
    }

    async fn resume(&self, subscription_id: &str) -> BillingResult<ProviderSubscription> {
        let id = Self::parse_id(subscription_id)?;
        let params = UpdateSubscription {
            cancel_at_period_end: Some(false),
            ..Default::default()
        };
        let subscription = Subscription::update(self.stripe.inner(), &id, params).await?;

        tracing::info!(
            subscription_id = %subscription.id,
            status = %subscription.status,
            "Resumed Stripe subscription"
        );

        Ok(into_provider_subscription(subscription))
    }

    async fn cancel_now(&self, subscription_id: &str) -> BillingResult<ProviderSubscription> {
        let id = Self::parse_id(subscription_id)?;
        let subscription = Subscription::cancel(
            self.stripe.inner(),
            &id,
            CancelSubscription::default(),
        )
        .await?;

        tracing::info!(
            subscription_id = %subscription.id,
            "Canceled Stripe subscription"
        );

        Ok(into_provider_subscription(subscription))
    }

    async fn restart_trial(
        &self,
        subscription_id: &str,
        trial_end: OffsetDateTime,
    ) -> BillingResult<ProviderSubscription> {
        let id = Self::parse_id(subscription_id)?;
        let params = UpdateSubscription {
            trial_end: Some(Scheduled::at(trial_end.unix_timestamp())),
            ..Default::default()
        };
        let subscription = Subscription::update(self.stripe.inner(), &id, params).await?;

        tracing::info!(
            subscription_id = %subscription.id,
            trial_end = %trial_end,
            "Restarted trial on Stripe subscription"
        );

        Ok(into_provider_subscription(subscription))
    }
}
