//! Reconcile action identifiers
//!
//! Every billing action a landlord can trigger against their subscription is
//! one of these variants. The wire form is the kebab-case identifier carried
//! in the request body; parsing happens before dispatch so that an
//! unrecognized identifier is an explicit error case, never a fallthrough.

use serde::{Deserialize, Serialize};

/// Named billing actions accepted by the reconciler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReconcileAction {
    /// Trial ends with no payment method on file; provider cancels
    EndTrialNoPayment,
    /// Trial ends and the first payment succeeds
    EndTrialWithPayment,
    /// Trial ends and the first payment attempt fails
    EndTrialPaymentFailed,
    /// Recurring payment succeeds (also the past-due recovery path)
    SimulatePaymentSuccess,
    /// Recurring payment fails
    SimulatePaymentFailed,
    /// Provider marks the subscription past due
    SimulatePastDue,
    /// Apply the provider's current subscription state, validated
    WebhookSubscriptionUpdated,
    /// Trial ending soon; refresh the trial-end timestamp, no status change
    WebhookTrialWillEnd,
    /// Overwrite the local record from provider truth (drift repair)
    ForceSync,
    /// Administratively mark the subscription active
    SetActive,
    /// Administratively cancel the subscription
    SetCanceled,
    /// Administrative/test-only reset from canceled back to a fresh trial
    ResetToTrial,
}

impl ReconcileAction {
    pub const ALL: [ReconcileAction; 12] = [
        Self::EndTrialNoPayment,
        Self::EndTrialWithPayment,
        Self::EndTrialPaymentFailed,
        Self::SimulatePaymentSuccess,
        Self::SimulatePaymentFailed,
        Self::SimulatePastDue,
        Self::WebhookSubscriptionUpdated,
        Self::WebhookTrialWillEnd,
        Self::ForceSync,
        Self::SetActive,
        Self::SetCanceled,
        Self::ResetToTrial,
    ];

    /// Parse the wire form. `None` means the identifier is unknown and the
    /// caller must reject the request without touching the billing record.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "end-trial-no-payment" => Some(Self::EndTrialNoPayment),
            "end-trial-with-payment" => Some(Self::EndTrialWithPayment),
            "end-trial-payment-failed" => Some(Self::EndTrialPaymentFailed),
            "simulate-payment-success" => Some(Self::SimulatePaymentSuccess),
            "simulate-payment-failed" => Some(Self::SimulatePaymentFailed),
            "simulate-past-due" => Some(Self::SimulatePastDue),
            "webhook-subscription-updated" => Some(Self::WebhookSubscriptionUpdated),
            "webhook-trial-will-end" => Some(Self::WebhookTrialWillEnd),
            "force-sync" => Some(Self::ForceSync),
            "set-active" => Some(Self::SetActive),
            "set-canceled" => Some(Self::SetCanceled),
            "reset-to-trial" => Some(Self::ResetToTrial),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EndTrialNoPayment => "end-trial-no-payment",
            Self::EndTrialWithPayment => "end-trial-with-payment",
            Self::EndTrialPaymentFailed => "end-trial-payment-failed",
            Self::SimulatePaymentSuccess => "simulate-payment-success",
            Self::SimulatePaymentFailed => "simulate-payment-failed",
            Self::SimulatePastDue => "simulate-past-due",
            Self::WebhookSubscriptionUpdated => "webhook-subscription-updated",
            Self::WebhookTrialWillEnd => "webhook-trial-will-end",
            Self::ForceSync => "force-sync",
            Self::SetActive => "set-active",
            Self::SetCanceled => "set-canceled",
            Self::ResetToTrial => "reset-to-trial",
        }
    }
}

impl std::fmt::Display for ReconcileAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
