//! Rentfold API server binary

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use rentfold_api::{
    auth::{JwtManager, JwtSessionResolver, SessionResolver},
    routes, AppState, BillingService, Config,
};
use rentfold_billing::{
    BillingEventLogger, Reconciler, SqlxBillingStore, StripeClient, StripeConfig,
    StripeSubscriptionProvider,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env().context("loading configuration")?;

    let pool = rentfold_shared::create_pool(&config.database_url)
        .await
        .context("connecting to database")?;
    rentfold_shared::run_migrations(&pool)
        .await
        .context("running migrations")?;

    let jwt = JwtManager::new(&config.jwt_secret, config.jwt_expiry_hours);
    let sessions: Arc<dyn SessionResolver> = Arc::new(JwtSessionResolver::new(jwt));

    let billing = if config.enable_billing {
        let stripe = StripeClient::new(StripeConfig {
            secret_key: config.stripe_secret_key.clone(),
            landlord_price_id: config.stripe_price_landlord.clone(),
            trial_days: config.billing_trial_days,
        });
        let store = Arc::new(SqlxBillingStore::new(pool.clone()));
        let provider = Arc::new(StripeSubscriptionProvider::new(stripe));
        let reconciler = Reconciler::new(store.clone(), provider, config.billing_trial_days)
            .with_event_logger(BillingEventLogger::new(pool.clone()));

        Some(Arc::new(BillingService { reconciler, store }))
    } else {
        tracing::warn!("Billing is disabled; reconcile endpoints will not be mounted");
        None
    };

    let bind_address = config.bind_address.clone();
    let state = AppState {
        pool,
        config: Arc::new(config),
        sessions,
        billing,
    };

    let router = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("binding {}", bind_address))?;

    tracing::info!(address = %bind_address, "Rentfold API listening");

    axum::serve(listener, router)
        .await
        .context("server error")?;

    Ok(())
}
