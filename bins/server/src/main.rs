//! Clinipay API Server
//!
//! Main entry point for the payment reconciliation and ledger service.

use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use clinipay_api::{AppState, create_router};
use clinipay_core::ledger::LedgerWriter;
use clinipay_core::locks::KeyedLocks;
use clinipay_core::payment::PaymentReconciler;
use clinipay_core::refund::RefundCoordinator;
use clinipay_core::revenue::RevenueAggregator;
use clinipay_core::storage::{StorageConfig, StorageService};
use clinipay_core::webhook::WebhookVerifier;
use clinipay_db::{
    LedgerRepository, PaymentRepository, ProcessedEventRepository, RefundRepository, connect,
};
use clinipay_processor::ProcessorClient;
use clinipay_shared::{AppConfig, JwtService};

/// Headroom over the proof size limit for the other multipart fields.
const MULTIPART_OVERHEAD_BYTES: u64 = 64 * 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "clinipay=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::load().context("failed to load configuration")?;

    let db = connect(&config.database).await?;
    info!(
        max_connections = config.database.max_connections,
        "Connected to database"
    );

    let payments = Arc::new(PaymentRepository::new(db.clone()));
    let events = Arc::new(ProcessedEventRepository::new(db.clone()));
    let ledger_store = Arc::new(LedgerRepository::new(db.clone()));
    let refunds = Arc::new(RefundRepository::new(db));

    let processor = Arc::new(
        ProcessorClient::new(&config.processor).context("invalid processor configuration")?,
    );
    info!(
        base_url = %config.processor.base_url,
        timeout_secs = config.processor.timeout_secs,
        "Processor client configured"
    );

    let storage = StorageService::from_config(StorageConfig::from_settings(&config.storage))
        .context("failed to initialize proof storage")?;
    let limits = storage.config().limits.clone();
    info!(provider = config.storage.provider.name(), "Proof storage configured");

    let ledger = LedgerWriter::new(ledger_store.clone(), config.ledger.clone());
    let payment_locks = Arc::new(KeyedLocks::new());
    let reconciler = PaymentReconciler::new(
        payments.clone(),
        events,
        processor.clone(),
        ledger.clone(),
    )
    .with_locks(payment_locks.clone());
    let coordinator = RefundCoordinator::new(
        payments,
        refunds,
        processor,
        Arc::new(storage),
        limits,
        config.refunds.clone(),
    )
    .with_locks(payment_locks);

    let max_upload_bytes =
        usize::try_from(config.storage.max_file_size.saturating_add(MULTIPART_OVERHEAD_BYTES))
            .unwrap_or(usize::MAX);

    let state = AppState {
        jwt_service: Arc::new(JwtService::new(&config.jwt)),
        verifier: Arc::new(WebhookVerifier::new(&config.webhook)),
        reconciler: Arc::new(reconciler),
        refunds: Arc::new(coordinator),
        ledger,
        ledger_store,
        revenue: Arc::new(RevenueAggregator::from_config(&config.ledger)),
        staff_roles: config.refunds.allowed_roles.clone().into(),
        max_upload_bytes,
    };

    let app = create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
