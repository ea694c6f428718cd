use {
    super::webhook_processor::{WebhookOutcome, WebhookProcessor},
    crate::domain::{error::PipelineError, store::FulfillmentStore},
    chrono::Utc,
    std::{sync::Arc, time::Duration},
    tokio::sync::watch,
};

const BATCH_SIZE: u32 = 50;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileReport {
    pub checked: usize,
    pub settled: usize,
    pub failed: usize,
}

/// Periodically re-check long-pending intents that already have a gateway
/// payment (offline methods), through the same settle step as webhooks.
pub async fn run_reconciler(
    store: Arc<dyn FulfillmentStore>,
    processor: Arc<WebhookProcessor>,
    interval: Duration,
    min_age: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    tracing::info!(interval_secs = interval.as_secs(), "reconciler started");

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                tracing::info!("reconciler shutting down");
                return;
            }
            _ = tokio::time::sleep(interval) => {}
        }

        match reconcile_once(&*store, &processor, min_age).await {
            Ok(report) if report.checked == 0 => {}
            Ok(report) => tracing::info!(?report, "reconcile pass finished"),
            Err(e) => tracing::error!(error = %e, "reconcile pass failed"),
        }
    }
}

pub async fn reconcile_once(
    store: &dyn FulfillmentStore,
    processor: &WebhookProcessor,
    min_age: Duration,
) -> Result<ReconcileReport, PipelineError> {
    let min_age = chrono::Duration::from_std(min_age)
        .map_err(|e| PipelineError::Config(format!("reconcile min age: {e}")))?;
    let stale = store.stale_pending_intents(Utc::now() - min_age, BATCH_SIZE).await?;

    let mut report = ReconcileReport::default();
    for intent in stale {
        let Some(payment_id) = intent.gateway_payment_id else {
            continue;
        };
        report.checked += 1;

        let result = match processor.gateway().fetch_payment(&payment_id).await {
            Ok(payment) => processor.settle(payment, "reconciler").await,
            Err(e) => Err(e),
        };

        match result {
            Ok(WebhookOutcome::StillPending(_)) => {}
            Ok(outcome) => {
                tracing::info!(
                    external_reference = %intent.external_reference,
                    payment_id = %payment_id,
                    outcome = outcome.as_str(),
                    "pending intent reconciled"
                );
                report.settled += 1;
            }
            Err(e) => {
                tracing::warn!(
                    external_reference = %intent.external_reference,
                    payment_id = %payment_id,
                    error = %e,
                    "reconcile check failed, will retry next pass"
                );
                report.failed += 1;
            }
        }
    }

    Ok(report)
}
