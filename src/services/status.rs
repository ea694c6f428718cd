use {
    crate::domain::{
        error::PipelineError,
        gateway::GatewayPaymentStatus,
        id::{ExternalReference, GatewayPaymentId},
        intent::IntentStatus,
        money::MoneyAmount,
        store::FulfillmentStore,
        ticket::Ticket,
    },
    chrono::{DateTime, Utc},
    serde::Serialize,
};

/// Read-only projection of an intent for client polling.
#[derive(Debug, Clone, Serialize)]
pub struct StatusView {
    pub external_reference: ExternalReference,
    pub status: IntentStatus,
    pub total_amount: MoneyAmount,
    pub requested_quantity: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub gateway_payment_id: Option<GatewayPaymentId>,
    pub gateway_status: Option<GatewayPaymentStatus>,
    pub tickets_issued: usize,
    pub fulfillment_error: Option<String>,
}

/// Reads go straight to the store on every call; nothing is cached.
pub async fn get_status(
    store: &dyn FulfillmentStore,
    reference: &ExternalReference,
) -> Result<StatusView, PipelineError> {
    let intent = store
        .find_intent(reference)
        .await?
        .ok_or_else(|| PipelineError::NotFound(format!("payment intent {reference}")))?;

    let tickets_issued = if intent.status == IntentStatus::Completed {
        store.tickets_for_intent(reference).await?.len()
    } else {
        0
    };

    // Completion and issuance commit together, so this only trips on a
    // hand-edited row; report it as still pending rather than lie.
    let status = if intent.status == IntentStatus::Completed && tickets_issued == 0 {
        tracing::error!(external_reference = %reference, "completed intent has no tickets");
        IntentStatus::Pending
    } else {
        intent.status
    };

    Ok(StatusView {
        external_reference: intent.external_reference,
        status,
        total_amount: intent.total_amount,
        requested_quantity: intent.requested_quantity,
        created_at: intent.created_at,
        updated_at: intent.updated_at,
        gateway_payment_id: intent.gateway_payment_id,
        gateway_status: intent.gateway_status,
        tickets_issued,
        fulfillment_error: intent.fulfillment_error,
    })
}

/// Tickets of a completed intent, in attendee order.
pub async fn issued_tickets(
    store: &dyn FulfillmentStore,
    reference: &ExternalReference,
) -> Result<Vec<Ticket>, PipelineError> {
    let intent = store
        .find_intent(reference)
        .await?
        .ok_or_else(|| PipelineError::NotFound(format!("payment intent {reference}")))?;
    if intent.status != IntentStatus::Completed {
        return Ok(Vec::new());
    }
    store.tickets_for_intent(reference).await
}
