use crate::domain::{
    error::PipelineError,
    id::TicketCode,
    store::FulfillmentStore,
    ticket::{Ticket, TicketStatus},
};

/// Venue validation: an active ticket becomes used. A second scan fails.
pub async fn redeem(
    store: &dyn FulfillmentStore,
    code: &TicketCode,
    actor: &str,
) -> Result<Ticket, PipelineError> {
    let ticket = store.update_ticket_status(code, TicketStatus::Used, actor).await?;
    tracing::info!(ticket_code = %code, external_reference = %ticket.external_reference, "ticket redeemed");
    Ok(ticket)
}

/// Administrative cancellation. Inventory is not returned to the event.
pub async fn cancel(
    store: &dyn FulfillmentStore,
    code: &TicketCode,
    actor: &str,
) -> Result<Ticket, PipelineError> {
    let ticket = store
        .update_ticket_status(code, TicketStatus::Cancelled, actor)
        .await?;
    tracing::warn!(ticket_code = %code, actor, "ticket cancelled");
    Ok(ticket)
}
