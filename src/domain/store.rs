use {
    super::error::PipelineError,
    super::event::Event,
    super::id::{ExternalReference, TicketCode},
    super::intent::{NewPaymentIntent, PaymentIntent, Transition, TransitionOutcome},
    super::ticket::{Ticket, TicketStatus},
    super::BoxFuture,
    chrono::{DateTime, Utc},
    uuid::Uuid,
};

/// Persistence port. Every method is one atomic unit; in particular
/// `apply_transition` serializes on the intent's reference and, for
/// completion, inserts the ticket batch and decrements inventory in the same
/// unit as the status change.
pub trait FulfillmentStore: Send + Sync {
    fn insert_event<'a>(&'a self, event: &'a Event) -> BoxFuture<'a, Result<(), PipelineError>>;

    fn event(&self, id: Uuid) -> BoxFuture<'_, Result<Option<Event>, PipelineError>>;

    fn insert_intent<'a>(
        &'a self,
        intent: NewPaymentIntent,
        actor: &'a str,
    ) -> BoxFuture<'a, Result<PaymentIntent, PipelineError>>;

    fn attach_gateway_id<'a>(
        &'a self,
        reference: &'a ExternalReference,
        gateway_intent_id: &'a str,
    ) -> BoxFuture<'a, Result<PaymentIntent, PipelineError>>;

    fn find_intent<'a>(
        &'a self,
        reference: &'a ExternalReference,
    ) -> BoxFuture<'a, Result<Option<PaymentIntent>, PipelineError>>;

    /// Fails with `InventoryExhausted` (nothing persisted) when a completion
    /// cannot be covered by the event's remaining tickets.
    fn apply_transition<'a>(
        &'a self,
        reference: &'a ExternalReference,
        transition: Transition,
        actor: &'a str,
    ) -> BoxFuture<'a, Result<TransitionOutcome, PipelineError>>;

    fn tickets_for_intent<'a>(
        &'a self,
        reference: &'a ExternalReference,
    ) -> BoxFuture<'a, Result<Vec<Ticket>, PipelineError>>;

    fn update_ticket_status<'a>(
        &'a self,
        code: &'a TicketCode,
        target: TicketStatus,
        actor: &'a str,
    ) -> BoxFuture<'a, Result<Ticket, PipelineError>>;

    /// Pending intents with a known gateway payment that have not changed
    /// since `updated_before`. Intents holding a fulfillment error wait for
    /// an operator and are left out.
    fn stale_pending_intents(
        &self,
        updated_before: DateTime<Utc>,
        limit: u32,
    ) -> BoxFuture<'_, Result<Vec<PaymentIntent>, PipelineError>>;
}
