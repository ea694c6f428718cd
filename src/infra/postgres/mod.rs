pub mod audit_repo;
pub mod event_repo;
pub mod intent_repo;
pub mod ticket_repo;

use {
    crate::domain::{
        BoxFuture,
        error::PipelineError,
        event::Event,
        id::{ExternalReference, TicketCode},
        intent::{IntentAction, NewPaymentIntent, PaymentIntent, Transition, TransitionOutcome},
        store::FulfillmentStore,
        ticket::{Ticket, TicketStatus},
    },
    audit_repo::insert_audit_entry,
    chrono::{DateTime, Utc},
    sqlx::PgPool,
    uuid::Uuid,
};

pub(crate) fn to_i32(value: u32) -> Result<i32, PipelineError> {
    i32::try_from(value)
        .map_err(|_| PipelineError::Validation(format!("{value} exceeds storage capacity")))
}

pub(crate) fn to_u32(value: i32) -> Result<u32, PipelineError> {
    u32::try_from(value)
        .map_err(|_| PipelineError::Validation(format!("unexpected negative count: {value}")))
}

fn missing_intent(reference: &ExternalReference) -> PipelineError {
    PipelineError::NotFound(format!("payment intent {reference}"))
}

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn apply_transition_inner(
        &self,
        reference: &ExternalReference,
        transition: Transition,
        actor: &str,
    ) -> Result<TransitionOutcome, PipelineError> {
        let mut tx = self.pool.begin().await?;

        intent_repo::lock_reference(&mut tx, reference).await?;

        // No FOR UPDATE needed: the advisory lock covers this reference.
        let mut intent = intent_repo::find_intent(&mut *tx, reference)
            .await?
            .ok_or_else(|| missing_intent(reference))?;
        let old_status = intent.status;

        if let IntentAction::AlreadyTerminal(status) = old_status.decide(&transition.target()) {
            tx.commit().await?;
            return Ok(TransitionOutcome::AlreadyTerminal(status));
        }

        let now = Utc::now();
        intent.apply(&transition, now);
        let action = transition.audit_action(old_status, intent.status);
        intent_repo::update_state(&mut tx, &intent).await?;

        let tickets = match transition {
            Transition::Complete { tickets, .. } => {
                let quantity = u32::try_from(tickets.len())
                    .map_err(|_| PipelineError::Validation("ticket batch too large".into()))?;
                // Dropping `tx` on error rolls back the status update too.
                event_repo::take_tickets(&mut tx, intent.event_id, quantity).await?;
                ticket_repo::insert_batch(&mut tx, reference, tickets, now).await?
            }
            _ => Vec::new(),
        };

        let mut audit = intent.audit_entry(actor, action);
        audit.detail["old_status"] = serde_json::json!(old_status.as_str());
        audit.detail["tickets_issued"] = serde_json::json!(tickets.len());
        insert_audit_entry(&mut tx, &audit).await?;

        tx.commit().await?;
        Ok(TransitionOutcome::Applied { intent, tickets })
    }

    async fn update_ticket_status_inner(
        &self,
        code: &TicketCode,
        target: TicketStatus,
        actor: &str,
    ) -> Result<Ticket, PipelineError> {
        let mut tx = self.pool.begin().await?;
        let mut ticket = ticket_repo::lock_ticket(&mut tx, code)
            .await?
            .ok_or_else(|| PipelineError::NotFound(format!("ticket {code}")))?;

        let from = ticket.status;
        if !from.can_transition_to(&target) {
            return Err(PipelineError::Validation(format!(
                "ticket {code} cannot move from {from} to {target}"
            )));
        }

        ticket_repo::set_status(&mut tx, code, target).await?;
        ticket.status = target;
        let action = format!("ticket_{target}");
        insert_audit_entry(&mut tx, &ticket.audit_entry(actor, &action, from)).await?;
        tx.commit().await?;
        Ok(ticket)
    }
}

impl FulfillmentStore for PgStore {
    fn insert_event<'a>(&'a self, event: &'a Event) -> BoxFuture<'a, Result<(), PipelineError>> {
        Box::pin(event_repo::insert_event(&self.pool, event))
    }

    fn event(&self, id: Uuid) -> BoxFuture<'_, Result<Option<Event>, PipelineError>> {
        Box::pin(async move {
            let mut conn = self.pool.acquire().await?;
            event_repo::find_event(&mut conn, id).await
        })
    }

    fn insert_intent<'a>(
        &'a self,
        intent: NewPaymentIntent,
        actor: &'a str,
    ) -> BoxFuture<'a, Result<PaymentIntent, PipelineError>> {
        Box::pin(async move {
            let mut tx = self.pool.begin().await?;
            if event_repo::find_event(&mut *tx, intent.event_id()).await?.is_none() {
                return Err(PipelineError::NotFound(format!("event {}", intent.event_id())));
            }
            let intent = intent.into_intent(Utc::now());
            intent_repo::insert_intent(&mut tx, &intent).await?;
            insert_audit_entry(&mut tx, &intent.audit_entry(actor, "created")).await?;
            tx.commit().await?;
            Ok(intent)
        })
    }

    fn attach_gateway_id<'a>(
        &'a self,
        reference: &'a ExternalReference,
        gateway_intent_id: &'a str,
    ) -> BoxFuture<'a, Result<PaymentIntent, PipelineError>> {
        Box::pin(async move {
            intent_repo::set_gateway_intent_id(&self.pool, reference, gateway_intent_id)
                .await?
                .ok_or_else(|| missing_intent(reference))
        })
    }

    fn find_intent<'a>(
        &'a self,
        reference: &'a ExternalReference,
    ) -> BoxFuture<'a, Result<Option<PaymentIntent>, PipelineError>> {
        Box::pin(async move {
            let mut conn = self.pool.acquire().await?;
            intent_repo::find_intent(&mut conn, reference).await
        })
    }

    fn apply_transition<'a>(
        &'a self,
        reference: &'a ExternalReference,
        transition: Transition,
        actor: &'a str,
    ) -> BoxFuture<'a, Result<TransitionOutcome, PipelineError>> {
        Box::pin(self.apply_transition_inner(reference, transition, actor))
    }

    fn tickets_for_intent<'a>(
        &'a self,
        reference: &'a ExternalReference,
    ) -> BoxFuture<'a, Result<Vec<Ticket>, PipelineError>> {
        Box::pin(ticket_repo::tickets_for_intent(&self.pool, reference))
    }

    fn update_ticket_status<'a>(
        &'a self,
        code: &'a TicketCode,
        target: TicketStatus,
        actor: &'a str,
    ) -> BoxFuture<'a, Result<Ticket, PipelineError>> {
        Box::pin(self.update_ticket_status_inner(code, target, actor))
    }

    fn stale_pending_intents(
        &self,
        updated_before: DateTime<Utc>,
        limit: u32,
    ) -> BoxFuture<'_, Result<Vec<PaymentIntent>, PipelineError>> {
        Box::pin(intent_repo::stale_pending(&self.pool, updated_before, limit))
    }
}
