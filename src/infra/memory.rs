use {
    crate::domain::{
        BoxFuture,
        audit::NewAuditEntry,
        error::PipelineError,
        event::Event,
        id::{ExternalReference, TicketCode},
        intent::{IntentAction, IntentStatus, NewPaymentIntent, PaymentIntent, Transition, TransitionOutcome},
        store::FulfillmentStore,
        ticket::{Ticket, TicketStatus},
    },
    chrono::{DateTime, Utc},
    std::collections::HashMap,
    tokio::sync::Mutex,
    uuid::Uuid,
};

#[derive(Default)]
struct State {
    events: HashMap<Uuid, Event>,
    intents: HashMap<ExternalReference, PaymentIntent>,
    tickets: HashMap<TicketCode, Ticket>,
    tickets_by_intent: HashMap<ExternalReference, Vec<TicketCode>>,
    audit_log: Vec<NewAuditEntry>,
}

/// Store kept entirely in process memory. Each call holds the state lock for
/// its whole duration, which makes every call one atomic unit.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn audit_entries(&self, entity_id: &str) -> Vec<NewAuditEntry> {
        let state = self.state.lock().await;
        state
            .audit_log
            .iter()
            .filter(|e| e.entity_id == entity_id)
            .cloned()
            .collect()
    }

    pub async fn ticket_count(&self) -> usize {
        self.state.lock().await.tickets.len()
    }
}

fn missing_intent(reference: &ExternalReference) -> PipelineError {
    PipelineError::NotFound(format!("payment intent {reference}"))
}

impl FulfillmentStore for MemoryStore {
    fn insert_event<'a>(&'a self, event: &'a Event) -> BoxFuture<'a, Result<(), PipelineError>> {
        Box::pin(async move {
            if event.available_tickets > event.total_tickets {
                return Err(PipelineError::Validation(
                    "available tickets cannot exceed total tickets".into(),
                ));
            }
            self.state.lock().await.events.insert(event.id, event.clone());
            Ok(())
        })
    }

    fn event(&self, id: Uuid) -> BoxFuture<'_, Result<Option<Event>, PipelineError>> {
        Box::pin(async move { Ok(self.state.lock().await.events.get(&id).cloned()) })
    }

    fn insert_intent<'a>(
        &'a self,
        intent: NewPaymentIntent,
        actor: &'a str,
    ) -> BoxFuture<'a, Result<PaymentIntent, PipelineError>> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            if !state.events.contains_key(&intent.event_id()) {
                return Err(PipelineError::NotFound(format!("event {}", intent.event_id())));
            }
            if state.intents.contains_key(intent.external_reference()) {
                return Err(PipelineError::Validation(format!(
                    "duplicate external reference {}",
                    intent.external_reference()
                )));
            }
            let intent = intent.into_intent(Utc::now());
            state.audit_log.push(intent.audit_entry(actor, "created"));
            state
                .intents
                .insert(intent.external_reference.clone(), intent.clone());
            Ok(intent)
        })
    }

    fn attach_gateway_id<'a>(
        &'a self,
        reference: &'a ExternalReference,
        gateway_intent_id: &'a str,
    ) -> BoxFuture<'a, Result<PaymentIntent, PipelineError>> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            let intent = state
                .intents
                .get_mut(reference)
                .ok_or_else(|| missing_intent(reference))?;
            intent.gateway_intent_id = Some(gateway_intent_id.to_string());
            intent.updated_at = Utc::now();
            Ok(intent.clone())
        })
    }

    fn find_intent<'a>(
        &'a self,
        reference: &'a ExternalReference,
    ) -> BoxFuture<'a, Result<Option<PaymentIntent>, PipelineError>> {
        Box::pin(async move { Ok(self.state.lock().await.intents.get(reference).cloned()) })
    }

    fn apply_transition<'a>(
        &'a self,
        reference: &'a ExternalReference,
        transition: Transition,
        actor: &'a str,
    ) -> BoxFuture<'a, Result<TransitionOutcome, PipelineError>> {
        Box::pin(async move {
            let mut guard = self.state.lock().await;
            let state = &mut *guard;

            let current = state
                .intents
                .get(reference)
                .ok_or_else(|| missing_intent(reference))?;
            let old_status = current.status;
            if let IntentAction::AlreadyTerminal(status) = old_status.decide(&transition.target()) {
                return Ok(TransitionOutcome::AlreadyTerminal(status));
            }

            // Inventory is checked against the event before anything is written.
            if let Transition::Complete { tickets, .. } = &transition {
                let quantity = u32::try_from(tickets.len())
                    .map_err(|_| PipelineError::Validation("ticket batch too large".into()))?;
                let event = state
                    .events
                    .get_mut(&current.event_id)
                    .ok_or_else(|| PipelineError::NotFound(format!("event {}", current.event_id)))?;
                event.take(quantity)?;
            }

            let now = Utc::now();
            let intent = state
                .intents
                .get_mut(reference)
                .ok_or_else(|| missing_intent(reference))?;
            intent.apply(&transition, now);
            let intent = intent.clone();
            let action = transition.audit_action(old_status, intent.status);

            let mut issued = Vec::new();
            if let Transition::Complete { tickets, .. } = transition {
                let codes = state.tickets_by_intent.entry(reference.clone()).or_default();
                for new_ticket in tickets {
                    let ticket = new_ticket.into_ticket(reference.clone(), now);
                    codes.push(ticket.ticket_code.clone());
                    state.tickets.insert(ticket.ticket_code.clone(), ticket.clone());
                    issued.push(ticket);
                }
            }

            let mut audit = intent.audit_entry(actor, action);
            audit.detail["old_status"] = serde_json::json!(old_status.as_str());
            audit.detail["tickets_issued"] = serde_json::json!(issued.len());
            state.audit_log.push(audit);

            Ok(TransitionOutcome::Applied { intent, tickets: issued })
        })
    }

    fn tickets_for_intent<'a>(
        &'a self,
        reference: &'a ExternalReference,
    ) -> BoxFuture<'a, Result<Vec<Ticket>, PipelineError>> {
        Box::pin(async move {
            let state = self.state.lock().await;
            let mut tickets: Vec<Ticket> = state
                .tickets_by_intent
                .get(reference)
                .into_iter()
                .flatten()
                .filter_map(|code| state.tickets.get(code).cloned())
                .collect();
            tickets.sort_by_key(|t| t.position);
            Ok(tickets)
        })
    }

    fn update_ticket_status<'a>(
        &'a self,
        code: &'a TicketCode,
        target: TicketStatus,
        actor: &'a str,
    ) -> BoxFuture<'a, Result<Ticket, PipelineError>> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            let ticket = state
                .tickets
                .get_mut(code)
                .ok_or_else(|| PipelineError::NotFound(format!("ticket {code}")))?;
            let from = ticket.status;
            if !from.can_transition_to(&target) {
                return Err(PipelineError::Validation(format!(
                    "ticket {code} cannot move from {from} to {target}"
                )));
            }
            ticket.status = target;
            let ticket = ticket.clone();
            let action = format!("ticket_{target}");
            state.audit_log.push(ticket.audit_entry(actor, &action, from));
            Ok(ticket)
        })
    }

    fn stale_pending_intents(
        &self,
        updated_before: DateTime<Utc>,
        limit: u32,
    ) -> BoxFuture<'_, Result<Vec<PaymentIntent>, PipelineError>> {
        Box::pin(async move {
            let state = self.state.lock().await;
            let mut stale: Vec<PaymentIntent> = state
                .intents
                .values()
                .filter(|i| {
                    i.status == IntentStatus::Pending
                        && i.gateway_payment_id.is_some()
                        && i.fulfillment_error.is_none()
                        && i.updated_at < updated_before
                })
                .cloned()
                .collect();
            stale.sort_by_key(|i| i.updated_at);
            stale.truncate(limit as usize);
            Ok(stale)
        })
    }
}
