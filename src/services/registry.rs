use {
    crate::domain::{
        error::PipelineError,
        event::Event,
        gateway::GatewayPaymentStatus,
        id::{ExternalReference, GatewayPaymentId},
        intent::{AttendeeInput, NewPaymentIntent, PaymentIntent, Transition, TransitionOutcome},
        store::FulfillmentStore,
    },
    std::sync::Arc,
};

/// Sole writer of payment intent rows.
#[derive(Clone)]
pub struct IntentRegistry {
    store: Arc<dyn FulfillmentStore>,
}

impl IntentRegistry {
    pub fn new(store: Arc<dyn FulfillmentStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn FulfillmentStore> {
        &self.store
    }

    /// Validate and persist a new `pending` intent. The availability check
    /// here is advisory; issuance re-checks inventory under lock.
    pub async fn create(
        &self,
        event: &Event,
        attendees: Vec<AttendeeInput>,
        requested_quantity: i64,
        actor: &str,
    ) -> Result<PaymentIntent, PipelineError> {
        let new_intent = NewPaymentIntent::new(event, attendees, requested_quantity)?;

        if !event.has_capacity_for(new_intent.requested_quantity()) {
            return Err(PipelineError::Validation(format!(
                "only {} tickets left for {}",
                event.available_tickets, event.name
            )));
        }

        let intent = self.store.insert_intent(new_intent, actor).await?;
        tracing::info!(
            external_reference = %intent.external_reference,
            event_id = %event.id,
            quantity = intent.requested_quantity,
            total = %intent.total_amount,
            "payment intent created"
        );
        Ok(intent)
    }

    pub async fn attach_gateway_id(
        &self,
        reference: &ExternalReference,
        gateway_intent_id: &str,
    ) -> Result<PaymentIntent, PipelineError> {
        self.store.attach_gateway_id(reference, gateway_intent_id).await
    }

    pub async fn find_by_reference(
        &self,
        reference: &ExternalReference,
    ) -> Result<Option<PaymentIntent>, PipelineError> {
        self.store.find_intent(reference).await
    }

    /// The only mutator of intent status. Requests against terminal intents
    /// succeed as no-ops.
    pub async fn transition(
        &self,
        reference: &ExternalReference,
        transition: Transition,
        actor: &str,
    ) -> Result<TransitionOutcome, PipelineError> {
        let target = transition.target();
        let outcome = self.store.apply_transition(reference, transition, actor).await?;
        match &outcome {
            TransitionOutcome::Applied { intent, .. } => {
                tracing::info!(
                    external_reference = %reference,
                    status = %intent.status,
                    requested = %target,
                    "intent transition applied"
                );
            }
            TransitionOutcome::AlreadyTerminal(status) => {
                tracing::info!(
                    external_reference = %reference,
                    status = %status,
                    requested = %target,
                    "intent already terminal, transition ignored"
                );
            }
        }
        Ok(outcome)
    }

    /// Keep an approved payment that could not be fulfilled on its pending
    /// intent, with the reason, for manual reconciliation. A no-op once the
    /// intent is terminal.
    pub async fn record_fulfillment_error(
        &self,
        reference: &ExternalReference,
        payment_id: &GatewayPaymentId,
        gateway_status: GatewayPaymentStatus,
        reason: &str,
        actor: &str,
    ) -> Result<TransitionOutcome, PipelineError> {
        let transition = Transition::RecordFailure {
            payment_id: payment_id.clone(),
            gateway_status,
            reason: reason.to_string(),
        };
        self.transition(reference, transition, actor).await
    }
}
