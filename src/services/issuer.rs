use {
    super::registry::IntentRegistry,
    crate::domain::{
        error::PipelineError,
        event::Event,
        gateway::GatewayPaymentStatus,
        id::GatewayPaymentId,
        intent::{IntentStatus, PaymentIntent, Transition, TransitionOutcome},
        ticket::{NewTicket, Ticket},
    },
};

#[derive(Debug)]
pub enum IssueOutcome {
    Issued {
        intent: PaymentIntent,
        event: Event,
        tickets: Vec<Ticket>,
    },
    /// Another delivery completed (or rejected) this intent first.
    AlreadyTerminal(IntentStatus),
}

/// Sole writer of ticket rows and of inventory decrements.
#[derive(Clone)]
pub struct TicketIssuer {
    registry: IntentRegistry,
}

impl TicketIssuer {
    pub fn new(registry: IntentRegistry) -> Self {
        Self { registry }
    }

    /// Build one ticket per attendee, in attendee order.
    pub fn build_batch(intent: &PaymentIntent, event: &Event) -> Result<Vec<NewTicket>, PipelineError> {
        let shares = intent.total_amount.split_evenly(intent.requested_quantity)?;
        intent
            .attendees
            .iter()
            .zip(shares)
            .enumerate()
            .map(|(position, (attendee, amount))| {
                let position = u32::try_from(position)
                    .map_err(|_| PipelineError::Validation("too many attendees".into()))?;
                NewTicket::new(event, position, attendee, amount)
            })
            .collect()
    }

    /// Issue the full batch for an approved intent and complete it, as one
    /// atomic unit. On `InventoryExhausted` no ticket is written; the intent
    /// stays `pending` and records the payment and the failure reason.
    pub async fn issue(
        &self,
        intent: &PaymentIntent,
        payment_id: &GatewayPaymentId,
        actor: &str,
    ) -> Result<IssueOutcome, PipelineError> {
        if intent.attendees.len() != intent.requested_quantity as usize {
            return Err(PipelineError::Validation(format!(
                "intent {} has {} attendees for {} tickets",
                intent.external_reference,
                intent.attendees.len(),
                intent.requested_quantity
            )));
        }

        let event = self
            .registry
            .store()
            .event(intent.event_id)
            .await?
            .ok_or_else(|| PipelineError::NotFound(format!("event {}", intent.event_id)))?;

        let tickets = Self::build_batch(intent, &event)?;
        let transition = Transition::Complete {
            payment_id: payment_id.clone(),
            gateway_status: GatewayPaymentStatus::Approved,
            tickets,
        };

        match self
            .registry
            .transition(&intent.external_reference, transition, actor)
            .await
        {
            Ok(TransitionOutcome::Applied { intent, tickets }) => {
                tracing::info!(
                    external_reference = %intent.external_reference,
                    payment_id = %payment_id,
                    count = tickets.len(),
                    "tickets issued"
                );
                Ok(IssueOutcome::Issued { intent, event, tickets })
            }
            Ok(TransitionOutcome::AlreadyTerminal(status)) => Ok(IssueOutcome::AlreadyTerminal(status)),
            Err(err @ PipelineError::InventoryExhausted { .. }) => {
                let reason = err.to_string();
                tracing::error!(
                    external_reference = %intent.external_reference,
                    payment_id = %payment_id,
                    event_id = %intent.event_id,
                    error = %reason,
                    "paid intent cannot be fulfilled, needs manual reconciliation"
                );
                self.registry
                    .record_fulfillment_error(
                        &intent.external_reference,
                        payment_id,
                        GatewayPaymentStatus::Approved,
                        &reason,
                        actor,
                    )
                    .await?;
                Err(err)
            }
            Err(err) => Err(err),
        }
    }
}
