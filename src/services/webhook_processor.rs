use {
    super::{
        issuer::{IssueOutcome, TicketIssuer},
        registry::IntentRegistry,
    },
    crate::domain::{
        error::PipelineError,
        event::Event,
        gateway::{FetchedPayment, GatewayPaymentStatus, PaymentGateway},
        id::{ExternalReference, GatewayPaymentId},
        intent::{IntentStatus, Transition, TransitionOutcome},
        notifier::Notifier,
        ticket::Ticket,
    },
    std::sync::Arc,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackTopic {
    Payment,
    MerchantOrder,
    Other(String),
}

impl CallbackTopic {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "payment" => Self::Payment,
            "merchant_order" | "topic_merchant_order_wh" => Self::MerchantOrder,
            other => Self::Other(other.to_string()),
        }
    }
}

/// An authenticated gateway notification.
#[derive(Debug, Clone)]
pub struct GatewayCallback {
    pub topic: CallbackTopic,
    pub resource_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    Completed { external_reference: ExternalReference, tickets: usize },
    Rejected(ExternalReference),
    StillPending(ExternalReference),
    /// Intent already terminal; nothing changed.
    Duplicate { external_reference: ExternalReference, status: IntentStatus },
    /// No intent of ours matches the payment's reference.
    UnknownReference,
    /// Order has no approved payment yet; a later callback will follow.
    Unresolved,
    InventoryExhausted(ExternalReference),
    AmountMismatch(ExternalReference),
    Reversed(ExternalReference),
    Ignored,
}

impl WebhookOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed { .. } => "completed",
            Self::Rejected(_) => "rejected",
            Self::StillPending(_) => "pending",
            Self::Duplicate { .. } => "duplicate",
            Self::UnknownReference => "unknown_reference",
            Self::Unresolved => "unresolved",
            Self::InventoryExhausted(_) => "inventory_exhausted",
            Self::AmountMismatch(_) => "amount_mismatch",
            Self::Reversed(_) => "reversed",
            Self::Ignored => "ignored",
        }
    }
}

/// Drives the intent state machine from gateway callbacks. Every recoverable
/// condition resolves to an `Ok` outcome; only infrastructure failures
/// (gateway, database) surface as errors.
pub struct WebhookProcessor {
    registry: IntentRegistry,
    issuer: TicketIssuer,
    gateway: Arc<dyn PaymentGateway>,
    notifier: Arc<dyn Notifier>,
}

impl WebhookProcessor {
    pub fn new(
        registry: IntentRegistry,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            issuer: TicketIssuer::new(registry.clone()),
            registry,
            gateway,
            notifier,
        }
    }

    pub fn gateway(&self) -> &Arc<dyn PaymentGateway> {
        &self.gateway
    }

    pub async fn process(
        &self,
        callback: &GatewayCallback,
        actor: &str,
    ) -> Result<WebhookOutcome, PipelineError> {
        let payment_id = match &callback.topic {
            CallbackTopic::Payment => GatewayPaymentId::new(callback.resource_id.as_str())
                .map_err(|e| PipelineError::MalformedPayload(e.to_string()))?,
            CallbackTopic::MerchantOrder => {
                let order = match self.gateway.fetch_order(&callback.resource_id).await {
                    Ok(order) => order,
                    Err(PipelineError::NotFound(what)) => {
                        tracing::warn!(order_id = %callback.resource_id, "gateway does not know {what}");
                        return Ok(WebhookOutcome::Unresolved);
                    }
                    Err(e) => return Err(e),
                };
                match order.approved_payment() {
                    Some(id) => id.clone(),
                    None => {
                        tracing::info!(
                            order_id = %callback.resource_id,
                            payments = order.payments.len(),
                            "order has no approved payment yet"
                        );
                        return Ok(WebhookOutcome::Unresolved);
                    }
                }
            }
            CallbackTopic::Other(topic) => {
                tracing::info!(topic = %topic, "callback topic not handled");
                return Ok(WebhookOutcome::Ignored);
            }
        };

        let payment = match self.gateway.fetch_payment(&payment_id).await {
            Ok(payment) => payment,
            Err(PipelineError::NotFound(what)) => {
                tracing::warn!(payment_id = %payment_id, "gateway does not know {what}");
                return Ok(WebhookOutcome::Unresolved);
            }
            Err(e) => return Err(e),
        };
        self.settle(payment, actor).await
    }

    /// Apply a freshly fetched payment to its intent. Shared by the webhook
    /// path and the reconciler so both go through the same idempotency guard.
    pub async fn settle(
        &self,
        payment: FetchedPayment,
        actor: &str,
    ) -> Result<WebhookOutcome, PipelineError> {
        let Some(reference) = payment
            .external_reference
            .as_deref()
            .and_then(|raw| ExternalReference::new(raw).ok())
        else {
            tracing::warn!(
                payment_id = %payment.id,
                reference = ?payment.external_reference,
                "payment carries no usable external reference"
            );
            return Ok(WebhookOutcome::UnknownReference);
        };

        let Some(intent) = self.registry.find_by_reference(&reference).await? else {
            tracing::warn!(
                external_reference = %reference,
                payment_id = %payment.id,
                "no payment intent for reference, acknowledging"
            );
            return Ok(WebhookOutcome::UnknownReference);
        };

        // Fast path only; the store re-checks under lock.
        if intent.status.is_terminal() {
            tracing::info!(
                external_reference = %reference,
                status = %intent.status,
                "intent already terminal, duplicate delivery"
            );
            return Ok(WebhookOutcome::Duplicate {
                external_reference: reference,
                status: intent.status,
            });
        }

        match payment.status {
            GatewayPaymentStatus::Approved => {
                if payment.amount < intent.total_amount {
                    let reason = format!(
                        "approved amount {} below intent total {}",
                        payment.amount, intent.total_amount
                    );
                    tracing::warn!(
                        external_reference = %reference,
                        payment_id = %payment.id,
                        "{reason}"
                    );
                    self.registry
                        .record_fulfillment_error(&reference, &payment.id, payment.status, &reason, actor)
                        .await?;
                    return Ok(WebhookOutcome::AmountMismatch(reference));
                }

                match self.issuer.issue(&intent, &payment.id, actor).await {
                    Ok(IssueOutcome::Issued { event, tickets, .. }) => {
                        self.notify_attendees(&event, &tickets).await;
                        Ok(WebhookOutcome::Completed {
                            external_reference: reference,
                            tickets: tickets.len(),
                        })
                    }
                    Ok(IssueOutcome::AlreadyTerminal(status)) => Ok(WebhookOutcome::Duplicate {
                        external_reference: reference,
                        status,
                    }),
                    Err(PipelineError::InventoryExhausted { .. }) => {
                        Ok(WebhookOutcome::InventoryExhausted(reference))
                    }
                    Err(e) => Err(e),
                }
            }
            GatewayPaymentStatus::Rejected => {
                let transition = Transition::Reject {
                    gateway_status: payment.status,
                };
                match self.registry.transition(&reference, transition, actor).await? {
                    TransitionOutcome::Applied { .. } => {
                        tracing::info!(
                            external_reference = %reference,
                            payment_id = %payment.id,
                            detail = ?payment.status_detail,
                            "payment rejected"
                        );
                        Ok(WebhookOutcome::Rejected(reference))
                    }
                    TransitionOutcome::AlreadyTerminal(status) => Ok(WebhookOutcome::Duplicate {
                        external_reference: reference,
                        status,
                    }),
                }
            }
            GatewayPaymentStatus::Pending => {
                let transition = Transition::RecordPending {
                    payment_id: payment.id.clone(),
                    gateway_status: payment.status,
                };
                match self.registry.transition(&reference, transition, actor).await? {
                    TransitionOutcome::Applied { .. } => Ok(WebhookOutcome::StillPending(reference)),
                    TransitionOutcome::AlreadyTerminal(status) => Ok(WebhookOutcome::Duplicate {
                        external_reference: reference,
                        status,
                    }),
                }
            }
            GatewayPaymentStatus::Reversed => {
                tracing::warn!(
                    external_reference = %reference,
                    payment_id = %payment.id,
                    "payment reversed before fulfillment, leaving intent pending"
                );
                Ok(WebhookOutcome::Reversed(reference))
            }
        }
    }

    /// One notification per attendee email. Failures never undo issuance.
    async fn notify_attendees(&self, event: &Event, tickets: &[Ticket]) {
        let mut groups: Vec<(&str, Vec<Ticket>)> = Vec::new();
        for ticket in tickets {
            let email = ticket.attendee.email.as_str();
            match groups.iter_mut().find(|(e, _)| e.eq_ignore_ascii_case(email)) {
                Some((_, group)) => group.push(ticket.clone()),
                None => groups.push((email, vec![ticket.clone()])),
            }
        }

        for (email, group) in groups {
            if let Err(e) = self.notifier.notify(email, event, &group).await {
                tracing::error!(
                    email = %email,
                    event_id = %event.id,
                    tickets = group.len(),
                    error = %e,
                    "ticket notification failed"
                );
            }
        }
    }
}
