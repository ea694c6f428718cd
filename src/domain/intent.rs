use {
    super::audit::NewAuditEntry,
    super::error::PipelineError,
    super::event::Event,
    super::gateway::GatewayPaymentStatus,
    super::id::{ExternalReference, GatewayPaymentId},
    super::money::MoneyAmount,
    super::ticket::{NewTicket, Ticket},
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
    std::fmt,
    uuid::Uuid,
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IntentStatus {
    Pending,
    Completed,
    Rejected,
}

impl IntentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Rejected => "rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    pub fn can_transition_to(&self, new: &IntentStatus) -> bool {
        matches!(
            (self, new),
            (Self::Pending, Self::Completed) | (Self::Pending, Self::Rejected)
        )
    }

    /// Decide what a transition request does to an intent in this status.
    /// Terminal states are sticky: any request against them is a no-op.
    pub fn decide(&self, target: &IntentStatus) -> IntentAction {
        if self.is_terminal() {
            IntentAction::AlreadyTerminal(*self)
        } else if self.can_transition_to(target) {
            IntentAction::Advance
        } else {
            IntentAction::Refresh
        }
    }
}

impl fmt::Display for IntentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for IntentStatus {
    type Error = PipelineError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "rejected" => Ok(Self::Rejected),
            other => Err(PipelineError::Validation(format!(
                "unknown intent status: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentAction {
    /// Pending → terminal.
    Advance,
    /// Stays pending; only gateway bookkeeping changes.
    Refresh,
    AlreadyTerminal(IntentStatus),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendeeInput {
    pub name: String,
    pub email: String,
    pub national_id: String,
    #[serde(default)]
    pub phone: String,
}

impl AttendeeInput {
    pub fn validate(&self, position: usize) -> Result<(), PipelineError> {
        let blank = |field: &str, value: &str| {
            if value.trim().is_empty() {
                Err(PipelineError::Validation(format!(
                    "attendee {position}: {field} is required"
                )))
            } else {
                Ok(())
            }
        };
        blank("name", &self.name)?;
        blank("email", &self.email)?;
        blank("national_id", &self.national_id)?;

        let email = self.email.trim();
        let valid_email = email
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
        if !valid_email {
            return Err(PipelineError::Validation(format!(
                "attendee {position}: invalid email: {email}"
            )));
        }
        Ok(())
    }
}

/// Checkout attempt, persisted before redirecting the buyer to the gateway.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentIntent {
    pub external_reference: ExternalReference,
    pub gateway_intent_id: Option<String>,
    pub event_id: Uuid,
    pub requested_quantity: u32,
    pub attendees: Vec<AttendeeInput>,
    pub total_amount: MoneyAmount,
    pub status: IntentStatus,
    pub gateway_payment_id: Option<GatewayPaymentId>,
    pub gateway_status: Option<GatewayPaymentStatus>,
    pub fulfillment_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentIntent {
    pub fn audit_entry(&self, actor: &str, action: &str) -> NewAuditEntry {
        NewAuditEntry::new(
            "payment_intent",
            self.external_reference.as_str(),
            action,
            actor,
            serde_json::json!({
                "event_id": self.event_id,
                "requested_quantity": self.requested_quantity,
                "total_amount": self.total_amount.cents(),
                "status": self.status.as_str(),
                "gateway_payment_id": self.gateway_payment_id.as_ref().map(GatewayPaymentId::as_str),
                "gateway_status": self.gateway_status.as_ref().map(GatewayPaymentStatus::as_str),
                "fulfillment_error": self.fulfillment_error,
            }),
        )
    }

    /// Apply a transition in memory after the caller has serialized access.
    /// The returned action tells the store what to persist.
    pub fn apply(&mut self, transition: &Transition, now: DateTime<Utc>) -> IntentAction {
        let action = self.status.decide(&transition.target());
        if let IntentAction::AlreadyTerminal(_) = action {
            return action;
        }

        match transition {
            Transition::RecordPending { payment_id, gateway_status } => {
                self.gateway_payment_id = Some(payment_id.clone());
                self.gateway_status = Some(*gateway_status);
            }
            Transition::RecordFailure { payment_id, gateway_status, reason } => {
                self.gateway_payment_id = Some(payment_id.clone());
                self.gateway_status = Some(*gateway_status);
                self.fulfillment_error = Some(reason.clone());
            }
            Transition::Reject { gateway_status } => {
                self.status = IntentStatus::Rejected;
                self.gateway_status = Some(*gateway_status);
            }
            Transition::Complete { payment_id, gateway_status, .. } => {
                self.status = IntentStatus::Completed;
                self.gateway_payment_id = Some(payment_id.clone());
                self.gateway_status = Some(*gateway_status);
                self.fulfillment_error = None;
            }
        }
        self.updated_at = now;
        action
    }
}

/// Input for creating a pending intent. Validated on construction.
#[derive(Debug, Clone)]
pub struct NewPaymentIntent {
    external_reference: ExternalReference,
    event_id: Uuid,
    requested_quantity: u32,
    attendees: Vec<AttendeeInput>,
    total_amount: MoneyAmount,
}

impl NewPaymentIntent {
    pub fn new(
        event: &Event,
        attendees: Vec<AttendeeInput>,
        requested_quantity: i64,
    ) -> Result<Self, PipelineError> {
        if requested_quantity <= 0 {
            return Err(PipelineError::Validation(
                "requested quantity must be positive".into(),
            ));
        }
        let requested_quantity = u32::try_from(requested_quantity).map_err(|_| {
            PipelineError::Validation(format!("requested quantity {requested_quantity} is too large"))
        })?;
        if attendees.len() != requested_quantity as usize {
            return Err(PipelineError::Validation(format!(
                "expected {requested_quantity} attendees, got {}",
                attendees.len()
            )));
        }
        for (position, attendee) in attendees.iter().enumerate() {
            attendee.validate(position)?;
        }
        let total_amount = event
            .unit_price
            .checked_mul(requested_quantity)
            .ok_or_else(|| PipelineError::Validation("total amount overflows".into()))?;

        Ok(Self {
            external_reference: ExternalReference::generate(),
            event_id: event.id,
            requested_quantity,
            attendees,
            total_amount,
        })
    }

    pub fn external_reference(&self) -> &ExternalReference {
        &self.external_reference
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn requested_quantity(&self) -> u32 {
        self.requested_quantity
    }

    pub fn attendees(&self) -> &[AttendeeInput] {
        &self.attendees
    }

    pub fn total_amount(&self) -> MoneyAmount {
        self.total_amount
    }

    pub fn into_intent(self, now: DateTime<Utc>) -> PaymentIntent {
        PaymentIntent {
            external_reference: self.external_reference,
            gateway_intent_id: None,
            event_id: self.event_id,
            requested_quantity: self.requested_quantity,
            attendees: self.attendees,
            total_amount: self.total_amount,
            status: IntentStatus::Pending,
            gateway_payment_id: None,
            gateway_status: None,
            fulfillment_error: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// The only ways an intent's status or gateway bookkeeping may change.
#[derive(Debug, Clone)]
pub enum Transition {
    RecordPending {
        payment_id: GatewayPaymentId,
        gateway_status: GatewayPaymentStatus,
    },
    /// The gateway approved the payment but it cannot be fulfilled. The
    /// intent stays pending and keeps the payment for manual follow-up.
    RecordFailure {
        payment_id: GatewayPaymentId,
        gateway_status: GatewayPaymentStatus,
        reason: String,
    },
    Reject {
        gateway_status: GatewayPaymentStatus,
    },
    /// Completion carries its ticket batch so both commit together.
    Complete {
        payment_id: GatewayPaymentId,
        gateway_status: GatewayPaymentStatus,
        tickets: Vec<NewTicket>,
    },
}

impl Transition {
    pub fn target(&self) -> IntentStatus {
        match self {
            Self::RecordPending { .. } | Self::RecordFailure { .. } => IntentStatus::Pending,
            Self::Reject { .. } => IntentStatus::Rejected,
            Self::Complete { .. } => IntentStatus::Completed,
        }
    }

    /// Audit action for an applied transition.
    pub fn audit_action(&self, old_status: IntentStatus, new_status: IntentStatus) -> &'static str {
        match self {
            Self::RecordFailure { .. } => "fulfillment_failed",
            _ if old_status == new_status => "payment_recorded",
            _ => "status_changed",
        }
    }
}

#[derive(Debug)]
pub enum TransitionOutcome {
    /// Change committed. `tickets` is non-empty only for completion.
    Applied {
        intent: PaymentIntent,
        tickets: Vec<Ticket>,
    },
    /// Intent was already terminal; nothing changed.
    AlreadyTerminal(IntentStatus),
}
