use {
    super::audit::NewAuditEntry,
    super::error::PipelineError,
    super::event::Event,
    super::id::{ExternalReference, TicketCode},
    super::intent::AttendeeInput,
    super::money::MoneyAmount,
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
    std::fmt,
    uuid::Uuid,
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Active,
    Used,
    Cancelled,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Used => "used",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn can_transition_to(&self, new: &TicketStatus) -> bool {
        matches!(
            (self, new),
            (Self::Active, Self::Used) | (Self::Active, Self::Cancelled)
        )
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for TicketStatus {
    type Error = PipelineError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "active" => Ok(Self::Active),
            "used" => Ok(Self::Used),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(PipelineError::Validation(format!(
                "unknown ticket status: {other}"
            ))),
        }
    }
}

/// Contents of the scannable code. Serialized to JSON and treated as opaque
/// by everything downstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QrContent {
    pub ticket_code: TicketCode,
    pub event_id: Uuid,
    pub event_name: String,
    pub starts_at: DateTime<Utc>,
    pub location: String,
    pub attendee_name: String,
}

impl QrContent {
    pub fn encode(&self) -> Result<String, PipelineError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn decode(payload: &str) -> Result<Self, PipelineError> {
        Ok(serde_json::from_str(payload)?)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Ticket {
    pub ticket_code: TicketCode,
    pub external_reference: ExternalReference,
    pub position: u32,
    pub event_id: Uuid,
    pub attendee: AttendeeInput,
    pub qr_payload: String,
    pub status: TicketStatus,
    pub amount_paid: MoneyAmount,
    pub issued_at: DateTime<Utc>,
}

impl Ticket {
    pub fn audit_entry(&self, actor: &str, action: &str, from: TicketStatus) -> NewAuditEntry {
        NewAuditEntry::new(
            "ticket",
            self.ticket_code.as_str(),
            action,
            actor,
            serde_json::json!({
                "external_reference": self.external_reference.as_str(),
                "old_status": from.as_str(),
                "new_status": self.status.as_str(),
            }),
        )
    }
}

/// Ticket row awaiting insertion. Attendee data is copied, not referenced.
#[derive(Debug, Clone)]
pub struct NewTicket {
    ticket_code: TicketCode,
    position: u32,
    event_id: Uuid,
    attendee: AttendeeInput,
    qr_payload: String,
    amount_paid: MoneyAmount,
}

impl NewTicket {
    pub fn new(
        event: &Event,
        position: u32,
        attendee: &AttendeeInput,
        amount_paid: MoneyAmount,
    ) -> Result<Self, PipelineError> {
        let ticket_code = TicketCode::generate();
        let qr_payload = QrContent {
            ticket_code: ticket_code.clone(),
            event_id: event.id,
            event_name: event.name.clone(),
            starts_at: event.starts_at,
            location: event.location.clone(),
            attendee_name: attendee.name.clone(),
        }
        .encode()?;

        Ok(Self {
            ticket_code,
            position,
            event_id: event.id,
            attendee: attendee.clone(),
            qr_payload,
            amount_paid,
        })
    }

    pub fn ticket_code(&self) -> &TicketCode {
        &self.ticket_code
    }

    pub fn position(&self) -> u32 {
        self.position
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn attendee(&self) -> &AttendeeInput {
        &self.attendee
    }

    pub fn qr_payload(&self) -> &str {
        &self.qr_payload
    }

    pub fn amount_paid(&self) -> MoneyAmount {
        self.amount_paid
    }

    pub fn into_ticket(self, external_reference: ExternalReference, issued_at: DateTime<Utc>) -> Ticket {
        Ticket {
            ticket_code: self.ticket_code,
            external_reference,
            position: self.position,
            event_id: self.event_id,
            attendee: self.attendee,
            qr_payload: self.qr_payload,
            status: TicketStatus::Active,
            amount_paid: self.amount_paid,
            issued_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qr_payload_embeds_code_and_event() {
        let event = Event::new("Fest", MoneyAmount::new(100).unwrap(), 5, Utc::now(), "Park").unwrap();
        let attendee = AttendeeInput {
            name: "Ana".into(),
            email: "ana@example.com".into(),
            national_id: "1".into(),
            phone: String::new(),
        };
        let ticket = NewTicket::new(&event, 0, &attendee, MoneyAmount::new(100).unwrap()).unwrap();
        let content = QrContent::decode(ticket.qr_payload()).unwrap();
        assert_eq!(&content.ticket_code, ticket.ticket_code());
        assert_eq!(content.event_id, event.id);
        assert_eq!(content.event_name, "Fest");
        assert_eq!(content.location, "Park");
        assert_eq!(content.attendee_name, "Ana");
    }

    #[test]
    fn only_active_tickets_move() {
        use TicketStatus::*;
        assert!(Active.can_transition_to(&Used));
        assert!(Active.can_transition_to(&Cancelled));
        assert!(!Used.can_transition_to(&Active));
        assert!(!Cancelled.can_transition_to(&Used));
        assert!(!Used.can_transition_to(&Cancelled));
    }
}
