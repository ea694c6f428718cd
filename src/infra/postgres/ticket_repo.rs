use {
    super::{to_i32, to_u32},
    crate::domain::{
        error::PipelineError,
        id::{ExternalReference, TicketCode},
        intent::AttendeeInput,
        money::MoneyAmount,
        ticket::{NewTicket, Ticket, TicketStatus},
    },
    chrono::{DateTime, Utc},
    uuid::Uuid,
};

const TICKET_COLUMNS: &str = "ticket_code, external_reference, position, event_id, attendee_name, \
     attendee_email, attendee_national_id, attendee_phone, qr_payload, status, amount_paid, issued_at";

#[derive(sqlx::FromRow)]
struct TicketRow {
    ticket_code: String,
    external_reference: String,
    position: i32,
    event_id: Uuid,
    attendee_name: String,
    attendee_email: String,
    attendee_national_id: String,
    attendee_phone: String,
    qr_payload: String,
    status: String,
    amount_paid: i64,
    issued_at: DateTime<Utc>,
}

impl TryFrom<TicketRow> for Ticket {
    type Error = PipelineError;

    fn try_from(row: TicketRow) -> Result<Self, Self::Error> {
        Ok(Ticket {
            ticket_code: TicketCode::new(row.ticket_code)?,
            external_reference: ExternalReference::new(row.external_reference)?,
            position: to_u32(row.position)?,
            event_id: row.event_id,
            attendee: AttendeeInput {
                name: row.attendee_name,
                email: row.attendee_email,
                national_id: row.attendee_national_id,
                phone: row.attendee_phone,
            },
            qr_payload: row.qr_payload,
            status: TicketStatus::try_from(row.status.as_str())?,
            amount_paid: MoneyAmount::new(row.amount_paid)?,
            issued_at: row.issued_at,
        })
    }
}

pub async fn insert_batch(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    reference: &ExternalReference,
    batch: Vec<NewTicket>,
    issued_at: DateTime<Utc>,
) -> Result<Vec<Ticket>, PipelineError> {
    let mut issued = Vec::with_capacity(batch.len());
    for new_ticket in batch {
        let ticket = new_ticket.into_ticket(reference.clone(), issued_at);
        sqlx::query(
            r#"
            INSERT INTO tickets
                (ticket_code, external_reference, position, event_id, attendee_name,
                 attendee_email, attendee_national_id, attendee_phone, qr_payload,
                 status, amount_paid, issued_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(ticket.ticket_code.as_str())
        .bind(reference.as_str())
        .bind(to_i32(ticket.position)?)
        .bind(ticket.event_id)
        .bind(&ticket.attendee.name)
        .bind(&ticket.attendee.email)
        .bind(&ticket.attendee.national_id)
        .bind(&ticket.attendee.phone)
        .bind(&ticket.qr_payload)
        .bind(ticket.status.as_str())
        .bind(ticket.amount_paid.cents())
        .bind(ticket.issued_at)
        .execute(&mut **tx)
        .await?;
        issued.push(ticket);
    }
    Ok(issued)
}

pub async fn tickets_for_intent(
    pool: &sqlx::PgPool,
    reference: &ExternalReference,
) -> Result<Vec<Ticket>, PipelineError> {
    let sql = format!(
        "SELECT {TICKET_COLUMNS} FROM tickets WHERE external_reference = $1 ORDER BY position"
    );
    let rows = sqlx::query_as::<_, TicketRow>(&sql)
        .bind(reference.as_str())
        .fetch_all(pool)
        .await?;
    rows.into_iter().map(Ticket::try_from).collect()
}

pub async fn lock_ticket(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    code: &TicketCode,
) -> Result<Option<Ticket>, PipelineError> {
    let sql = format!("SELECT {TICKET_COLUMNS} FROM tickets WHERE ticket_code = $1 FOR UPDATE");
    let row = sqlx::query_as::<_, TicketRow>(&sql)
        .bind(code.as_str())
        .fetch_optional(&mut **tx)
        .await?;
    row.map(Ticket::try_from).transpose()
}

pub async fn set_status(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    code: &TicketCode,
    status: TicketStatus,
) -> Result<(), PipelineError> {
    sqlx::query("UPDATE tickets SET status = $1 WHERE ticket_code = $2")
        .bind(status.as_str())
        .bind(code.as_str())
        .execute(&mut **tx)
        .await?;
    Ok(())
}
