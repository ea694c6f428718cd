use {
    super::{to_i32, to_u32},
    crate::domain::{error::PipelineError, event::Event, money::MoneyAmount},
    chrono::{DateTime, Utc},
    uuid::Uuid,
};

#[derive(sqlx::FromRow)]
struct EventRow {
    id: Uuid,
    name: String,
    unit_price: i64,
    total_tickets: i32,
    available_tickets: i32,
    starts_at: DateTime<Utc>,
    location: String,
}

impl TryFrom<EventRow> for Event {
    type Error = PipelineError;

    fn try_from(row: EventRow) -> Result<Self, Self::Error> {
        Ok(Event {
            id: row.id,
            name: row.name,
            unit_price: MoneyAmount::new(row.unit_price)?,
            total_tickets: to_u32(row.total_tickets)?,
            available_tickets: to_u32(row.available_tickets)?,
            starts_at: row.starts_at,
            location: row.location,
        })
    }
}

pub async fn insert_event(pool: &sqlx::PgPool, event: &Event) -> Result<(), PipelineError> {
    sqlx::query(
        r#"
        INSERT INTO events (id, name, unit_price, total_tickets, available_tickets, starts_at, location)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(event.id)
    .bind(&event.name)
    .bind(event.unit_price.cents())
    .bind(to_i32(event.total_tickets)?)
    .bind(to_i32(event.available_tickets)?)
    .bind(event.starts_at)
    .bind(&event.location)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn find_event(
    conn: &mut sqlx::PgConnection,
    id: Uuid,
) -> Result<Option<Event>, PipelineError> {
    let row = sqlx::query_as::<_, EventRow>(
        "SELECT id, name, unit_price, total_tickets, available_tickets, starts_at, location FROM events WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(conn)
    .await?;

    row.map(Event::try_from).transpose()
}

/// Conditional decrement: succeeds only while enough tickets remain, so
/// concurrent issuances can never drive the count below zero.
pub async fn take_tickets(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    event_id: Uuid,
    quantity: u32,
) -> Result<u32, PipelineError> {
    let remaining: Option<i32> = sqlx::query_scalar(
        r#"
        UPDATE events
        SET available_tickets = available_tickets - $1
        WHERE id = $2 AND available_tickets >= $1
        RETURNING available_tickets
        "#,
    )
    .bind(to_i32(quantity)?)
    .bind(event_id)
    .fetch_optional(&mut **tx)
    .await?;

    match remaining {
        Some(left) => to_u32(left),
        None => {
            let available: Option<i32> =
                sqlx::query_scalar("SELECT available_tickets FROM events WHERE id = $1")
                    .bind(event_id)
                    .fetch_optional(&mut **tx)
                    .await?;
            match available {
                Some(available) => Err(PipelineError::InventoryExhausted {
                    requested: quantity,
                    available: to_u32(available)?,
                }),
                None => Err(PipelineError::NotFound(format!("event {event_id}"))),
            }
        }
    }
}
