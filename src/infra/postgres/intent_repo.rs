use {
    super::{to_i32, to_u32},
    crate::domain::{
        error::PipelineError,
        gateway::GatewayPaymentStatus,
        id::{ExternalReference, GatewayPaymentId},
        intent::{AttendeeInput, IntentStatus, PaymentIntent},
        money::MoneyAmount,
    },
    chrono::{DateTime, Utc},
    sqlx::types::Json,
    uuid::Uuid,
};

const INTENT_COLUMNS: &str = "external_reference, gateway_intent_id, event_id, requested_quantity, \
     attendees, total_amount, status, gateway_payment_id, gateway_status, fulfillment_error, \
     created_at, updated_at";

#[derive(sqlx::FromRow)]
struct IntentRow {
    external_reference: String,
    gateway_intent_id: Option<String>,
    event_id: Uuid,
    requested_quantity: i32,
    attendees: Json<Vec<AttendeeInput>>,
    total_amount: i64,
    status: String,
    gateway_payment_id: Option<String>,
    gateway_status: Option<String>,
    fulfillment_error: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<IntentRow> for PaymentIntent {
    type Error = PipelineError;

    fn try_from(row: IntentRow) -> Result<Self, Self::Error> {
        Ok(PaymentIntent {
            external_reference: ExternalReference::new(row.external_reference)?,
            gateway_intent_id: row.gateway_intent_id,
            event_id: row.event_id,
            requested_quantity: to_u32(row.requested_quantity)?,
            attendees: row.attendees.0,
            total_amount: MoneyAmount::new(row.total_amount)?,
            status: IntentStatus::try_from(row.status.as_str())?,
            gateway_payment_id: row.gateway_payment_id.map(GatewayPaymentId::new).transpose()?,
            gateway_status: row
                .gateway_status
                .as_deref()
                .map(GatewayPaymentStatus::try_from)
                .transpose()?,
            fulfillment_error: row.fulfillment_error,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

pub async fn insert_intent(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    intent: &PaymentIntent,
) -> Result<(), PipelineError> {
    sqlx::query(
        r#"
        INSERT INTO payment_intents
            (external_reference, event_id, requested_quantity, attendees, total_amount,
             status, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(intent.external_reference.as_str())
    .bind(intent.event_id)
    .bind(to_i32(intent.requested_quantity)?)
    .bind(Json(&intent.attendees))
    .bind(intent.total_amount.cents())
    .bind(intent.status.as_str())
    .bind(intent.created_at)
    .bind(intent.updated_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

pub async fn find_intent(
    conn: &mut sqlx::PgConnection,
    reference: &ExternalReference,
) -> Result<Option<PaymentIntent>, PipelineError> {
    let sql = format!("SELECT {INTENT_COLUMNS} FROM payment_intents WHERE external_reference = $1");
    let row = sqlx::query_as::<_, IntentRow>(&sql)
        .bind(reference.as_str())
        .fetch_optional(conn)
        .await?;
    row.map(PaymentIntent::try_from).transpose()
}

/// Serialize all processing for this reference until the transaction ends.
/// Works even before the row exists, so there is no insert race to handle.
pub async fn lock_reference(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    reference: &ExternalReference,
) -> Result<(), PipelineError> {
    sqlx::query("SET LOCAL lock_timeout = '5s'")
        .execute(&mut **tx)
        .await?;
    sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
        .bind(reference.as_str())
        .execute(&mut **tx)
        .await?;
    Ok(())
}

pub async fn update_state(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    intent: &PaymentIntent,
) -> Result<(), PipelineError> {
    sqlx::query(
        r#"
        UPDATE payment_intents
        SET status = $1, gateway_payment_id = $2, gateway_status = $3,
            fulfillment_error = $4, updated_at = $5
        WHERE external_reference = $6
        "#,
    )
    .bind(intent.status.as_str())
    .bind(intent.gateway_payment_id.as_ref().map(GatewayPaymentId::as_str))
    .bind(intent.gateway_status.as_ref().map(GatewayPaymentStatus::as_str))
    .bind(intent.fulfillment_error.as_deref())
    .bind(intent.updated_at)
    .bind(intent.external_reference.as_str())
    .execute(&mut **tx)
    .await?;
    Ok(())
}

pub async fn set_gateway_intent_id(
    pool: &sqlx::PgPool,
    reference: &ExternalReference,
    gateway_intent_id: &str,
) -> Result<Option<PaymentIntent>, PipelineError> {
    let sql = format!(
        "UPDATE payment_intents SET gateway_intent_id = $1, updated_at = now() \
         WHERE external_reference = $2 RETURNING {INTENT_COLUMNS}"
    );
    let row = sqlx::query_as::<_, IntentRow>(&sql)
        .bind(gateway_intent_id)
        .bind(reference.as_str())
        .fetch_optional(pool)
        .await?;
    row.map(PaymentIntent::try_from).transpose()
}

pub async fn stale_pending(
    pool: &sqlx::PgPool,
    updated_before: DateTime<Utc>,
    limit: u32,
) -> Result<Vec<PaymentIntent>, PipelineError> {
    let sql = format!(
        "SELECT {INTENT_COLUMNS} FROM payment_intents \
         WHERE status = 'pending' AND gateway_payment_id IS NOT NULL \
           AND fulfillment_error IS NULL AND updated_at < $1 \
         ORDER BY updated_at LIMIT $2"
    );
    let rows = sqlx::query_as::<_, IntentRow>(&sql)
        .bind(updated_before)
        .bind(i64::from(limit))
        .fetch_all(pool)
        .await?;
    rows.into_iter().map(PaymentIntent::try_from).collect()
}
