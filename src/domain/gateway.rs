use {
    super::error::PipelineError,
    super::id::{ExternalReference, GatewayPaymentId},
    super::money::MoneyAmount,
    super::BoxFuture,
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
    std::fmt,
};

/// Payment status as reported by the gateway, collapsed to what drives the
/// intent state machine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GatewayPaymentStatus {
    Approved,
    Rejected,
    Pending,
    /// Refunded or charged back after approval. Never drives a transition.
    Reversed,
}

impl GatewayPaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Pending => "pending",
            Self::Reversed => "reversed",
        }
    }

    pub fn from_gateway(status: &str) -> Self {
        match status {
            "approved" => Self::Approved,
            "rejected" | "cancelled" => Self::Rejected,
            "pending" | "in_process" | "authorized" | "in_mediation" => Self::Pending,
            "refunded" | "charged_back" => Self::Reversed,
            other => {
                tracing::warn!("unknown gateway payment status: {other}, defaulting to pending");
                Self::Pending
            }
        }
    }
}

impl fmt::Display for GatewayPaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for GatewayPaymentStatus {
    type Error = PipelineError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            "pending" => Ok(Self::Pending),
            "reversed" => Ok(Self::Reversed),
            other => Err(PipelineError::Validation(format!(
                "unknown gateway status: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IntentItem {
    pub id: String,
    pub title: String,
    pub quantity: u32,
    pub unit_price: MoneyAmount,
}

#[derive(Debug, Clone, Serialize)]
pub struct Payer {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BackUrls {
    pub success: String,
    pub failure: String,
    pub pending: String,
}

#[derive(Debug, Clone)]
pub struct IntentRequest {
    pub items: Vec<IntentItem>,
    pub payer: Payer,
    pub back_urls: BackUrls,
    pub notification_url: String,
    pub external_reference: ExternalReference,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreatedIntent {
    pub gateway_intent_id: String,
    pub redirect_url: String,
}

/// What the service layer gets back after fetching a payment from the gateway.
#[derive(Debug, Clone)]
pub struct FetchedPayment {
    pub id: GatewayPaymentId,
    pub status: GatewayPaymentStatus,
    pub status_detail: Option<String>,
    pub amount: MoneyAmount,
    /// Raw reference as the gateway echoes it; may be absent or foreign.
    pub external_reference: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OrderPayment {
    pub id: GatewayPaymentId,
    pub status: GatewayPaymentStatus,
}

#[derive(Debug, Clone)]
pub struct FetchedOrder {
    pub payments: Vec<OrderPayment>,
}

impl FetchedOrder {
    pub fn approved_payment(&self) -> Option<&GatewayPaymentId> {
        self.payments
            .iter()
            .find(|p| p.status == GatewayPaymentStatus::Approved)
            .map(|p| &p.id)
    }
}

/// Narrow contract with the external payment gateway. Each call is a single
/// attempt bounded by the client's network timeout.
pub trait PaymentGateway: Send + Sync {
    fn create_intent<'a>(
        &'a self,
        request: &'a IntentRequest,
    ) -> BoxFuture<'a, Result<CreatedIntent, PipelineError>>;

    fn fetch_payment<'a>(
        &'a self,
        payment_id: &'a GatewayPaymentId,
    ) -> BoxFuture<'a, Result<FetchedPayment, PipelineError>>;

    fn fetch_order<'a>(&'a self, order_id: &'a str)
    -> BoxFuture<'a, Result<FetchedOrder, PipelineError>>;
}
