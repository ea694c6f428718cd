use {
    super::error::PipelineError,
    super::money::MoneyAmount,
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
    uuid::Uuid,
};

/// Event owned by the catalog; this service only reads it and decrements
/// `available_tickets` during issuance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub name: String,
    pub unit_price: MoneyAmount,
    pub total_tickets: u32,
    pub available_tickets: u32,
    pub starts_at: DateTime<Utc>,
    pub location: String,
}

impl Event {
    pub fn new(
        name: impl Into<String>,
        unit_price: MoneyAmount,
        total_tickets: u32,
        starts_at: DateTime<Utc>,
        location: impl Into<String>,
    ) -> Result<Self, PipelineError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(PipelineError::Validation("event name cannot be empty".into()));
        }
        Ok(Self {
            id: Uuid::now_v7(),
            name,
            unit_price,
            total_tickets,
            available_tickets: total_tickets,
            starts_at,
            location: location.into(),
        })
    }

    pub fn has_capacity_for(&self, quantity: u32) -> bool {
        self.available_tickets >= quantity
    }

    /// Take `quantity` seats. The check and the decrement are one step so
    /// callers cannot split them.
    pub fn take(&mut self, quantity: u32) -> Result<(), PipelineError> {
        if !self.has_capacity_for(quantity) {
            return Err(PipelineError::InventoryExhausted {
                requested: quantity,
                available: self.available_tickets,
            });
        }
        self.available_tickets -= quantity;
        Ok(())
    }
}
