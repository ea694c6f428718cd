use {
    super::error::PipelineError,
    serde::{Deserialize, Serialize},
    std::fmt,
    std::ops::Add,
};

/// Amount in minor units (cents). Single-currency: the currency id lives in config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MoneyAmount(i64);

impl MoneyAmount {
    pub const ZERO: MoneyAmount = MoneyAmount(0);

    pub fn new(cents: i64) -> Result<Self, PipelineError> {
        if cents < 0 {
            return Err(PipelineError::Validation(format!(
                "MoneyAmount cannot be negative, got: {cents}"
            )));
        }
        Ok(Self(cents))
    }

    pub fn cents(&self) -> i64 {
        self.0
    }

    pub fn checked_add(self, other: MoneyAmount) -> Option<MoneyAmount> {
        self.0.checked_add(other.0).map(MoneyAmount)
    }

    pub fn checked_mul(self, quantity: u32) -> Option<MoneyAmount> {
        self.0.checked_mul(i64::from(quantity)).map(MoneyAmount)
    }

    /// Split into `parts` shares that sum back to `self`. Remainder cents go
    /// to the leading shares.
    pub fn split_evenly(self, parts: u32) -> Result<Vec<MoneyAmount>, PipelineError> {
        if parts == 0 {
            return Err(PipelineError::Validation(
                "cannot split an amount into zero parts".into(),
            ));
        }
        let parts_i = i64::from(parts);
        let base = self.0 / parts_i;
        let remainder = self.0 % parts_i;
        Ok((0..parts_i)
            .map(|i| MoneyAmount(base + i64::from(i < remainder)))
            .collect())
    }

    /// Major-unit value for gateway APIs that take decimal prices.
    pub fn as_major_units(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    pub fn from_major_units(value: f64) -> Result<Self, PipelineError> {
        if !value.is_finite() {
            return Err(PipelineError::Validation(format!(
                "amount is not a finite number: {value}"
            )));
        }
        Self::new((value * 100.0).round() as i64)
    }
}

impl Add for MoneyAmount {
    type Output = MoneyAmount;

    fn add(self, rhs: MoneyAmount) -> MoneyAmount {
        self.checked_add(rhs).expect("MoneyAmount overflow")
    }
}

impl fmt::Display for MoneyAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_negative() {
        assert!(MoneyAmount::new(-1).is_err());
    }

    #[test]
    fn split_distributes_remainder_first() {
        let shares = MoneyAmount::new(1001).unwrap().split_evenly(3).unwrap();
        let cents: Vec<i64> = shares.iter().map(MoneyAmount::cents).collect();
        assert_eq!(cents, vec![334, 334, 333]);
    }

    #[test]
    fn split_exact() {
        let shares = MoneyAmount::new(3000).unwrap().split_evenly(3).unwrap();
        assert!(shares.iter().all(|s| s.cents() == 1000));
    }

    #[test]
    fn shares_add_back_to_total() {
        let total = MoneyAmount::new(1001).unwrap();
        let sum = total
            .split_evenly(3)
            .unwrap()
            .into_iter()
            .fold(MoneyAmount::ZERO, |acc, share| acc + share);
        assert_eq!(sum, total);
    }

    #[test]
    fn split_into_zero_parts_fails() {
        assert!(MoneyAmount::ZERO.split_evenly(0).is_err());
    }

    #[test]
    fn major_units_round_to_nearest_cent() {
        assert_eq!(MoneyAmount::from_major_units(12.345).unwrap().cents(), 1235);
        assert_eq!(MoneyAmount::new(1250).unwrap().as_major_units(), 12.5);
        assert!(MoneyAmount::from_major_units(f64::NAN).is_err());
    }
}
