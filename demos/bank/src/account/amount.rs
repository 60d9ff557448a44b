use serde::{Deserialize, Serialize};
use std::ops::{AddAssign, SubAssign};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Amount {
    pub value: f64,
    pub currency: &'static str,
}

impl Amount {
    pub fn new(value: f64) -> Self {
        Self {
            value,
            currency: "EUR",
        }
    }

    pub fn abs(&self) -> Self {
        Self {
            value: self.value.abs(),
            currency: self.currency,
        }
    }
}

impl Default for Amount {
    fn default() -> Self {
        Self::new(0.0)
    }
}

impl AddAssign for Amount {
    fn add_assign(&mut self, rhs: Self) {
        self.value += rhs.value;
    }
}

impl SubAssign for Amount {
    fn sub_assign(&mut self, rhs: Self) {
        self.value -= rhs.value;
    }
}

impl From<f64> for Amount {
    fn from(value: f64) -> Self {
        Self::new(value)
    }
}
