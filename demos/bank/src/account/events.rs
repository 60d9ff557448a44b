use crate::account::Amount;
use cqrs_dispatch::Event;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Events {
    AccountOpened { owner: String },
    Deposited { amount: Amount },
    Withdrawn { amount: Amount },
    Closed,
}

impl Event for Events {
    fn event_type(&self) -> String {
        match self {
            Events::AccountOpened { .. } => "account_opened".to_string(),
            Events::Deposited { .. } => "amount_deposited".to_string(),
            Events::Withdrawn { .. } => "amount_withdrawn".to_string(),
            Events::Closed => "account_closed".to_string(),
        }
    }
}
