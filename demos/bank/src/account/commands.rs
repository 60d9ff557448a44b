use crate::account::amount::Amount;
use cqrs_dispatch::Command;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAccount {
    pub account_number: String,
    pub owner: String,
}

impl Command for OpenAccount {
    const KIND: &'static str = "bank.account.open";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deposit {
    pub account_number: String,
    pub amount: Amount,
}

impl Command for Deposit {
    const KIND: &'static str = "bank.account.deposit";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Withdraw {
    pub account_number: String,
    pub amount: Amount,
}

impl Command for Withdraw {
    const KIND: &'static str = "bank.account.withdraw";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloseAccount {
    pub account_number: String,
}

impl Command for CloseAccount {
    const KIND: &'static str = "bank.account.close";
}
