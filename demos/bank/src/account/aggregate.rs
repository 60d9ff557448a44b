use crate::account::errors::ErrorCode;
use crate::account::{Amount, CloseAccount, Deposit, Events, OpenAccount, Withdraw};
use cqrs_dispatch::{Aggregate, CqrsContext, CqrsError, CqrsErrorCode, Handler, HandlerOutcome};

const AGGREGATE_TYPE: &str = "account";

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct Account {
    pub owner: String,
    pub amount: Amount,
    pub closed: bool,
}

#[async_trait::async_trait]
impl Aggregate for Account {
    const TYPE: &'static str = AGGREGATE_TYPE;

    type Event = Events;
    type Error = CqrsError;

    fn apply(&mut self, event: Self::Event) -> Result<(), Self::Error> {
        match event {
            Events::AccountOpened { owner } => {
                self.owner = owner;
            }
            Events::Deposited { amount } => {
                self.amount += amount;
            }
            Events::Withdrawn { amount } => {
                self.amount -= amount;
            }
            Events::Closed => {
                self.closed = true;
            }
        }
        Ok(())
    }
}

pub struct OpenAccountHandler;

#[async_trait::async_trait]
impl Handler<Account> for OpenAccountHandler {
    type Command = OpenAccount;
    type Services = ();

    async fn execute(
        &self,
        _state: &Account,
        command: &Self::Command,
        _services: &Self::Services,
        _context: &CqrsContext,
    ) -> Result<HandlerOutcome<Events>, CqrsError> {
        Ok(HandlerOutcome::Events(vec![Events::AccountOpened {
            owner: command.owner.clone(),
        }]))
    }
}

pub struct DepositHandler;

#[async_trait::async_trait]
impl Handler<Account> for DepositHandler {
    type Command = Deposit;
    type Services = ();

    async fn execute(
        &self,
        state: &Account,
        command: &Self::Command,
        _services: &Self::Services,
        _context: &CqrsContext,
    ) -> Result<HandlerOutcome<Events>, CqrsError> {
        if state.closed {
            return Err(ErrorCode::AccountClosed.error("this account is closed"));
        }
        if command.amount.value <= 0f64 {
            return Err(ErrorCode::InvalidAmount.error("deposit amount must be positive"));
        }
        Ok(HandlerOutcome::Events(vec![Events::Deposited {
            amount: command.amount,
        }]))
    }
}

pub struct WithdrawHandler;

#[async_trait::async_trait]
impl Handler<Account> for WithdrawHandler {
    type Command = Withdraw;
    type Services = ();

    async fn execute(
        &self,
        state: &Account,
        command: &Self::Command,
        _services: &Self::Services,
        _context: &CqrsContext,
    ) -> Result<HandlerOutcome<Events>, CqrsError> {
        if state.closed {
            return Err(ErrorCode::AccountClosed.error("this account is closed"));
        }
        if command.amount.value <= 0f64 {
            return Err(ErrorCode::InvalidAmount.error("withdrawal amount must be positive"));
        }
        if state.amount.value < command.amount.value {
            return Err(ErrorCode::InsufficientFunds.error(format!(
                "cannot withdraw {}, balance is {}",
                command.amount.value, state.amount.value
            )));
        }
        Ok(HandlerOutcome::Events(vec![Events::Withdrawn {
            amount: command.amount,
        }]))
    }
}

pub struct CloseAccountHandler;

#[async_trait::async_trait]
impl Handler<Account> for CloseAccountHandler {
    type Command = CloseAccount;
    type Services = ();

    async fn execute(
        &self,
        state: &Account,
        _command: &Self::Command,
        _services: &Self::Services,
        _context: &CqrsContext,
    ) -> Result<HandlerOutcome<Events>, CqrsError> {
        if state.closed {
            return Err(ErrorCode::AccountClosed.error("this account is already closed"));
        }
        Ok(HandlerOutcome::Events(vec![Events::Closed]))
    }
}
