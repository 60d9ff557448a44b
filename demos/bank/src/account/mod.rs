pub mod aggregate;
pub mod amount;
pub mod commands;
pub mod errors;
pub mod events;

pub use aggregate::{Account, CloseAccountHandler, DepositHandler, OpenAccountHandler, WithdrawHandler};
pub use amount::Amount;
pub use commands::{CloseAccount, Deposit, OpenAccount, Withdraw};
pub use errors::ErrorCode;
pub use events::Events;
