use bank::account::{self, Account, CloseAccount, CloseAccountHandler, Deposit, DepositHandler, OpenAccount, OpenAccountHandler, Withdraw, WithdrawHandler};
use cqrs_dispatch::es::InMemoryEventStore;
use cqrs_dispatch::{CqrsContext, DispatchOutcome, IdentityPrefix, IdentityRule, InMemoryRegistry, RegisterOptions, Router};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let store = Arc::new(InMemoryEventStore::<Account>::new());
    let registry = Arc::new(InMemoryRegistry::new());

    let prefix = IdentityPrefix::Literal("bank-account-".into());

    let router = Router::builder()
        .register(
            OpenAccountHandler,
            (),
            store.clone(),
            registry.clone(),
            RegisterOptions::new(IdentityRule::field(|c: &OpenAccount| c.account_number.clone()))
                .with_prefix(prefix.clone()),
        )
        .expect("register OpenAccount")
        .register(
            DepositHandler,
            (),
            store.clone(),
            registry.clone(),
            RegisterOptions::new(IdentityRule::field(|c: &Deposit| c.account_number.clone()))
                .with_prefix(prefix.clone()),
        )
        .expect("register Deposit")
        .register(
            WithdrawHandler,
            (),
            store.clone(),
            registry.clone(),
            RegisterOptions::new(IdentityRule::field(|c: &Withdraw| c.account_number.clone()))
                .with_prefix(prefix.clone()),
        )
        .expect("register Withdraw")
        .register(
            CloseAccountHandler,
            (),
            store.clone(),
            registry.clone(),
            RegisterOptions::new(IdentityRule::field(|c: &CloseAccount| c.account_number.clone()))
                .with_prefix(prefix),
        )
        .expect("register CloseAccount")
        .build();

    let context = CqrsContext::default();

    router
        .dispatch(OpenAccount {
            account_number: "ACC1".into(),
            owner: "bob".into(),
        })
        .await
        .expect("open account");

    let outcome = router
        .dispatch(Deposit {
            account_number: "ACC1".into(),
            amount: account::Amount::new(50.0),
        })
        .await
        .expect("deposit");

    match outcome {
        DispatchOutcome::Ok => info!("deposit accepted"),
        other => info!(?other, "deposit accepted with response"),
    }

    let _ = context;
}
