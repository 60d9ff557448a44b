use bank::account::{
    Account, Amount, CloseAccount, CloseAccountHandler, Deposit, DepositHandler, OpenAccount,
    OpenAccountHandler, Withdraw, WithdrawHandler,
};
use cqrs_dispatch::es::InMemoryEventStore;
use cqrs_dispatch::{DispatchOutcome, IdentityPrefix, IdentityRule, InMemoryRegistry, RegisterOptions, Returning, Router};
use std::sync::Arc;

fn build_router() -> Router {
    let store = Arc::new(InMemoryEventStore::<Account>::new());
    let registry = Arc::new(InMemoryRegistry::new());
    let prefix = IdentityPrefix::Literal("bank-account-".into());

    Router::builder()
        .register(
            OpenAccountHandler,
            (),
            store.clone(),
            registry.clone(),
            RegisterOptions::new(IdentityRule::field(|c: &OpenAccount| c.account_number.clone()))
                .with_prefix(prefix.clone()),
        )
        .unwrap()
        .register(
            DepositHandler,
            (),
            store.clone(),
            registry.clone(),
            RegisterOptions::new(IdentityRule::field(|c: &Deposit| c.account_number.clone()))
                .with_prefix(prefix.clone()),
        )
        .unwrap()
        .register(
            WithdrawHandler,
            (),
            store.clone(),
            registry.clone(),
            RegisterOptions::new(IdentityRule::field(|c: &Withdraw| c.account_number.clone()))
                .with_prefix(prefix.clone()),
        )
        .unwrap()
        .register(
            CloseAccountHandler,
            (),
            store.clone(),
            registry.clone(),
            RegisterOptions::new(IdentityRule::field(|c: &CloseAccount| c.account_number.clone()))
                .with_prefix(prefix),
        )
        .unwrap()
        .build()
}

#[tokio::test]
async fn open_and_deposit_accumulates_balance() {
    let router = build_router();

    router
        .dispatch(OpenAccount {
            account_number: "ACC1".into(),
            owner: "bob".into(),
        })
        .await
        .unwrap();

    for _ in 0..4 {
        router
            .dispatch(Deposit {
                account_number: "ACC1".into(),
                amount: Amount::new(50.0),
            })
            .await
            .unwrap();
    }

    let outcome = router
        .dispatch_with(
            Withdraw {
                account_number: "ACC1".into(),
                amount: Amount::new(10.0),
            },
            cqrs_dispatch::DispatchOptions {
                returning: Some(Returning::AggregateState),
                ..Default::default()
            },
            cqrs_dispatch::CqrsContext::default(),
        )
        .await
        .unwrap();

    match outcome {
        DispatchOutcome::AggregateState { aggregate_state } => {
            let balance = aggregate_state["amount"]["value"].as_f64().unwrap();
            assert_eq!(balance, 190.0);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[tokio::test]
async fn withdraw_beyond_balance_is_rejected() {
    let router = build_router();

    router
        .dispatch(OpenAccount {
            account_number: "ACC2".into(),
            owner: "alice".into(),
        })
        .await
        .unwrap();

    let err = router
        .dispatch(Withdraw {
            account_number: "ACC2".into(),
            amount: Amount::new(10.0),
        })
        .await
        .unwrap_err();

    assert!(matches!(err, cqrs_dispatch::DispatchError::Domain(_)));
}

#[tokio::test]
async fn closed_account_rejects_further_deposits() {
    let router = build_router();

    router
        .dispatch(OpenAccount {
            account_number: "ACC3".into(),
            owner: "carol".into(),
        })
        .await
        .unwrap();
    router
        .dispatch(CloseAccount {
            account_number: "ACC3".into(),
        })
        .await
        .unwrap();

    let err = router
        .dispatch(Deposit {
            account_number: "ACC3".into(),
            amount: Amount::new(10.0),
        })
        .await
        .unwrap_err();

    assert!(matches!(err, cqrs_dispatch::DispatchError::Domain(_)));
}

#[tokio::test]
async fn empty_identity_is_rejected_before_dispatch() {
    let router = build_router();

    let err = router
        .dispatch(OpenAccount {
            account_number: "".into(),
            owner: "dave".into(),
        })
        .await
        .unwrap_err();

    assert!(matches!(err, cqrs_dispatch::DispatchError::InvalidAggregateIdentity));
}
