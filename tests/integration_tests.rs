use cqrs_dispatch::es::InMemoryEventStore;
use cqrs_dispatch::{
    Aggregate, Command, CqrsContext, DispatchError, DispatchOutcome, Event, EventEnvelope, EventStore,
    Handler, HandlerOutcome, IdentityPrefix, IdentityRule, InMemoryRegistry, RegisterOptions, Returning,
    Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, thiserror::Error)]
enum CounterError {
    #[error("decrement would go negative")]
    WouldGoNegative,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum CounterEvent {
    Created,
    Incremented { by: i64 },
}

impl Event for CounterEvent {
    fn event_type(&self) -> String {
        match self {
            CounterEvent::Created => "counter_created".into(),
            CounterEvent::Incremented { .. } => "counter_incremented".into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct Counter {
    value: i64,
}

#[async_trait::async_trait]
impl Aggregate for Counter {
    const TYPE: &'static str = "counter";
    type Event = CounterEvent;
    type Error = CounterError;

    fn apply(&mut self, event: Self::Event) -> Result<(), Self::Error> {
        match event {
            CounterEvent::Created => {}
            CounterEvent::Incremented { by } => self.value += by,
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CreateCounter {
    id: String,
}

impl Command for CreateCounter {
    const KIND: &'static str = "counter.create";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IncrementCounter {
    id: String,
    by: i64,
}

impl Command for IncrementCounter {
    const KIND: &'static str = "counter.increment";
}

struct CreateCounterHandler;

#[async_trait::async_trait]
impl Handler<Counter> for CreateCounterHandler {
    type Command = CreateCounter;
    type Services = ();

    async fn execute(
        &self,
        _state: &Counter,
        _command: &Self::Command,
        _services: &Self::Services,
        _context: &CqrsContext,
    ) -> Result<HandlerOutcome<CounterEvent>, CounterError> {
        Ok(HandlerOutcome::Events(vec![CounterEvent::Created]))
    }
}

struct IncrementCounterHandler;

#[async_trait::async_trait]
impl Handler<Counter> for IncrementCounterHandler {
    type Command = IncrementCounter;
    type Services = ();

    async fn execute(
        &self,
        state: &Counter,
        command: &Self::Command,
        _services: &Self::Services,
        _context: &CqrsContext,
    ) -> Result<HandlerOutcome<CounterEvent>, CounterError> {
        if state.value + command.by < 0 {
            return Err(CounterError::WouldGoNegative);
        }
        Ok(HandlerOutcome::Events(vec![CounterEvent::Incremented {
            by: command.by,
        }]))
    }
}

fn build_router(store: Arc<InMemoryEventStore<Counter>>) -> Router {
    let registry = Arc::new(InMemoryRegistry::new());
    Router::builder()
        .register(
            CreateCounterHandler,
            (),
            store.clone(),
            registry.clone(),
            RegisterOptions::new(IdentityRule::field(|c: &CreateCounter| c.id.clone()))
                .with_prefix(IdentityPrefix::Literal("counter-".into())),
        )
        .unwrap()
        .register(
            IncrementCounterHandler,
            (),
            store,
            registry,
            RegisterOptions::new(IdentityRule::field(|c: &IncrementCounter| c.id.clone()))
                .with_prefix(IdentityPrefix::Literal("counter-".into())),
        )
        .unwrap()
        .build()
}

#[tokio::test]
async fn create_then_increment_accumulates() {
    let store = Arc::new(InMemoryEventStore::<Counter>::new());
    let router = build_router(store);

    router.dispatch(CreateCounter { id: "c1".into() }).await.unwrap();
    router
        .dispatch(IncrementCounter { id: "c1".into(), by: 3 })
        .await
        .unwrap();
    let outcome = router
        .dispatch_with(
            IncrementCounter { id: "c1".into(), by: 4 },
            cqrs_dispatch::DispatchOptions {
                returning: Some(Returning::AggregateState),
                ..Default::default()
            },
            CqrsContext::default(),
        )
        .await
        .unwrap();

    match outcome {
        DispatchOutcome::AggregateState { aggregate_state } => {
            assert_eq!(aggregate_state["value"].as_i64(), Some(7));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[tokio::test]
async fn domain_error_rejects_invalid_decrement() {
    let store = Arc::new(InMemoryEventStore::<Counter>::new());
    let router = build_router(store);

    router.dispatch(CreateCounter { id: "c2".into() }).await.unwrap();
    let err = router
        .dispatch(IncrementCounter { id: "c2".into(), by: -1 })
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::Domain(_)));
}

#[tokio::test]
async fn unregistered_command_kind_is_rejected() {
    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Unknown;
    impl Command for Unknown {
        const KIND: &'static str = "counter.unknown";
    }

    let store = Arc::new(InMemoryEventStore::<Counter>::new());
    let router = build_router(store);
    let err = router.dispatch(Unknown).await.unwrap_err();
    assert!(matches!(err, DispatchError::UnregisteredCommand(kind) if kind == "counter.unknown"));
}

#[tokio::test]
async fn empty_identity_is_rejected() {
    let store = Arc::new(InMemoryEventStore::<Counter>::new());
    let router = build_router(store);
    let err = router
        .dispatch(CreateCounter { id: "".into() })
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::InvalidAggregateIdentity));
}

/// Simulates an external writer bumping the stream's version behind the
/// actor's back (e.g. a concurrent dispatch on another process). The
/// instance's append fails with a stale expected version, reads the missed
/// event, re-executes the handler against the refreshed state, and retries
/// the append transparently to the caller.
#[tokio::test]
async fn concurrent_append_triggers_retry_and_succeeds() {
    let store = Arc::new(InMemoryEventStore::<Counter>::new());
    let router = build_router(store.clone());

    router.dispatch(CreateCounter { id: "c3".into() }).await.unwrap();

    store
        .append(
            "counter-c3",
            1,
            vec![EventEnvelope {
                event_id: "external-1".into(),
                aggregate_id: "counter-c3".into(),
                version: 2,
                payload: CounterEvent::Incremented { by: 100 },
                metadata: HashMap::new(),
                at: chrono::Utc::now(),
            }],
        )
        .await
        .unwrap();

    let outcome = router
        .dispatch_with(
            IncrementCounter { id: "c3".into(), by: 1 },
            cqrs_dispatch::DispatchOptions {
                returning: Some(Returning::AggregateState),
                ..Default::default()
            },
            CqrsContext::default(),
        )
        .await
        .unwrap();

    match outcome {
        DispatchOutcome::AggregateState { aggregate_state } => {
            assert_eq!(aggregate_state["value"].as_i64(), Some(101));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}
