use crate::event::Event;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;

/// A consistency boundary whose state is the fold of its event stream.
///
/// Identity is not carried on the aggregate
/// value itself — the runtime resolves identity from the *command* (via
/// [`crate::identity::IdentityRule`]) before an instance is ever created, so
/// `Aggregate` only needs to know how to apply an event to itself.
#[async_trait::async_trait]
pub trait Aggregate: Default + Debug + Clone + Serialize + DeserializeOwned + Sync + Send {
    const TYPE: &'static str;

    type Event: Event;
    type Error: std::error::Error + Send + Sync + 'static;

    fn apply(&mut self, event: Self::Event) -> Result<(), Self::Error>;
}

/// What a [`Handler`] produced for a single command.
#[derive(Debug, Clone)]
pub enum HandlerOutcome<E> {
    /// Zero or more events; no reply beyond the shape `returning` asks for.
    Events(Vec<E>),
    /// Events plus a domain reply, forwarded only when `returning` permits
    /// it (requires `returning = execution_result`).
    EventsWithReply(Vec<E>, serde_json::Value),
}

impl<E> HandlerOutcome<E> {
    pub fn events(&self) -> &[E] {
        match self {
            HandlerOutcome::Events(events) => events,
            HandlerOutcome::EventsWithReply(events, _) => events,
        }
    }

    pub fn into_events(self) -> Vec<E> {
        match self {
            HandlerOutcome::Events(events) => events,
            HandlerOutcome::EventsWithReply(events, _) => events,
        }
    }

    pub fn reply(&self) -> Option<&serde_json::Value> {
        match self {
            HandlerOutcome::Events(_) => None,
            HandlerOutcome::EventsWithReply(_, reply) => Some(reply),
        }
    }
}

/// Executes one command against aggregate state, producing events or a
/// domain error. A single typed method covers both creation and mutation:
/// a command's `KIND` already distinguishes "open a new one" from "mutate
/// an existing one", so there's no separate create/update split.
#[async_trait::async_trait]
pub trait Handler<A: Aggregate>: Send + Sync {
    type Command: crate::Command;
    type Services: Send + Sync;

    async fn execute(
        &self,
        state: &A,
        command: &Self::Command,
        services: &Self::Services,
        context: &crate::CqrsContext,
    ) -> Result<HandlerOutcome<A::Event>, A::Error>;
}
