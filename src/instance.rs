//! The Aggregate Instance: a per-identity serialized actor — lazy
//! rehydration, command execution, optimistic-concurrency append with
//! retry, lifespan-driven shutdown. One `tokio::spawn`-ed task per
//! identity, fed through a mailbox, so commands against the same stream
//! never race.

use crate::aggregate::{Aggregate, HandlerOutcome};
use crate::context::CqrsContext;
use crate::errors::DispatchError;
use crate::event::EventEnvelope;
use crate::event_store::{AppendError, EventStore};
use crate::lifespan::{LifespanAction, LifespanPolicy};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

/// Type-erased handler invocation, built by the Router at dispatch time so
/// the instance task doesn't need to be generic over every `Handler` and
/// `Command` type it will ever see — only over the `Aggregate`.
#[async_trait::async_trait]
pub trait AggregateExecutor<A: Aggregate>: Send + Sync {
    fn command_kind(&self) -> &'static str;

    async fn execute(
        &self,
        state: &A,
        context: &CqrsContext,
    ) -> Result<HandlerOutcome<A::Event>, A::Error>;
}

/// Richest internal reply shape; the Dispatcher projects this down to the
/// requested `returning` mode.
#[derive(Debug, Clone)]
pub struct InstanceReply<A: Aggregate> {
    pub aggregate_state: A,
    pub aggregate_version: usize,
    pub events: Vec<A::Event>,
    pub reply: Option<serde_json::Value>,
}

pub struct ExecuteRequest<A: Aggregate> {
    pub invocation: Box<dyn AggregateExecutor<A>>,
    pub context: CqrsContext,
    pub command_uuid: String,
    pub causation_id: String,
    pub correlation_id: String,
    pub metadata: HashMap<String, String>,
    pub retry_attempts: u32,
    pub reply: oneshot::Sender<Result<InstanceReply<A>, DispatchError>>,
}

#[derive(Clone)]
pub struct AggregateInstanceHandle<A: Aggregate> {
    sender: mpsc::Sender<ExecuteRequest<A>>,
}

impl<A: Aggregate> AggregateInstanceHandle<A> {
    pub async fn send(&self, request: ExecuteRequest<A>) -> Result<(), DispatchError> {
        self.sender
            .send(request)
            .await
            .map_err(|_| DispatchError::AggregateStopped)
    }
}

struct InstanceState<A: Aggregate> {
    stream_uuid: String,
    state: A,
    version: usize,
    rehydrated: bool,
}

/// Spawns the mailbox-fed task owning one `(aggregate_kind, stream_uuid)`.
/// Returns immediately with a handle; the task itself runs until the
/// lifespan policy says to stop or the mailbox is dropped.
pub fn spawn<A>(
    stream_uuid: String,
    store: Arc<dyn EventStore<A>>,
    lifespan: Arc<dyn LifespanPolicy<A>>,
    mailbox_capacity: usize,
) -> AggregateInstanceHandle<A>
where
    A: Aggregate + 'static,
{
    let (sender, receiver) = mpsc::channel(mailbox_capacity);
    tokio::spawn(run(stream_uuid, store, lifespan, receiver));
    AggregateInstanceHandle { sender }
}

async fn run<A>(
    stream_uuid: String,
    store: Arc<dyn EventStore<A>>,
    lifespan: Arc<dyn LifespanPolicy<A>>,
    mut receiver: mpsc::Receiver<ExecuteRequest<A>>,
) where
    A: Aggregate + 'static,
{
    let mut instance = InstanceState {
        stream_uuid: stream_uuid.clone(),
        state: A::default(),
        version: 0,
        rehydrated: false,
    };

    loop {
        let idle_timeout = match receiver.recv().await {
            Some(request) => {
                let command_kind = request.invocation.command_kind();
                let action = process_request(&mut instance, &*store, request, &*lifespan).await;
                debug!(stream_uuid = %instance.stream_uuid, command_kind, ?action, "lifespan decision");
                match action {
                    LifespanAction::Stop => {
                        info!(stream_uuid = %instance.stream_uuid, "instance stopping per lifespan policy");
                        return;
                    }
                    LifespanAction::Hibernate => continue,
                    LifespanAction::Infinity => continue,
                    LifespanAction::TimeoutMs(ms) => Some(ms),
                }
            }
            None => return,
        };

        if let Some(ms) = idle_timeout {
            match tokio::time::timeout(
                std::time::Duration::from_millis(ms),
                receiver.recv(),
            )
            .await
            {
                Ok(Some(request)) => {
                    // Put it back through the normal loop by looping once
                    // more with this request handled inline.
                    let command_kind = request.invocation.command_kind();
                    let action = process_request(&mut instance, &*store, request, &*lifespan).await;
                    debug!(stream_uuid = %instance.stream_uuid, command_kind, ?action, "lifespan decision");
                    if matches!(action, LifespanAction::Stop) {
                        return;
                    }
                }
                Ok(None) => return,
                Err(_) => {
                    info!(stream_uuid = %instance.stream_uuid, "instance idle timeout, stopping");
                    return;
                }
            }
        }
    }
}

async fn process_request<A>(
    instance: &mut InstanceState<A>,
    store: &dyn EventStore<A>,
    request: ExecuteRequest<A>,
    lifespan: &dyn LifespanPolicy<A>,
) -> LifespanAction
where
    A: Aggregate,
{
    if !instance.rehydrated {
        match store.load_aggregate(&instance.stream_uuid).await {
            Ok((state, version)) => {
                instance.state = state;
                instance.version = version;
                instance.rehydrated = true;
            }
            Err(e) => {
                error!(stream_uuid = %instance.stream_uuid, error = %e, "rehydration failed");
                let _ = request.reply.send(Err(DispatchError::Infrastructure(e.to_string())));
                // No domain `A::Error` exists here (the handler never ran),
                // so this bypasses `after_error` and terminates directly;
                // the Registry re-creates the instance on demand.
                return LifespanAction::Stop;
            }
        }
    }

    let (outcome, action) =
        execute_with_retry(instance, store, &*request.invocation, &request, lifespan).await;
    let _ = request.reply.send(outcome);
    action
}

async fn execute_with_retry<A>(
    instance: &mut InstanceState<A>,
    store: &dyn EventStore<A>,
    invocation: &dyn AggregateExecutor<A>,
    request: &ExecuteRequest<A>,
    lifespan: &dyn LifespanPolicy<A>,
) -> (Result<InstanceReply<A>, DispatchError>, LifespanAction)
where
    A: Aggregate,
{
    let mut retry_attempts = request.retry_attempts;

    loop {
        let outcome = match invocation.execute(&instance.state, &request.context).await {
            Ok(outcome) => outcome,
            Err(e) => {
                let action = lifespan.after_error(&e).await;
                return (Err(DispatchError::domain(e)), action);
            }
        };

        let events = outcome.events().to_vec();
        if events.is_empty() {
            let action = lifespan.after_command(invocation.command_kind()).await;
            return (
                Ok(InstanceReply {
                    aggregate_state: instance.state.clone(),
                    aggregate_version: instance.version,
                    events: vec![],
                    reply: outcome.reply().cloned(),
                }),
                action,
            );
        }

        let envelopes: Vec<EventEnvelope<A>> = events
            .iter()
            .enumerate()
            .map(|(i, event)| {
                let mut metadata = request.metadata.clone();
                metadata.insert("causationId".to_string(), request.command_uuid.clone());
                metadata.insert("correlationId".to_string(), request.correlation_id.clone());
                EventEnvelope {
                    event_id: format!("{}-{}", request.command_uuid, i),
                    aggregate_id: instance.stream_uuid.clone(),
                    version: instance.version + i + 1,
                    payload: event.clone(),
                    metadata,
                    at: request.context.now(),
                }
            })
            .collect();

        match store
            .append(&instance.stream_uuid, instance.version, envelopes.clone())
            .await
        {
            Ok(()) => {
                for envelope in envelopes.iter() {
                    if let Err(e) = instance.state.apply(envelope.payload.clone()) {
                        let action = lifespan.after_error(&e).await;
                        return (Err(DispatchError::domain(e)), action);
                    }
                    instance.version += 1;
                }
                store
                    .save_snapshot(crate::snapshot::Snapshot {
                        aggregate_id: instance.stream_uuid.clone(),
                        state: instance.state.clone(),
                        version: instance.version,
                    })
                    .await;

                let mut action = lifespan.after_command(invocation.command_kind()).await;
                for event in &events {
                    action = lifespan.after_event(event).await;
                }
                return (
                    Ok(InstanceReply {
                        aggregate_state: instance.state.clone(),
                        aggregate_version: instance.version,
                        events,
                        reply: outcome.reply().cloned(),
                    }),
                    action,
                );
            }
            Err(AppendError::WrongExpectedVersion { .. }) => {
                if retry_attempts == 0 {
                    return (Err(DispatchError::TooManyAttempts), LifespanAction::Infinity);
                }
                retry_attempts -= 1;

                let missed = match store
                    .read_stream_forward(&instance.stream_uuid, instance.version + 1, 0)
                    .await
                {
                    Ok(missed) => missed,
                    Err(e) => {
                        return (
                            Err(DispatchError::Infrastructure(e.to_string())),
                            LifespanAction::Infinity,
                        )
                    }
                };
                for envelope in missed {
                    if let Err(e) = instance.state.apply(envelope.payload) {
                        let action = lifespan.after_error(&e).await;
                        return (Err(DispatchError::domain(e)), action);
                    }
                    instance.version = envelope.version;
                }
                // loop: re-execute the handler against the now-current state
            }
            Err(AppendError::Unavailable(reason)) => {
                return (Err(DispatchError::Infrastructure(reason)), LifespanAction::Infinity);
            }
        }
    }
}
