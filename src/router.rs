//! The Router: the configuration-time binding of command kinds to
//! handler+aggregate+identity+lifespan, and the dispatch entry point.
//! Grounded on a `HashMap`-keyed route table idiom, generalized so each
//! entry is downcast back to its own concrete command type rather than
//! kept fully dynamic — the caller of `Router::dispatch::<C>()` already
//! knows `C` statically.

use crate::aggregate::{Aggregate, Handler};
use crate::command::Command;
use crate::consistency::Consistency;
use crate::context::CqrsContext;
use crate::dispatch::{DispatchOptions, DispatchOutcome, ExecutionResult, Pipeline, Returning};
use crate::errors::{DispatchError, RouterConfigError};
use crate::event_store::EventStore;
use crate::instance::{AggregateExecutor, AggregateInstanceHandle, ExecuteRequest, InstanceReply};
use crate::lifespan::{InfiniteLifespan, LifespanPolicy};
use crate::middleware::{run_after, run_after_failure, run_before, IdentityExtraction, Middleware};
use crate::registry::{InMemoryRegistry, Registry};
use crate::identity::{IdentityPrefix, IdentityRule};
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, error, info};

/// System + router-wide defaults, lowest-precedence layer.
#[derive(Debug, Clone)]
pub struct RouterDefaults {
    pub consistency: Consistency,
    pub returning: Returning,
    pub timeout: Duration,
    pub retry_attempts: u32,
}

impl Default for RouterDefaults {
    fn default() -> Self {
        Self {
            consistency: Consistency::Eventual,
            returning: Returning::None,
            timeout: Duration::from_millis(5000),
            retry_attempts: 10,
        }
    }
}

/// Per-command-kind registration options.
pub struct RegisterOptions<A: Aggregate, C> {
    pub identity: IdentityRule<C>,
    pub identity_prefix: IdentityPrefix,
    pub lifespan: Arc<dyn LifespanPolicy<A>>,
    pub middleware: Vec<Box<dyn Middleware<C>>>,
    pub consistency: Option<Consistency>,
    pub timeout: Option<Duration>,
    pub retry_attempts: Option<u32>,
    pub returning: Option<Returning>,
    pub mailbox_capacity: usize,
    /// `ConsistencyGuarantee` is always appended after `IdentityExtraction`
    /// in this route's middleware chain — the system default order is
    /// `[user..., IdentityExtraction, ConsistencyGuarantee]`. When unset
    /// here, `register` supplies a coordinator with no strongly-consistent
    /// subscribers, which makes the guarantee a no-op for `Eventual` routes.
    pub consistency_coordinator: Option<Arc<crate::consistency::ConsistencyCoordinator>>,
}

impl<A: Aggregate, C> RegisterOptions<A, C> {
    pub fn new(identity: IdentityRule<C>) -> Self {
        Self {
            identity,
            identity_prefix: IdentityPrefix::None,
            lifespan: Arc::new(InfiniteLifespan),
            middleware: vec![],
            consistency: None,
            timeout: None,
            retry_attempts: None,
            returning: None,
            mailbox_capacity: 64,
            consistency_coordinator: None,
        }
    }

    pub fn with_consistency_coordinator(
        mut self,
        coordinator: Arc<crate::consistency::ConsistencyCoordinator>,
    ) -> Self {
        self.consistency_coordinator = Some(coordinator);
        self
    }

    pub fn with_prefix(mut self, prefix: IdentityPrefix) -> Self {
        self.identity_prefix = prefix;
        self
    }

    pub fn with_lifespan(mut self, lifespan: Arc<dyn LifespanPolicy<A>>) -> Self {
        self.lifespan = lifespan;
        self
    }

    pub fn with_middleware(mut self, middleware: Vec<Box<dyn Middleware<C>>>) -> Self {
        self.middleware = middleware;
        self
    }
}

struct HandlerInvocation<A: Aggregate, H: Handler<A>> {
    handler: Arc<H>,
    command: H::Command,
    services: Arc<H::Services>,
}

#[async_trait::async_trait]
impl<A, H> AggregateExecutor<A> for HandlerInvocation<A, H>
where
    A: Aggregate,
    H: Handler<A>,
{
    fn command_kind(&self) -> &'static str {
        H::Command::KIND
    }

    async fn execute(
        &self,
        state: &A,
        context: &CqrsContext,
    ) -> Result<crate::aggregate::HandlerOutcome<A::Event>, A::Error> {
        self.handler
            .execute(state, &self.command, &self.services, context)
            .await
    }
}

/// The per-route backend: everything generic over a concrete `Aggregate`
/// and `Handler`, erased behind this trait so `RouteEntry<C>` only needs to
/// be generic over the command type `C`.
#[async_trait::async_trait]
trait RouteBackend<C: Send + Sync>: Send + Sync {
    async fn dispatch(&self, pipeline: &mut Pipeline<C>, context: CqrsContext);
}

struct HandlerBackend<A, H>
where
    A: Aggregate + 'static,
    H: Handler<A> + 'static,
{
    handler: Arc<H>,
    services: Arc<H::Services>,
    store: Arc<dyn EventStore<A>>,
    registry: Arc<InMemoryRegistry<String, AggregateInstanceHandle<A>>>,
    lifespan: Arc<dyn LifespanPolicy<A>>,
    mailbox_capacity: usize,
}

#[async_trait::async_trait]
impl<A, H> RouteBackend<H::Command> for HandlerBackend<A, H>
where
    A: Aggregate + 'static,
    H: Handler<A> + 'static,
{
    async fn dispatch(&self, pipeline: &mut Pipeline<H::Command>, context: CqrsContext) {
        let stream_uuid = match pipeline.stream_uuid.clone() {
            Some(s) => s,
            None => {
                pipeline.halt(DispatchError::InvalidAggregateIdentity);
                return;
            }
        };

        let store = self.store.clone();
        let lifespan = self.lifespan.clone();
        let mailbox_capacity = self.mailbox_capacity;
        let spawn_stream_uuid = stream_uuid.clone();
        let (handle, created) = self
            .registry
            .start_or_lookup(stream_uuid.clone(), move || async move {
                crate::instance::spawn(spawn_stream_uuid, store, lifespan, mailbox_capacity)
            })
            .await;
        debug!(stream_uuid = %stream_uuid, created, "instance resolved");

        let invocation = Box::new(HandlerInvocation {
            handler: self.handler.clone(),
            command: pipeline.command.clone(),
            services: self.services.clone(),
        });

        let (reply_tx, reply_rx) = oneshot::channel();
        let request = ExecuteRequest {
            invocation,
            context,
            command_uuid: pipeline.command_uuid.clone(),
            causation_id: pipeline.causation_id.clone(),
            correlation_id: pipeline.correlation_id.clone(),
            metadata: pipeline.metadata.clone(),
            retry_attempts: pipeline.retry_attempts,
            reply: reply_tx,
        };

        if let Err(error) = handle.send(request).await {
            error!(stream_uuid = %pipeline.stream_uuid.as_deref().unwrap_or(""), %error, "instance unreachable");
            self.registry.deregister(&pipeline.stream_uuid.clone().unwrap()).await;
            pipeline.response = Some(Err(error));
            return;
        }

        let reply = match pipeline.timeout {
            Some(timeout) => match tokio::time::timeout(timeout, reply_rx).await {
                Ok(Ok(reply)) => reply,
                Ok(Err(_)) => Err(DispatchError::AggregateStopped),
                Err(_) => Err(DispatchError::AggregateExecutionTimeout),
            },
            None => reply_rx.await.unwrap_or(Err(DispatchError::AggregateStopped)),
        };

        let outcome = match reply {
            Ok(reply) => {
                pipeline.assign(
                    "aggregate_version",
                    serde_json::Value::from(reply.aggregate_version as u64),
                );
                Ok(project_reply(reply, pipeline.returning, stream_uuid.clone()))
            }
            Err(error) => Err(error),
        };

        pipeline.response = Some(outcome);
    }
}

/// Projects the richest internal reply down to the requested `returning`
/// shape.
fn project_reply<A: Aggregate>(
    reply: InstanceReply<A>,
    returning: Returning,
    stream_uuid: String,
) -> DispatchOutcome {
    match returning {
        Returning::None => DispatchOutcome::Ok,
        Returning::AggregateVersion => DispatchOutcome::AggregateVersion {
            aggregate_version: reply.aggregate_version,
        },
        Returning::AggregateState => DispatchOutcome::AggregateState {
            aggregate_state: serde_json::to_value(&reply.aggregate_state)
                .unwrap_or(serde_json::Value::Null),
        },
        Returning::ExecutionResult => DispatchOutcome::Execution(ExecutionResult {
            aggregate_uuid: stream_uuid,
            aggregate_state: serde_json::to_value(&reply.aggregate_state)
                .unwrap_or(serde_json::Value::Null),
            aggregate_version: reply.aggregate_version,
            events: reply
                .events
                .iter()
                .map(|e| serde_json::to_value(e).unwrap_or(serde_json::Value::Null))
                .collect(),
            metadata: HashMap::new(),
        }),
    }
}

/// A command kind's full configuration: resolved
/// middleware chain plus defaults, generic only over the command type.
struct RouteEntry<C: Send + Sync> {
    middleware: Vec<Box<dyn Middleware<C>>>,
    backend: Arc<dyn RouteBackend<C>>,
    default_consistency: Consistency,
    default_returning: Returning,
    default_timeout: Duration,
    default_retry_attempts: u32,
}

/// The immutable command-kind → route table,
/// built once via [`RouterBuilder`] and never mutated afterward.
pub struct Router {
    routes: HashMap<&'static str, Box<dyn Any + Send + Sync>>,
    defaults: RouterDefaults,
}

impl Router {
    pub fn builder() -> RouterBuilder {
        RouterBuilder {
            routes: HashMap::new(),
            defaults: RouterDefaults::default(),
        }
    }

    /// `dispatch(command)` with defaults; see [`Router::dispatch_with`] for
    /// per-call overrides.
    pub async fn dispatch<C: Command>(&self, command: C) -> Result<DispatchOutcome, DispatchError> {
        self.dispatch_with(command, DispatchOptions::default(), CqrsContext::default())
            .await
    }

    pub async fn dispatch_with<C: Command>(
        &self,
        command: C,
        options: DispatchOptions,
        context: CqrsContext,
    ) -> Result<DispatchOutcome, DispatchError> {
        let entry = self
            .routes
            .get(C::KIND)
            .and_then(|boxed| boxed.downcast_ref::<RouteEntry<C>>())
            .ok_or_else(|| DispatchError::UnregisteredCommand(C::KIND.to_string()))?;

        let mut pipeline = Pipeline {
            command,
            command_kind: C::KIND,
            command_uuid: context.next_uuid(),
            causation_id: options.causation_id.unwrap_or_else(|| context.next_uuid()),
            correlation_id: options.correlation_id.unwrap_or_else(|| context.next_uuid()),
            metadata: options.metadata,
            consistency: options.consistency.unwrap_or_else(|| entry.default_consistency.clone()),
            returning: options.returning.unwrap_or(entry.default_returning),
            timeout: Some(options.timeout.unwrap_or(entry.default_timeout)),
            retry_attempts: options.retry_attempts.unwrap_or(entry.default_retry_attempts),
            stream_uuid: None,
            response: None,
            halted: false,
            assigns: HashMap::new(),
        };

        info!(command_kind = C::KIND, "dispatching command");

        if !run_before(&entry.middleware, &mut pipeline).await {
            return pipeline.response.unwrap_or(Err(DispatchError::InvalidAggregateIdentity));
        }

        entry.backend.dispatch(&mut pipeline, context).await;

        match pipeline.response {
            Some(Err(_)) => run_after_failure(&entry.middleware, &mut pipeline).await,
            _ => run_after(&entry.middleware, &mut pipeline).await,
        }

        match pipeline.response {
            Some(outcome) => outcome,
            None => Ok(DispatchOutcome::Ok),
        }
    }
}

pub struct RouterBuilder {
    routes: HashMap<&'static str, Box<dyn Any + Send + Sync>>,
    defaults: RouterDefaults,
}

impl RouterBuilder {
    pub fn with_defaults(mut self, defaults: RouterDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    /// Registers a handler for one command kind. Fails configuration
    /// if `H::Command::KIND` is already registered, matching the invariant
    /// if the same command kind is registered twice in one router.
    pub fn register<A, H>(
        mut self,
        handler: H,
        services: H::Services,
        store: Arc<dyn EventStore<A>>,
        registry: Arc<InMemoryRegistry<String, AggregateInstanceHandle<A>>>,
        options: RegisterOptions<A, H::Command>,
    ) -> Result<Self, RouterConfigError>
    where
        A: Aggregate + 'static,
        H: Handler<A> + 'static,
    {
        if self.routes.contains_key(H::Command::KIND) {
            return Err(RouterConfigError::DuplicateCommandKind(
                H::Command::KIND.to_string(),
            ));
        }

        let default_consistency = options.consistency.unwrap_or_else(|| self.defaults.consistency.clone());

        let coordinator = options.consistency_coordinator.unwrap_or_else(|| {
            Arc::new(crate::consistency::ConsistencyCoordinator::new(Vec::<String>::new()))
        });
        if let Consistency::Only(ref subscribers) = default_consistency {
            coordinator.validate_explicit_set(subscribers)?;
        }

        let mut middleware: Vec<Box<dyn Middleware<H::Command>>> = options.middleware;
        middleware.push(Box::new(IdentityExtraction::new(
            options.identity,
            options.identity_prefix,
        )));
        middleware.push(Box::new(crate::middleware::ConsistencyGuarantee::new(coordinator)));

        let backend = Arc::new(HandlerBackend {
            handler: Arc::new(handler),
            services: Arc::new(services),
            store,
            registry,
            lifespan: options.lifespan,
            mailbox_capacity: options.mailbox_capacity,
        });

        let entry = RouteEntry {
            middleware,
            backend,
            default_consistency,
            default_returning: options.returning.unwrap_or(self.defaults.returning),
            default_timeout: options.timeout.unwrap_or(self.defaults.timeout),
            default_retry_attempts: options.retry_attempts.unwrap_or(self.defaults.retry_attempts),
        };

        self.routes
            .insert(H::Command::KIND, Box::new(entry) as Box<dyn Any + Send + Sync>);
        Ok(self)
    }

    pub fn build(self) -> Router {
        Router {
            routes: self.routes,
            defaults: self.defaults,
        }
    }
}
