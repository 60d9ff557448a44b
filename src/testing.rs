//! Fixture aggregate used by this crate's own unit tests.

use crate::aggregate::{Aggregate, Handler, HandlerOutcome};
use crate::command::Command;
use crate::context::CqrsContext;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, thiserror::Error)]
pub enum TestError {
    #[error("test error: {0}")]
    Failed(String),
}

impl From<&str> for TestError {
    fn from(value: &str) -> Self {
        Self::Failed(value.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TestEvent {
    Created { value: i32 },
    Incremented { by: i32 },
}

impl crate::event::Event for TestEvent {
    fn event_type(&self) -> String {
        match self {
            TestEvent::Created { .. } => "created".to_string(),
            TestEvent::Incremented { .. } => "incremented".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestAggregate {
    pub value: i32,
}

#[async_trait::async_trait]
impl Aggregate for TestAggregate {
    const TYPE: &'static str = "test_aggregate";

    type Event = TestEvent;
    type Error = TestError;

    fn apply(&mut self, event: Self::Event) -> Result<(), Self::Error> {
        match event {
            TestEvent::Created { value } => self.value = value,
            TestEvent::Incremented { by } => self.value += by,
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateCommand {
    pub id: String,
    pub value: i32,
}

impl Command for CreateCommand {
    const KIND: &'static str = "test.create";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncrementCommand {
    pub id: String,
    pub by: i32,
}

impl Command for IncrementCommand {
    const KIND: &'static str = "test.increment";
}

pub struct CreateHandler;

#[async_trait::async_trait]
impl Handler<TestAggregate> for CreateHandler {
    type Command = CreateCommand;
    type Services = ();

    async fn execute(
        &self,
        _state: &TestAggregate,
        command: &Self::Command,
        _services: &Self::Services,
        _context: &CqrsContext,
    ) -> Result<HandlerOutcome<TestEvent>, TestError> {
        Ok(HandlerOutcome::Events(vec![TestEvent::Created {
            value: command.value,
        }]))
    }
}

pub struct IncrementHandler;

#[async_trait::async_trait]
impl Handler<TestAggregate> for IncrementHandler {
    type Command = IncrementCommand;
    type Services = ();

    async fn execute(
        &self,
        _state: &TestAggregate,
        command: &Self::Command,
        _services: &Self::Services,
        _context: &CqrsContext,
    ) -> Result<HandlerOutcome<TestEvent>, TestError> {
        if command.by == 0 {
            return Err(TestError::Failed("increment by zero is a no-op, rejected".into()));
        }
        Ok(HandlerOutcome::Events(vec![TestEvent::Incremented {
            by: command.by,
        }]))
    }
}
