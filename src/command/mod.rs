//! PATEOAS command dispatch.
//!
//! Every command invocation produces one envelope with three parts:
//!
//! - `purpose` — what the command is for (pure, constant per command);
//! - `content` — the payload, which may require I/O and may fail;
//! - `affordances` — advisory hints for which commands are meaningfully
//!   callable next, computed from the persisted context.
//!
//! Content failures become a well-formed error envelope rather than a raw
//! fault, so the transport layer always has something structured to send.

mod commands;
mod dispatcher;

pub use commands::builtin_commands;
pub use dispatcher::Dispatcher;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::registry::{
    DiscoverySource, ProtocolResolver, ResourceError, ResourceRegistry,
};
use crate::state::{ProcessState, StateError};

/// Errors raised while computing command content.
#[derive(Debug, Error)]
pub enum CommandError {
    /// A registry or resolver failure.
    #[error(transparent)]
    Resource(#[from] ResourceError),

    /// A persisted-state failure.
    #[error(transparent)]
    State(#[from] StateError),

    /// The caller supplied malformed or missing arguments.
    #[error("Invalid arguments: {0}")]
    InvalidArgs(String),
}

/// A hint for a command that is meaningfully callable next.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Affordance {
    /// The command identifier.
    pub command: String,
    /// Why a caller might invoke it now.
    pub hint: String,
}

impl Affordance {
    /// Creates an affordance hint.
    pub fn new(command: impl Into<String>, hint: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            hint: hint.into(),
        }
    }
}

/// The response envelope for one command invocation.
///
/// Created fresh per invocation and never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct CommandEnvelope {
    /// What the command was for.
    pub purpose: String,
    /// The command payload, or `null` on failure.
    pub content: Value,
    /// Advisory next-command hints. Valid across process restarts because
    /// they derive only from the persisted context.
    pub affordances: Vec<Affordance>,
    /// Set when content computation failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CommandEnvelope {
    /// Creates a success envelope.
    #[must_use]
    pub const fn ok(purpose: String, content: Value, affordances: Vec<Affordance>) -> Self {
        Self {
            purpose,
            content,
            affordances,
            error: None,
        }
    }

    /// Creates an error envelope.
    #[must_use]
    pub const fn failed(purpose: String, error: String, affordances: Vec<Affordance>) -> Self {
        Self {
            purpose,
            content: Value::Null,
            affordances,
            error: Some(error),
        }
    }

    /// Whether content computation failed.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Everything a command's content computation may touch.
///
/// Borrowed from the dispatcher for the duration of one invocation, which
/// serialises registry and state mutation per dispatcher instance.
pub struct CommandContext<'a> {
    /// The resource registry.
    pub registry: &'a mut ResourceRegistry,
    /// The protocol resolver.
    pub resolver: &'a ProtocolResolver,
    /// The persisted process state.
    pub state: &'a mut ProcessState,
    /// The discovery sources, in no particular order; the merge orders them.
    pub sources: &'a [Arc<dyn DiscoverySource>],
}

/// A command implementation.
///
/// All three computations are required; the dispatcher additionally
/// validates at registration time that the name and purpose are non-empty,
/// the name is unique, and every affordance hint references a registered
/// command. A definition failing any of these is a `Construction` error —
/// fail fast at registration, never at call time.
#[async_trait]
pub trait Command: Send + Sync {
    /// The command identifier.
    fn name(&self) -> &'static str;

    /// What this command is for. Pure; no I/O; constant per command kind.
    fn purpose(&self) -> &'static str;

    /// JSON Schema for the command's arguments.
    fn input_schema(&self) -> Value {
        serde_json::json!({ "type": "object", "properties": {} })
    }

    /// Computes the command payload. May perform I/O and may fail; the
    /// dispatcher converts failures into an error envelope.
    async fn content(
        &self,
        ctx: &mut CommandContext<'_>,
        args: &Value,
    ) -> Result<Value, CommandError>;

    /// Which commands are meaningfully callable next. Pure function of the
    /// persisted context plus this command's kind; advisory only.
    fn affordances(&self, state: &ProcessState) -> Vec<Affordance>;
}

/// Extracts a required string argument.
pub(crate) fn required_str<'a>(args: &'a Value, key: &str) -> Result<&'a str, CommandError> {
    args.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| CommandError::InvalidArgs(format!("missing required string field '{key}'")))
}
