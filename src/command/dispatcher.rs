//! The command dispatcher.
//!
//! Owns the registration table, the registry, the resolver, and the
//! persisted state — explicitly, never through process-wide singletons —
//! so multiple dispatcher instances can coexist and tests stay isolated.
//! Each `execute` call runs purpose → content → affordances sequentially
//! and packages the result into one envelope; the dispatcher itself keeps
//! no per-call state.

use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;

use crate::command::{builtin_commands, Command, CommandContext, CommandEnvelope};
use crate::registry::{
    DiscoverySource, ProtocolResolver, ResourceError, ResourceRegistry, ResourceResult,
};
use crate::state::ProcessState;

/// Executes named commands against the owned registry and state.
pub struct Dispatcher {
    commands: IndexMap<&'static str, Box<dyn Command>>,
    registry: ResourceRegistry,
    resolver: ProtocolResolver,
    state: ProcessState,
    sources: Vec<Arc<dyn DiscoverySource>>,
}

impl Dispatcher {
    /// Creates a dispatcher with the built-in command set registered.
    ///
    /// # Errors
    ///
    /// Returns a `Construction` error if any command definition fails
    /// registration-time validation. Built-ins always pass; this guards
    /// future additions.
    pub fn new(
        resolver: ProtocolResolver,
        state: ProcessState,
        sources: Vec<Arc<dyn DiscoverySource>>,
    ) -> ResourceResult<Self> {
        let mut dispatcher = Self {
            commands: IndexMap::new(),
            registry: ResourceRegistry::new(),
            resolver,
            state,
            sources,
        };

        for command in builtin_commands() {
            dispatcher.insert_command(command)?;
        }
        dispatcher.validate_affordances()?;

        Ok(dispatcher)
    }

    /// Registers an additional command.
    ///
    /// # Errors
    ///
    /// Fails fast with a `Construction` error when the definition has an
    /// empty name or purpose, the name collides with a registered command,
    /// or an affordance hint references an unregistered command.
    pub fn register_command(&mut self, command: Box<dyn Command>) -> ResourceResult<()> {
        self.insert_command(command)?;
        self.validate_affordances()
    }

    fn insert_command(&mut self, command: Box<dyn Command>) -> ResourceResult<()> {
        let name = command.name();

        if name.is_empty() {
            return Err(ResourceError::construction(
                "<unnamed>",
                "command name is empty",
            ));
        }
        if command.purpose().is_empty() {
            return Err(ResourceError::construction(
                name,
                "purpose computation yields an empty string",
            ));
        }
        if self.commands.contains_key(name) {
            return Err(ResourceError::construction(
                name,
                "a command with this name is already registered",
            ));
        }

        self.commands.insert(name, command);
        Ok(())
    }

    /// Checks that every affordance hint points at a registered command.
    fn validate_affordances(&self) -> ResourceResult<()> {
        for command in self.commands.values() {
            for affordance in command.affordances(&self.state) {
                if !self.commands.contains_key(affordance.command.as_str()) {
                    return Err(ResourceError::construction(
                        command.name(),
                        format!(
                            "affordance references unregistered command '{}'",
                            affordance.command
                        ),
                    ));
                }
            }
        }
        Ok(())
    }

    /// The registered command names, in registration order.
    pub fn command_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.commands.keys().copied()
    }

    /// Looks up a registered command.
    #[must_use]
    pub fn command(&self, name: &str) -> Option<&dyn Command> {
        self.commands.get(name).map(AsRef::as_ref)
    }

    /// The owned registry (read access for callers such as tests).
    #[must_use]
    pub const fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    /// The owned persisted state.
    #[must_use]
    pub const fn state(&self) -> &ProcessState {
        &self.state
    }

    /// Executes a command and packages the envelope.
    ///
    /// Returns `None` for an unknown command name; the transport layer
    /// turns that into a tool-level error. For known commands the result is
    /// always a well-formed envelope: content failures set the envelope's
    /// error field instead of escaping as a fault.
    pub async fn execute(&mut self, name: &str, args: &Value) -> Option<CommandEnvelope> {
        let command = self.commands.get(name)?;

        tracing::debug!(command = name, "Executing command");

        // purpose, then content, then affordances, strictly in order; the
        // affordances see any context mutation the content step made.
        let purpose = command.purpose().to_string();

        let mut ctx = CommandContext {
            registry: &mut self.registry,
            resolver: &self.resolver,
            state: &mut self.state,
            sources: &self.sources,
        };

        let content = command.content(&mut ctx, args).await;
        let affordances = command.affordances(&self.state);

        let envelope = match content {
            Ok(content) => CommandEnvelope::ok(purpose, content, affordances),
            Err(e) => {
                tracing::warn!(error = %e, "Command content failed");
                CommandEnvelope::failed(purpose, e.to_string(), affordances)
            }
        };

        Some(envelope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{Affordance, CommandError};
    use crate::registry::TierRoots;
    use async_trait::async_trait;
    use serde_json::json;

    fn test_dispatcher(dir: &std::path::Path) -> Dispatcher {
        let resolver = ProtocolResolver::new(TierRoots {
            user: dir.join("user"),
            project: dir.join("project"),
            package: dir.join("package"),
        });
        let state = ProcessState::load(dir.join("state.json")).unwrap();
        Dispatcher::new(resolver, state, Vec::new()).unwrap()
    }

    struct BadAffordanceCommand;

    #[async_trait]
    impl Command for BadAffordanceCommand {
        fn name(&self) -> &'static str {
            "broken"
        }
        fn purpose(&self) -> &'static str {
            "A command whose affordances dangle"
        }
        async fn content(
            &self,
            _ctx: &mut CommandContext<'_>,
            _args: &Value,
        ) -> Result<Value, CommandError> {
            Ok(Value::Null)
        }
        fn affordances(&self, _state: &ProcessState) -> Vec<Affordance> {
            vec![Affordance::new("does-not-exist", "nope")]
        }
    }

    struct EmptyPurposeCommand;

    #[async_trait]
    impl Command for EmptyPurposeCommand {
        fn name(&self) -> &'static str {
            "empty-purpose"
        }
        fn purpose(&self) -> &'static str {
            ""
        }
        async fn content(
            &self,
            _ctx: &mut CommandContext<'_>,
            _args: &Value,
        ) -> Result<Value, CommandError> {
            Ok(Value::Null)
        }
        fn affordances(&self, _state: &ProcessState) -> Vec<Affordance> {
            Vec::new()
        }
    }

    #[tokio::test]
    async fn builtins_register_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let dispatcher = test_dispatcher(dir.path());
        let names: Vec<_> = dispatcher.command_names().collect();
        assert_eq!(
            names,
            ["init", "discover", "action", "learn", "remember", "recall"]
        );
    }

    #[tokio::test]
    async fn unknown_command_yields_none() {
        let dir = tempfile::tempdir().unwrap();
        let mut dispatcher = test_dispatcher(dir.path());
        assert!(dispatcher.execute("nope", &json!({})).await.is_none());
    }

    #[tokio::test]
    async fn dangling_affordance_fails_at_registration() {
        let dir = tempfile::tempdir().unwrap();
        let mut dispatcher = test_dispatcher(dir.path());
        let err = dispatcher
            .register_command(Box::new(BadAffordanceCommand))
            .unwrap_err();
        assert!(matches!(err, ResourceError::Construction { .. }));
    }

    #[tokio::test]
    async fn empty_purpose_fails_at_registration() {
        let dir = tempfile::tempdir().unwrap();
        let mut dispatcher = test_dispatcher(dir.path());
        let err = dispatcher
            .register_command(Box::new(EmptyPurposeCommand))
            .unwrap_err();
        assert!(matches!(err, ResourceError::Construction { .. }));
    }

    #[tokio::test]
    async fn duplicate_name_fails_at_registration() {
        struct DuplicateInit;

        #[async_trait]
        impl Command for DuplicateInit {
            fn name(&self) -> &'static str {
                "init"
            }
            fn purpose(&self) -> &'static str {
                "Shadowing the built-in"
            }
            async fn content(
                &self,
                _ctx: &mut CommandContext<'_>,
                _args: &Value,
            ) -> Result<Value, CommandError> {
                Ok(Value::Null)
            }
            fn affordances(&self, _state: &ProcessState) -> Vec<Affordance> {
                Vec::new()
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let mut dispatcher = test_dispatcher(dir.path());
        let err = dispatcher
            .register_command(Box::new(DuplicateInit))
            .unwrap_err();
        assert!(matches!(err, ResourceError::Construction { .. }));
    }

    #[tokio::test]
    async fn content_failure_becomes_error_envelope() {
        let dir = tempfile::tempdir().unwrap();
        let mut dispatcher = test_dispatcher(dir.path());

        // learn with a missing resource: NotFound surfaces in the envelope.
        let envelope = dispatcher
            .execute("learn", &json!({"resource": "role://missing"}))
            .await
            .unwrap();

        assert!(envelope.is_error());
        assert!(envelope.error.as_deref().unwrap().contains("not found"));
        assert!(!envelope.purpose.is_empty());
        assert!(!envelope.affordances.is_empty());
    }

    #[tokio::test]
    async fn recall_with_empty_query_applies_no_filter() {
        let dir = tempfile::tempdir().unwrap();
        let mut dispatcher = test_dispatcher(dir.path());

        dispatcher
            .execute("remember", &json!({"content": "first note"}))
            .await
            .unwrap();

        let envelope = dispatcher
            .execute("recall", &json!({"query": ""}))
            .await
            .unwrap();

        assert!(!envelope.is_error());
        assert_eq!(envelope.content["filter"], json!("no query filter applied"));
        assert_eq!(envelope.content["count"], json!(1));
    }

    #[tokio::test]
    async fn recall_filters_by_query_and_tag() {
        let dir = tempfile::tempdir().unwrap();
        let mut dispatcher = test_dispatcher(dir.path());

        dispatcher
            .execute(
                "remember",
                &json!({"content": "likes haiku", "tags": ["style"]}),
            )
            .await
            .unwrap();
        dispatcher
            .execute("remember", &json!({"content": "deadline friday"}))
            .await
            .unwrap();

        let envelope = dispatcher
            .execute("recall", &json!({"query": "style"}))
            .await
            .unwrap();
        assert_eq!(envelope.content["count"], json!(1));

        let envelope = dispatcher
            .execute("recall", &json!({"query": "haiku"}))
            .await
            .unwrap();
        assert_eq!(envelope.content["count"], json!(1));
    }

    #[tokio::test]
    async fn learn_affordances_depend_on_active_role() {
        let dir = tempfile::tempdir().unwrap();
        let mut dispatcher = test_dispatcher(dir.path());

        // No active role yet: learn points back at activation and discovery.
        let envelope = dispatcher
            .execute("learn", &json!({"resource": "role://missing"}))
            .await
            .unwrap();
        let commands: Vec<_> = envelope
            .affordances
            .iter()
            .map(|a| a.command.as_str())
            .collect();
        assert_eq!(commands, ["action", "discover"]);

        // With an active role recorded, learn points at the memory journal.
        dispatcher
            .state
            .set("active_role", json!("writer"))
            .unwrap();
        let envelope = dispatcher
            .execute("learn", &json!({"resource": "role://missing"}))
            .await
            .unwrap();
        let commands: Vec<_> = envelope
            .affordances
            .iter()
            .map(|a| a.command.as_str())
            .collect();
        assert_eq!(commands, ["recall", "remember"]);
    }

    #[tokio::test]
    async fn affordances_reflect_state_mutated_by_content() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("package")).unwrap();
        std::fs::write(
            dir.path().join("package/writer.role.md"),
            "# Writer\nWrites things.",
        )
        .unwrap();

        let resolver = ProtocolResolver::new(TierRoots {
            user: dir.path().join("user"),
            project: dir.path().join("project"),
            package: dir.path().join("package"),
        });
        let state = ProcessState::load(dir.path().join("state.json")).unwrap();

        let sources: Vec<Arc<dyn DiscoverySource>> =
            vec![Arc::new(crate::registry::DirectorySource::new(
                crate::registry::SourceTier::Package,
                dir.path().join("package"),
                vec![glob::Pattern::new("**/*.md").unwrap()],
            ))];

        let mut dispatcher = Dispatcher::new(resolver, state, sources).unwrap();

        dispatcher.execute("init", &json!({})).await.unwrap();

        let envelope = dispatcher
            .execute("action", &json!({"role": "writer"}))
            .await
            .unwrap();
        assert!(!envelope.is_error());

        // learn's affordances now see the active role set by action.
        let envelope = dispatcher
            .execute("learn", &json!({"resource": "role://writer"}))
            .await
            .unwrap();
        let commands: Vec<_> = envelope
            .affordances
            .iter()
            .map(|a| a.command.as_str())
            .collect();
        assert!(commands.contains(&"remember"));
    }
}
