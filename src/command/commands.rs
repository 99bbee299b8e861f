//! The built-in PATEOAS command set.
//!
//! Six commands cover the documented workflow: `init` refreshes discovery,
//! `discover` lists what the registry holds, `action` activates a role,
//! `learn` loads one resource, and `remember`/`recall` drive the persisted
//! memory journal.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::command::{required_str, Affordance, Command, CommandContext, CommandError};
use crate::registry::discover_and_merge;
use crate::state::{MemoryEntry, ProcessState};

/// Returns the built-in command set, in registration order.
#[must_use]
pub fn builtin_commands() -> Vec<Box<dyn Command>> {
    vec![
        Box::new(InitCommand),
        Box::new(DiscoverCommand),
        Box::new(ActionCommand),
        Box::new(LearnCommand),
        Box::new(RememberCommand),
        Box::new(RecallCommand),
    ]
}

fn has_active_role(state: &ProcessState) -> bool {
    state
        .get("active_role")
        .and_then(Value::as_str)
        .is_some_and(|s| !s.is_empty())
}

/// Refreshes discovery and merges the results into the registry.
struct InitCommand;

#[async_trait]
impl Command for InitCommand {
    fn name(&self) -> &'static str {
        "init"
    }

    fn purpose(&self) -> &'static str {
        "Initialise the workspace: scan the user, project, and package tiers and merge the discovered resources into the registry"
    }

    async fn content(
        &self,
        ctx: &mut CommandContext<'_>,
        _args: &Value,
    ) -> Result<Value, CommandError> {
        let report = discover_and_merge(ctx.sources, ctx.registry).await;
        ctx.state.set("initialised", json!(true))?;

        Ok(json!({
            "registered": report.applied(),
            "retained": report.retained,
            "total": ctx.registry.len(),
            "warnings": report.warnings,
        }))
    }

    fn affordances(&self, _state: &ProcessState) -> Vec<Affordance> {
        vec![
            Affordance::new("discover", "List the resources now available"),
            Affordance::new("learn", "Load a resource by its identifier"),
        ]
    }
}

/// Lists registered resources grouped by tier.
struct DiscoverCommand;

#[async_trait]
impl Command for DiscoverCommand {
    fn name(&self) -> &'static str {
        "discover"
    }

    fn purpose(&self) -> &'static str {
        "List every registered resource, grouped by source tier"
    }

    async fn content(
        &self,
        ctx: &mut CommandContext<'_>,
        _args: &Value,
    ) -> Result<Value, CommandError> {
        let mut grouped = json!({
            "USER": [], "PROJECT": [], "PACKAGE": [], "INTERNET": [],
        });

        for record in ctx.registry.list() {
            let entry = json!({
                "identifier": record.identifier,
                "priority": record.priority,
            });
            if let Some(list) = grouped
                .get_mut(record.tier.as_str())
                .and_then(Value::as_array_mut)
            {
                list.push(entry);
            }
        }

        Ok(json!({
            "total": ctx.registry.len(),
            "by_tier": grouped,
        }))
    }

    fn affordances(&self, _state: &ProcessState) -> Vec<Affordance> {
        vec![
            Affordance::new("action", "Activate one of the listed roles"),
            Affordance::new("learn", "Load a resource by its identifier"),
        ]
    }
}

/// Activates a role: resolves its definition and records it in the context.
struct ActionCommand;

#[async_trait]
impl Command for ActionCommand {
    fn name(&self) -> &'static str {
        "action"
    }

    fn purpose(&self) -> &'static str {
        "Activate a role: load its definition and record it as the active role"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "role": {
                    "type": "string",
                    "description": "Role name (e.g. 'writer') or full role:// identifier"
                }
            },
            "required": ["role"]
        })
    }

    async fn content(
        &self,
        ctx: &mut CommandContext<'_>,
        args: &Value,
    ) -> Result<Value, CommandError> {
        let role = required_str(args, "role")?;
        let (identifier, name) = if let Some(name) = role.strip_prefix("role://") {
            (role.to_string(), name.to_string())
        } else {
            (format!("role://{role}"), role.to_string())
        };

        let definition = ctx.resolver.resolve(&identifier, ctx.registry).await?;
        ctx.state.set("active_role", json!(name))?;

        tracing::info!(role = %name, "Role activated");

        Ok(json!({
            "role": name,
            "definition": definition,
        }))
    }

    fn affordances(&self, _state: &ProcessState) -> Vec<Affordance> {
        vec![
            Affordance::new("learn", "Load the thought or execution patterns this role references"),
            Affordance::new("recall", "Check what has been remembered for this role"),
            Affordance::new("remember", "Record something worth keeping"),
        ]
    }
}

/// Loads one resource by its fully-qualified identifier.
struct LearnCommand;

#[async_trait]
impl Command for LearnCommand {
    fn name(&self) -> &'static str {
        "learn"
    }

    fn purpose(&self) -> &'static str {
        "Load the content of one resource by its <scheme>://<path> identifier"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "resource": {
                    "type": "string",
                    "description": "Fully-qualified identifier, e.g. thought://deep-analysis"
                }
            },
            "required": ["resource"]
        })
    }

    async fn content(
        &self,
        ctx: &mut CommandContext<'_>,
        args: &Value,
    ) -> Result<Value, CommandError> {
        let identifier = required_str(args, "resource")?;
        let content = ctx.resolver.resolve(identifier, ctx.registry).await?;

        Ok(json!({
            "resource": identifier,
            "content": content,
        }))
    }

    fn affordances(&self, state: &ProcessState) -> Vec<Affordance> {
        if has_active_role(state) {
            vec![
                Affordance::new("recall", "Review related memories"),
                Affordance::new("remember", "Record what was just learned"),
            ]
        } else {
            vec![
                Affordance::new("action", "Activate a role to work with this material"),
                Affordance::new("discover", "See what else is available"),
            ]
        }
    }
}

/// Appends an entry to the memory journal.
struct RememberCommand;

#[async_trait]
impl Command for RememberCommand {
    fn name(&self) -> &'static str {
        "remember"
    }

    fn purpose(&self) -> &'static str {
        "Append an entry to the persisted memory journal"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "content": {
                    "type": "string",
                    "description": "What to remember"
                },
                "tags": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Optional tags for later recall"
                }
            },
            "required": ["content"]
        })
    }

    async fn content(
        &self,
        ctx: &mut CommandContext<'_>,
        args: &Value,
    ) -> Result<Value, CommandError> {
        let content = required_str(args, "content")?;
        let tags: Vec<String> = args
            .get("tags")
            .and_then(Value::as_array)
            .map(|a| {
                a.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        ctx.state
            .push_memory(MemoryEntry::new(content, tags.clone()))?;

        Ok(json!({
            "remembered": content,
            "tags": tags,
            "total_memories": ctx.state.memories().len(),
        }))
    }

    fn affordances(&self, _state: &ProcessState) -> Vec<Affordance> {
        vec![
            Affordance::new("recall", "Verify the memory is retrievable"),
            Affordance::new("discover", "Continue exploring resources"),
        ]
    }
}

/// Queries the memory journal.
struct RecallCommand;

#[async_trait]
impl Command for RecallCommand {
    fn name(&self) -> &'static str {
        "recall"
    }

    fn purpose(&self) -> &'static str {
        "Retrieve entries from the persisted memory journal, optionally filtered by a query"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Substring or tag to filter by; empty or absent returns everything"
                }
            }
        })
    }

    async fn content(
        &self,
        ctx: &mut CommandContext<'_>,
        args: &Value,
    ) -> Result<Value, CommandError> {
        // Empty or whitespace-only query is treated as absent, never an error.
        let query = args
            .get("query")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|q| !q.is_empty());

        let matches: Vec<&MemoryEntry> = match query {
            Some(q) => ctx.state.memories().iter().filter(|m| m.matches(q)).collect(),
            None => ctx.state.memories().iter().collect(),
        };

        Ok(json!({
            "filter": query.map_or_else(|| json!("no query filter applied"), |q| json!(q)),
            "count": matches.len(),
            "memories": matches,
        }))
    }

    fn affordances(&self, _state: &ProcessState) -> Vec<Affordance> {
        vec![
            Affordance::new("remember", "Record something new"),
            Affordance::new("learn", "Load a resource to act on a memory"),
        ]
    }
}
