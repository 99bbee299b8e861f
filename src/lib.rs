//! prompthub-mcp: MCP server for protocol-addressed prompt resource management
//!
//! This library implements a priority-merged resource registry with layered
//! discovery and PATEOAS-style stateful command dispatch, exposed to AI
//! assistants over the Model Context Protocol.
//!
//! # Architecture
//!
//! A caller issues a command with arguments; the dispatcher computes a
//! purpose, a content payload, and next-command affordances into one
//! envelope. Content resolution goes through the protocol resolver, which
//! queries the registry; the registry is populated by tiered discovery
//! sources at `init` time. Affordances derive only from the persisted
//! context, so they stay valid across process restarts.
//!
//! # Modules
//!
//! - [`config`] — Configuration loading and validation
//! - [`error`] — Configuration error types
//! - [`registry`] — Resource records, registry, discovery, and resolution
//! - [`state`] — Persisted process state (context plus memory journal)
//! - [`command`] — PATEOAS commands and the dispatcher
//! - [`mcp`] — MCP protocol implementation

pub mod command;
pub mod config;
pub mod error;
pub mod mcp;
pub mod registry;
pub mod state;
