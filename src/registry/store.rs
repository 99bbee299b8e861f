//! In-memory resource registry with priority-based override resolution.
//!
//! The registry is the single source of truth for which record is active
//! for a given identifier. It performs no I/O of its own; discovery feeds
//! it and the protocol resolver queries it.
//!
//! # Override rule
//!
//! On a colliding `register`, the decision is made in strict order:
//!
//! 1. source tier — USER > PROJECT > PACKAGE > INTERNET, always decisive;
//! 2. numeric priority — smaller value wins;
//! 3. registration timestamp — later wins.
//!
//! If the existing record wins, the call is a no-op and no error is raised.
//!
//! # Ownership
//!
//! There is deliberately no process-wide registry singleton. The dispatcher
//! owns its registry and hands out `&`/`&mut` access, which serialises
//! mutation per instance and keeps tests isolated.

use indexmap::IndexMap;

use crate::registry::error::{ResourceError, ResourceResult};
use crate::registry::record::{Location, ResourceRecord};

/// Outcome of a single `register` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOutcome {
    /// The identifier was new; the record was inserted.
    Inserted,
    /// The new record beat the existing one and replaced it.
    Replaced,
    /// The existing record won; the call was a no-op.
    Retained,
}

/// The in-memory resource index.
///
/// At most one active record per identifier at any time.
#[derive(Debug, Default)]
pub struct ResourceRegistry {
    records: IndexMap<String, ResourceRecord>,
}

impl ResourceRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or conditionally overrides a record per the override rule.
    pub fn register(&mut self, record: ResourceRecord) -> RegisterOutcome {
        match self.records.get(&record.identifier) {
            None => {
                tracing::debug!(identifier = %record.identifier, tier = %record.tier, "Registered resource");
                self.records.insert(record.identifier.clone(), record);
                RegisterOutcome::Inserted
            }
            Some(existing) if record.wins_over(existing) => {
                tracing::debug!(
                    identifier = %record.identifier,
                    old_tier = %existing.tier,
                    new_tier = %record.tier,
                    "Overrode resource registration"
                );
                self.records.insert(record.identifier.clone(), record);
                RegisterOutcome::Replaced
            }
            Some(existing) => {
                tracing::trace!(
                    identifier = %record.identifier,
                    kept_tier = %existing.tier,
                    "Retained existing resource registration"
                );
                RegisterOutcome::Retained
            }
        }
    }

    /// Resolves an identifier to its active location reference.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the identifier has no active record.
    pub fn resolve(&self, identifier: &str) -> ResourceResult<&Location> {
        self.records
            .get(identifier)
            .map(|r| &r.location)
            .ok_or_else(|| ResourceError::not_found(identifier))
    }

    /// Returns the full active record for an identifier, if any.
    #[must_use]
    pub fn get(&self, identifier: &str) -> Option<&ResourceRecord> {
        self.records.get(identifier)
    }

    /// Lazy, restartable iteration over all current records.
    ///
    /// Insertion order is not guaranteed to survive overrides.
    pub fn list(&self) -> impl Iterator<Item = &ResourceRecord> {
        self.records.values()
    }

    /// Number of active records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the registry holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
