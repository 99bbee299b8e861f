//! Protocol-addressed resource registry with layered discovery.
//!
//! - [`record`] — identifiers, schemes, tiers, and resource records
//! - [`store`] — the in-memory index with the priority override rule
//! - [`discovery`] — tiered discovery sources and the fan-in merge
//! - [`resolver`] — `<scheme>://<path>` resolution to content
//! - [`error`] — the resource error taxonomy

pub mod discovery;
pub mod error;
pub mod record;
pub mod resolver;
pub mod store;

pub use discovery::{
    discover_and_merge, DirectorySource, DiscoveryReport, DiscoveryResult, DiscoverySource,
};
pub use error::{ResourceError, ResourceResult};
pub use record::{Location, ResourceId, ResourceRecord, Scheme, SourceTier};
pub use resolver::{ProtocolResolver, TierRoots};
pub use store::{RegisterOutcome, ResourceRegistry};
