//! Integration tests for the registry override rule.
//!
//! The override decision runs tier → priority → timestamp, in that strict
//! order, and a losing registration is a silent no-op.

use chrono::{TimeZone, Utc};
use prompthub_mcp::registry::{
    Location, RegisterOutcome, ResourceError, ResourceRecord, ResourceRegistry, SourceTier,
};

fn record(id: &str, tier: SourceTier, priority: u32, secs: i64) -> ResourceRecord {
    ResourceRecord {
        identifier: id.to_string(),
        location: Location::file(format!("/tier/{secs}.md")),
        tier,
        priority,
        registered_at: Utc.timestamp_opt(secs, 0).unwrap(),
    }
}

// =============================================================================
// Scenario tests
// =============================================================================

#[test]
fn test_user_tier_beats_package_priority_and_timestamp() {
    // register {id: "role:writer", tier: PACKAGE, priority: 10, ts: T1},
    // then {id: "role:writer", tier: USER, priority: 5, ts: T2 < T1}:
    // the USER record wins even though its timestamp is older.
    let mut registry = ResourceRegistry::new();
    registry.register(record("role://writer", SourceTier::Package, 10, 1000));
    let outcome = registry.register(record("role://writer", SourceTier::User, 5, 500));

    assert_eq!(outcome, RegisterOutcome::Replaced);
    let active = registry.get("role://writer").unwrap();
    assert_eq!(active.tier, SourceTier::User);
    assert_eq!(active.priority, 5);
}

#[test]
fn test_timestamp_tiebreak_on_equal_tier_and_priority() {
    // Equal tier and priority: the later timestamp wins.
    let mut registry = ResourceRegistry::new();
    registry.register(record("x", SourceTier::Project, 5, 1000));
    let outcome = registry.register(record("x", SourceTier::Project, 5, 2000));

    assert_eq!(outcome, RegisterOutcome::Replaced);
    assert_eq!(
        registry.get("x").unwrap().registered_at,
        Utc.timestamp_opt(2000, 0).unwrap()
    );
}

#[test]
fn test_idempotent_under_noise() {
    // Registering a strictly lower-precedence record after a higher one
    // leaves the higher-precedence record in place, repeatedly.
    let mut registry = ResourceRegistry::new();
    registry.register(record("x", SourceTier::User, 1, 100));

    for (tier, priority, secs) in [
        (SourceTier::Internet, 0, 999),
        (SourceTier::Package, 0, 999),
        (SourceTier::Project, 0, 999),
        (SourceTier::User, 2, 999),
        (SourceTier::User, 1, 50),
    ] {
        let outcome = registry.register(record("x", tier, priority, secs));
        assert_eq!(outcome, RegisterOutcome::Retained);
    }

    let active = registry.get("x").unwrap();
    assert_eq!(active.tier, SourceTier::User);
    assert_eq!(active.priority, 1);
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_full_tier_ordering() {
    let mut registry = ResourceRegistry::new();
    registry.register(record("x", SourceTier::Internet, 0, 1));
    assert_eq!(registry.get("x").unwrap().tier, SourceTier::Internet);

    registry.register(record("x", SourceTier::Package, 0, 2));
    assert_eq!(registry.get("x").unwrap().tier, SourceTier::Package);

    registry.register(record("x", SourceTier::Project, 0, 3));
    assert_eq!(registry.get("x").unwrap().tier, SourceTier::Project);

    registry.register(record("x", SourceTier::User, 0, 4));
    assert_eq!(registry.get("x").unwrap().tier, SourceTier::User);
}

#[test]
fn test_resolve_unknown_identifier() {
    let registry = ResourceRegistry::new();
    let err = registry.resolve("role://nobody").unwrap_err();
    assert!(matches!(err, ResourceError::NotFound { .. }));
}

#[test]
fn test_list_survives_overrides() {
    let mut registry = ResourceRegistry::new();
    registry.register(record("a", SourceTier::Package, 1, 1));
    registry.register(record("b", SourceTier::Package, 1, 2));
    registry.register(record("a", SourceTier::User, 1, 3));

    let ids: Vec<_> = registry.list().map(|r| r.identifier.as_str()).collect();
    assert_eq!(ids.len(), 2);
    assert!(ids.contains(&"a"));
    assert!(ids.contains(&"b"));
}
