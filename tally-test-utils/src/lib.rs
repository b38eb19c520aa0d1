//! Tally Test Utilities
//!
//! Shared test infrastructure for the Tally workspace:
//! - Fixtures for tokens, identities and resource records
//! - Proptest generators for session and cache types

pub use tally_core::{
    Record, RecordId, ResourceKind, Session, SessionStatus, TallyError, TallyResult, TenantId,
    TokenRecord, UserIdentity,
};

pub use fixtures::*;

pub mod fixtures {
    //! Pre-built test fixtures for common testing scenarios.

    use super::*;
    use chrono::{Duration, Utc};
    use serde_json::json;

    /// The tenant most tests run against.
    pub fn tenant_default() -> TenantId {
        TenantId::new("biz-1")
    }

    /// Token expiring an hour from now.
    pub fn valid_token() -> TokenRecord {
        TokenRecord::new("valid-token", Utc::now() + Duration::hours(1))
    }

    /// Token that expired one second ago.
    pub fn expired_token() -> TokenRecord {
        TokenRecord::new("abc", Utc::now() - Duration::seconds(1))
    }

    pub fn sample_identity() -> UserIdentity {
        UserIdentity {
            id: "user-1".to_string(),
            email: "owner@example.com".to_string(),
            name: Some("Dana Owner".to_string()),
            tenants: vec![tenant_default()],
            roles: vec!["owner".to_string()],
        }
    }

    /// Backend JSON for [`sample_identity`].
    pub fn sample_identity_json() -> serde_json::Value {
        json!({
            "id": "user-1",
            "email": "owner@example.com",
            "name": "Dana Owner",
            "tenants": ["biz-1"],
            "roles": ["owner"]
        })
    }

    /// Catalog items `item-0 .. item-{count-1}` as backend JSON.
    pub fn item_json(count: usize) -> Vec<serde_json::Value> {
        (0..count)
            .map(|i| {
                json!({
                    "id": format!("item-{i}"),
                    "name": format!("Item {i}"),
                    "unitPrice": (i as f64) * 2.5,
                })
            })
            .collect()
    }

    pub fn item_records(count: usize) -> Vec<Record> {
        item_json(count)
            .into_iter()
            .filter_map(|value| Record::from_value(value).ok())
            .collect()
    }

    /// Minimal records carrying only the given ids.
    pub fn records_from_ids(ids: &[&str]) -> Vec<Record> {
        ids.iter()
            .filter_map(|id| Record::from_value(json!({ "id": id })).ok())
            .collect()
    }
}

pub mod generators {
    //! Proptest strategies for generating Tally types.

    use super::*;
    use chrono::{Duration, Utc};
    use proptest::prelude::*;

    pub fn arb_resource_kind() -> impl Strategy<Value = ResourceKind> {
        prop::sample::select(ResourceKind::ALL.to_vec())
    }

    pub fn arb_tenant_id() -> impl Strategy<Value = TenantId> {
        "biz-[0-9]{1,3}".prop_map(TenantId::new)
    }

    pub fn arb_access_token() -> impl Strategy<Value = String> {
        "[A-Za-z0-9._-]{0,64}"
    }

    /// Token whose expiry is at or before now.
    pub fn arb_expired_token() -> impl Strategy<Value = TokenRecord> {
        (arb_access_token(), 0i64..100_000_000).prop_map(|(token, seconds_ago)| {
            TokenRecord::new(token, Utc::now() - Duration::seconds(seconds_ago))
        })
    }

    /// Non-empty token expiring at least a minute from now.
    pub fn arb_live_token() -> impl Strategy<Value = TokenRecord> {
        ("[A-Za-z0-9]{1,64}", 60i64..100_000_000).prop_map(|(token, seconds_ahead)| {
            TokenRecord::new(token, Utc::now() + Duration::seconds(seconds_ahead))
        })
    }

    /// Collection with unique ids in backend order.
    pub fn arb_records(max: usize) -> impl Strategy<Value = Vec<Record>> {
        prop::collection::btree_set("[a-z0-9]{1,12}", 0..max).prop_map(|ids| {
            ids.into_iter()
                .filter_map(|id| Record::from_value(serde_json::json!({ "id": id })).ok())
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_records_have_distinct_ids() {
        let records = item_records(5);
        assert_eq!(records.len(), 5);
        assert_eq!(records[3].id().as_str(), "item-3");
    }

    #[test]
    fn test_token_fixtures() {
        assert!(valid_token().is_valid());
        assert!(!expired_token().is_valid());
    }

    #[test]
    fn test_identity_json_matches_fixture() {
        let parsed: UserIdentity =
            serde_json::from_value(sample_identity_json()).expect("fixture should parse");
        assert_eq!(parsed, sample_identity());
    }
}
