//! Grouping for the admin withdrawal and referral tables.
//!
//! Filters run over the ungrouped records and groups are rebuilt from the
//! filtered list, so group sizes always match what the filters let through.
//! Grouping never drops or duplicates a record: records without an owner land
//! in an explicit unknown bucket. Groups keep first-appearance order.

use std::collections::HashMap;
use std::hash::Hash;

use liquifund_core::{Kes, UserId, WithdrawalStatus};
use serde::Serialize;

use crate::api::types::{
    AdminUser, ReferralRelationship, UserSnapshot, Withdrawal, WithdrawalUser,
};

/// Shown when a group has no value for a display field.
const NOT_AVAILABLE: &str = "N/A";

/// Partition `items` by `key`, preserving the order in which keys first appear.
fn partition<T, K, F>(items: Vec<T>, key: F) -> Vec<(K, Vec<T>)>
where
    K: Eq + Hash + Clone,
    F: Fn(&T) -> K,
{
    let mut index: HashMap<K, usize> = HashMap::new();
    let mut groups: Vec<(K, Vec<T>)> = Vec::new();
    for item in items {
        let k = key(&item);
        if let Some(&slot) = index.get(&k) {
            if let Some((_, members)) = groups.get_mut(slot) {
                members.push(item);
            }
        } else {
            index.insert(k.clone(), groups.len());
            groups.push((k, vec![item]));
        }
    }
    groups
}

fn contains_ci(haystack: Option<&str>, needle: &str) -> bool {
    haystack.is_some_and(|h| h.to_lowercase().contains(needle))
}

// =============================================================================
// Withdrawals
// =============================================================================

/// Owner of a withdrawal group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum GroupKey {
    User(UserId),
    Unknown,
}

impl std::fmt::Display for GroupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User(id) => write!(f, "{id}"),
            Self::Unknown => f.write_str("unknown"),
        }
    }
}

/// Search and status predicates over individual withdrawals.
#[derive(Debug, Clone, Default)]
pub struct WithdrawalFilter {
    /// Case-insensitive match on owner email, phone, name or the amount.
    pub search: String,
    /// `None` means every status.
    pub status: Option<WithdrawalStatus>,
}

impl WithdrawalFilter {
    #[must_use]
    pub fn matches(&self, withdrawal: &Withdrawal) -> bool {
        self.matches_status(withdrawal) && self.matches_search(withdrawal)
    }

    fn matches_status(&self, withdrawal: &Withdrawal) -> bool {
        self.status.is_none_or(|status| withdrawal.status == status)
    }

    fn matches_search(&self, withdrawal: &Withdrawal) -> bool {
        let needle = self.search.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        contains_ci(withdrawal.owner_email(), &needle)
            || contains_ci(withdrawal.owner_phone(), &needle)
            || contains_ci(withdrawal.owner_name(), &needle)
            || contains_ci(withdrawal.mobile_number.as_deref(), &needle)
            || withdrawal.amount.amount().to_string().contains(&needle)
    }

    /// The withdrawals that pass both predicates, in input order.
    #[must_use]
    pub fn apply(&self, withdrawals: Vec<Withdrawal>) -> Vec<Withdrawal> {
        withdrawals.into_iter().filter(|w| self.matches(w)).collect()
    }
}

/// One user's withdrawals.
#[derive(Debug, Clone)]
pub struct UserWithdrawals {
    pub key: GroupKey,
    /// From the first record only; not reconciled across the group.
    pub email: String,
    pub phone: String,
    pub name: String,
    pub withdrawals: Vec<Withdrawal>,
}

impl UserWithdrawals {
    #[must_use]
    pub fn total(&self) -> Kes {
        self.withdrawals.iter().map(|w| w.amount).sum()
    }

    #[must_use]
    pub fn pending(&self) -> usize {
        self.withdrawals
            .iter()
            .filter(|w| w.status == WithdrawalStatus::Pending)
            .count()
    }
}

/// Group withdrawals by owning user.
#[must_use]
pub fn group_withdrawals_by_user(withdrawals: Vec<Withdrawal>) -> Vec<UserWithdrawals> {
    partition(withdrawals, |w| w.owner_id().map_or(GroupKey::Unknown, GroupKey::User))
        .into_iter()
        .map(|(key, withdrawals)| {
            let first = withdrawals.first();
            let field = |get: fn(&Withdrawal) -> Option<&str>| {
                first
                    .and_then(get)
                    .unwrap_or(NOT_AVAILABLE)
                    .to_string()
            };
            UserWithdrawals {
                key,
                email: field(Withdrawal::owner_email),
                phone: field(Withdrawal::owner_phone),
                name: field(Withdrawal::owner_name),
                withdrawals,
            }
        })
        .collect()
}

/// Count of withdrawals in one status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusCount {
    pub status: WithdrawalStatus,
    pub count: usize,
}

impl StatusCount {
    /// Share of `total`, as a whole percent for bar widths.
    #[must_use]
    pub fn percent_of(&self, total: usize) -> usize {
        if total == 0 {
            0
        } else {
            self.count * 100 / total
        }
    }
}

/// Count per status, every status listed even when zero.
#[must_use]
pub fn withdrawal_status_breakdown(withdrawals: &[Withdrawal]) -> Vec<StatusCount> {
    WithdrawalStatus::ALL
        .iter()
        .map(|&status| StatusCount {
            status,
            count: withdrawals.iter().filter(|w| w.status == status).count(),
        })
        .collect()
}

/// Fill in owner details from the user list for withdrawals whose embedded
/// user is only an id (or has no details).
pub fn enrich_withdrawals(withdrawals: &mut [Withdrawal], users: &[AdminUser]) {
    let by_id: HashMap<UserId, &AdminUser> = users.iter().map(|u| (u.id, u)).collect();
    for withdrawal in withdrawals {
        let has_details = matches!(
            &withdrawal.user,
            Some(WithdrawalUser::Record(snapshot)) if snapshot.has_details()
        );
        if has_details {
            continue;
        }
        if let Some(user) = withdrawal.owner_id().and_then(|id| by_id.get(&id)) {
            withdrawal.user = Some(WithdrawalUser::Record(UserSnapshot {
                id: Some(user.id),
                email: Some(user.email.clone()),
                full_name: Some(user.full_name.clone()),
                phone_number: user.phone_number.clone(),
            }));
        }
    }
}

// =============================================================================
// Referrals
// =============================================================================

/// Search predicate over referral relationships.
#[derive(Debug, Clone, Default)]
pub struct ReferralFilter {
    /// Case-insensitive match on referrer or referred email and name.
    pub search: String,
}

impl ReferralFilter {
    #[must_use]
    pub fn matches(&self, relationship: &ReferralRelationship) -> bool {
        let needle = self.search.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        [
            relationship.referrer_email.as_deref(),
            relationship.referrer_full_name.as_deref(),
            relationship.referred_email.as_deref(),
            relationship.referred_full_name.as_deref(),
        ]
        .into_iter()
        .any(|field| contains_ci(field, &needle))
    }

    #[must_use]
    pub fn apply(&self, relationships: Vec<ReferralRelationship>) -> Vec<ReferralRelationship> {
        relationships
            .into_iter()
            .filter(|r| self.matches(r))
            .collect()
    }
}

/// Referrer key: email, then full name, then id, then `unknown`.
fn referrer_key(relationship: &ReferralRelationship) -> String {
    relationship
        .referrer_email
        .clone()
        .filter(|s| !s.is_empty())
        .or_else(|| {
            relationship
                .referrer_full_name
                .clone()
                .filter(|s| !s.is_empty())
        })
        .or_else(|| relationship.referrer_id.map(|id| id.to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

/// One referrer's referrals.
#[derive(Debug, Clone)]
pub struct ReferrerGroup {
    /// Display key, preferring the email.
    pub referrer: String,
    pub referrer_email: Option<String>,
    pub referrer_name: Option<String>,
    pub referrals: Vec<ReferralRelationship>,
}

/// Group referral relationships by referrer.
#[must_use]
pub fn group_referrals_by_referrer(relationships: Vec<ReferralRelationship>) -> Vec<ReferrerGroup> {
    partition(relationships, referrer_key)
        .into_iter()
        .map(|(referrer, referrals)| {
            let first = referrals.first();
            ReferrerGroup {
                referrer,
                referrer_email: first.and_then(|r| r.referrer_email.clone()),
                referrer_name: first.and_then(|r| r.referrer_full_name.clone()),
                referrals,
            }
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn withdrawal(value: Value) -> Withdrawal {
        let mut base = json!({
            "id": 1,
            "amount": "500",
            "status": "pending",
            "created_at": "2025-03-01T10:00:00Z"
        });
        if let (Some(base), Some(extra)) = (base.as_object_mut(), value.as_object()) {
            base.extend(extra.clone());
        }
        serde_json::from_value(base).unwrap()
    }

    fn relationship(value: Value) -> ReferralRelationship {
        serde_json::from_value(value).unwrap()
    }

    fn sample() -> Vec<Withdrawal> {
        vec![
            withdrawal(json!({"id": 1, "user": {"id": 5, "email": "a@x.com", "phone_number": "0711"}})),
            withdrawal(json!({"id": 2, "user_id": 9, "user_email": "b@x.com", "status": "paid"})),
            withdrawal(json!({"id": 3})),
            withdrawal(json!({"id": 4, "user": 5, "user_email": "other@x.com", "status": "rejected"})),
        ]
    }

    #[test]
    fn test_groups_preserve_first_appearance_order() {
        let groups = group_withdrawals_by_user(sample());
        let keys: Vec<GroupKey> = groups.iter().map(|g| g.key).collect();
        assert_eq!(
            keys,
            vec![
                GroupKey::User(UserId::new(5)),
                GroupKey::User(UserId::new(9)),
                GroupKey::Unknown
            ]
        );
    }

    #[test]
    fn test_grouping_keeps_every_record_once() {
        let groups = group_withdrawals_by_user(sample());
        let mut ids: Vec<i64> = groups
            .iter()
            .flat_map(|g| g.withdrawals.iter().map(|w| w.id.as_i64()))
            .collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_display_fields_come_from_first_record() {
        let groups = group_withdrawals_by_user(sample());
        // Record 4 says other@x.com, but the group shows the first record's email.
        assert_eq!(groups[0].email, "a@x.com");
        assert_eq!(groups[0].phone, "0711");
        assert_eq!(groups[0].withdrawals.len(), 2);
        assert_eq!(groups[2].email, "N/A");
        assert_eq!(groups[2].phone, "N/A");
    }

    #[test]
    fn test_filter_before_grouping_keeps_counts_consistent() {
        let filter = WithdrawalFilter {
            search: String::new(),
            status: Some(WithdrawalStatus::Pending),
        };
        let groups = group_withdrawals_by_user(filter.apply(sample()));
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].withdrawals.len(), 1);
        assert_eq!(groups[0].pending(), 1);
    }

    #[test]
    fn test_search_and_status_commute() {
        let search = WithdrawalFilter {
            search: "X.COM".into(),
            status: None,
        };
        let status = WithdrawalFilter {
            search: String::new(),
            status: Some(WithdrawalStatus::Paid),
        };
        let both = WithdrawalFilter {
            search: "x.com".into(),
            status: Some(WithdrawalStatus::Paid),
        };
        let a: Vec<i64> = status.apply(search.apply(sample())).iter().map(|w| w.id.as_i64()).collect();
        let b: Vec<i64> = search.apply(status.apply(sample())).iter().map(|w| w.id.as_i64()).collect();
        let c: Vec<i64> = both.apply(sample()).iter().map(|w| w.id.as_i64()).collect();
        assert_eq!(a, vec![2]);
        assert_eq!(a, b);
        assert_eq!(a, c);
    }

    #[test]
    fn test_status_breakdown_lists_every_status() {
        let breakdown = withdrawal_status_breakdown(&sample());
        assert_eq!(breakdown.len(), WithdrawalStatus::ALL.len());
        let pending = breakdown
            .iter()
            .find(|c| c.status == WithdrawalStatus::Pending)
            .unwrap();
        assert_eq!(pending.count, 2);
        assert_eq!(pending.percent_of(4), 50);
        assert_eq!(pending.percent_of(0), 0);
    }

    #[test]
    fn test_enrich_fills_bare_user_ids() {
        let users: Vec<AdminUser> = serde_json::from_value(json!([
            {"id": 5, "email": "amina@x.com", "full_name": "Amina", "phone_number": "0722000000", "wallet_balance": "0"}
        ]))
        .unwrap();
        let mut withdrawals = vec![withdrawal(json!({"user": 5}))];
        enrich_withdrawals(&mut withdrawals, &users);
        assert_eq!(withdrawals[0].owner_email(), Some("amina@x.com"));
        assert_eq!(withdrawals[0].owner_phone(), Some("0722000000"));
    }

    #[test]
    fn test_referral_key_fallbacks() {
        let groups = group_referrals_by_referrer(vec![
            relationship(json!({"referrer_email": "a@x.com", "referred_email": "c@x.com"})),
            relationship(json!({"referrer_full_name": "Baraka"})),
            relationship(json!({"referrer_id": 12})),
            relationship(json!({})),
            relationship(json!({"referrer_email": "a@x.com", "referred_email": "d@x.com"})),
        ]);
        let keys: Vec<&str> = groups.iter().map(|g| g.referrer.as_str()).collect();
        assert_eq!(keys, vec!["a@x.com", "Baraka", "12", "unknown"]);
        assert_eq!(groups[0].referrals.len(), 2);
    }

    #[test]
    fn test_referral_search_matches_referred_user() {
        let filter = ReferralFilter {
            search: "d@x".into(),
        };
        let groups = group_referrals_by_referrer(filter.apply(vec![
            relationship(json!({"referrer_email": "a@x.com", "referred_email": "c@x.com"})),
            relationship(json!({"referrer_email": "a@x.com", "referred_email": "d@x.com"})),
        ]));
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].referrals.len(), 1);
    }
}
