//! Group membership reconciliation.
//!
//! Computes the member-attribute delta for add/remove requests against the current member set.
//! A group never ends up without a member value: when the last real member leaves, the sentinel
//! member takes its place, and once the group holds two entries again the sentinel is dropped.
//! The add threshold (two entries) and the remove threshold (zero entries) differ.

use crate::protocol::DirectoryModification;

/// Sentinel adjustment carried by a [`MembershipChange`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SentinelChange {
    /// Add the sentinel member DN.
    Insert(String),
    /// Remove the sentinel member DN.
    Drop(String),
}

/// Minimal member-attribute delta for one reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MembershipChange {
    /// Member DNs to add, in request order.
    pub additions: Vec<String>,
    /// Member DNs to remove, in request order.
    pub removals: Vec<String>,
    /// Sentinel maintenance, if any.
    pub sentinel: Option<SentinelChange>,
}

impl MembershipChange {
    /// True when applying the change would not touch the directory.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.additions.is_empty() && self.removals.is_empty() && self.sentinel.is_none()
    }

    /// Renders the change as one add and one delete of `attribute`, in that order. The
    /// sentinel joins the side it belongs to; empty sides are omitted.
    #[must_use]
    pub fn modifications(&self, attribute: &str) -> Vec<DirectoryModification> {
        let mut additions = self.additions.clone();
        let mut removals = self.removals.clone();
        match &self.sentinel {
            Some(SentinelChange::Insert(dn)) => additions.push(dn.clone()),
            Some(SentinelChange::Drop(dn)) => removals.push(dn.clone()),
            None => {}
        }

        let mut modifications = Vec::with_capacity(2);
        if !additions.is_empty() {
            modifications.push(DirectoryModification::Add {
                attribute: attribute.to_string(),
                values: additions,
            });
        }
        if !removals.is_empty() {
            modifications.push(DirectoryModification::Delete {
                attribute: attribute.to_string(),
                values: removals,
            });
        }
        modifications
    }
}

/// Plans adding `requested` member DNs to a group currently holding `current`.
///
/// Members already present (exact, case-sensitive match) and repeated requests are skipped.
/// The sentinel is never added through this path. When the resulting member count reaches two
/// and the sentinel is present, it is dropped.
#[must_use]
pub fn plan_additions<S: AsRef<str>>(
    current: &[String],
    requested: &[S],
    sentinel_dn: &str,
) -> MembershipChange {
    let mut additions: Vec<String> = Vec::new();
    for dn in requested.iter().map(AsRef::as_ref) {
        if dn == sentinel_dn || contains(current, dn) || contains(&additions, dn) {
            continue;
        }
        additions.push(dn.to_string());
    }

    let total = current.len() + additions.len();
    let sentinel = (total >= 2 && contains(current, sentinel_dn))
        .then(|| SentinelChange::Drop(sentinel_dn.to_string()));

    MembershipChange {
        additions,
        removals: Vec::new(),
        sentinel,
    }
}

/// Plans removing `requested` member DNs from a group currently holding `current`.
///
/// Only present members are removed, each once. The sentinel may be removed like any other
/// member. When nothing would remain, the sentinel is inserted; a group already left without
/// members gets it back this way. Removing the sentinel from a group holding nothing else is a
/// no-op.
#[must_use]
pub fn plan_removals<S: AsRef<str>>(
    current: &[String],
    requested: &[S],
    sentinel_dn: &str,
) -> MembershipChange {
    let mut removals: Vec<String> = Vec::new();
    for dn in requested.iter().map(AsRef::as_ref) {
        if !contains(current, dn) || contains(&removals, dn) {
            continue;
        }
        removals.push(dn.to_string());
    }

    let mut sentinel = None;
    if current.len() == removals.len() {
        if contains(&removals, sentinel_dn) {
            removals.retain(|dn| dn != sentinel_dn);
        } else {
            sentinel = Some(SentinelChange::Insert(sentinel_dn.to_string()));
        }
    }

    MembershipChange {
        additions: Vec::new(),
        removals,
        sentinel,
    }
}

fn contains(members: &[String], dn: &str) -> bool {
    members.iter().any(|member| member == dn)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SENTINEL: &str = "uid=NO_SUCH_USER,ou=users,o=company";
    const ALICE: &str = "uid=C00001,ou=users,o=company";
    const BOB: &str = "uid=C00002,ou=users,o=company";
    const CAROL: &str = "uid=C00003,ou=users,o=company";

    fn members(dns: &[&str]) -> Vec<String> {
        dns.iter().map(|dn| (*dn).to_string()).collect()
    }

    #[test]
    fn first_real_member_replaces_sentinel() {
        let change = plan_additions(&members(&[SENTINEL]), &[ALICE], SENTINEL);
        assert_eq!(change.additions, members(&[ALICE]));
        assert_eq!(
            change.sentinel,
            Some(SentinelChange::Drop(SENTINEL.to_string()))
        );
    }

    #[test]
    fn existing_members_are_not_re_added() {
        let change = plan_additions(&members(&[ALICE, BOB]), &[ALICE, BOB], SENTINEL);
        assert!(change.is_empty());
        assert!(change.modifications("uniqueMember").is_empty());
    }

    #[test]
    fn duplicate_requests_collapse() {
        let change = plan_additions(&members(&[ALICE]), &[BOB, BOB], SENTINEL);
        assert_eq!(change.additions, members(&[BOB]));
        assert_eq!(change.sentinel, None);
    }

    #[test]
    fn member_match_is_case_sensitive() {
        let lower = "uid=c00001,ou=users,o=company";
        let change = plan_additions(&members(&[ALICE]), &[lower], SENTINEL);
        assert_eq!(change.additions, members(&[lower]));
    }

    #[test]
    fn second_real_member_drops_present_sentinel() {
        let change = plan_additions(&members(&[SENTINEL, ALICE]), &[BOB], SENTINEL);
        assert_eq!(change.additions, members(&[BOB]));
        assert_eq!(
            change.sentinel,
            Some(SentinelChange::Drop(SENTINEL.to_string()))
        );
    }

    #[test]
    fn sentinel_is_never_added_on_request() {
        let change = plan_additions(&members(&[ALICE]), &[SENTINEL], SENTINEL);
        assert!(change.is_empty());
    }

    #[test]
    fn present_sentinel_can_be_removed() {
        let change = plan_removals(&members(&[SENTINEL, ALICE]), &[SENTINEL], SENTINEL);
        assert_eq!(change.removals, members(&[SENTINEL]));
        assert_eq!(change.sentinel, None);
    }

    #[test]
    fn removing_only_sentinel_changes_nothing() {
        let change = plan_removals(&members(&[SENTINEL]), &[SENTINEL], SENTINEL);
        assert!(change.is_empty());
    }

    #[test]
    fn memberless_group_gets_sentinel_back() {
        let change = plan_removals(&[], &[ALICE], SENTINEL);
        assert!(change.removals.is_empty());
        assert_eq!(
            change.sentinel,
            Some(SentinelChange::Insert(SENTINEL.to_string()))
        );
    }

    #[test]
    fn removing_last_member_inserts_sentinel() {
        let change = plan_removals(&members(&[ALICE]), &[ALICE], SENTINEL);
        assert_eq!(change.removals, members(&[ALICE]));
        assert_eq!(
            change.sentinel,
            Some(SentinelChange::Insert(SENTINEL.to_string()))
        );
    }

    #[test]
    fn removing_some_members_keeps_the_rest() {
        let change = plan_removals(&members(&[ALICE, BOB, CAROL]), &[BOB], SENTINEL);
        assert_eq!(change.removals, members(&[BOB]));
        assert_eq!(change.sentinel, None);
    }

    #[test]
    fn absent_members_are_not_removed() {
        let change = plan_removals(&members(&[ALICE]), &[BOB], SENTINEL);
        assert!(change.is_empty());
    }

    #[test]
    fn sentinel_joins_matching_side() {
        let change = plan_removals(&members(&[ALICE]), &[ALICE], SENTINEL);
        assert_eq!(
            change.modifications("uniqueMember"),
            vec![
                DirectoryModification::Add {
                    attribute: "uniqueMember".to_string(),
                    values: members(&[SENTINEL]),
                },
                DirectoryModification::Delete {
                    attribute: "uniqueMember".to_string(),
                    values: members(&[ALICE]),
                },
            ]
        );

        let change = plan_additions(&members(&[SENTINEL]), &[ALICE, BOB], SENTINEL);
        assert_eq!(
            change.modifications("uniqueMember"),
            vec![
                DirectoryModification::Add {
                    attribute: "uniqueMember".to_string(),
                    values: members(&[ALICE, BOB]),
                },
                DirectoryModification::Delete {
                    attribute: "uniqueMember".to_string(),
                    values: members(&[SENTINEL]),
                },
            ]
        );
    }
}
