//! Purpose-aware routing.
//!
//! Each purpose (`query`, `mutation`, `upsert`, ...) owns a dedicated pool
//! of nodes with its own round-robin cursor. The map is frozen at startup.

use std::collections::{BTreeSet, HashMap};
use crate::load_balancer::endpoint::{normalize, EndpointInfo};
use crate::load_balancer::round_robin::RoundRobin;
use crate::load_balancer::RoutingError;

/// Routes traffic classes to their own backend pools.
#[derive(Debug, Default)]
pub struct PurposeRouter {
    groups: HashMap<String, RoundRobin>,
}

impl PurposeRouter {
    /// Build the router from `purpose -> addresses`.
    ///
    /// Returns the names of purposes whose non-empty address list had no
    /// usable entry, so the caller can refuse to start.
    pub fn new(groups: &HashMap<String, Vec<String>>) -> (Self, Vec<String>) {
        let mut built = HashMap::new();
        let mut unusable = Vec::new();

        for (purpose, addresses) in groups {
            let set = normalize(addresses);
            if set.all_rejected() {
                unusable.push(purpose.clone());
            }
            tracing::info!(
                purpose = %purpose,
                endpoints = set.accepted.len(),
                rejected = set.rejected.len(),
                "Purpose group configured"
            );
            built.insert(purpose.clone(), RoundRobin::new(set.accepted));
        }

        unusable.sort();
        (Self { groups: built }, unusable)
    }

    /// Next node for the given purpose.
    pub fn next(&self, purpose: &str) -> Result<EndpointInfo, RoutingError> {
        let group = self
            .groups
            .get(purpose)
            .ok_or_else(|| RoutingError::UnknownPurpose(purpose.to_string()))?;

        group
            .next()
            .ok_or_else(|| RoutingError::EmptyPool(purpose.to_string()))
    }

    /// Deduplicated union of every address across every purpose.
    pub fn all_endpoints(&self) -> BTreeSet<String> {
        self.groups
            .values()
            .flat_map(|group| group.nodes().iter())
            .map(|node| node.address.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn groups(entries: &[(&str, &[&str])]) -> HashMap<String, Vec<String>> {
        entries
            .iter()
            .map(|(purpose, eps)| {
                (purpose.to_string(), eps.iter().map(|e| e.to_string()).collect())
            })
            .collect()
    }

    #[test]
    fn disjoint_pools_stay_isolated() {
        let (router, unusable) = PurposeRouter::new(&groups(&[
            ("query", &["q1:9080", "q2:9081"]),
            ("mutation", &["m1:9082"]),
        ]));
        assert!(unusable.is_empty());

        for _ in 0..10 {
            let q = router.next("query").unwrap();
            assert!(q.address.starts_with('q'), "query routed to {}", q.address);

            let m = router.next("mutation").unwrap();
            assert_eq!(m.address, "m1:9082");
        }
    }

    #[test]
    fn each_purpose_has_its_own_cursor() {
        let (router, _) = PurposeRouter::new(&groups(&[
            ("query", &["a:9080", "b:9081"]),
            ("mutation", &["a:9080", "b:9081"]),
        ]));

        assert_eq!(router.next("query").unwrap().address, "a:9080");
        assert_eq!(router.next("mutation").unwrap().address, "a:9080");
        assert_eq!(router.next("query").unwrap().address, "b:9081");
        assert_eq!(router.next("mutation").unwrap().address, "b:9081");
    }

    #[test]
    fn unknown_purpose_is_an_error() {
        let (router, _) = PurposeRouter::new(&groups(&[("query", &["a:9080"])]));
        assert_eq!(
            router.next("upsert"),
            Err(RoutingError::UnknownPurpose("upsert".to_string()))
        );
    }

    #[test]
    fn declared_but_empty_purpose_is_a_distinct_error() {
        let (router, unusable) = PurposeRouter::new(&groups(&[
            ("query", &["a:9080"]),
            ("mutation", &["broken"]),
            ("upsert", &[]),
        ]));

        assert_eq!(unusable, vec!["mutation".to_string()]);
        assert_eq!(
            router.next("mutation"),
            Err(RoutingError::EmptyPool("mutation".to_string()))
        );
        assert_eq!(
            router.next("upsert"),
            Err(RoutingError::EmptyPool("upsert".to_string()))
        );
    }

    #[test]
    fn all_endpoints_is_a_deduplicated_union() {
        let (router, _) = PurposeRouter::new(&groups(&[
            ("query", &["http://a:9080", "b:9081"]),
            ("mutation", &["a:9080", "c:9082"]),
        ]));

        let all: Vec<_> = router.all_endpoints().into_iter().collect();
        assert_eq!(all, vec!["a:9080", "b:9081", "c:9082"]);
    }
}
