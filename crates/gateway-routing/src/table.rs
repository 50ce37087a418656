//! Longest-prefix routing table.

use crate::rules::RouteRule;
use tracing::debug;

/// Routing table resolving request paths to rules.
///
/// Rules are held sorted by descending prefix length so resolution picks the
/// most specific match: `/carts/items` wins over `/carts` for
/// `/carts/items/42`. The table is immutable after construction; config
/// reloads swap in a freshly built table.
#[derive(Debug, Clone, Default)]
pub struct RoutingTable {
    rules: Vec<RouteRule>,
}

impl RoutingTable {
    /// Build a table from rules, sorting them for longest-prefix matching
    #[must_use]
    pub fn new(mut rules: Vec<RouteRule>) -> Self {
        rules.sort_by(|a, b| b.prefix.len().cmp(&a.prefix.len()));
        Self { rules }
    }

    /// Resolve the most specific rule for a path.
    ///
    /// A prefix matches when the path equals it or continues past it at a
    /// segment boundary, so `/cart` never captures `/carts/u-1`.
    #[must_use]
    pub fn resolve(&self, path: &str) -> Option<&RouteRule> {
        let rule = self.rules.iter().find(|rule| {
            path.strip_prefix(&rule.prefix)
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
        });
        match rule {
            Some(rule) => {
                debug!(path = %path, service = %rule.service, "Route resolved");
                Some(rule)
            }
            None => {
                debug!(path = %path, "No route matched");
                None
            }
        }
    }

    /// All rules in match order
    #[must_use]
    pub fn rules(&self) -> &[RouteRule] {
        &self.rules
    }

    /// Number of rules
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the table has no rules
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::AuthPolicy;
    use http::Method;

    fn table() -> RoutingTable {
        RoutingTable::new(vec![
            RouteRule::new("/carts", "carts", "http://carts:8080")
                .with_auth(AuthPolicy::MutatingOnly),
            RouteRule::new("/carts/items", "cart-items", "http://cart-items:8080"),
            RouteRule::new("/catalogue", "catalogue", "http://catalogue:8080").cacheable(true),
        ])
    }

    #[test]
    fn test_resolves_exact_prefix() {
        let table = table();
        assert_eq!(table.resolve("/catalogue").unwrap().service, "catalogue");
        assert_eq!(
            table.resolve("/catalogue/size").unwrap().service,
            "catalogue"
        );
    }

    #[test]
    fn test_longest_prefix_wins() {
        let table = table();
        assert_eq!(table.resolve("/carts/u-1").unwrap().service, "carts");
        assert_eq!(
            table.resolve("/carts/items/42").unwrap().service,
            "cart-items"
        );
    }

    #[test]
    fn test_no_match() {
        assert!(table().resolve("/payments/authorise").is_none());
    }

    #[test]
    fn test_prefix_matches_only_at_segment_boundary() {
        let table = RoutingTable::new(vec![RouteRule::new("/cart", "cart", "http://cart:8080")]);
        assert!(table.resolve("/carts/u-1").is_none());
        assert!(table.resolve("/cart/u-1").is_some());
    }

    #[test]
    fn test_resolved_rule_carries_policy() {
        let table = table();
        let rule = table.resolve("/carts/u-1").unwrap();
        assert!(rule.auth.requires_auth(&Method::POST));
        assert!(!rule.auth.requires_auth(&Method::GET));
    }
}
