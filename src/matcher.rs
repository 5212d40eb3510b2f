//! Cross-reference matching between DNS records and load balancers.
//!
//! Matching is exact and case-sensitive, with the trailing-dot convention
//! Route 53 uses for record values. The index is built once per account
//! batch across every region, turning a records x load-balancers scan
//! into a single lookup per record.

use std::collections::HashMap;

use tracing::warn;

use crate::types::{DnsRecord, LoadBalancer};

/// Lookup index from load-balancer DNS name to ARN for one account batch.
///
/// Each load balancer registers two keys: `<dns_name>.` and
/// `dualstack.<dns_name>.`, so resolved record values match by plain
/// equality whether or not they carry the dualstack prefix.
#[derive(Debug, Default)]
pub struct LbIndex {
    by_dns_name: HashMap<String, String>,
    ambiguous: usize,
}

impl LbIndex {
    pub fn build(load_balancers: &[LoadBalancer]) -> Self {
        let mut index = Self::default();
        for lb in load_balancers {
            index.insert(lb);
        }
        index
    }

    pub fn insert(&mut self, lb: &LoadBalancer) {
        let keys = [
            format!("{}.", lb.dns_name),
            format!("dualstack.{}.", lb.dns_name),
        ];
        let mut kept: Option<String> = None;
        for key in keys {
            match self.by_dns_name.get(&key) {
                Some(existing) if existing != &lb.arn => {
                    kept = Some(existing.clone());
                }
                Some(_) => {}
                None => {
                    self.by_dns_name.insert(key, lb.arn.clone());
                }
            }
        }
        // Two load balancers sharing one DNS name count as one collision
        // even though both lookup keys clash. First registration wins;
        // the collision is surfaced instead of silently discarded.
        if let Some(kept) = kept {
            warn!(
                dns_name = %lb.dns_name,
                kept = %kept,
                dropped = %lb.arn,
                "ambiguous load balancer DNS name"
            );
            self.ambiguous += 1;
        }
    }

    /// Exact lookup of a resolved record value.
    pub fn match_value(&self, value: &str) -> Option<&str> {
        self.by_dns_name.get(value).map(String::as_str)
    }

    /// Number of DNS-name collisions observed while building the index.
    pub fn ambiguous(&self) -> usize {
        self.ambiguous
    }

    pub fn is_empty(&self) -> bool {
        self.by_dns_name.is_empty()
    }
}

/// Find the load balancer ARN a normalized record points at, if any.
///
/// Records with an unresolved value or a non-correlatable type never
/// match.
pub fn correlate(record: &DnsRecord, index: &LbIndex) -> Option<String> {
    if !record.record_type.is_correlatable() {
        return None;
    }
    let value = record.value.as_str()?;
    index.match_value(value).map(str::to_string)
}
