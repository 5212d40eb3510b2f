//! Core inventory types shared across the workflow.

use serde::{Deserialize, Serialize};

/// One entry from the account directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub name: String,
    pub id: String,
}

/// A Route 53 hosted zone. Zone names keep the trailing dot the DNS
/// service returns them with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostedZone {
    pub id: String,
    pub name: String,
    pub is_private: bool,
}

/// DNS record type. Only A and CNAME records take part in correlation;
/// everything else is carried through for counting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordType {
    A,
    Cname,
    Other(String),
}

impl RecordType {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "A" => Self::A,
            "CNAME" => Self::Cname,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn is_correlatable(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

impl std::fmt::Display for RecordType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::A => write!(f, "A"),
            Self::Cname => write!(f, "CNAME"),
            Self::Other(raw) => write!(f, "{}", raw),
        }
    }
}

/// Resolved record value: a record carries either an alias target or a
/// resource-record list, never both. A record with neither resolves to
/// `Unresolved` and is never emitted as a correlated match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordValue {
    Alias(String),
    Literal(String),
    Unresolved,
}

impl RecordValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Alias(value) | Self::Literal(value) => Some(value),
            Self::Unresolved => None,
        }
    }
}

/// A normalized DNS record, ready for export and correlation.
#[derive(Debug, Clone)]
pub struct DnsRecord {
    pub zone_name: String,
    pub name: String,
    pub record_type: RecordType,
    pub value: RecordValue,
}

/// ELBv2 load balancer type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LbType {
    Network,
    Application,
    Gateway,
    Other(String),
}

impl LbType {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "network" => Self::Network,
            "application" => Self::Application,
            "gateway" => Self::Gateway,
            other => Self::Other(other.to_string()),
        }
    }
}

impl std::fmt::Display for LbType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Network => write!(f, "network"),
            Self::Application => write!(f, "application"),
            Self::Gateway => write!(f, "gateway"),
            Self::Other(raw) => write!(f, "{}", raw),
        }
    }
}

/// An ELBv2 load balancer discovered in one account/region.
#[derive(Debug, Clone)]
pub struct LoadBalancer {
    pub arn: String,
    pub name: String,
    pub dns_name: String,
    pub lb_type: LbType,
}

/// An EC2 network ACL.
#[derive(Debug, Clone)]
pub struct NetworkAcl {
    pub id: String,
    pub vpc_id: String,
    pub is_default: bool,
}

/// End-of-run counters, printed once the workflow finishes.
#[derive(Debug, Default, Clone)]
pub struct RunSummary {
    pub zones: usize,
    pub zones_on_allow_list: usize,
    pub records_seen: usize,
    pub records_exported: usize,
    pub dkim_records: usize,
    pub load_balancers: usize,
    pub correlated: usize,
    pub ambiguous: usize,
    pub acls: usize,
    pub acls_in_used_vpcs: usize,
    pub skipped_units: usize,
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "zones: {} ({} on reference list), records: {}/{} exported, \
             dkim records: {}, load balancers: {}, correlated: {} ({} ambiguous), \
             acls: {} ({} in used VPCs), skipped units: {}",
            self.zones,
            self.zones_on_allow_list,
            self.records_exported,
            self.records_seen,
            self.dkim_records,
            self.load_balancers,
            self.correlated,
            self.ambiguous,
            self.acls,
            self.acls_in_used_vpcs,
            self.skipped_units,
        )
    }
}
