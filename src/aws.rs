//! AWS resource enumeration through the `aws` CLI.
//!
//! The cloud is an external collaborator reached by shelling out to the
//! CLI with the session's profile and region; credentials stay in the
//! ambient profile store. Every network call goes through the retry
//! invoker and parses its JSON body with serde. Callers treat each
//! account/region/resource unit independently, so one failure here never
//! aborts a run.

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::debug;

use crate::error::InventoryError;
use crate::retry::{Invoker, Sleeper, TokioSleeper};
use crate::session::ScopedSession;
use crate::types::{HostedZone, LbType, LoadBalancer, NetworkAcl};

/// Read-only cloud listing operations, one per resource kind.
#[async_trait]
pub trait CloudApi: Send + Sync {
    async fn list_hosted_zones(
        &self,
        session: &ScopedSession,
    ) -> Result<Vec<HostedZone>, InventoryError>;

    async fn list_record_sets(
        &self,
        session: &ScopedSession,
        zone_id: &str,
    ) -> Result<Vec<RawRecordSet>, InventoryError>;

    async fn describe_load_balancers(
        &self,
        session: &ScopedSession,
    ) -> Result<Vec<LoadBalancer>, InventoryError>;

    async fn describe_network_acls(
        &self,
        session: &ScopedSession,
    ) -> Result<Vec<NetworkAcl>, InventoryError>;

    /// True iff at least one instance reservation exists in the VPC.
    async fn vpc_has_instances(
        &self,
        session: &ScopedSession,
        vpc_id: &str,
    ) -> Result<bool, InventoryError>;
}

// ============================================================
// Wire Types
// ============================================================

/// One raw Route 53 record set as the CLI returns it. A record carries an
/// alias target or a resource-record list, never both.
#[derive(Debug, Clone, Deserialize)]
pub struct RawRecordSet {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Type")]
    pub record_type: String,
    #[serde(rename = "AliasTarget")]
    pub alias_target: Option<RawAliasTarget>,
    #[serde(rename = "ResourceRecords", default)]
    pub resource_records: Vec<RawResourceRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawAliasTarget {
    #[serde(rename = "DNSName")]
    pub dns_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawResourceRecord {
    #[serde(rename = "Value")]
    pub value: String,
}

#[derive(Debug, Deserialize)]
struct HostedZonesResponse {
    #[serde(rename = "HostedZones")]
    hosted_zones: Vec<RawHostedZone>,
}

#[derive(Debug, Deserialize)]
struct RawHostedZone {
    #[serde(rename = "Id")]
    id: String,
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Config")]
    config: Option<RawZoneConfig>,
}

#[derive(Debug, Deserialize)]
struct RawZoneConfig {
    #[serde(rename = "PrivateZone", default)]
    private_zone: bool,
}

#[derive(Debug, Deserialize)]
struct RecordSetsResponse {
    #[serde(rename = "ResourceRecordSets")]
    resource_record_sets: Vec<RawRecordSet>,
}

#[derive(Debug, Deserialize)]
struct LoadBalancersResponse {
    #[serde(rename = "LoadBalancers")]
    load_balancers: Vec<RawLoadBalancer>,
}

#[derive(Debug, Deserialize)]
struct RawLoadBalancer {
    #[serde(rename = "LoadBalancerArn")]
    arn: String,
    #[serde(rename = "LoadBalancerName")]
    name: String,
    #[serde(rename = "DNSName")]
    dns_name: String,
    #[serde(rename = "Type")]
    lb_type: String,
}

#[derive(Debug, Deserialize)]
struct NetworkAclsResponse {
    #[serde(rename = "NetworkAcls")]
    network_acls: Vec<RawNetworkAcl>,
}

#[derive(Debug, Deserialize)]
struct RawNetworkAcl {
    #[serde(rename = "NetworkAclId")]
    id: String,
    #[serde(rename = "VpcId")]
    vpc_id: String,
    #[serde(rename = "IsDefault", default)]
    is_default: bool,
}

#[derive(Debug, Deserialize)]
struct ReservationsResponse {
    #[serde(rename = "Reservations", default)]
    reservations: Vec<serde_json::Value>,
}

// ============================================================
// CLI Client
// ============================================================

/// `aws` CLI subprocess client.
pub struct AwsCli {
    sleeper: Box<dyn Sleeper>,
}

impl AwsCli {
    pub fn new() -> Self {
        Self {
            sleeper: Box::new(TokioSleeper),
        }
    }

    /// Run one CLI invocation through the retry invoker and parse the
    /// JSON body. Non-zero exit and malformed bodies both count as
    /// retryable attempts.
    async fn call_json<T: serde::de::DeserializeOwned>(
        &self,
        label: &str,
        args: Vec<String>,
    ) -> Result<T, InventoryError> {
        debug!(call = label, "invoking aws CLI");
        let mut invoker = Invoker::new(self.sleeper.as_ref());
        invoker
            .invoke(label, || {
                let args = args.clone();
                async move {
                    let output = Command::new("aws")
                        .args(&args)
                        .output()
                        .await
                        .map_err(|e| {
                            InventoryError::Transient(format!("failed to spawn aws CLI: {e}"))
                        })?;

                    if !output.status.success() {
                        let stderr = String::from_utf8_lossy(&output.stderr);
                        return Err(InventoryError::Transient(format!(
                            "aws CLI exited with {}: {}",
                            output.status,
                            stderr.trim()
                        )));
                    }

                    serde_json::from_slice(&output.stdout)
                        .map_err(|e| InventoryError::Parse(e.to_string()))
                }
            })
            .await
    }

    fn scoped_args(session: &ScopedSession, head: &[&str], regional: bool) -> Vec<String> {
        let mut args: Vec<String> = head.iter().map(|s| s.to_string()).collect();
        args.push("--profile".into());
        args.push(session.profile().to_string());
        if regional {
            args.push("--region".into());
            args.push(session.region.clone());
        }
        args.push("--output".into());
        args.push("json".into());
        args
    }
}

impl Default for AwsCli {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CloudApi for AwsCli {
    async fn list_hosted_zones(
        &self,
        session: &ScopedSession,
    ) -> Result<Vec<HostedZone>, InventoryError> {
        let args = Self::scoped_args(session, &["route53", "list-hosted-zones"], false);
        let response: HostedZonesResponse = self.call_json("route53 list-hosted-zones", args).await?;

        Ok(response
            .hosted_zones
            .into_iter()
            .map(|zone| HostedZone {
                // Zone ids come back as "/hostedzone/Z123..."; keep the bare id.
                id: zone.id.rsplit('/').next().unwrap_or(&zone.id).to_string(),
                name: zone.name,
                is_private: zone.config.map(|c| c.private_zone).unwrap_or(false),
            })
            .collect())
    }

    async fn list_record_sets(
        &self,
        session: &ScopedSession,
        zone_id: &str,
    ) -> Result<Vec<RawRecordSet>, InventoryError> {
        let mut head = vec!["route53", "list-resource-record-sets", "--hosted-zone-id"];
        head.push(zone_id);
        let args = Self::scoped_args(session, &head, false);
        let response: RecordSetsResponse = self
            .call_json("route53 list-resource-record-sets", args)
            .await?;
        Ok(response.resource_record_sets)
    }

    async fn describe_load_balancers(
        &self,
        session: &ScopedSession,
    ) -> Result<Vec<LoadBalancer>, InventoryError> {
        let args = Self::scoped_args(session, &["elbv2", "describe-load-balancers"], true);
        let response: LoadBalancersResponse =
            self.call_json("elbv2 describe-load-balancers", args).await?;

        Ok(response
            .load_balancers
            .into_iter()
            .map(|lb| LoadBalancer {
                arn: lb.arn,
                name: lb.name,
                dns_name: lb.dns_name,
                lb_type: LbType::parse(&lb.lb_type),
            })
            .collect())
    }

    async fn describe_network_acls(
        &self,
        session: &ScopedSession,
    ) -> Result<Vec<NetworkAcl>, InventoryError> {
        let args = Self::scoped_args(session, &["ec2", "describe-network-acls"], true);
        let response: NetworkAclsResponse =
            self.call_json("ec2 describe-network-acls", args).await?;

        Ok(response
            .network_acls
            .into_iter()
            .map(|acl| NetworkAcl {
                id: acl.id,
                vpc_id: acl.vpc_id,
                is_default: acl.is_default,
            })
            .collect())
    }

    async fn vpc_has_instances(
        &self,
        session: &ScopedSession,
        vpc_id: &str,
    ) -> Result<bool, InventoryError> {
        let filter = format!("Name=vpc-id,Values={vpc_id}");
        let head = vec!["ec2", "describe-instances", "--filters", filter.as_str()];
        let args = Self::scoped_args(session, &head, true);
        let response: ReservationsResponse =
            self.call_json("ec2 describe-instances", args).await?;
        Ok(!response.reservations.is_empty())
    }
}
