//! End-to-end workflow tests against a mock cloud API.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;

use aws_inventory_agent::aws::{CloudApi, RawAliasTarget, RawRecordSet, RawResourceRecord};
use aws_inventory_agent::config::DomainAllowList;
use aws_inventory_agent::error::InventoryError;
use aws_inventory_agent::session::ScopedSession;
use aws_inventory_agent::types::{Account, HostedZone, LbType, LoadBalancer, NetworkAcl};
use aws_inventory_agent::workflow::{OutputPaths, Workflow};

#[derive(Default)]
struct MockApi {
    zones: Vec<HostedZone>,
    records_by_zone: HashMap<String, Vec<RawRecordSet>>,
    lbs_by_region: HashMap<String, Vec<LoadBalancer>>,
    acls_by_region: HashMap<String, Vec<NetworkAcl>>,
    failing_regions: HashSet<String>,
    used_vpcs: HashSet<String>,
}

#[async_trait]
impl CloudApi for MockApi {
    async fn list_hosted_zones(
        &self,
        _session: &ScopedSession,
    ) -> Result<Vec<HostedZone>, InventoryError> {
        Ok(self.zones.clone())
    }

    async fn list_record_sets(
        &self,
        _session: &ScopedSession,
        zone_id: &str,
    ) -> Result<Vec<RawRecordSet>, InventoryError> {
        Ok(self.records_by_zone.get(zone_id).cloned().unwrap_or_default())
    }

    async fn describe_load_balancers(
        &self,
        session: &ScopedSession,
    ) -> Result<Vec<LoadBalancer>, InventoryError> {
        if self.failing_regions.contains(&session.region) {
            return Err(InventoryError::Transient(format!(
                "aws CLI exited with 255 in {}",
                session.region
            )));
        }
        Ok(self
            .lbs_by_region
            .get(&session.region)
            .cloned()
            .unwrap_or_default())
    }

    async fn describe_network_acls(
        &self,
        session: &ScopedSession,
    ) -> Result<Vec<NetworkAcl>, InventoryError> {
        if self.failing_regions.contains(&session.region) {
            return Err(InventoryError::Transient(format!(
                "aws CLI exited with 255 in {}",
                session.region
            )));
        }
        Ok(self
            .acls_by_region
            .get(&session.region)
            .cloned()
            .unwrap_or_default())
    }

    async fn vpc_has_instances(
        &self,
        _session: &ScopedSession,
        vpc_id: &str,
    ) -> Result<bool, InventoryError> {
        if vpc_id == "vpc-missing" {
            return Err(InventoryError::NotFound(format!("no such vpc: {vpc_id}")));
        }
        Ok(self.used_vpcs.contains(vpc_id))
    }
}

fn account() -> Account {
    Account {
        name: "se-staging".into(),
        id: "111122223333".into(),
    }
}

fn alias_record(name: &str, target: &str) -> RawRecordSet {
    RawRecordSet {
        name: name.into(),
        record_type: "A".into(),
        alias_target: Some(RawAliasTarget {
            dns_name: target.into(),
        }),
        resource_records: Vec::new(),
    }
}

fn cname_record(name: &str, value: &str) -> RawRecordSet {
    RawRecordSet {
        name: name.into(),
        record_type: "CNAME".into(),
        alias_target: None,
        resource_records: vec![RawResourceRecord {
            value: value.into(),
        }],
    }
}

fn read_rows(path: &std::path::Path) -> Vec<Vec<String>> {
    let mut reader = csv::Reader::from_path(path).unwrap();
    reader
        .records()
        .map(|record| {
            record
                .unwrap()
                .iter()
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .collect()
}

#[tokio::test]
async fn correlation_matches_alias_and_leaves_unrelated_cname_empty() {
    let mut api = MockApi::default();
    api.zones = vec![
        HostedZone {
            id: "Z1".into(),
            name: "app.example.com.".into(),
            is_private: false,
        },
        HostedZone {
            id: "Z2".into(),
            name: "other.example.com.".into(),
            is_private: false,
        },
    ];
    api.records_by_zone.insert(
        "Z1".into(),
        vec![alias_record(
            "web.app.example.com.",
            "dualstack.my-lb-1234.elb.amazonaws.com.",
        )],
    );
    api.records_by_zone.insert(
        "Z2".into(),
        vec![cname_record(
            "mail.other.example.com.",
            "ghs.googlehosted.com",
        )],
    );
    api.lbs_by_region.insert(
        "us-east-1".into(),
        vec![LoadBalancer {
            arn: "arn:aws:elasticloadbalancing:us-east-1:111122223333:loadbalancer/net/my-lb/1234"
                .into(),
            name: "my-lb".into(),
            dns_name: "my-lb-1234.elb.amazonaws.com".into(),
            lb_type: LbType::Network,
        }],
    );

    let dir = tempfile::tempdir().unwrap();
    let outputs = OutputPaths::in_dir(dir.path());

    let workflow = Workflow::new(Arc::new(api), vec![account()], vec!["us-east-1".into()]);
    let summary = workflow.run(&outputs).await.unwrap();

    assert_eq!(summary.zones, 2);
    assert_eq!(summary.records_exported, 2);
    assert_eq!(summary.correlated, 1);
    assert_eq!(summary.ambiguous, 0);

    let rows = read_rows(&outputs.correlation);
    assert_eq!(rows.len(), 2);

    let matched: Vec<_> = rows.iter().filter(|row| !row[4].is_empty()).collect();
    let unmatched: Vec<_> = rows.iter().filter(|row| row[4].is_empty()).collect();
    assert_eq!(matched.len(), 1);
    assert_eq!(unmatched.len(), 1);
    assert_eq!(matched[0][2], "web.app.example.com.");
    assert!(matched[0][4].contains("loadbalancer/net/my-lb"));
    assert_eq!(unmatched[0][2], "mail.other.example.com.");
}

#[tokio::test]
async fn one_failing_region_does_not_block_the_other_nine() {
    let mut api = MockApi::default();
    let mut regions = Vec::new();
    for i in 0..10 {
        let region = format!("region-{i}");
        api.lbs_by_region.insert(
            region.clone(),
            vec![LoadBalancer {
                arn: format!("arn:lb/{i}"),
                name: format!("lb-{i}"),
                dns_name: format!("lb-{i}.elb.amazonaws.com"),
                lb_type: LbType::Application,
            }],
        );
        regions.push(region);
    }
    api.failing_regions.insert("region-3".into());

    let dir = tempfile::tempdir().unwrap();
    let outputs = OutputPaths::in_dir(dir.path());

    let workflow = Workflow::new(Arc::new(api), vec![account()], regions).with_workers(4);
    let summary = workflow.run(&outputs).await.unwrap();

    let rows = read_rows(&outputs.load_balancers);
    assert_eq!(rows.len(), 9);
    assert!(!rows.iter().any(|row| row[1] == "arn:lb/3"));
    assert_eq!(summary.load_balancers, 9);
    // region-3 skips both its load balancer and ACL units.
    assert_eq!(summary.skipped_units, 2);
}

#[tokio::test]
async fn acl_export_and_vpc_usage_checks() {
    let mut api = MockApi::default();
    api.acls_by_region.insert(
        "us-west-2".into(),
        vec![
            NetworkAcl {
                id: "acl-used".into(),
                vpc_id: "vpc-1".into(),
                is_default: true,
            },
            NetworkAcl {
                id: "acl-unused".into(),
                vpc_id: "vpc-2".into(),
                is_default: false,
            },
            NetworkAcl {
                id: "acl-orphan".into(),
                vpc_id: "vpc-missing".into(),
                is_default: false,
            },
        ],
    );
    api.used_vpcs.insert("vpc-1".into());

    let dir = tempfile::tempdir().unwrap();
    let outputs = OutputPaths::in_dir(dir.path());

    let workflow = Workflow::new(Arc::new(api), vec![account()], vec!["us-west-2".into()]);
    let summary = workflow.run(&outputs).await.unwrap();

    assert_eq!(summary.acls, 3);
    assert_eq!(summary.acls_in_used_vpcs, 1);
    // The missing VPC is a non-match, not a skipped unit.
    assert_eq!(summary.skipped_units, 0);

    let rows = read_rows(&outputs.network_acls);
    assert_eq!(rows.len(), 3);
    let used = rows.iter().find(|row| row[2] == "acl-used").unwrap();
    assert_eq!(used[0], "111122223333");
    assert_eq!(used[1], "us-west-2");
    assert_eq!(used[3], "true");
}

#[tokio::test]
async fn allow_list_matches_are_counted() {
    use std::io::Write;

    let mut domains_file = tempfile::NamedTempFile::new().unwrap();
    writeln!(domains_file, "domain_name").unwrap();
    writeln!(domains_file, "app.example.com").unwrap();
    writeln!(domains_file, "gmail.com").unwrap();

    let allow_list =
        DomainAllowList::load(domains_file.path(), DomainAllowList::DEFAULT_EXCLUSION).unwrap();

    let mut api = MockApi::default();
    api.zones = vec![
        HostedZone {
            id: "Z1".into(),
            name: "app.example.com.".into(),
            is_private: false,
        },
        HostedZone {
            id: "Z2".into(),
            name: "gmail.com.".into(),
            is_private: false,
        },
        HostedZone {
            id: "Z3".into(),
            name: "unlisted.example.com.".into(),
            is_private: true,
        },
    ];

    let dir = tempfile::tempdir().unwrap();
    let outputs = OutputPaths::in_dir(dir.path());

    let workflow = Workflow::new(Arc::new(api), vec![account()], vec!["us-east-1".into()])
        .with_allow_list(allow_list);
    let summary = workflow.run(&outputs).await.unwrap();

    // gmail.com is excluded from the candidate set before matching.
    assert_eq!(summary.zones, 3);
    assert_eq!(summary.zones_on_allow_list, 1);
}

#[tokio::test]
async fn dkim_cnames_are_exported_only_for_zones_on_the_reference_list() {
    use std::io::Write;

    let mut domains_file = tempfile::NamedTempFile::new().unwrap();
    writeln!(domains_file, "domain_name").unwrap();
    writeln!(domains_file, "app.example.com").unwrap();

    let allow_list =
        DomainAllowList::load(domains_file.path(), DomainAllowList::DEFAULT_EXCLUSION).unwrap();

    let mut api = MockApi::default();
    api.zones = vec![
        HostedZone {
            id: "Z1".into(),
            name: "app.example.com.".into(),
            is_private: false,
        },
        HostedZone {
            id: "Z2".into(),
            name: "other.example.com.".into(),
            is_private: false,
        },
    ];
    api.records_by_zone.insert(
        "Z1".into(),
        vec![
            cname_record(
                "DKIM._domainkey.app.example.com.",
                "dkim.mail-provider.example.",
            ),
            cname_record("www.app.example.com.", "app.example.com"),
            alias_record("app.example.com.", "my-lb.elb.amazonaws.com."),
        ],
    );
    // Same record shape, but the zone is not on the reference list.
    api.records_by_zone.insert(
        "Z2".into(),
        vec![cname_record(
            "dkim._domainkey.other.example.com.",
            "dkim.mail-provider.example.",
        )],
    );

    let dir = tempfile::tempdir().unwrap();
    let outputs = OutputPaths::in_dir(dir.path());

    let workflow = Workflow::new(Arc::new(api), vec![account()], vec!["us-east-1".into()])
        .with_allow_list(allow_list);
    let summary = workflow.run(&outputs).await.unwrap();

    assert_eq!(summary.zones_on_allow_list, 1);
    assert_eq!(summary.dkim_records, 1);

    let rows = read_rows(&outputs.dkim);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0][0], "111122223333");
    assert_eq!(rows[0][1], "Z1");
    assert_eq!(rows[0][2], "DKIM._domainkey.app.example.com.");
}

#[tokio::test]
async fn shutdown_before_run_schedules_nothing_but_flushes_exports() {
    let mut api = MockApi::default();
    api.zones = vec![HostedZone {
        id: "Z1".into(),
        name: "app.example.com.".into(),
        is_private: false,
    }];
    api.lbs_by_region.insert(
        "us-east-1".into(),
        vec![LoadBalancer {
            arn: "arn:lb/1".into(),
            name: "my-lb".into(),
            dns_name: "my-lb.elb.amazonaws.com".into(),
            lb_type: LbType::Network,
        }],
    );

    let dir = tempfile::tempdir().unwrap();
    let outputs = OutputPaths::in_dir(dir.path());

    let workflow = Workflow::new(Arc::new(api), vec![account()], vec!["us-east-1".into()]);
    workflow
        .shutdown_handle()
        .store(true, std::sync::atomic::Ordering::SeqCst);
    let summary = workflow.run(&outputs).await.unwrap();

    // Nothing was scheduled, but the run still completes cleanly with
    // flushed, readable exports.
    assert_eq!(summary.zones, 0);
    assert_eq!(summary.records_exported, 0);
    assert_eq!(summary.load_balancers, 0);
    assert_eq!(summary.skipped_units, 0);
    for path in [
        &outputs.dns,
        &outputs.load_balancers,
        &outputs.network_acls,
        &outputs.correlation,
        &outputs.dkim,
    ] {
        let contents = std::fs::read_to_string(path).unwrap();
        assert_eq!(contents.lines().count(), 1, "{} should be header-only", path.display());
    }
}

#[tokio::test]
async fn empty_inventory_still_produces_header_only_exports() {
    let api = MockApi::default();

    let dir = tempfile::tempdir().unwrap();
    let outputs = OutputPaths::in_dir(dir.path());

    let workflow = Workflow::new(Arc::new(api), vec![account()], vec!["us-east-1".into()]);
    let summary = workflow.run(&outputs).await.unwrap();

    assert_eq!(summary.records_exported, 0);
    for path in [
        &outputs.dns,
        &outputs.load_balancers,
        &outputs.network_acls,
        &outputs.correlation,
        &outputs.dkim,
    ] {
        let contents = std::fs::read_to_string(path).unwrap();
        assert_eq!(contents.lines().count(), 1, "{} should be header-only", path.display());
    }
}
