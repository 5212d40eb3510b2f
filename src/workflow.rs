//! The account x region x resource-kind enumeration driver.
//!
//! Accounts are processed in order. Within an account, the regional
//! enumeration units (load balancers and network ACLs per region) run in
//! a bounded worker pool; output arrives in completion order and the
//! shared sinks tolerate that. Per-unit failures are logged with their
//! account, region, and resource kind, then skipped - partial results are
//! expected. An interrupt stops new units from being scheduled, lets
//! in-flight units finish, and flushes every sink.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use crate::aws::CloudApi;
use crate::config::DomainAllowList;
use crate::error::InventoryError;
use crate::export::{
    self, write_shared, CsvSink, SharedSink, ACL_EXPORT_COLUMNS, CORRELATION_EXPORT_COLUMNS,
    DKIM_EXPORT_COLUMNS, DNS_EXPORT_COLUMNS, LB_EXPORT_COLUMNS,
};
use crate::matcher::{correlate, LbIndex};
use crate::normalize::normalize;
use crate::session::ScopedSession;
use crate::types::{Account, DnsRecord, LoadBalancer, RecordType, RunSummary};

const DEFAULT_WORKERS: usize = 4;

/// Where each workflow's CSV lands.
#[derive(Debug, Clone)]
pub struct OutputPaths {
    pub dns: PathBuf,
    pub load_balancers: PathBuf,
    pub network_acls: PathBuf,
    pub correlation: PathBuf,
    pub dkim: PathBuf,
}

impl OutputPaths {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            dns: dir.join("route53zones.csv"),
            load_balancers: dir.join("all_load_balancers.csv"),
            network_acls: dir.join("network_acls.csv"),
            correlation: dir.join("dns_lb_correlation.csv"),
            dkim: dir.join("dkim_cname_records.csv"),
        }
    }
}

/// The inventory workflow driver.
pub struct Workflow {
    api: Arc<dyn CloudApi>,
    accounts: Vec<Account>,
    regions: Vec<String>,
    allow_list: Option<DomainAllowList>,
    profile_override: Option<String>,
    echo_stdout: bool,
    workers: usize,
    shutdown: Arc<AtomicBool>,
}

impl Workflow {
    pub fn new(api: Arc<dyn CloudApi>, accounts: Vec<Account>, regions: Vec<String>) -> Self {
        Self {
            api,
            accounts,
            regions,
            allow_list: None,
            profile_override: None,
            echo_stdout: false,
            workers: DEFAULT_WORKERS,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_allow_list(mut self, allow_list: DomainAllowList) -> Self {
        self.allow_list = Some(allow_list);
        self
    }

    pub fn with_profile_override(mut self, profile: Option<String>) -> Self {
        self.profile_override = profile;
        self
    }

    pub fn with_stdout_echo(mut self, echo: bool) -> Self {
        self.echo_stdout = echo;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Flag shared with the signal handler: once set, no new enumeration
    /// unit is scheduled.
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Run the full inventory: DNS, load balancers, network ACLs, and the
    /// DNS-to-load-balancer correlation, one CSV per workflow.
    pub async fn run(&self, outputs: &OutputPaths) -> Result<RunSummary, InventoryError> {
        let dns_sink = export::shared(CsvSink::create(&outputs.dns, DNS_EXPORT_COLUMNS)?);
        let lb_sink = export::shared(CsvSink::create(&outputs.load_balancers, LB_EXPORT_COLUMNS)?);
        let acl_sink = export::shared(CsvSink::create(&outputs.network_acls, ACL_EXPORT_COLUMNS)?);
        let corr_sink = export::shared(CsvSink::create(
            &outputs.correlation,
            CORRELATION_EXPORT_COLUMNS,
        )?);
        let dkim_sink = export::shared(CsvSink::create(&outputs.dkim, DKIM_EXPORT_COLUMNS)?);

        let mut summary = RunSummary::default();

        for account in &self.accounts {
            if self.is_shutdown() {
                info!("shutdown requested, stopping before next account");
                break;
            }
            info!(account = %account.name, id = %account.id, "processing account");

            let records = self
                .enumerate_dns(account, &dns_sink, &dkim_sink, &mut summary)
                .await;
            let load_balancers = self
                .enumerate_regions(account, &lb_sink, &acl_sink, &mut summary)
                .await;

            // Correlation runs only after every region for the account has
            // been enumerated: matching is a search across all of them.
            let index = LbIndex::build(&load_balancers);
            summary.ambiguous += index.ambiguous();
            summary.load_balancers += load_balancers.len();

            for record in &records {
                if !record.record_type.is_correlatable() {
                    continue;
                }
                // Records that resolved to no value are never emitted as
                // correlated matches.
                if record.value.as_str().is_none() {
                    continue;
                }
                let arn = correlate(record, &index);
                if arn.is_some() {
                    summary.correlated += 1;
                }
                let row = [
                    account.id.clone(),
                    record.zone_name.clone(),
                    record.name.clone(),
                    record.record_type.to_string(),
                    arn.unwrap_or_default(),
                ];
                if let Err(err) = write_shared(&corr_sink, &row) {
                    warn!(account = %account.name, error = %err, "failed to write correlation row");
                }
            }
            info!(account = %account.name, "account complete");
        }

        for sink in [&dns_sink, &lb_sink, &acl_sink, &corr_sink, &dkim_sink] {
            export::flush_shared(sink)?;
        }

        Ok(summary)
    }

    /// Hosted zones and record sets for one account. Route 53 is global,
    /// so one session covers the account. Returns the normalized A/CNAME
    /// records for later correlation.
    async fn enumerate_dns(
        &self,
        account: &Account,
        dns_sink: &SharedSink,
        dkim_sink: &SharedSink,
        summary: &mut RunSummary,
    ) -> Vec<DnsRecord> {
        let region = self
            .regions
            .first()
            .map(String::as_str)
            .unwrap_or("us-east-1");
        let session = ScopedSession::open(account, region, self.profile_override.as_deref());

        let zones = match self.api.list_hosted_zones(&session).await {
            Ok(zones) => zones,
            Err(err) => {
                warn!(
                    account = %account.name,
                    resource = "hosted-zones",
                    error = %err,
                    "enumeration unit failed, skipping"
                );
                summary.skipped_units += 1;
                return Vec::new();
            }
        };
        summary.zones += zones.len();

        let mut records = Vec::new();
        for zone in &zones {
            if self.is_shutdown() {
                break;
            }

            let on_allow_list = self
                .allow_list
                .as_ref()
                .is_some_and(|allow_list| allow_list.contains(&zone.name));
            if on_allow_list {
                summary.zones_on_allow_list += 1;
                info!(
                    zone = %zone.name,
                    private = zone.is_private,
                    "hosted zone is on the reference domain list"
                );
            }

            let raw_records = match self.api.list_record_sets(&session, &zone.id).await {
                Ok(raw_records) => raw_records,
                Err(err) => {
                    warn!(
                        account = %account.name,
                        zone = %zone.id,
                        resource = "record-sets",
                        error = %err,
                        "enumeration unit failed, skipping"
                    );
                    summary.skipped_units += 1;
                    continue;
                }
            };

            for raw in &raw_records {
                summary.records_seen += 1;
                let record = normalize(&zone.name, raw);
                // Only A and CNAME records are exported, as the original
                // inventory did; everything else is still counted above.
                if !record.record_type.is_correlatable() {
                    continue;
                }

                // Zones on the reference list also feed the DKIM export:
                // every CNAME whose name mentions dkim.
                if on_allow_list
                    && record.record_type == RecordType::Cname
                    && record.name.to_ascii_lowercase().contains("dkim")
                {
                    let row = [account.id.clone(), zone.id.clone(), record.name.clone()];
                    match write_shared(dkim_sink, &row) {
                        Ok(()) => summary.dkim_records += 1,
                        Err(err) => {
                            warn!(account = %account.name, error = %err, "failed to write DKIM row")
                        }
                    }
                }

                let value = record.value.as_str().unwrap_or("").to_string();
                if self.echo_stdout {
                    println!(
                        "Account: {}, Zone: {}, Type: {}, Name: {}, Value: {}",
                        account.id, record.zone_name, record.record_type, record.name, value
                    );
                }
                let row = [
                    account.id.clone(),
                    record.zone_name.clone(),
                    record.name.clone(),
                    record.record_type.to_string(),
                    value,
                ];
                match write_shared(dns_sink, &row) {
                    Ok(()) => summary.records_exported += 1,
                    Err(err) => {
                        warn!(account = %account.name, error = %err, "failed to write DNS row")
                    }
                }
                records.push(record);
            }
        }
        records
    }

    /// Regional enumeration units for one account, run through a bounded
    /// worker pool. Load balancers from every region are collected for
    /// the correlation index.
    async fn enumerate_regions(
        &self,
        account: &Account,
        lb_sink: &SharedSink,
        acl_sink: &SharedSink,
        summary: &mut RunSummary,
    ) -> Vec<LoadBalancer> {
        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut handles = Vec::new();

        for region in &self.regions {
            if self.is_shutdown() {
                break;
            }
            let api = Arc::clone(&self.api);
            let semaphore = Arc::clone(&semaphore);
            let shutdown = Arc::clone(&self.shutdown);
            let account = account.clone();
            let region = region.clone();
            let profile_override = self.profile_override.clone();
            let lb_sink = Arc::clone(lb_sink);
            let acl_sink = Arc::clone(acl_sink);

            handles.push(tokio::spawn(async move {
                let _permit = match semaphore.acquire().await {
                    Ok(permit) => permit,
                    Err(_) => return RegionOutcome::default(),
                };
                if shutdown.load(Ordering::SeqCst) {
                    // The interrupt arrived while this unit was queued;
                    // do not start new work.
                    return RegionOutcome::default();
                }
                run_region(api, account, region, profile_override, lb_sink, acl_sink).await
            }));
        }

        let mut load_balancers = Vec::new();
        for joined in join_all(handles).await {
            match joined {
                Ok(outcome) => {
                    summary.acls += outcome.acls;
                    summary.acls_in_used_vpcs += outcome.acls_in_used_vpcs;
                    summary.skipped_units += outcome.skipped;
                    load_balancers.extend(outcome.load_balancers);
                }
                Err(err) => {
                    error!(account = %account.name, error = %err, "region worker panicked");
                    summary.skipped_units += 1;
                }
            }
        }
        load_balancers
    }
}

#[derive(Debug, Default)]
struct RegionOutcome {
    load_balancers: Vec<LoadBalancer>,
    acls: usize,
    acls_in_used_vpcs: usize,
    skipped: usize,
}

/// One account/region unit: load balancers, network ACLs, and the VPC
/// usage check per ACL.
async fn run_region(
    api: Arc<dyn CloudApi>,
    account: Account,
    region: String,
    profile_override: Option<String>,
    lb_sink: SharedSink,
    acl_sink: SharedSink,
) -> RegionOutcome {
    let session = ScopedSession::open(&account, &region, profile_override.as_deref());
    let mut outcome = RegionOutcome::default();

    match api.describe_load_balancers(&session).await {
        Ok(load_balancers) => {
            for lb in &load_balancers {
                let row = [
                    account.id.clone(),
                    lb.arn.clone(),
                    lb.name.clone(),
                    lb.dns_name.clone(),
                    lb.lb_type.to_string(),
                ];
                if let Err(err) = write_shared(&lb_sink, &row) {
                    warn!(account = %account.name, region = %region, error = %err, "failed to write load balancer row");
                }
            }
            outcome.load_balancers = load_balancers;
        }
        Err(err) => {
            warn!(
                account = %account.name,
                region = %region,
                resource = "load-balancers",
                error = %err,
                "enumeration unit failed, skipping"
            );
            outcome.skipped += 1;
        }
    }

    match api.describe_network_acls(&session).await {
        Ok(acls) => {
            outcome.acls = acls.len();
            for acl in &acls {
                let row = [
                    account.id.clone(),
                    region.clone(),
                    acl.id.clone(),
                    acl.is_default.to_string(),
                ];
                if let Err(err) = write_shared(&acl_sink, &row) {
                    warn!(account = %account.name, region = %region, error = %err, "failed to write ACL row");
                }

                match api.vpc_has_instances(&session, &acl.vpc_id).await {
                    Ok(true) => {
                        outcome.acls_in_used_vpcs += 1;
                        info!(
                            acl = %acl.id,
                            vpc = %acl.vpc_id,
                            region = %region,
                            "ACL is associated with a used VPC"
                        );
                    }
                    Ok(false) => {
                        info!(
                            acl = %acl.id,
                            vpc = %acl.vpc_id,
                            region = %region,
                            "ACL is associated with an unused VPC"
                        );
                    }
                    Err(InventoryError::NotFound(reason)) => {
                        // No VPC behind this ACL is a non-match, not a failure.
                        warn!(acl = %acl.id, region = %region, reason = %reason, "no VPC found for ACL");
                    }
                    Err(err) => {
                        warn!(
                            account = %account.name,
                            region = %region,
                            resource = "vpc-usage",
                            error = %err,
                            "enumeration unit failed, skipping"
                        );
                        outcome.skipped += 1;
                    }
                }
            }
        }
        Err(err) => {
            warn!(
                account = %account.name,
                region = %region,
                resource = "network-acls",
                error = %err,
                "enumeration unit failed, skipping"
            );
            outcome.skipped += 1;
        }
    }

    outcome
}
