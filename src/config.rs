//! Input configuration: account directory, region list, reference domains.
//!
//! All loaders fail with [`InventoryError::Config`], which is fatal to the
//! run. There is no partial-account-list recovery.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::Deserialize;
use tracing::info;

use crate::error::InventoryError;
use crate::types::Account;

/// Account directory shapes seen in the wild: an ordered list of
/// `[name, id]` pairs, or a mapping of account id to metadata.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AccountFile {
    Pairs(Vec<(String, String)>),
    ById(BTreeMap<String, AccountMeta>),
}

#[derive(Debug, Deserialize)]
struct AccountMeta {
    name: String,
}

/// Load the account directory. An empty directory is as fatal as a
/// missing one: there is nothing to enumerate.
pub fn load_accounts(path: &Path) -> Result<Vec<Account>, InventoryError> {
    let body = std::fs::read_to_string(path)
        .map_err(|e| InventoryError::Config(format!("{}: {}", path.display(), e)))?;
    let file: AccountFile = serde_json::from_str(&body)
        .map_err(|e| InventoryError::Config(format!("{}: {}", path.display(), e)))?;

    let accounts: Vec<Account> = match file {
        AccountFile::Pairs(pairs) => pairs
            .into_iter()
            .map(|(name, id)| Account { name, id })
            .collect(),
        AccountFile::ById(by_id) => by_id
            .into_iter()
            .map(|(id, meta)| Account { name: meta.name, id })
            .collect(),
    };

    if accounts.is_empty() {
        return Err(InventoryError::Config(format!(
            "{}: account directory is empty",
            path.display()
        )));
    }

    info!(count = accounts.len(), "loaded account directory");
    Ok(accounts)
}

/// Region list shapes: a plain list of region names, or the
/// `{"zones": [{"region": ...}]}` document the zone inventory used.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RegionFile {
    Plain(Vec<String>),
    Zoned { zones: Vec<ZoneEntry> },
}

#[derive(Debug, Deserialize)]
struct ZoneEntry {
    region: String,
}

/// Load the region list, deduplicated, first-occurrence order preserved.
pub fn load_regions(path: &Path) -> Result<Vec<String>, InventoryError> {
    let body = std::fs::read_to_string(path)
        .map_err(|e| InventoryError::Config(format!("{}: {}", path.display(), e)))?;
    let file: RegionFile = serde_json::from_str(&body)
        .map_err(|e| InventoryError::Config(format!("{}: {}", path.display(), e)))?;

    let raw = match file {
        RegionFile::Plain(regions) => regions,
        RegionFile::Zoned { zones } => zones.into_iter().map(|z| z.region).collect(),
    };

    let mut seen = HashSet::new();
    let regions: Vec<String> = raw
        .into_iter()
        .filter(|region| seen.insert(region.clone()))
        .collect();

    if regions.is_empty() {
        return Err(InventoryError::Config(format!(
            "{}: region list is empty",
            path.display()
        )));
    }

    info!(count = regions.len(), "loaded region list");
    Ok(regions)
}

#[derive(Debug, Deserialize)]
struct DomainRow {
    domain_name: String,
}

/// Reference domain allow-list loaded from a CSV with a `domain_name`
/// column. One exclusion domain is dropped before the candidate set is
/// built; matching is case-insensitive with trailing dots ignored.
#[derive(Debug, Default)]
pub struct DomainAllowList {
    domains: HashSet<String>,
}

impl DomainAllowList {
    pub const DEFAULT_EXCLUSION: &'static str = "gmail.com";

    /// Load the allow-list, filtering out `exclusion` (exact match,
    /// case-insensitive) from the candidate set.
    pub fn load(path: &Path, exclusion: &str) -> Result<Self, InventoryError> {
        let mut reader = csv::Reader::from_path(path)
            .map_err(|e| InventoryError::Config(format!("{}: {}", path.display(), e)))?;

        let excluded = normalize_domain(exclusion);
        let mut domains = HashSet::new();
        for row in reader.deserialize::<DomainRow>() {
            let row = row
                .map_err(|e| InventoryError::Config(format!("{}: {}", path.display(), e)))?;
            let domain = normalize_domain(&row.domain_name);
            if domain.is_empty() || domain == excluded {
                continue;
            }
            domains.insert(domain);
        }

        info!(count = domains.len(), excluded = %excluded, "loaded reference domain list");
        Ok(Self { domains })
    }

    /// Case-insensitive membership test for a hosted zone name.
    pub fn contains(&self, zone_name: &str) -> bool {
        self.domains.contains(&normalize_domain(zone_name))
    }

    pub fn len(&self) -> usize {
        self.domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }
}

fn normalize_domain(raw: &str) -> String {
    raw.trim().trim_end_matches('.').to_ascii_lowercase()
}
