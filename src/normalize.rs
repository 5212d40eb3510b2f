//! Normalization of raw Route 53 record sets into canonical records.

use crate::aws::RawRecordSet;
use crate::types::{DnsRecord, RecordType, RecordValue};

/// Resolve the canonical (name, type, value) triple for a raw record set.
///
/// The value comes from the alias target when one is present, otherwise
/// from the first entry of the resource-record list. A record with
/// neither stays [`RecordValue::Unresolved`] and is excluded from
/// correlation downstream. Pure and total over every record shape the
/// CLI returns.
pub fn normalize(zone_name: &str, raw: &RawRecordSet) -> DnsRecord {
    let value = if let Some(alias) = &raw.alias_target {
        RecordValue::Alias(alias.dns_name.clone())
    } else if let Some(first) = raw.resource_records.first() {
        RecordValue::Literal(first.value.clone())
    } else {
        RecordValue::Unresolved
    };

    DnsRecord {
        zone_name: zone_name.to_string(),
        name: raw.name.clone(),
        record_type: RecordType::parse(&raw.record_type),
        value,
    }
}
