//! AWS Inventory Agent Library
//!
//! Multi-account enumeration, correlation, and CSV export of Route 53
//! DNS records, ELBv2 load balancers, and EC2 network ACLs.

pub mod aws;
pub mod config;
pub mod error;
pub mod export;
pub mod matcher;
pub mod normalize;
pub mod retry;
pub mod session;
pub mod types;
pub mod workflow;

pub use aws::{AwsCli, CloudApi};
pub use error::InventoryError;
pub use workflow::{OutputPaths, Workflow};
