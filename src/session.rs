//! Scoped sessions binding an account to an AWS profile and region.
//!
//! Credential resolution is left to the ambient profile store; nothing is
//! validated eagerly and no secret ever passes through this crate.
//! Handles are cheap and scoped to a single enumeration call.

use crate::types::Account;

/// A short-lived handle naming the credentials and region for one
/// enumeration call. Failures surface on the first call made through it.
#[derive(Debug, Clone)]
pub struct ScopedSession {
    pub account: Account,
    pub region: String,
    profile: String,
}

impl ScopedSession {
    /// Open a session for one account/region pair. By convention the CLI
    /// profile is named after the account; `profile_override` forces a
    /// single profile for every account instead.
    pub fn open(account: &Account, region: &str, profile_override: Option<&str>) -> Self {
        let profile = profile_override.unwrap_or(&account.name).to_string();
        Self {
            account: account.clone(),
            region: region.to_string(),
            profile,
        }
    }

    pub fn profile(&self) -> &str {
        &self.profile
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account() -> Account {
        Account {
            name: "se-staging".into(),
            id: "111122223333".into(),
        }
    }

    #[test]
    fn profile_defaults_to_account_name() {
        let session = ScopedSession::open(&account(), "us-west-2", None);
        assert_eq!(session.profile(), "se-staging");
        assert_eq!(session.region, "us-west-2");
    }

    #[test]
    fn profile_override_wins() {
        let session = ScopedSession::open(&account(), "us-west-2", Some("security-ro"));
        assert_eq!(session.profile(), "security-ro");
    }
}
