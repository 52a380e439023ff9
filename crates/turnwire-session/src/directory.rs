//! Collaborator contracts the login validator consumes.
//!
//! The validator doesn't own accounts, ban lists, word lists, or the
//! access log — deployments back these traits with whatever store they
//! run (a database, flat files, the in-memory implementations from
//! [`memory`](crate::memory) for embedding and tests). Each trait is
//! `Send + Sync` because one validator instance serves every
//! connection task.

use std::net::IpAddr;
use std::time::SystemTime;

use crate::AuthError;

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

/// A registered account as the directory stores it.
///
/// The password hash is crypt-format text (`$1$<salt>$<digest>`); the
/// salt the challenge hands to clients is embedded in it rather than
/// stored separately, so the two can never drift apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

impl Account {
    /// The salt segment of the stored password hash, or `None` if the
    /// stored hash is not crypt-format text.
    pub fn salt(&self) -> Option<&str> {
        self.password_hash.split('$').nth(2).filter(|s| !s.is_empty())
    }
}

/// Lookup, verification, and creation of registered accounts.
pub trait AccountDirectory: Send + Sync {
    /// Fetches the account registered under `name`, if any.
    fn fetch(&self, name: &str) -> Option<Account>;

    /// Whether `password_hash` matches the stored credential for
    /// `name`. `false` for unknown names — the caller distinguishes the
    /// two cases by fetching first.
    fn verify(&self, name: &str, password_hash: &str) -> bool;

    /// Creates a new account.
    ///
    /// # Errors
    /// Returns [`AuthError::DuplicateAccount`] if the name is taken.
    fn create(&self, account: Account) -> Result<(), AuthError>;
}

// ---------------------------------------------------------------------------
// Bans
// ---------------------------------------------------------------------------

/// One active ban. `expires` is `None` for a permanent ban.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ban {
    pub expires: Option<SystemTime>,
}

impl Ban {
    /// A ban with no expiry.
    pub fn permanent() -> Self {
        Self { expires: None }
    }

    /// A ban expiring at the given instant.
    pub fn until(expires: SystemTime) -> Self {
        Self {
            expires: Some(expires),
        }
    }

    /// Whether the ban is still in force at `now`.
    pub fn in_force(&self, now: SystemTime) -> bool {
        match self.expires {
            Some(expires) => now < expires,
            None => true,
        }
    }
}

/// Ban lookups by the three identities a connection presents.
///
/// Implementations must only return bans still in force; expiry
/// bookkeeping belongs to the registry, not the validator.
pub trait BanRegistry: Send + Sync {
    /// Active ban on the username, if any.
    fn username_ban(&self, name: &str) -> Option<Ban>;

    /// Active ban on the source address, if any.
    fn ip_ban(&self, ip: IpAddr) -> Option<Ban>;

    /// Active ban on the hashed hardware identifier, if any. Only ever
    /// called with a well-formed identifier.
    fn hardware_ban(&self, hashed_id: &str) -> Option<Ban>;
}

// ---------------------------------------------------------------------------
// Word filter
// ---------------------------------------------------------------------------

/// Blocked-word lookup for requested names.
pub trait WordFilter: Send + Sync {
    /// Whether `text` contains a blocked word (case-insensitive
    /// substring match is the expected contract).
    fn is_blocked(&self, text: &str) -> bool;
}

// ---------------------------------------------------------------------------
// Access log
// ---------------------------------------------------------------------------

/// What a finished login attempt produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    /// Attempt succeeded as the given kind.
    Success(crate::LoginKind),
    /// Attempt failed with the given user-facing message.
    Failure(String),
}

/// One line of the access log. Every attempt is recorded — success or
/// failure — before the result reaches the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginAttempt {
    pub name: String,
    pub ip: IpAddr,
    pub timestamp: SystemTime,
    pub outcome: LoginOutcome,
}

/// Sink for login attempts.
pub trait AccessLog: Send + Sync {
    fn record(&self, attempt: &LoginAttempt);
}

/// An [`AccessLog`] that writes structured `tracing` events — the
/// default sink when a deployment has no audit store of its own.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAccessLog;

impl AccessLog for TracingAccessLog {
    fn record(&self, attempt: &LoginAttempt) {
        match &attempt.outcome {
            LoginOutcome::Success(kind) => {
                tracing::info!(
                    name = %attempt.name,
                    ip = %attempt.ip,
                    ?kind,
                    "login accepted"
                );
            }
            LoginOutcome::Failure(message) => {
                tracing::warn!(
                    name = %attempt.name,
                    ip = %attempt.ip,
                    %message,
                    "login rejected"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_account_salt_extracted_from_crypt_hash() {
        let account = Account {
            name: "alice".into(),
            email: "alice@example.com".into(),
            password_hash: "$1$abcdefgh$digestdigest".into(),
        };
        assert_eq!(account.salt(), Some("abcdefgh"));
    }

    #[test]
    fn test_account_salt_none_for_malformed_hash() {
        let account = Account {
            name: "alice".into(),
            email: "alice@example.com".into(),
            password_hash: "plaintext".into(),
        };
        assert_eq!(account.salt(), None);
    }

    #[test]
    fn test_ban_expiry() {
        let now = SystemTime::now();
        assert!(Ban::permanent().in_force(now));
        assert!(Ban::until(now + Duration::from_secs(60)).in_force(now));
        assert!(!Ban::until(now - Duration::from_secs(60)).in_force(now));
    }
}
