//! In-memory implementations of the collaborator contracts.
//!
//! Good enough to embed in a small hub and for tests. Everything is
//! interior-mutable behind `RwLock` so one instance can be shared by
//! all connection tasks; none of these persist anything.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Mutex, PoisonError, RwLock};
use std::time::SystemTime;

use crate::{
    Account, AccountDirectory, AccessLog, AuthError, Ban, BanRegistry,
    LoginAttempt, WordFilter,
};

// ---------------------------------------------------------------------------
// MemoryDirectory
// ---------------------------------------------------------------------------

/// Account directory backed by a map. Names are case-insensitive keys
/// so `Alice` and `alice` cannot coexist.
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    accounts: RwLock<HashMap<String, Account>>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered accounts.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Account>> {
        self.accounts.read().unwrap_or_else(PoisonError::into_inner)
    }
}

impl AccountDirectory for MemoryDirectory {
    fn fetch(&self, name: &str) -> Option<Account> {
        self.read().get(&name.to_lowercase()).cloned()
    }

    fn verify(&self, name: &str, password_hash: &str) -> bool {
        self.read()
            .get(&name.to_lowercase())
            .is_some_and(|account| account.password_hash == password_hash)
    }

    fn create(&self, account: Account) -> Result<(), AuthError> {
        let mut accounts = self
            .accounts
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let key = account.name.to_lowercase();
        if accounts.contains_key(&key) {
            return Err(AuthError::DuplicateAccount);
        }
        accounts.insert(key, account);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemoryBans
// ---------------------------------------------------------------------------

/// Ban registry backed by three maps. Expired bans are dropped lazily
/// on lookup.
#[derive(Debug, Default)]
pub struct MemoryBans {
    usernames: RwLock<HashMap<String, Ban>>,
    ips: RwLock<HashMap<IpAddr, Ban>>,
    hardware: RwLock<HashMap<String, Ban>>,
}

impl MemoryBans {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ban_username(&self, name: &str, ban: Ban) {
        self.usernames
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_lowercase(), ban);
    }

    pub fn ban_ip(&self, ip: IpAddr, ban: Ban) {
        self.ips
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(ip, ban);
    }

    pub fn ban_hardware(&self, hashed_id: &str, ban: Ban) {
        self.hardware
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(hashed_id.to_string(), ban);
    }

    fn lookup<K>(map: &RwLock<HashMap<K, Ban>>, key: &K) -> Option<Ban>
    where
        K: std::hash::Hash + Eq + Clone,
    {
        let now = SystemTime::now();
        let expired = {
            let bans = map.read().unwrap_or_else(PoisonError::into_inner);
            match bans.get(key) {
                Some(ban) if ban.in_force(now) => return Some(*ban),
                Some(_) => true,
                None => false,
            }
        };
        if expired {
            map.write()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(key);
        }
        None
    }
}

impl BanRegistry for MemoryBans {
    fn username_ban(&self, name: &str) -> Option<Ban> {
        Self::lookup(&self.usernames, &name.to_lowercase())
    }

    fn ip_ban(&self, ip: IpAddr) -> Option<Ban> {
        Self::lookup(&self.ips, &ip)
    }

    fn hardware_ban(&self, hashed_id: &str) -> Option<Ban> {
        Self::lookup(&self.hardware, &hashed_id.to_string())
    }
}

// ---------------------------------------------------------------------------
// MemoryWordFilter
// ---------------------------------------------------------------------------

/// Word filter over a fixed list, matched case-insensitively as
/// substrings. The default list is empty — deployments load their own.
#[derive(Debug, Default)]
pub struct MemoryWordFilter {
    words: Vec<String>,
}

impl MemoryWordFilter {
    pub fn new(words: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            words: words
                .into_iter()
                .map(|w| w.into().to_lowercase())
                .collect(),
        }
    }
}

impl WordFilter for MemoryWordFilter {
    fn is_blocked(&self, text: &str) -> bool {
        let text = text.to_lowercase();
        self.words.iter().any(|word| text.contains(word))
    }
}

// ---------------------------------------------------------------------------
// MemoryAccessLog
// ---------------------------------------------------------------------------

/// Access log that keeps every attempt in memory, for tests and for
/// the moderation view of a small hub.
#[derive(Debug, Default)]
pub struct MemoryAccessLog {
    attempts: Mutex<Vec<LoginAttempt>>,
}

impl MemoryAccessLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all recorded attempts, oldest first.
    pub fn attempts(&self) -> Vec<LoginAttempt> {
        self.attempts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl AccessLog for MemoryAccessLog {
    fn record(&self, attempt: &LoginAttempt) {
        self.attempts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(attempt.clone());
    }
}
