//! Server-side login validation: challenge issuance and response
//! checking.
//!
//! One [`LoginValidator`] instance serves every connection attempt on a
//! hub. The flow per attempt is:
//!
//! 1. Client presents a name; the hub answers with
//!    [`challenge`](LoginValidator::challenge) properties (the salt to
//!    hash the password with).
//! 2. Client answers with response properties (version, credentials,
//!    hashed hardware id).
//! 3. The hub calls [`validate`](LoginValidator::validate); `Err` is
//!    the rejection message sent back, `Ok` says which kind of login
//!    was accepted.
//!
//! Checks run in a fixed order — version, name filtering, the three ban
//! identities, then the kind-specific branch — and the first failure is
//! terminal for the attempt. Every attempt is recorded to the access
//! log, success or failure, before the result is returned.

use std::collections::BTreeMap;
use std::net::IpAddr;
use std::time::SystemTime;

use crate::keys::{
    self, ANONYMOUS_LOGIN, EMAIL, FLAG_TRUE, HASHEDPWD, HASHED_MAC,
    LOBBY_VERSION, LOBBY_WATCHER_LOGIN, LOBBY_WATCHER_SUFFIX, LOGIN,
    REGISTER_USER, SALT,
};
use crate::{
    AccessLog, Account, AccountDirectory, AuthError, Ban, BanRegistry,
    LoginAttempt, LoginOutcome, WordFilter,
};

/// Alphabet used for generated salts, matching the crypt charset the
/// hardware-id and password-hash shape checks accept.
const SALT_ALPHABET: &[u8; 64] =
    b"./0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Length of a generated (decoy) salt.
const SALT_LENGTH: usize = 8;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Naming and version rules the validator enforces.
#[derive(Debug, Clone)]
pub struct LoginRules {
    /// Exact protocol version clients must declare.
    pub lobby_version: String,
    /// Minimum username length (watcher suffix excluded).
    pub min_name_len: usize,
    /// Maximum username length (watcher suffix excluded).
    pub max_name_len: usize,
}

impl Default for LoginRules {
    fn default() -> Self {
        Self {
            lobby_version: "1.0.0".to_string(),
            min_name_len: 3,
            max_name_len: 40,
        }
    }
}

/// Which kind of login an accepted attempt was.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginKind {
    /// Password login to an existing account.
    Registered,
    /// Registration that created the account and logged it in.
    NewAccount,
    /// Anonymous login under an unregistered name.
    Anonymous,
    /// Anonymous login by an automated lobby-watcher bot.
    LobbyWatcher,
}

// ---------------------------------------------------------------------------
// LoginValidator
// ---------------------------------------------------------------------------

/// Validates login attempts against the collaborator stores.
pub struct LoginValidator {
    directory: Box<dyn AccountDirectory>,
    bans: Box<dyn BanRegistry>,
    words: Box<dyn WordFilter>,
    log: Box<dyn AccessLog>,
    rules: LoginRules,
    /// Seeds decoy salts for unknown names so the challenge map looks
    /// the same whether or not an account exists.
    challenge_secret: u64,
}

impl LoginValidator {
    pub fn new(
        directory: impl AccountDirectory + 'static,
        bans: impl BanRegistry + 'static,
        words: impl WordFilter + 'static,
        log: impl AccessLog + 'static,
        rules: LoginRules,
    ) -> Self {
        Self {
            directory: Box::new(directory),
            bans: Box::new(bans),
            words: Box::new(words),
            log: Box::new(log),
            rules,
            challenge_secret: rand::random(),
        }
    }

    /// Challenge properties for a presented name.
    ///
    /// Always contains a `SALT` entry. For a registered name it is the
    /// account's real salt; for an unknown name it is a decoy derived
    /// from a per-validator secret and the name — stable across calls
    /// and indistinguishable in shape — so the challenge cannot be used
    /// as an account-existence oracle.
    pub fn challenge(&self, name: &str) -> BTreeMap<String, String> {
        let salt = self
            .directory
            .fetch(name)
            .and_then(|account| account.salt().map(str::to_string))
            .unwrap_or_else(|| self.decoy_salt(name));

        let mut properties = BTreeMap::new();
        properties.insert(SALT.to_string(), salt);
        properties
    }

    /// Validates one login attempt and records it to the access log.
    ///
    /// # Errors
    /// The returned [`AuthError`]'s display text is the user-facing
    /// rejection message. All failures are terminal for this attempt.
    pub fn validate(
        &self,
        name: &str,
        ip: IpAddr,
        response: &BTreeMap<String, String>,
    ) -> Result<LoginKind, AuthError> {
        let result = self.check(name, ip, response);

        let outcome = match &result {
            Ok(kind) => LoginOutcome::Success(*kind),
            Err(error) => LoginOutcome::Failure(error.to_string()),
        };
        self.log.record(&LoginAttempt {
            name: name.to_string(),
            ip,
            timestamp: SystemTime::now(),
            outcome,
        });

        result
    }

    fn check(
        &self,
        name: &str,
        ip: IpAddr,
        response: &BTreeMap<String, String>,
    ) -> Result<LoginKind, AuthError> {
        let got = response
            .get(LOBBY_VERSION)
            .ok_or(AuthError::MalformedRequest)?;
        if *got != self.rules.lobby_version {
            return Err(AuthError::VersionMismatch {
                expected: self.rules.lobby_version.clone(),
                got: got.clone(),
            });
        }

        if self.words.is_blocked(name) {
            return Err(AuthError::OffensiveName);
        }
        if let Some(ban) = self.bans.username_ban(name) {
            return Err(AuthError::Banned(ban_message(&ban)));
        }
        if let Some(ban) = self.bans.ip_ban(ip) {
            return Err(AuthError::Banned(ban_message(&ban)));
        }

        // Hardware-id shape before ban lookup: a malformed id must
        // never reach the registry.
        let hardware_id = response
            .get(HASHED_MAC)
            .filter(|id| !id.is_empty())
            .ok_or(AuthError::MissingIdentifier)?;
        if !keys::is_well_formed_hardware_id(hardware_id) {
            return Err(AuthError::MalformedIdentifier);
        }
        if let Some(ban) = self.bans.hardware_ban(hardware_id) {
            return Err(AuthError::Banned(ban_message(&ban)));
        }

        if flag_set(response, REGISTER_USER) {
            self.register(name, response)
        } else if flag_set(response, ANONYMOUS_LOGIN) {
            self.anonymous(name, flag_set(response, LOBBY_WATCHER_LOGIN))
        } else if flag_set(response, LOGIN) {
            self.password_login(name, response)
        } else {
            Err(AuthError::MalformedRequest)
        }
    }

    fn register(
        &self,
        name: &str,
        response: &BTreeMap<String, String>,
    ) -> Result<LoginKind, AuthError> {
        self.validate_username(name)?;

        let email = response
            .get(EMAIL)
            .filter(|e| is_plausible_email(e.as_str()))
            .ok_or(AuthError::InvalidEmail)?;
        let password_hash = response
            .get(HASHEDPWD)
            .filter(|h| keys::is_well_formed_password_hash(h.as_str()))
            .ok_or(AuthError::InvalidPassword)?;

        if self.directory.fetch(name).is_some() {
            return Err(AuthError::DuplicateAccount);
        }
        self.directory.create(Account {
            name: name.to_string(),
            email: email.clone(),
            password_hash: password_hash.clone(),
        })?;

        tracing::info!(%name, "account registered");
        Ok(LoginKind::NewAccount)
    }

    fn anonymous(
        &self,
        name: &str,
        watcher: bool,
    ) -> Result<LoginKind, AuthError> {
        if watcher {
            // Watcher bots announce themselves with a fixed suffix; the
            // naming rules apply to the base name in front of it.
            let base = name.strip_suffix(LOBBY_WATCHER_SUFFIX).ok_or_else(|| {
                AuthError::InvalidName(format!(
                    "watcher names must end with '{LOBBY_WATCHER_SUFFIX}'"
                ))
            })?;
            self.validate_username(base)?;
        } else {
            self.validate_username(name)?;
        }

        if self.directory.fetch(name).is_some() {
            return Err(AuthError::NameCollision);
        }

        Ok(if watcher {
            LoginKind::LobbyWatcher
        } else {
            LoginKind::Anonymous
        })
    }

    fn password_login(
        &self,
        name: &str,
        response: &BTreeMap<String, String>,
    ) -> Result<LoginKind, AuthError> {
        if self.directory.fetch(name).is_none() {
            return Err(AuthError::UnknownUser);
        }
        let password_hash = response
            .get(HASHEDPWD)
            .filter(|h| keys::is_well_formed_password_hash(h.as_str()))
            .ok_or(AuthError::InvalidPassword)?;

        if !self.directory.verify(name, password_hash) {
            return Err(AuthError::IncorrectPassword);
        }
        Ok(LoginKind::Registered)
    }

    fn validate_username(&self, name: &str) -> Result<(), AuthError> {
        let len = name.chars().count();
        if len < self.rules.min_name_len || len > self.rules.max_name_len {
            return Err(AuthError::InvalidName(format!(
                "usernames must be {} to {} characters",
                self.rules.min_name_len, self.rules.max_name_len
            )));
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(AuthError::InvalidName(
                "usernames may only contain letters, digits, '_' and '-'"
                    .to_string(),
            ));
        }
        if name.to_lowercase().contains("admin") {
            return Err(AuthError::InvalidName(
                "usernames may not contain 'admin'".to_string(),
            ));
        }
        Ok(())
    }

    /// Deterministic fake salt for names with no account. FNV-1a over
    /// the secret and the lowercased name, expanded into the crypt
    /// alphabet. Not a credential — only a shape-alike.
    fn decoy_salt(&self, name: &str) -> String {
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in self
            .challenge_secret
            .to_le_bytes()
            .into_iter()
            .chain(name.to_lowercase().into_bytes())
        {
            hash ^= u64::from(byte);
            hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
        }

        let mut salt = String::with_capacity(SALT_LENGTH);
        for _ in 0..SALT_LENGTH {
            salt.push(SALT_ALPHABET[(hash & 0x3f) as usize] as char);
            hash >>= 6;
        }
        salt
    }
}

/// Whether a flag key is present and set in a property map.
fn flag_set(properties: &BTreeMap<String, String>, key: &str) -> bool {
    properties.get(key).is_some_and(|value| value == FLAG_TRUE)
}

/// Cheap email shape check — enough to catch typos and junk, not an
/// RFC 5322 parser.
fn is_plausible_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && domain.contains('.')
        && !domain.ends_with('.')
        && email.len() <= 254
        && !email.chars().any(char::is_whitespace)
}

/// Composes the user-facing ban message. The same message whichever of
/// the three identities matched, so a rejection does not reveal which
/// list the client is on.
fn ban_message(ban: &Ban) -> String {
    match ban.expires {
        None => "You have been banned from the lobby".to_string(),
        Some(expires) => {
            let remaining = expires
                .duration_since(SystemTime::now())
                .unwrap_or_default();
            let hours = remaining.as_secs() / 3600;
            let minutes = (remaining.as_secs() % 3600) / 60;
            format!(
                "You have been banned from the lobby, the ban expires in {hours}h {minutes}m"
            )
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
