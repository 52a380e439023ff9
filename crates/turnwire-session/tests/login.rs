//! End-to-end login flows against the in-memory stores.
//!
//! These exercise the full attempt lifecycle — challenge, response,
//! validation order, audit trail — the way the hub handler drives it.

use std::collections::BTreeMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use turnwire_session::keys::{
    ANONYMOUS_LOGIN, FLAG_TRUE, HARDWARE_ID_PREFIX, HASHED_MAC, HASHEDPWD,
    EMAIL, LOBBY_VERSION, LOGIN, REGISTER_USER, SALT,
};
use turnwire_session::memory::{
    MemoryAccessLog, MemoryBans, MemoryDirectory, MemoryWordFilter,
};
use turnwire_session::{
    Account, AccountDirectory, AuthError, Ban, BanRegistry, LoginKind,
    LoginOutcome, LoginRules, LoginValidator,
};

// =========================================================================
// Helpers
// =========================================================================

const VERSION: &str = "1.0.0";
const ALICE_HASH: &str = "$1$abcdefgh$digestdigestdigest";

fn ip() -> IpAddr {
    "203.0.113.10".parse().unwrap()
}

fn hardware_id() -> String {
    format!("{HARDWARE_ID_PREFIX}{}", "a1b2c3d4e5f6g7h8i9j0k.")
}

fn base_response() -> BTreeMap<String, String> {
    let mut props = BTreeMap::new();
    props.insert(LOBBY_VERSION.into(), VERSION.into());
    props.insert(HASHED_MAC.into(), hardware_id());
    props
}

fn password_response(hash: &str) -> BTreeMap<String, String> {
    let mut props = base_response();
    props.insert(LOGIN.into(), FLAG_TRUE.into());
    props.insert(HASHEDPWD.into(), hash.into());
    props
}

fn directory_with_alice() -> MemoryDirectory {
    let directory = MemoryDirectory::new();
    directory
        .create(Account {
            name: "alice".into(),
            email: "alice@example.com".into(),
            password_hash: ALICE_HASH.into(),
        })
        .expect("seed account");
    directory
}

fn rules() -> LoginRules {
    LoginRules {
        lobby_version: VERSION.into(),
        ..LoginRules::default()
    }
}

// =========================================================================
// Password login
// =========================================================================

#[test]
fn correct_hash_for_existing_user_is_accepted() {
    let validator = LoginValidator::new(
        directory_with_alice(),
        MemoryBans::new(),
        MemoryWordFilter::default(),
        MemoryAccessLog::new(),
        rules(),
    );

    // The client hashes its password with the salt from the challenge;
    // here the "hash" is the stored credential directly.
    let challenge = validator.challenge("alice");
    assert_eq!(challenge.get(SALT).map(String::as_str), Some("abcdefgh"));

    let kind = validator
        .validate("alice", ip(), &password_response(ALICE_HASH))
        .expect("login should succeed");
    assert_eq!(kind, LoginKind::Registered);
}

#[test]
fn wrong_hash_yields_incorrect_password() {
    let validator = LoginValidator::new(
        directory_with_alice(),
        MemoryBans::new(),
        MemoryWordFilter::default(),
        MemoryAccessLog::new(),
        rules(),
    );

    let err = validator
        .validate("alice", ip(), &password_response("$1$abcdefgh$wrongwrong"))
        .unwrap_err();
    assert_eq!(err.to_string(), "Incorrect password");
}

#[test]
fn unknown_username_yields_username_does_not_exist() {
    let validator = LoginValidator::new(
        MemoryDirectory::new(),
        MemoryBans::new(),
        MemoryWordFilter::default(),
        MemoryAccessLog::new(),
        rules(),
    );

    let err = validator
        .validate("nobody", ip(), &password_response(ALICE_HASH))
        .unwrap_err();
    assert_eq!(err.to_string(), "Username does not exist");
}

// =========================================================================
// Bans
// =========================================================================

#[test]
fn banned_ip_rejected_regardless_of_correct_credentials() {
    let bans = MemoryBans::new();
    bans.ban_ip(ip(), Ban::permanent());

    let validator = LoginValidator::new(
        directory_with_alice(),
        bans,
        MemoryWordFilter::default(),
        MemoryAccessLog::new(),
        rules(),
    );

    let err = validator
        .validate("alice", ip(), &password_response(ALICE_HASH))
        .unwrap_err();
    assert!(matches!(err, AuthError::Banned(_)));
}

#[test]
fn banned_username_rejected() {
    let bans = MemoryBans::new();
    bans.ban_username("alice", Ban::permanent());

    let validator = LoginValidator::new(
        directory_with_alice(),
        bans,
        MemoryWordFilter::default(),
        MemoryAccessLog::new(),
        rules(),
    );

    let err = validator
        .validate("alice", ip(), &password_response(ALICE_HASH))
        .unwrap_err();
    assert!(matches!(err, AuthError::Banned(_)));
}

#[test]
fn banned_hardware_id_rejected() {
    let bans = MemoryBans::new();
    bans.ban_hardware(&hardware_id(), Ban::permanent());

    let validator = LoginValidator::new(
        directory_with_alice(),
        bans,
        MemoryWordFilter::default(),
        MemoryAccessLog::new(),
        rules(),
    );

    let err = validator
        .validate("alice", ip(), &password_response(ALICE_HASH))
        .unwrap_err();
    assert!(matches!(err, AuthError::Banned(_)));
}

/// A registry that notices if the hardware lookup ever runs.
struct HardwareLookupSpy {
    inner: MemoryBans,
    hardware_queried: Arc<AtomicBool>,
}

impl BanRegistry for HardwareLookupSpy {
    fn username_ban(&self, name: &str) -> Option<Ban> {
        self.inner.username_ban(name)
    }
    fn ip_ban(&self, ip: IpAddr) -> Option<Ban> {
        self.inner.ip_ban(ip)
    }
    fn hardware_ban(&self, hashed_id: &str) -> Option<Ban> {
        self.hardware_queried.store(true, Ordering::SeqCst);
        self.inner.hardware_ban(hashed_id)
    }
}

#[test]
fn malformed_hardware_id_never_reaches_ban_registry() {
    let hardware_queried = Arc::new(AtomicBool::new(false));
    let validator = LoginValidator::new(
        MemoryDirectory::new(),
        HardwareLookupSpy {
            inner: MemoryBans::new(),
            hardware_queried: Arc::clone(&hardware_queried),
        },
        MemoryWordFilter::default(),
        MemoryAccessLog::new(),
        rules(),
    );

    let mut props = base_response();
    props.insert(ANONYMOUS_LOGIN.into(), FLAG_TRUE.into());
    props.insert(HASHED_MAC.into(), "$1$MH$tooshort".into());

    let err = validator.validate("alice", ip(), &props).unwrap_err();
    assert_eq!(err, AuthError::MalformedIdentifier);
    assert!(
        !hardware_queried.load(Ordering::SeqCst),
        "shape check must run before the ban lookup"
    );
}

// =========================================================================
// Registration
// =========================================================================

fn registration_response() -> BTreeMap<String, String> {
    let mut props = base_response();
    props.insert(REGISTER_USER.into(), FLAG_TRUE.into());
    props.insert(EMAIL.into(), "bob@example.com".into());
    props.insert(HASHEDPWD.into(), "$1$bobssalt$bobsdigest".into());
    props
}

#[test]
fn registration_creates_account_then_password_login_works() {
    let validator = LoginValidator::new(
        MemoryDirectory::new(),
        MemoryBans::new(),
        MemoryWordFilter::default(),
        MemoryAccessLog::new(),
        rules(),
    );

    let kind = validator
        .validate("bob", ip(), &registration_response())
        .expect("registration should succeed");
    assert_eq!(kind, LoginKind::NewAccount);

    // The challenge now serves the real salt and the credential logs in.
    assert_eq!(
        validator.challenge("bob").get(SALT).map(String::as_str),
        Some("bobssalt")
    );
    let kind = validator
        .validate("bob", ip(), &password_response("$1$bobssalt$bobsdigest"))
        .expect("password login after registration");
    assert_eq!(kind, LoginKind::Registered);
}

#[test]
fn registration_of_taken_name_rejected() {
    let validator = LoginValidator::new(
        directory_with_alice(),
        MemoryBans::new(),
        MemoryWordFilter::default(),
        MemoryAccessLog::new(),
        rules(),
    );

    let mut props = registration_response();
    props.insert(EMAIL.into(), "other@example.com".into());
    let err = validator.validate("alice", ip(), &props).unwrap_err();
    assert_eq!(err, AuthError::DuplicateAccount);
}

#[test]
fn registration_with_junk_email_rejected() {
    let validator = LoginValidator::new(
        MemoryDirectory::new(),
        MemoryBans::new(),
        MemoryWordFilter::default(),
        MemoryAccessLog::new(),
        rules(),
    );

    for junk in ["", "no-at-sign", "a@nodot", "spaces in@mail.com", "a@b."] {
        let mut props = registration_response();
        props.insert(EMAIL.into(), junk.into());
        let err = validator.validate("bob", ip(), &props).unwrap_err();
        assert_eq!(err, AuthError::InvalidEmail, "email {junk:?}");
    }
}

#[test]
fn registration_with_plaintext_password_rejected() {
    let validator = LoginValidator::new(
        MemoryDirectory::new(),
        MemoryBans::new(),
        MemoryWordFilter::default(),
        MemoryAccessLog::new(),
        rules(),
    );

    let mut props = registration_response();
    props.insert(HASHEDPWD.into(), "hunter2".into());
    let err = validator.validate("bob", ip(), &props).unwrap_err();
    assert_eq!(err, AuthError::InvalidPassword);
}

// =========================================================================
// Anonymous login
// =========================================================================

#[test]
fn anonymous_name_colliding_with_account_rejected() {
    let validator = LoginValidator::new(
        directory_with_alice(),
        MemoryBans::new(),
        MemoryWordFilter::default(),
        MemoryAccessLog::new(),
        rules(),
    );

    let mut props = base_response();
    props.insert(ANONYMOUS_LOGIN.into(), FLAG_TRUE.into());
    let err = validator.validate("alice", ip(), &props).unwrap_err();
    assert_eq!(err, AuthError::NameCollision);
}

// =========================================================================
// Audit trail
// =========================================================================

#[test]
fn every_attempt_is_recorded_with_outcome() {
    let log = Arc::new(MemoryAccessLog::new());
    let validator = LoginValidator::new(
        directory_with_alice(),
        MemoryBans::new(),
        MemoryWordFilter::default(),
        SharedLog(Arc::clone(&log)),
        rules(),
    );

    validator
        .validate("alice", ip(), &password_response(ALICE_HASH))
        .expect("success attempt");
    validator
        .validate("alice", ip(), &password_response("$1$abcdefgh$nope"))
        .expect_err("failure attempt");

    let attempts = log.attempts();
    assert_eq!(attempts.len(), 2);
    assert_eq!(attempts[0].name, "alice");
    assert_eq!(attempts[0].ip, ip());
    assert_eq!(
        attempts[0].outcome,
        LoginOutcome::Success(LoginKind::Registered)
    );
    assert_eq!(
        attempts[1].outcome,
        LoginOutcome::Failure("Incorrect password".into())
    );
}

/// Adapter so the test can keep a handle on the log the validator owns.
struct SharedLog(Arc<MemoryAccessLog>);

impl turnwire_session::AccessLog for SharedLog {
    fn record(&self, attempt: &turnwire_session::LoginAttempt) {
        self.0.record(attempt);
    }
}
