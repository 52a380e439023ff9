//! Error types for login validation.
//!
//! Every variant's `Display` text is the exact message shown to the
//! rejected client, so the wording here is part of the observable
//! protocol. In particular "Username does not exist" versus "Incorrect
//! password" deliberately distinguishes the two cases.

/// A failed login attempt. Terminal for that attempt — there are no
/// retries at this layer; the caller may reconnect with corrected
/// credentials.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// Client protocol version differs from the hub's.
    #[error("Wrong client version: this lobby requires {expected}, you have {got}")]
    VersionMismatch { expected: String, got: String },

    /// The requested name contains a blocked word.
    #[error("That name is not allowed")]
    OffensiveName,

    /// The user, source address, or hardware id is banned. The message
    /// carries the expiry when the ban is temporary.
    #[error("{0}")]
    Banned(String),

    /// The response carried no hashed hardware identifier.
    #[error("Your client did not send a hardware identifier")]
    MissingIdentifier,

    /// The hashed hardware identifier failed the shape check. Rejected
    /// before any ban lookup.
    #[error("Invalid hardware identifier")]
    MalformedIdentifier,

    /// Password login for a name with no account.
    #[error("Username does not exist")]
    UnknownUser,

    /// Password login with a hash that does not match the stored one.
    #[error("Incorrect password")]
    IncorrectPassword,

    /// Anonymous login under a name that belongs to a registered
    /// account.
    #[error("An account with that name exists, log in with its password or pick another name")]
    NameCollision,

    /// The requested name violates the naming rules.
    #[error("Invalid username: {0}")]
    InvalidName(String),

    /// Registration with an email that fails the shape check.
    #[error("Invalid email address")]
    InvalidEmail,

    /// Registration or login with a password hash that fails the shape
    /// check.
    #[error("Invalid password hash")]
    InvalidPassword,

    /// Registration under a name that is already taken.
    #[error("A user with that name already exists")]
    DuplicateAccount,

    /// The response names none of the three login kinds, or is
    /// otherwise unreadable.
    #[error("Invalid login request")]
    MalformedRequest,
}
