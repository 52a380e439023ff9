//! Wire property keys and value-shape rules for the login handshake.
//!
//! The challenge and response travel as string property maps; these
//! constants are the only keys either side may use. Both the hub and
//! client SDKs import them from here, so a typo can't silently split
//! the protocol.

/// Client's protocol version; must match the hub's exactly.
pub const LOBBY_VERSION: &str = "LOBBY_VERSION";

/// Flag: this response is a registration request.
pub const REGISTER_USER: &str = "REGISTER_USER";

/// Flag: this response is an anonymous login.
pub const ANONYMOUS_LOGIN: &str = "ANONYMOUS_LOGIN";

/// Flag: this anonymous login is an automated lobby-watcher bot.
pub const LOBBY_WATCHER_LOGIN: &str = "LOBBY_WATCHER_LOGIN";

/// Flag: this response is a password login to an existing account.
pub const LOGIN: &str = "LOGIN";

/// Salted hash of the password (registration and password login).
pub const HASHEDPWD: &str = "HASHEDPWD";

/// Contact email (registration only).
pub const EMAIL: &str = "EMAIL";

/// Challenge → client: the salt to hash the password with.
pub const SALT: &str = "SALT";

/// Salted hash of the client's hardware address; present in every
/// response.
pub const HASHED_MAC: &str = "HASHED_MAC";

/// Value that marks a flag key as set.
pub const FLAG_TRUE: &str = "true";

/// Suffix that marks an anonymous login as a lobby-watcher bot. Name
/// rules apply to the base name with the suffix stripped.
pub const LOBBY_WATCHER_SUFFIX: &str = "_lobby_watcher";

// ---------------------------------------------------------------------------
// Hardware-identifier shape
// ---------------------------------------------------------------------------

/// Exact length of a well-formed hashed hardware identifier.
pub const HARDWARE_ID_LENGTH: usize = 28;

/// Magic prefix of a well-formed hashed hardware identifier.
pub const HARDWARE_ID_PREFIX: &str = "$1$MH$";

/// Returns `true` for characters allowed in crypt-style hash text.
pub fn is_crypt_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '.' || c == '/'
}

/// Shape check for a hashed hardware identifier: fixed length, magic
/// prefix, crypt charset after the prefix. Runs before any ban lookup —
/// a value that fails here never reaches the ban registry.
pub fn is_well_formed_hardware_id(id: &str) -> bool {
    id.len() == HARDWARE_ID_LENGTH
        && id.starts_with(HARDWARE_ID_PREFIX)
        && id[HARDWARE_ID_PREFIX.len()..].chars().all(is_crypt_char)
}

/// Shape check for a salted password hash: crypt-format text of the
/// form `$1$<salt>$<hash>`.
pub fn is_well_formed_password_hash(hash: &str) -> bool {
    let mut parts = hash.split('$');
    matches!(
        (parts.next(), parts.next(), parts.next(), parts.next(), parts.next()),
        (Some(""), Some("1"), Some(salt), Some(digest), None)
            if !salt.is_empty()
                && !digest.is_empty()
                && salt.chars().all(is_crypt_char)
                && digest.chars().all(is_crypt_char)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn well_formed_id() -> String {
        // 28 chars total: 6-char prefix + 22 crypt chars.
        format!("{HARDWARE_ID_PREFIX}{}", "a1b2c3d4e5f6g7h8i9j0k.")
    }

    #[test]
    fn test_well_formed_hardware_id_accepted() {
        let id = well_formed_id();
        assert_eq!(id.len(), HARDWARE_ID_LENGTH);
        assert!(is_well_formed_hardware_id(&id));
    }

    #[test]
    fn test_hardware_id_wrong_length_rejected() {
        assert!(!is_well_formed_hardware_id("$1$MH$short"));
        let long = format!("{}x", well_formed_id());
        assert!(!is_well_formed_hardware_id(&long));
    }

    #[test]
    fn test_hardware_id_wrong_prefix_rejected() {
        let id = well_formed_id().replace("$1$MH$", "$2$MH$");
        assert!(!is_well_formed_hardware_id(&id));
    }

    #[test]
    fn test_hardware_id_bad_charset_rejected() {
        let id = format!("{HARDWARE_ID_PREFIX}{}", "a1b2c3d4e5f6g7h8i9j0k!");
        assert_eq!(id.len(), HARDWARE_ID_LENGTH);
        assert!(!is_well_formed_hardware_id(&id));
    }

    #[test]
    fn test_password_hash_shape() {
        assert!(is_well_formed_password_hash("$1$abcdefgh$qwerty123456"));
        assert!(!is_well_formed_password_hash("plaintext"));
        assert!(!is_well_formed_password_hash("$1$$nohash"));
        assert!(!is_well_formed_password_hash("$1$salt$"));
        assert!(!is_well_formed_password_hash("$1$salt$digest$extra"));
    }
}
