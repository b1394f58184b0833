//! Cache key definitions
//!
//! Every piece of credential state is filed under a deterministic key built
//! from an opaque prefix (typically a session or user identifier).

/// Hex characters of the cipher key used for the short rotated-slot field.
pub const SLOT_FIELD_SHORT: usize = 5;

/// Hex characters of the cipher key used for the long rotated-slot field.
pub const SLOT_FIELD_LONG: usize = 10;

/// Key holding the cached [`SecretMetadata`](crate::auth::SecretMetadata) for a prefix.
pub fn secret_key(prefix: &str) -> String {
    format!("{}secretkey", prefix)
}

/// Key holding the cached [`SignatureMetadata`](crate::auth::SignatureMetadata) for a prefix.
pub fn signature_key(prefix: &str) -> String {
    format!("{}signature", prefix)
}

/// Key holding the live bearer token for a session.
pub fn token_key(session_key: &str) -> String {
    format!("{}token", session_key)
}

/// Hash-map key holding a user's rotated signature slots.
pub fn slots_map_key(user_id: &str) -> String {
    format!("{}-signatures", user_id)
}

/// Slot field derived from a cipher key at the given truncation length.
pub fn slot_field(cipher_key: &str, len: usize) -> &str {
    &cipher_key[..len.min(cipher_key.len())]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_naming() {
        assert_eq!(secret_key("alice"), "alicesecretkey");
        assert_eq!(signature_key("alice"), "alicesignature");
        assert_eq!(token_key("alice"), "alicetoken");
        assert_eq!(slots_map_key("user-1"), "user-1-signatures");
    }

    #[test]
    fn test_slot_field_truncation() {
        let cipher_key = "abcdef0123456789";
        assert_eq!(slot_field(cipher_key, SLOT_FIELD_SHORT), "abcde");
        assert_eq!(slot_field(cipher_key, SLOT_FIELD_LONG), "abcdef0123");
    }

    #[test]
    fn test_slot_field_shorter_than_requested() {
        assert_eq!(slot_field("abc", SLOT_FIELD_SHORT), "abc");
    }
}
