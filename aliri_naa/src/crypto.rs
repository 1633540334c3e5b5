//! Identifier generation

/// A source of fresh, unique identifiers
pub trait CryptoProvider: Send + Sync {
    /// Generates a new GUID in its hyphenated string form
    fn create_new_guid(&self) -> String;
}

/// Generates random (version 4) UUIDs
#[derive(Clone, Copy, Debug, Default)]
pub struct UuidCrypto;

impl CryptoProvider for UuidCrypto {
    #[inline]
    fn create_new_guid(&self) -> String {
        uuid::Uuid::new_v4().hyphenated().to_string()
    }
}
