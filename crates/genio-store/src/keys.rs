//! Key encoding utilities for `RocksDB`.
//!
//! Index keys put the user id first so a prefix scan yields one user's rows,
//! and the ULID last so byte order within the prefix is creation order.

use genio_core::{GenerationId, MediaType, TransactionId, UserId};

use crate::error::{Result, StoreError};

const ID_LEN: usize = 16;

/// Create a user key from a user ID.
#[must_use]
pub fn user_key(user_id: &UserId) -> Vec<u8> {
    user_id.as_bytes().to_vec()
}

/// Create an email index key.
#[must_use]
pub fn email_key(email: &str) -> Vec<u8> {
    email.as_bytes().to_vec()
}

/// Create a transaction key from a transaction ID.
#[must_use]
pub fn transaction_key(transaction_id: &TransactionId) -> Vec<u8> {
    transaction_id.to_bytes().to_vec()
}

/// Create a user-transaction index key.
///
/// Format: `user_id (16 bytes) || transaction_id (16 bytes)`
#[must_use]
pub fn user_transaction_key(user_id: &UserId, transaction_id: &TransactionId) -> Vec<u8> {
    let mut key = Vec::with_capacity(2 * ID_LEN);
    key.extend_from_slice(user_id.as_bytes());
    key.extend_from_slice(&transaction_id.to_bytes());
    key
}

/// Create a prefix for iterating all transactions for a user.
#[must_use]
pub fn user_transactions_prefix(user_id: &UserId) -> Vec<u8> {
    user_id.as_bytes().to_vec()
}

/// Extract the transaction ID from a user-transaction index key.
///
/// # Errors
///
/// Returns `StoreError::Serialization` if the key is shorter than 32 bytes.
pub fn extract_transaction_id_from_user_key(key: &[u8]) -> Result<TransactionId> {
    trailing_id(key, ID_LEN).map(TransactionId::from_bytes)
}

/// Create a generation key from a generation ID.
#[must_use]
pub fn generation_key(generation_id: &GenerationId) -> Vec<u8> {
    generation_id.to_bytes().to_vec()
}

/// One-byte tag for a media type inside index keys.
#[must_use]
pub const fn media_tag(media_type: MediaType) -> u8 {
    match media_type {
        MediaType::Text => 1,
        MediaType::Image => 2,
        MediaType::Voice => 3,
        MediaType::Video => 4,
    }
}

/// Create a user-generation index key.
///
/// Format: `user_id (16 bytes) || media_tag (1 byte) || generation_id (16 bytes)`
#[must_use]
pub fn user_generation_key(
    user_id: &UserId,
    media_type: MediaType,
    generation_id: &GenerationId,
) -> Vec<u8> {
    let mut key = user_generations_prefix(user_id, media_type);
    key.extend_from_slice(&generation_id.to_bytes());
    key
}

/// Create a prefix for iterating one user's generations of one media type.
#[must_use]
pub fn user_generations_prefix(user_id: &UserId, media_type: MediaType) -> Vec<u8> {
    let mut key = Vec::with_capacity(2 * ID_LEN + 1);
    key.extend_from_slice(user_id.as_bytes());
    key.push(media_tag(media_type));
    key
}

/// Extract the generation ID from a user-generation index key.
///
/// # Errors
///
/// Returns `StoreError::Serialization` if the key is shorter than 33 bytes.
pub fn extract_generation_id_from_user_key(key: &[u8]) -> Result<GenerationId> {
    trailing_id(key, ID_LEN + 1).map(GenerationId::from_bytes)
}

fn trailing_id(key: &[u8], offset: usize) -> Result<[u8; ID_LEN]> {
    key.get(offset..offset + ID_LEN)
        .and_then(|slice| <[u8; ID_LEN]>::try_from(slice).ok())
        .ok_or_else(|| StoreError::Serialization(format!("malformed index key ({} bytes)", key.len())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_transaction_key_format() {
        let user_id = UserId::generate();
        let tx_id = TransactionId::generate();
        let key = user_transaction_key(&user_id, &tx_id);

        assert_eq!(key.len(), 32);
        assert_eq!(&key[..16], user_id.as_bytes());
        assert_eq!(&key[16..], tx_id.to_bytes());
        assert_eq!(extract_transaction_id_from_user_key(&key).unwrap(), tx_id);
    }

    #[test]
    fn user_generation_key_format() {
        let user_id = UserId::generate();
        let gen_id = GenerationId::generate();
        let key = user_generation_key(&user_id, MediaType::Video, &gen_id);

        assert_eq!(key.len(), 33);
        assert!(key.starts_with(&user_generations_prefix(&user_id, MediaType::Video)));
        assert!(!key.starts_with(&user_generations_prefix(&user_id, MediaType::Image)));
        assert_eq!(extract_generation_id_from_user_key(&key).unwrap(), gen_id);
    }

    #[test]
    fn short_key_is_an_error() {
        assert!(extract_transaction_id_from_user_key(&[0u8; 20]).is_err());
        assert!(extract_generation_id_from_user_key(&[0u8; 32]).is_err());
    }

    #[test]
    fn media_tags_are_distinct() {
        let mut tags: Vec<u8> = MediaType::ALL.iter().map(|m| media_tag(*m)).collect();
        tags.dedup();
        assert_eq!(tags.len(), MediaType::ALL.len());
    }
}
