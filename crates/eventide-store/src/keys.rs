//! Key construction for RocksDB column families.
//!
//! Account and index keys are the raw id bytes. Check-in and follow-up
//! keys are composite: the user id, a `0x00` separator, then the 16-byte
//! ULID of the record. Ids reject control characters, so the separator
//! cannot occur inside a user id and prefix scans cannot bleed into a
//! neighbouring user. ULIDs sort by creation time, which keeps each
//! user's records in chronological order under the prefix.

use eventide_core::{CheckInId, CustomerRef, UserId};

/// Separator between the user id and the record id in composite keys.
pub const KEY_SEP: u8 = 0x00;

/// Key for an account record: the raw user id bytes.
#[must_use]
pub fn account_key(user_id: &UserId) -> Vec<u8> {
    user_id.as_ref().to_vec()
}

/// Key for a customer-ref index entry: the raw customer ref bytes.
#[must_use]
pub fn customer_index_key(customer: &CustomerRef) -> Vec<u8> {
    customer.as_ref().to_vec()
}

/// Composite key for a check-in or follow-up record.
#[must_use]
pub fn record_key(user_id: &UserId, id: &CheckInId) -> Vec<u8> {
    let user = user_id.as_ref();
    let mut key = Vec::with_capacity(user.len() + 1 + 16);
    key.extend_from_slice(user);
    key.push(KEY_SEP);
    key.extend_from_slice(&id.to_bytes());
    key
}

/// Prefix matching every record key for a user.
#[must_use]
pub fn user_prefix(user_id: &UserId) -> Vec<u8> {
    let user = user_id.as_ref();
    let mut prefix = Vec::with_capacity(user.len() + 1);
    prefix.extend_from_slice(user);
    prefix.push(KEY_SEP);
    prefix
}

/// Extracts the record id from a composite key.
///
/// Returns `None` if the key is shorter than a ULID payload.
#[must_use]
pub fn extract_record_id(key: &[u8]) -> Option<CheckInId> {
    if key.len() < 17 {
        return None;
    }
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&key[key.len() - 16..]);
    CheckInId::from_bytes(bytes).ok()
}
