//! Column family layout for the RocksDB store.

/// Column family names.
pub mod cf {
    /// Account records, keyed by user id.
    pub const ACCOUNTS: &str = "accounts";

    /// Customer-ref index, keyed by processor customer ref.
    /// The value is the owning user id.
    pub const ACCOUNTS_BY_CUSTOMER: &str = "accounts_by_customer";

    /// Check-in records, keyed by `user_id || 0x00 || check_in_id`.
    pub const CHECK_INS: &str = "check_ins";

    /// Follow-up records, keyed by `user_id || 0x00 || follow_up_id`.
    pub const FOLLOW_UPS: &str = "follow_ups";
}

/// All column families that must be opened with the database.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![
        cf::ACCOUNTS,
        cf::ACCOUNTS_BY_CUSTOMER,
        cf::CHECK_INS,
        cf::FOLLOW_UPS,
    ]
}
