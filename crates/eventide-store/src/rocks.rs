//! RocksDB-backed storage implementation.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use rocksdb::{
    ColumnFamilyDescriptor, DBWithThreadMode, Direction, IteratorMode, MultiThreaded, Options,
    WriteBatch,
};
use serde::de::DeserializeOwned;
use serde::Serialize;

use eventide_core::{
    CheckIn, CheckInId, CustomerRef, FollowUp, SubscriptionPatch, UserAccount, UserId,
};

use crate::error::{Result, StoreError};
use crate::keys;
use crate::schema::{all_column_families, cf};
use crate::Store;

/// RocksDB-backed store.
pub struct RocksStore {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
    /// Serializes read-modify-write cycles on account records. Plain puts
    /// and reads do not take it.
    write_lock: Mutex<()>,
}

impl RocksStore {
    /// Opens (or creates) the database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<ColumnFamilyDescriptor> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db =
            DBWithThreadMode::<MultiThreaded>::open_cf_descriptors(&opts, path, cf_descriptors)?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Mutex::new(()),
        })
    }

    fn cf(&self, name: &str) -> Result<Arc<rocksdb::BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("missing column family: {name}")))
    }

    fn write_guard(&self) -> MutexGuard<'_, ()> {
        self.write_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn serialize<T: Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    fn deserialize<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        ciborium::from_reader(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// Resolves the user currently holding a customer ref in the index.
    fn customer_holder(&self, customer: &CustomerRef) -> Result<Option<UserId>> {
        let index = self.cf(cf::ACCOUNTS_BY_CUSTOMER)?;
        let Some(bytes) = self.db.get_cf(&index, keys::customer_index_key(customer))? else {
            return Ok(None);
        };
        let raw =
            String::from_utf8(bytes).map_err(|e| StoreError::Serialization(e.to_string()))?;
        raw.parse::<UserId>()
            .map(Some)
            .map_err(|e| StoreError::Serialization(e.to_string()))
    }
}

impl Store for RocksStore {
    fn put_account(&self, account: &UserAccount) -> Result<()> {
        let accounts = self.cf(cf::ACCOUNTS)?;
        let key = keys::account_key(&account.user_id);
        self.db.put_cf(&accounts, key, Self::serialize(account)?)?;
        Ok(())
    }

    fn get_account(&self, user_id: &UserId) -> Result<Option<UserAccount>> {
        let accounts = self.cf(cf::ACCOUNTS)?;
        self.db
            .get_cf(&accounts, keys::account_key(user_id))?
            .map(|bytes| Self::deserialize(&bytes))
            .transpose()
    }

    fn ensure_account(&self, user_id: &UserId) -> Result<UserAccount> {
        let _guard = self.write_guard();

        if let Some(account) = self.get_account(user_id)? {
            return Ok(account);
        }

        let account = UserAccount::new(user_id.clone());
        self.put_account(&account)?;
        tracing::info!(user_id = %user_id, "Created account record");
        Ok(account)
    }

    fn find_account_by_customer(&self, customer: &CustomerRef) -> Result<Option<UserAccount>> {
        let Some(user_id) = self.customer_holder(customer)? else {
            return Ok(None);
        };
        self.get_account(&user_id)
    }

    fn reset_week(&self, user_id: &UserId, now: DateTime<Utc>) -> Result<UserAccount> {
        let _guard = self.write_guard();

        let mut account = self.get_account(user_id)?.ok_or(StoreError::NotFound)?;
        account.weekly_session_count = 0;
        account.week_start_date = now;
        account.updated_at = now;
        self.put_account(&account)?;
        Ok(account)
    }

    fn record_session(&self, user_id: &UserId, now: DateTime<Utc>) -> Result<UserAccount> {
        let _guard = self.write_guard();

        let mut account = self.get_account(user_id)?.ok_or(StoreError::NotFound)?;
        account.weekly_session_count += 1;
        account.session_count_total += 1;
        account.last_session_date = Some(now);
        account.updated_at = now;
        self.put_account(&account)?;
        Ok(account)
    }

    fn record_session_within_limit(
        &self,
        user_id: &UserId,
        limit: u32,
        now: DateTime<Utc>,
    ) -> Result<UserAccount> {
        let _guard = self.write_guard();

        let mut account = self.get_account(user_id)?.ok_or(StoreError::NotFound)?;

        if account.week_expired(now) {
            account.weekly_session_count = 0;
            account.week_start_date = now;
        }

        if account.weekly_session_count >= limit {
            return Err(StoreError::WeeklyLimitReached {
                count: account.weekly_session_count,
            });
        }

        account.weekly_session_count += 1;
        account.session_count_total += 1;
        account.last_session_date = Some(now);
        account.updated_at = now;
        self.put_account(&account)?;
        Ok(account)
    }

    fn apply_subscription_patch(
        &self,
        user_id: &UserId,
        patch: &SubscriptionPatch,
    ) -> Result<UserAccount> {
        let _guard = self.write_guard();

        let mut account = self.get_account(user_id)?.ok_or(StoreError::NotFound)?;

        // Resolve customer-ref conflicts before the merge. The ref is
        // set-once per account, and one ref may never map to two accounts.
        let mut patch = patch.clone();
        if let Some(requested) = patch.customer_ref.clone() {
            if let Some(existing) = &account.billing_customer_ref {
                if *existing != requested {
                    tracing::warn!(
                        user_id = %user_id,
                        existing = %existing,
                        requested = %requested,
                        "Ignoring attempt to repoint an established customer ref"
                    );
                }
                patch.customer_ref = None;
            } else if let Some(holder) = self.customer_holder(&requested)? {
                if holder != *user_id {
                    tracing::warn!(
                        user_id = %user_id,
                        customer = %requested,
                        holder = %holder,
                        "Customer ref already linked to another account; not linking"
                    );
                    patch.customer_ref = None;
                }
            }
        }

        let newly_linked = account.apply_billing_patch(&patch, Utc::now());

        let accounts = self.cf(cf::ACCOUNTS)?;
        let mut batch = WriteBatch::default();
        batch.put_cf(
            &accounts,
            keys::account_key(user_id),
            Self::serialize(&account)?,
        );
        if let Some(customer) = newly_linked {
            let index = self.cf(cf::ACCOUNTS_BY_CUSTOMER)?;
            batch.put_cf(&index, keys::customer_index_key(&customer), user_id.as_ref());
        }
        self.db.write(batch)?;

        Ok(account)
    }

    fn put_check_in(&self, check_in: &CheckIn) -> Result<()> {
        let check_ins = self.cf(cf::CHECK_INS)?;
        let key = keys::record_key(&check_in.user_id, &check_in.id);
        self.db.put_cf(&check_ins, key, Self::serialize(check_in)?)?;
        Ok(())
    }

    fn get_check_in(&self, user_id: &UserId, id: &CheckInId) -> Result<Option<CheckIn>> {
        let check_ins = self.cf(cf::CHECK_INS)?;
        self.db
            .get_cf(&check_ins, keys::record_key(user_id, id))?
            .map(|bytes| Self::deserialize(&bytes))
            .transpose()
    }

    fn list_check_ins(&self, user_id: &UserId, limit: usize) -> Result<Vec<CheckIn>> {
        let check_ins = self.cf(cf::CHECK_INS)?;
        let prefix = keys::user_prefix(user_id);
        let mode = IteratorMode::From(&prefix, Direction::Forward);

        // ULID keys sort oldest-first; collect the whole prefix, then walk
        // backwards for a newest-first page.
        let mut raw = Vec::new();
        for entry in self.db.iterator_cf(&check_ins, mode) {
            let (key, value) = entry?;
            if !key.starts_with(&prefix) {
                break;
            }
            raw.push(value);
        }

        raw.iter()
            .rev()
            .take(limit)
            .map(|bytes| Self::deserialize(bytes))
            .collect()
    }

    fn put_follow_up(&self, follow_up: &FollowUp) -> Result<()> {
        let follow_ups = self.cf(cf::FOLLOW_UPS)?;
        let key = keys::record_key(&follow_up.user_id, &follow_up.id);
        self.db
            .put_cf(&follow_ups, key, Self::serialize(follow_up)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use eventide_core::{
        RefPatch, SubscriptionRef, SubscriptionStatus, Tier, WEEKLY_FREE_SESSION_LIMIT,
    };
    use tempfile::TempDir;

    fn create_test_store() -> (RocksStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = RocksStore::open(dir.path()).unwrap();
        (store, dir)
    }

    fn user(raw: &str) -> UserId {
        UserId::new(raw).unwrap()
    }

    fn customer(raw: &str) -> CustomerRef {
        CustomerRef::new(raw).unwrap()
    }

    fn check_in(user_id: &UserId, route: &str) -> CheckIn {
        CheckIn::new(
            user_id.clone(),
            "2-3 hours ago".to_string(),
            vec!["calm".to_string()],
            4,
            5,
            route.to_string(),
            None,
        )
    }

    #[test]
    fn test_account_round_trip() {
        let (store, _dir) = create_test_store();
        let user_id = user("alice");

        assert!(store.get_account(&user_id).unwrap().is_none());

        let created = store.ensure_account(&user_id).unwrap();
        assert_eq!(created.subscription_tier, Tier::Free);
        assert_eq!(created.weekly_session_count, 0);

        let loaded = store.get_account(&user_id).unwrap().unwrap();
        assert_eq!(loaded.user_id, user_id);
        assert_eq!(loaded.session_count_total, 0);
    }

    #[test]
    fn test_ensure_account_is_idempotent() {
        let (store, _dir) = create_test_store();
        let user_id = user("alice");

        let first = store.ensure_account(&user_id).unwrap();
        let second = store.ensure_account(&user_id).unwrap();

        assert_eq!(first.created_at, second.created_at);
    }

    #[test]
    fn test_record_session_updates_counters() {
        let (store, _dir) = create_test_store();
        let user_id = user("alice");
        store.ensure_account(&user_id).unwrap();

        store.record_session(&user_id, Utc::now()).unwrap();
        let account = store.record_session(&user_id, Utc::now()).unwrap();

        assert_eq!(account.weekly_session_count, 2);
        assert_eq!(account.session_count_total, 2);
        assert!(account.last_session_date.is_some());
    }

    #[test]
    fn test_record_session_requires_account() {
        let (store, _dir) = create_test_store();
        let result = store.record_session(&user("ghost"), Utc::now());
        assert!(matches!(result, Err(StoreError::NotFound)));
    }

    #[test]
    fn test_session_quota_refused_at_limit() {
        let (store, _dir) = create_test_store();
        let user_id = user("alice");
        store.ensure_account(&user_id).unwrap();

        for _ in 0..WEEKLY_FREE_SESSION_LIMIT {
            store
                .record_session_within_limit(&user_id, WEEKLY_FREE_SESSION_LIMIT, Utc::now())
                .unwrap();
        }

        let result =
            store.record_session_within_limit(&user_id, WEEKLY_FREE_SESSION_LIMIT, Utc::now());
        assert!(matches!(
            result,
            Err(StoreError::WeeklyLimitReached { count }) if count == WEEKLY_FREE_SESSION_LIMIT
        ));

        let account = store.get_account(&user_id).unwrap().unwrap();
        assert_eq!(account.weekly_session_count, WEEKLY_FREE_SESSION_LIMIT);
        assert_eq!(account.session_count_total, u64::from(WEEKLY_FREE_SESSION_LIMIT));
    }

    #[test]
    fn test_final_slot_goes_to_exactly_one_caller() {
        let (store, _dir) = create_test_store();
        let store = Arc::new(store);
        let user_id = user("contender");

        let mut account = store.ensure_account(&user_id).unwrap();
        account.weekly_session_count = WEEKLY_FREE_SESSION_LIMIT - 1;
        store.put_account(&account).unwrap();

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let store = Arc::clone(&store);
                let user_id = user_id.clone();
                std::thread::spawn(move || {
                    store.record_session_within_limit(
                        &user_id,
                        WEEKLY_FREE_SESSION_LIMIT,
                        Utc::now(),
                    )
                })
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        let granted = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(granted, 1);
        assert!(results.iter().any(|r| matches!(
            r,
            Err(StoreError::WeeklyLimitReached { count }) if *count == WEEKLY_FREE_SESSION_LIMIT
        )));

        let account = store.get_account(&user_id).unwrap().unwrap();
        assert_eq!(account.weekly_session_count, WEEKLY_FREE_SESSION_LIMIT);
    }

    #[test]
    fn test_lapsed_week_resets_before_quota_check() {
        let (store, _dir) = create_test_store();
        let user_id = user("alice");

        let mut account = store.ensure_account(&user_id).unwrap();
        account.weekly_session_count = WEEKLY_FREE_SESSION_LIMIT;
        account.week_start_date = Utc::now() - Duration::days(8);
        store.put_account(&account).unwrap();

        let updated = store
            .record_session_within_limit(&user_id, WEEKLY_FREE_SESSION_LIMIT, Utc::now())
            .unwrap();

        assert_eq!(updated.weekly_session_count, 1);
        assert!(updated.week_start_date > Utc::now() - Duration::hours(1));
    }

    #[test]
    fn test_reset_week_preserves_lifetime_total() {
        let (store, _dir) = create_test_store();
        let user_id = user("alice");
        store.ensure_account(&user_id).unwrap();
        store.record_session(&user_id, Utc::now()).unwrap();
        store.record_session(&user_id, Utc::now()).unwrap();

        let account = store.reset_week(&user_id, Utc::now()).unwrap();

        assert_eq!(account.weekly_session_count, 0);
        assert_eq!(account.session_count_total, 2);
    }

    #[test]
    fn test_customer_index_round_trip() {
        let (store, _dir) = create_test_store();
        let user_id = user("alice");
        store.ensure_account(&user_id).unwrap();

        let patch = SubscriptionPatch {
            tier: Some(Tier::Premium),
            status: Some(SubscriptionStatus::Active),
            customer_ref: Some(customer("cus_123")),
            subscription_ref: RefPatch::Set(SubscriptionRef::new("sub_123").unwrap()),
            last_payment_at: None,
        };
        store.apply_subscription_patch(&user_id, &patch).unwrap();

        let found = store
            .find_account_by_customer(&customer("cus_123"))
            .unwrap()
            .unwrap();
        assert_eq!(found.user_id, user_id);
        assert_eq!(found.subscription_tier, Tier::Premium);
        assert!(found.last_webhook_update.is_some());

        assert!(store
            .find_account_by_customer(&customer("cus_unknown"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_customer_ref_is_set_once() {
        let (store, _dir) = create_test_store();
        let user_id = user("alice");
        store.ensure_account(&user_id).unwrap();

        let link = SubscriptionPatch {
            customer_ref: Some(customer("cus_first")),
            ..SubscriptionPatch::default()
        };
        store.apply_subscription_patch(&user_id, &link).unwrap();

        let repoint = SubscriptionPatch {
            customer_ref: Some(customer("cus_second")),
            ..SubscriptionPatch::default()
        };
        let account = store.apply_subscription_patch(&user_id, &repoint).unwrap();

        assert_eq!(account.billing_customer_ref, Some(customer("cus_first")));
        assert!(store
            .find_account_by_customer(&customer("cus_second"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_customer_ref_not_shared_across_accounts() {
        let (store, _dir) = create_test_store();
        let alice = user("alice");
        let mallory = user("mallory");
        store.ensure_account(&alice).unwrap();
        store.ensure_account(&mallory).unwrap();

        let link = SubscriptionPatch {
            customer_ref: Some(customer("cus_shared")),
            ..SubscriptionPatch::default()
        };
        store.apply_subscription_patch(&alice, &link).unwrap();
        let second = store.apply_subscription_patch(&mallory, &link).unwrap();

        assert!(second.billing_customer_ref.is_none());
        let holder = store
            .find_account_by_customer(&customer("cus_shared"))
            .unwrap()
            .unwrap();
        assert_eq!(holder.user_id, alice);
    }

    #[test]
    fn test_apply_patch_updates_subscription_fields() {
        let (store, _dir) = create_test_store();
        let user_id = user("alice");
        store.ensure_account(&user_id).unwrap();

        let paid_at = Utc::now();
        let patch = SubscriptionPatch {
            tier: Some(Tier::Premium),
            status: Some(SubscriptionStatus::Trialing),
            customer_ref: None,
            subscription_ref: RefPatch::Set(SubscriptionRef::new("sub_42").unwrap()),
            last_payment_at: Some(paid_at),
        };
        let account = store.apply_subscription_patch(&user_id, &patch).unwrap();

        assert_eq!(account.subscription_status, SubscriptionStatus::Trialing);
        assert_eq!(
            account.billing_subscription_ref,
            Some(SubscriptionRef::new("sub_42").unwrap())
        );
        assert_eq!(account.last_payment_at, Some(paid_at));
        assert!(account.subscription_updated_at.is_some());
    }

    #[test]
    fn test_check_in_history_newest_first_with_limit() {
        let (store, _dir) = create_test_store();
        let user_id = user("alice");
        let other = user("bob");

        for i in 0..5 {
            store.put_check_in(&check_in(&user_id, &format!("route-{i}"))).unwrap();
            std::thread::sleep(std::time::Duration::from_millis(2));
        }
        store.put_check_in(&check_in(&other, "other-route")).unwrap();

        let page = store.list_check_ins(&user_id, 3).unwrap();

        assert_eq!(page.len(), 3);
        assert_eq!(page[0].route_chosen, "route-4");
        assert_eq!(page[1].route_chosen, "route-3");
        assert_eq!(page[2].route_chosen, "route-2");
        assert!(page.iter().all(|c| c.user_id == user_id));
    }

    #[test]
    fn test_get_check_in_scoped_to_user() {
        let (store, _dir) = create_test_store();
        let user_id = user("alice");
        let record = check_in(&user_id, "grounding");
        store.put_check_in(&record).unwrap();

        let loaded = store.get_check_in(&user_id, &record.id).unwrap().unwrap();
        assert_eq!(loaded.route_chosen, "grounding");

        assert!(store
            .get_check_in(&user("bob"), &record.id)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_follow_up_keys_do_not_collide() {
        let (store, _dir) = create_test_store();
        let user_id = user("alice");
        let first = FollowUp::new(user_id.clone(), None, Some(7), None);
        let second = FollowUp::new(
            user_id.clone(),
            Some(first.id),
            Some(4),
            Some("woke early".to_string()),
        );

        store.put_follow_up(&first).unwrap();
        store.put_follow_up(&second).unwrap();

        assert_ne!(first.id, second.id);
    }
}
