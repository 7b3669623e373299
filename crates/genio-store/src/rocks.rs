//! `RocksDB` storage implementation.
//!
//! This module provides the `RocksStore` implementation of the `Store` trait.
//! Balance changes take a per-user stripe lock around read-modify-write, so
//! writers for different users never contend on one global lock.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, Direction, IteratorMode,
    MultiThreaded, Options, WriteBatch,
};

use genio_core::{
    CreditTransaction, GenerationRecord, MediaType, ProfileUpdate, TransactionId, User, UserId,
};

use crate::error::{Result, StoreError};
use crate::keys;
use crate::schema::{all_column_families, cf};
use crate::{next_balance, positive_amount, Store};

const LOCK_STRIPES: usize = 64;

/// RocksDB-backed storage implementation.
pub struct RocksStore {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
    user_locks: Vec<Mutex<()>>,
    signup_lock: Mutex<()>,
}

impl RocksStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = DBWithThreadMode::open_cf_descriptors(&opts, path, cf_descriptors)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(Self {
            db: Arc::new(db),
            user_locks: (0..LOCK_STRIPES).map(|_| Mutex::new(())).collect(),
            signup_lock: Mutex::new(()),
        })
    }

    /// Get a column family handle.
    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
    }

    fn lock_user(&self, user_id: &UserId) -> Result<MutexGuard<'_, ()>> {
        let stripe = usize::from(user_id.as_bytes()[15]) % LOCK_STRIPES;
        lock(&self.user_locks[stripe])
    }

    /// Serialize a value using CBOR.
    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize a value from CBOR.
    fn deserialize<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn read<T: serde::de::DeserializeOwned>(&self, family: &str, key: &[u8]) -> Result<Option<T>> {
        let cf = self.cf(family)?;
        self.db
            .get_cf(&cf, key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    /// Keys under `prefix`, newest first.
    fn index_keys(&self, family: &str, prefix: &[u8]) -> Result<Vec<Vec<u8>>> {
        let cf = self.cf(family)?;
        let iter = self
            .db
            .iterator_cf(&cf, IteratorMode::From(prefix, Direction::Forward));

        let mut found = Vec::new();
        for item in iter {
            let (key, _) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            if !key.starts_with(prefix) {
                break;
            }
            found.push(key.to_vec());
        }
        found.reverse();
        Ok(found)
    }

    fn read_user(&self, user_id: &UserId) -> Result<Option<User>> {
        self.read(cf::USERS, &keys::user_key(user_id))
    }

    fn create_user_blocking(&self, user: &User) -> Result<()> {
        let _guard = lock(&self.signup_lock)?;
        if self.read_user(&user.id)?.is_some() {
            return Err(StoreError::AlreadyExists(format!("user {}", user.id)));
        }
        let cf_email = self.cf(cf::USERS_BY_EMAIL)?;
        let email_key = keys::email_key(&user.email);
        if self
            .db
            .get_cf(&cf_email, &email_key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .is_some()
        {
            return Err(StoreError::AlreadyExists(format!("email {}", user.email)));
        }

        let cf_users = self.cf(cf::USERS)?;
        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_users, keys::user_key(&user.id), Self::serialize(user)?);
        batch.put_cf(&cf_email, email_key, user.id.as_bytes());

        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn update_profile_blocking(&self, user_id: &UserId, update: &ProfileUpdate) -> Result<User> {
        let _guard = self.lock_user(user_id)?;
        let mut user = self
            .read_user(user_id)?
            .ok_or_else(|| StoreError::user_not_found(user_id))?;
        user.apply_profile(update);

        let cf = self.cf(cf::USERS)?;
        self.db
            .put_cf(&cf, keys::user_key(user_id), Self::serialize(&user)?)
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(user)
    }

    /// Apply `delta` to the balance and record the transaction in one batch.
    fn apply_blocking(&self, transaction: &CreditTransaction, delta: i64) -> Result<CreditTransaction> {
        let user_id = transaction.user_id;
        let _guard = self.lock_user(&user_id)?;

        let mut user = self
            .read_user(&user_id)?
            .ok_or_else(|| StoreError::user_not_found(user_id))?;

        user.credits = next_balance(user.credits, delta)?;
        user.updated_at = Utc::now();
        tracing::debug!(user_id = %user.id, delta, balance = user.credits, "Balance updated");

        let mut recorded = transaction.clone();
        recorded.balance_after = user.credits;

        let cf_users = self.cf(cf::USERS)?;
        let cf_tx = self.cf(cf::TRANSACTIONS)?;
        let cf_tx_by_user = self.cf(cf::TRANSACTIONS_BY_USER)?;

        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_users, keys::user_key(&user_id), Self::serialize(&user)?);
        batch.put_cf(
            &cf_tx,
            keys::transaction_key(&recorded.id),
            Self::serialize(&recorded)?,
        );
        batch.put_cf(
            &cf_tx_by_user,
            keys::user_transaction_key(&user_id, &recorded.id),
            [],
        );

        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(recorded)
    }

    fn list_transactions_blocking(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<CreditTransaction>> {
        let prefix = keys::user_transactions_prefix(user_id);
        let mut transactions = Vec::new();
        for key in self
            .index_keys(cf::TRANSACTIONS_BY_USER, &prefix)?
            .into_iter()
            .skip(offset)
            .take(limit)
        {
            let tx_id = keys::extract_transaction_id_from_user_key(&key)?;
            if let Some(tx) = self.read(cf::TRANSACTIONS, &keys::transaction_key(&tx_id))? {
                transactions.push(tx);
            }
        }
        Ok(transactions)
    }

    fn put_generation_blocking(&self, record: &GenerationRecord) -> Result<()> {
        let cf_gen = self.cf(cf::GENERATIONS)?;
        let cf_by_user = self.cf(cf::GENERATIONS_BY_USER)?;

        let mut batch = WriteBatch::default();
        batch.put_cf(
            &cf_gen,
            keys::generation_key(&record.id),
            Self::serialize(record)?,
        );
        batch.put_cf(
            &cf_by_user,
            keys::user_generation_key(&record.user_id, record.media_type(), &record.id),
            [],
        );

        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn list_generations_blocking(
        &self,
        user_id: &UserId,
        media_type: MediaType,
    ) -> Result<Vec<GenerationRecord>> {
        let prefix = keys::user_generations_prefix(user_id, media_type);
        let mut records = Vec::new();
        for key in self.index_keys(cf::GENERATIONS_BY_USER, &prefix)? {
            let id = keys::extract_generation_id_from_user_key(&key)?;
            if let Some(record) = self.read(cf::GENERATIONS, &keys::generation_key(&id))? {
                records.push(record);
            }
        }
        Ok(records)
    }
}

fn lock(mutex: &Mutex<()>) -> Result<MutexGuard<'_, ()>> {
    mutex
        .lock()
        .map_err(|_| StoreError::Database("user lock poisoned".into()))
}

#[async_trait]
impl Store for RocksStore {
    async fn create_user(&self, user: &User) -> Result<()> {
        self.create_user_blocking(user)
    }

    async fn get_user(&self, user_id: &UserId) -> Result<Option<User>> {
        self.read_user(user_id)
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let cf = self.cf(cf::USERS_BY_EMAIL)?;
        let Some(id_bytes) = self
            .db
            .get_cf(&cf, keys::email_key(email))
            .map_err(|e| StoreError::Database(e.to_string()))?
        else {
            return Ok(None);
        };
        self.read(cf::USERS, &id_bytes)
    }

    async fn update_profile(&self, user_id: &UserId, update: &ProfileUpdate) -> Result<User> {
        self.update_profile_blocking(user_id, update)
    }

    async fn debit(&self, transaction: &CreditTransaction) -> Result<CreditTransaction> {
        let amount = positive_amount(transaction)?;
        self.apply_blocking(transaction, -amount)
    }

    async fn credit(&self, transaction: &CreditTransaction) -> Result<CreditTransaction> {
        let amount = positive_amount(transaction)?;
        self.apply_blocking(transaction, amount)
    }

    async fn get_transaction(
        &self,
        transaction_id: &TransactionId,
    ) -> Result<Option<CreditTransaction>> {
        self.read(cf::TRANSACTIONS, &keys::transaction_key(transaction_id))
    }

    async fn list_transactions_by_user(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<CreditTransaction>> {
        self.list_transactions_blocking(user_id, limit, offset)
    }

    async fn put_generation(&self, record: &GenerationRecord) -> Result<()> {
        self.put_generation_blocking(record)
    }

    async fn list_generations(
        &self,
        user_id: &UserId,
        media_type: MediaType,
    ) -> Result<Vec<GenerationRecord>> {
        self.list_generations_blocking(user_id, media_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use genio_core::{ArtifactRef, Emotion, GenerationRequest, Speed, Voice, VoiceRequest};
    use tempfile::TempDir;

    fn create_test_store() -> (RocksStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = RocksStore::open(dir.path()).unwrap();
        (store, dir)
    }

    async fn create_user(store: &RocksStore, credits: i64) -> UserId {
        let user_id = UserId::generate();
        let email = format!("{user_id}@example.com");
        store
            .create_user(&User::new(user_id, email, "Test", credits))
            .await
            .unwrap();
        user_id
    }

    fn voice_record(user_id: UserId, text: &str) -> GenerationRecord {
        GenerationRecord::completed(
            user_id,
            GenerationRequest::Voice(VoiceRequest {
                text: text.into(),
                voice: Voice::Natural,
                emotion: Emotion::Neutral,
                speed: Speed::Medium,
            }),
            ArtifactRef::Url {
                url: format!("https://cdn.example.com/{text}.wav"),
                content_type: "audio/wav".into(),
            },
            1,
            TransactionId::generate(),
        )
    }

    #[tokio::test]
    async fn user_crud() {
        let (store, _dir) = create_test_store();
        let user_id = create_user(&store, 100).await;

        let user = store.get_user(&user_id).await.unwrap().unwrap();
        assert_eq!(user.credits, 100);

        let by_email = store
            .get_user_by_email(&user.email)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_email.id, user_id);

        let updated = store
            .update_profile(
                &user_id,
                &ProfileUpdate {
                    name: Some("Renamed".into()),
                    profile_picture: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Renamed");
        assert_eq!(updated.credits, 100);

        let dup = store.create_user(&user).await;
        assert!(matches!(dup, Err(StoreError::AlreadyExists(_))));
    }

    #[tokio::test]
    async fn debit_records_transaction_with_balance() {
        let (store, _dir) = create_test_store();
        let user_id = create_user(&store, 100).await;

        let tx = CreditTransaction::generation(user_id, 12, MediaType::Text);
        let recorded = store.debit(&tx).await.unwrap();
        assert_eq!(recorded.id, tx.id);
        assert_eq!(recorded.balance_after, 88);

        let stored = store.get_transaction(&tx.id).await.unwrap().unwrap();
        assert_eq!(stored.balance_after, 88);
        assert_eq!(stored.amount, -12);
        assert_eq!(store.get_user(&user_id).await.unwrap().unwrap().credits, 88);
    }

    #[tokio::test]
    async fn insufficient_credits() {
        let (store, _dir) = create_test_store();
        let user_id = create_user(&store, 5).await;

        let tx = CreditTransaction::generation(user_id, 100, MediaType::Video);
        let result = store.debit(&tx).await;
        assert!(matches!(
            result,
            Err(StoreError::InsufficientCredits {
                required: 100,
                available: 5
            })
        ));
        assert!(store.get_transaction(&tx.id).await.unwrap().is_none());
        assert_eq!(store.get_user(&user_id).await.unwrap().unwrap().credits, 5);
    }

    #[tokio::test]
    async fn debit_unknown_user_is_not_found() {
        let (store, _dir) = create_test_store();
        let tx = CreditTransaction::generation(UserId::generate(), 1, MediaType::Text);
        assert!(matches!(
            store.debit(&tx).await,
            Err(StoreError::NotFound { entity: "user", .. })
        ));
    }

    #[tokio::test]
    async fn credit_past_max_balance_is_refused() {
        let (store, _dir) = create_test_store();
        let user_id = create_user(&store, i64::MAX - 5).await;

        let err = store
            .credit(&CreditTransaction::grant(user_id, 10, "Top up".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::BalanceOverflow { amount: 10, .. }));

        // The user's lock stripe is still usable afterwards.
        let grant = store
            .credit(&CreditTransaction::grant(user_id, 5, "Top up".into()))
            .await
            .unwrap();
        assert_eq!(grant.balance_after, i64::MAX);
        assert_eq!(store.list_transactions_by_user(&user_id, 10, 0).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn transactions_list_newest_first() {
        let (store, _dir) = create_test_store();
        let user_id = create_user(&store, 0).await;

        store
            .credit(&CreditTransaction::grant(user_id, 50, "Grant 1".into()))
            .await
            .unwrap();
        store
            .credit(&CreditTransaction::grant(user_id, 25, "Grant 2".into()))
            .await
            .unwrap();

        let transactions = store.list_transactions_by_user(&user_id, 10, 0).await.unwrap();
        assert_eq!(transactions.len(), 2);
        assert_eq!(transactions[0].description, "Grant 2");
        assert_eq!(transactions[0].balance_after, 75);
        assert_eq!(transactions[1].description, "Grant 1");

        let page2 = store.list_transactions_by_user(&user_id, 1, 1).await.unwrap();
        assert_eq!(page2.len(), 1);
        assert_eq!(page2[0].description, "Grant 1");
    }

    #[tokio::test]
    async fn generations_are_partitioned_by_media_type() {
        let (store, _dir) = create_test_store();
        let user_id = create_user(&store, 0).await;
        let other_user = create_user(&store, 0).await;

        store.put_generation(&voice_record(user_id, "first")).await.unwrap();
        store.put_generation(&voice_record(user_id, "second")).await.unwrap();
        store.put_generation(&voice_record(other_user, "theirs")).await.unwrap();

        let voices = store.list_generations(&user_id, MediaType::Voice).await.unwrap();
        assert_eq!(voices.len(), 2);
        assert_eq!(
            voices[0].artifact.url(),
            Some("https://cdn.example.com/second.wav")
        );

        assert!(store
            .list_generations(&user_id, MediaType::Image)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_debits_are_linearizable() {
        let (store, _dir) = create_test_store();
        let store = Arc::new(store);
        let user_id = create_user(&store, 10).await;

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    store
                        .debit(&CreditTransaction::generation(user_id, 6, MediaType::Image))
                        .await
                })
            })
            .collect();

        let mut outcomes = Vec::new();
        for handle in handles {
            outcomes.push(handle.await.unwrap());
        }

        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(outcomes
            .iter()
            .any(|r| matches!(r, Err(StoreError::InsufficientCredits { available: 4, .. }))));
        assert_eq!(store.get_user(&user_id).await.unwrap().unwrap().credits, 4);
    }
}
