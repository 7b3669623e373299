//! In-memory storage implementation.
//!
//! Every operation runs under one mutex, which makes each of them trivially
//! atomic. Used by tests and by local runs without a database.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use genio_core::{
    CreditTransaction, GenerationId, GenerationRecord, MediaType, ProfileUpdate, TransactionId,
    User, UserId,
};

use crate::error::{Result, StoreError};
use crate::{next_balance, positive_amount, Store};

#[derive(Default)]
struct State {
    users: HashMap<UserId, User>,
    emails: HashMap<String, UserId>,
    transactions: BTreeMap<TransactionId, CreditTransaction>,
    generations: BTreeMap<GenerationId, GenerationRecord>,
}

/// Storage backed by in-process maps.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| StoreError::Database("memory store lock poisoned".into()))
    }

    fn apply(&self, transaction: &CreditTransaction, delta: i64) -> Result<CreditTransaction> {
        let mut state = self.state()?;
        let user = state
            .users
            .get_mut(&transaction.user_id)
            .ok_or_else(|| StoreError::user_not_found(transaction.user_id))?;

        user.credits = next_balance(user.credits, delta)?;
        user.updated_at = Utc::now();
        tracing::debug!(user_id = %user.id, delta, balance = user.credits, "Balance updated");

        let mut recorded = transaction.clone();
        recorded.balance_after = user.credits;
        state.transactions.insert(recorded.id, recorded.clone());
        Ok(recorded)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_user(&self, user: &User) -> Result<()> {
        let mut state = self.state()?;
        if state.users.contains_key(&user.id) {
            return Err(StoreError::AlreadyExists(format!("user {}", user.id)));
        }
        if state.emails.contains_key(&user.email) {
            return Err(StoreError::AlreadyExists(format!("email {}", user.email)));
        }
        state.emails.insert(user.email.clone(), user.id);
        state.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn get_user(&self, user_id: &UserId) -> Result<Option<User>> {
        Ok(self.state()?.users.get(user_id).cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let state = self.state()?;
        Ok(state
            .emails
            .get(email)
            .and_then(|id| state.users.get(id))
            .cloned())
    }

    async fn update_profile(&self, user_id: &UserId, update: &ProfileUpdate) -> Result<User> {
        let mut state = self.state()?;
        let user = state
            .users
            .get_mut(user_id)
            .ok_or_else(|| StoreError::user_not_found(user_id))?;
        user.apply_profile(update);
        Ok(user.clone())
    }

    async fn debit(&self, transaction: &CreditTransaction) -> Result<CreditTransaction> {
        let amount = positive_amount(transaction)?;
        self.apply(transaction, -amount)
    }

    async fn credit(&self, transaction: &CreditTransaction) -> Result<CreditTransaction> {
        let amount = positive_amount(transaction)?;
        self.apply(transaction, amount)
    }

    async fn get_transaction(
        &self,
        transaction_id: &TransactionId,
    ) -> Result<Option<CreditTransaction>> {
        Ok(self.state()?.transactions.get(transaction_id).cloned())
    }

    async fn list_transactions_by_user(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<CreditTransaction>> {
        Ok(self
            .state()?
            .transactions
            .values()
            .rev()
            .filter(|tx| tx.user_id == *user_id)
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn put_generation(&self, record: &GenerationRecord) -> Result<()> {
        self.state()?.generations.insert(record.id, record.clone());
        Ok(())
    }

    async fn list_generations(
        &self,
        user_id: &UserId,
        media_type: MediaType,
    ) -> Result<Vec<GenerationRecord>> {
        Ok(self
            .state()?
            .generations
            .values()
            .rev()
            .filter(|r| r.user_id == *user_id && r.media_type() == media_type)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    async fn store_with_user(credits: i64) -> (MemoryStore, UserId) {
        let store = MemoryStore::new();
        let user_id = UserId::generate();
        store
            .create_user(&User::new(user_id, "mem@example.com", "Mem", credits))
            .await
            .unwrap();
        (store, user_id)
    }

    #[tokio::test]
    async fn debit_and_credit_track_balance() {
        let (store, user_id) = store_with_user(100).await;

        let debit = store
            .debit(&CreditTransaction::generation(user_id, 12, MediaType::Text))
            .await
            .unwrap();
        assert_eq!(debit.balance_after, 88);

        let refund = store
            .credit(&CreditTransaction::refund(user_id, 12, debit.id, "failed".into()))
            .await
            .unwrap();
        assert_eq!(refund.balance_after, 100);
        assert_eq!(store.get_user(&user_id).await.unwrap().unwrap().credits, 100);
    }

    #[tokio::test]
    async fn insufficient_debit_writes_nothing() {
        let (store, user_id) = store_with_user(5).await;

        let err = store
            .debit(&CreditTransaction::generation(user_id, 6, MediaType::Image))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::InsufficientCredits {
                required: 6,
                available: 5
            }
        ));
        assert!(store
            .list_transactions_by_user(&user_id, 10, 0)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn credit_past_max_balance_is_refused() {
        let (store, user_id) = store_with_user(i64::MAX).await;

        let err = store
            .credit(&CreditTransaction::grant(user_id, 1, "Top up".into()))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::BalanceOverflow {
                balance: i64::MAX,
                amount: 1
            }
        ));

        // The refusal leaves the store usable and the balance untouched.
        let debit = store
            .debit(&CreditTransaction::generation(user_id, 12, MediaType::Text))
            .await
            .unwrap();
        assert_eq!(debit.balance_after, i64::MAX - 12);
        assert_eq!(
            store.list_transactions_by_user(&user_id, 10, 0).await.unwrap().len(),
            1
        );
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let (store, _) = store_with_user(1).await;
        let err = store
            .create_user(&User::new(UserId::generate(), "mem@example.com", "Other", 1))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_debits_never_overdraw() {
        let (store, user_id) = store_with_user(10).await;
        let store = Arc::new(store);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    store
                        .debit(&CreditTransaction::generation(user_id, 6, MediaType::Voice))
                        .await
                })
            })
            .collect();

        let mut succeeded = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                succeeded += 1;
            }
        }
        assert_eq!(succeeded, 1);
        assert_eq!(store.get_user(&user_id).await.unwrap().unwrap().credits, 4);
    }
}
