//! PostgreSQL storage implementation.
//!
//! The debit is a single conditional `UPDATE ... WHERE credits >= $amount`
//! inside a transaction that also inserts the ledger row, so the database
//! serializes concurrent debits for the same user on the row lock.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use genio_core::{
    ArtifactRef, CreditTransaction, GenerationRecord, GenerationRequest, GenerationStatus,
    MediaType, ProfileUpdate, TransactionId, TransactionType, User, UserId,
};

use crate::error::{Result, StoreError};
use crate::{positive_amount, Store};

/// SQLSTATE raised when `credits + $1` leaves the `BIGINT` range.
const NUMERIC_VALUE_OUT_OF_RANGE: &str = "22003";

/// PostgreSQL-backed storage implementation.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect to the database at `url`.
    ///
    /// # Errors
    ///
    /// Returns an error if no connection can be established.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    #[must_use]
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply pending migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if a migration fails.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    async fn apply(&self, transaction: &CreditTransaction, delta: i64) -> Result<CreditTransaction> {
        let user_id = *transaction.user_id.as_uuid();
        let mut db_tx = self.pool.begin().await?;

        let updated: std::result::Result<Option<i64>, sqlx::Error> = sqlx::query_scalar(
            r"
            UPDATE users
            SET credits = credits + $1, updated_at = now()
            WHERE id = $2 AND credits + $1 >= 0
            RETURNING credits
            ",
        )
        .bind(delta)
        .bind(user_id)
        .fetch_optional(&mut *db_tx)
        .await;

        let balance = match updated {
            Ok(balance) => balance,
            Err(sqlx::Error::Database(db))
                if db.code().as_deref() == Some(NUMERIC_VALUE_OUT_OF_RANGE) =>
            {
                db_tx.rollback().await?;
                let balance: i64 = sqlx::query_scalar("SELECT credits FROM users WHERE id = $1")
                    .bind(user_id)
                    .fetch_one(&self.pool)
                    .await?;
                tracing::warn!(
                    user_id = %transaction.user_id,
                    balance,
                    delta,
                    "Credit refused, balance would overflow"
                );
                return Err(StoreError::BalanceOverflow {
                    balance,
                    amount: delta,
                });
            }
            Err(e) => return Err(e.into()),
        };

        let Some(balance) = balance else {
            let available: Option<i64> =
                sqlx::query_scalar("SELECT credits FROM users WHERE id = $1")
                    .bind(user_id)
                    .fetch_optional(&mut *db_tx)
                    .await?;
            db_tx.rollback().await?;
            return Err(match available {
                None => StoreError::user_not_found(transaction.user_id),
                Some(available) => StoreError::InsufficientCredits {
                    required: -delta,
                    available,
                },
            });
        };

        let mut recorded = transaction.clone();
        recorded.balance_after = balance;

        sqlx::query(
            r"
            INSERT INTO credit_transactions
                (id, user_id, amount, transaction_type, balance_after, description, metadata, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ",
        )
        .bind(recorded.id.to_string())
        .bind(user_id)
        .bind(recorded.amount)
        .bind(recorded.transaction_type.as_str())
        .bind(recorded.balance_after)
        .bind(&recorded.description)
        .bind(&recorded.metadata)
        .bind(recorded.created_at)
        .execute(&mut *db_tx)
        .await?;

        db_tx.commit().await?;
        tracing::debug!(user_id = %transaction.user_id, delta, balance, "Balance updated");
        Ok(recorded)
    }
}

#[derive(FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    name: String,
    profile_picture: Option<String>,
    credits: i64,
    verified: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: UserId::from_uuid(row.id),
            email: row.email,
            name: row.name,
            profile_picture: row.profile_picture,
            credits: row.credits,
            verified: row.verified,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(FromRow)]
struct TransactionRow {
    id: String,
    user_id: Uuid,
    amount: i64,
    transaction_type: String,
    balance_after: i64,
    description: String,
    metadata: serde_json::Value,
    created_at: DateTime<Utc>,
}

impl TryFrom<TransactionRow> for CreditTransaction {
    type Error = StoreError;

    fn try_from(row: TransactionRow) -> Result<Self> {
        let transaction_type = match row.transaction_type.as_str() {
            "generation" => TransactionType::Generation,
            "refund" => TransactionType::Refund,
            "grant" => TransactionType::Grant,
            other => {
                return Err(StoreError::Serialization(format!(
                    "unknown transaction type '{other}'"
                )))
            }
        };
        Ok(Self {
            id: parse_id(&row.id)?,
            user_id: UserId::from_uuid(row.user_id),
            amount: row.amount,
            transaction_type,
            balance_after: row.balance_after,
            description: row.description,
            metadata: row.metadata,
            created_at: row.created_at,
        })
    }
}

#[derive(FromRow)]
struct GenerationRow {
    id: String,
    user_id: Uuid,
    request: Json<GenerationRequest>,
    artifact: Json<ArtifactRef>,
    credit_cost: i64,
    transaction_id: String,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<GenerationRow> for GenerationRecord {
    type Error = StoreError;

    fn try_from(row: GenerationRow) -> Result<Self> {
        let status = match row.status.as_str() {
            "pending" => GenerationStatus::Pending,
            "completed" => GenerationStatus::Completed,
            "failed" => GenerationStatus::Failed,
            other => {
                return Err(StoreError::Serialization(format!(
                    "unknown generation status '{other}'"
                )))
            }
        };
        Ok(Self {
            id: parse_id(&row.id)?,
            user_id: UserId::from_uuid(row.user_id),
            request: row.request.0,
            artifact: row.artifact.0,
            credit_cost: row.credit_cost,
            transaction_id: parse_id(&row.transaction_id)?,
            status,
            created_at: row.created_at,
        })
    }
}

fn parse_id<T: std::str::FromStr>(s: &str) -> Result<T> {
    s.parse()
        .map_err(|_| StoreError::Serialization(format!("invalid stored id '{s}'")))
}

const USER_COLUMNS: &str =
    "id, email, name, profile_picture, credits, verified, created_at, updated_at";

#[async_trait]
impl Store for PgStore {
    async fn create_user(&self, user: &User) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO users (id, email, name, profile_picture, credits, verified, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ",
        )
        .bind(user.id.as_uuid())
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.profile_picture)
        .bind(user.credits)
        .bind(user.verified)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_user(&self, user_id: &UserId) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(User::from))
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(User::from))
    }

    async fn update_profile(&self, user_id: &UserId, update: &ProfileUpdate) -> Result<User> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r"
            UPDATE users
            SET name = COALESCE($2, name),
                profile_picture = COALESCE($3, profile_picture),
                updated_at = now()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "
        ))
        .bind(user_id.as_uuid())
        .bind(&update.name)
        .bind(&update.profile_picture)
        .fetch_optional(&self.pool)
        .await?;
        row.map(User::from)
            .ok_or_else(|| StoreError::user_not_found(user_id))
    }

    async fn debit(&self, transaction: &CreditTransaction) -> Result<CreditTransaction> {
        let amount = positive_amount(transaction)?;
        self.apply(transaction, -amount).await
    }

    async fn credit(&self, transaction: &CreditTransaction) -> Result<CreditTransaction> {
        let amount = positive_amount(transaction)?;
        self.apply(transaction, amount).await
    }

    async fn get_transaction(
        &self,
        transaction_id: &TransactionId,
    ) -> Result<Option<CreditTransaction>> {
        sqlx::query_as::<_, TransactionRow>(
            r"
            SELECT id, user_id, amount, transaction_type, balance_after, description, metadata, created_at
            FROM credit_transactions
            WHERE id = $1
            ",
        )
        .bind(transaction_id.to_string())
        .fetch_optional(&self.pool)
        .await?
        .map(CreditTransaction::try_from)
        .transpose()
    }

    async fn list_transactions_by_user(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<CreditTransaction>> {
        let rows = sqlx::query_as::<_, TransactionRow>(
            r"
            SELECT id, user_id, amount, transaction_type, balance_after, description, metadata, created_at
            FROM credit_transactions
            WHERE user_id = $1
            ORDER BY id DESC
            LIMIT $2 OFFSET $3
            ",
        )
        .bind(user_id.as_uuid())
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .bind(i64::try_from(offset).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(CreditTransaction::try_from).collect()
    }

    async fn put_generation(&self, record: &GenerationRecord) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO generations
                (id, user_id, media_type, request, artifact, credit_cost, transaction_id, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ",
        )
        .bind(record.id.to_string())
        .bind(record.user_id.as_uuid())
        .bind(record.media_type().as_str())
        .bind(Json(&record.request))
        .bind(Json(&record.artifact))
        .bind(record.credit_cost)
        .bind(record.transaction_id.to_string())
        .bind(record.status.as_str())
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_generations(
        &self,
        user_id: &UserId,
        media_type: MediaType,
    ) -> Result<Vec<GenerationRecord>> {
        let rows = sqlx::query_as::<_, GenerationRow>(
            r"
            SELECT id, user_id, request, artifact, credit_cost, transaction_id, status, created_at
            FROM generations
            WHERE user_id = $1 AND media_type = $2
            ORDER BY id DESC
            ",
        )
        .bind(user_id.as_uuid())
        .bind(media_type.as_str())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(GenerationRecord::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    //! These run against a live database named by `TEST_DATABASE_URL`.

    use super::*;

    async fn store() -> PgStore {
        let url = std::env::var("TEST_DATABASE_URL").unwrap();
        let store = PgStore::connect(&url, 4).await.unwrap();
        store.migrate().await.unwrap();
        store
    }

    async fn user(store: &PgStore, credits: i64) -> UserId {
        let id = UserId::generate();
        store
            .create_user(&User::new(id, format!("{id}@example.com"), "Pg", credits))
            .await
            .unwrap();
        id
    }

    #[tokio::test]
    #[ignore = "requires TEST_DATABASE_URL"]
    async fn conditional_debit() {
        let store = store().await;
        let user_id = user(&store, 10).await;

        let ok = store
            .debit(&CreditTransaction::generation(user_id, 6, MediaType::Image))
            .await
            .unwrap();
        assert_eq!(ok.balance_after, 4);

        let err = store
            .debit(&CreditTransaction::generation(user_id, 6, MediaType::Image))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::InsufficientCredits {
                required: 6,
                available: 4
            }
        ));

        let listed = store.list_transactions_by_user(&user_id, 10, 0).await.unwrap();
        assert_eq!(listed.len(), 1);
    }

    #[tokio::test]
    #[ignore = "requires TEST_DATABASE_URL"]
    async fn duplicate_email_is_already_exists() {
        let store = store().await;
        let user_id = user(&store, 0).await;
        let email = format!("{user_id}@example.com");

        let err = store
            .create_user(&User::new(UserId::generate(), email, "Dup", 0))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(_)));
    }
}
