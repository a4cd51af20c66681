//! Credits ledger: per-user balance plus an append-only transaction log.
//!
//! Every mutation runs inside one SQL transaction so a failed debit leaves
//! balance and log untouched, and a crash can never separate the balance
//! update from its log entry. The ledger itself does not police at-most-once
//! refunds; the dispatcher owns the single refund path per job and the
//! startup sweep reconciles any crash window.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};
use thiserror::Error;
use tracing::info;

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("insufficient credits")]
    InsufficientCredits,

    #[error("amount must be positive, got {0}")]
    InvalidAmount(i64),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Transaction kinds as recorded in the log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxKind {
    Debit,
    Refund,
    Topup,
    Adjustment,
}

impl TxKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debit => "debit",
            Self::Refund => "refund",
            Self::Topup => "topup",
            Self::Adjustment => "adjustment",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "debit" => Some(Self::Debit),
            "refund" => Some(Self::Refund),
            "topup" => Some(Self::Topup),
            "adjustment" => Some(Self::Adjustment),
            _ => None,
        }
    }
}

/// Credit kinds callers may append directly; debits go through [`CreditsLedger::debit`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreditKind {
    Refund,
    Topup,
    Adjustment,
}

impl CreditKind {
    fn as_tx(&self) -> TxKind {
        match self {
            Self::Refund => TxKind::Refund,
            Self::Topup => TxKind::Topup,
            Self::Adjustment => TxKind::Adjustment,
        }
    }
}

/// One immutable ledger entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub user_id: String,
    /// Signed amount: negative for debits, positive for credits
    pub delta: i64,
    pub kind: TxKind,
    pub job_id: Option<String>,
    pub description: String,
    pub created_at: i64,
}

/// Per-user balances with an append-only log. Balance ≡ sum of deltas.
#[derive(Clone)]
pub struct CreditsLedger {
    pool: SqlitePool,
}

impl CreditsLedger {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn init(&self) -> LedgerResult<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS credits_accounts (
                user_id TEXT PRIMARY KEY,
                balance INTEGER NOT NULL DEFAULT 0 CHECK (balance >= 0)
            )",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS credits_transactions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                delta INTEGER NOT NULL,
                kind TEXT NOT NULL,
                job_id TEXT,
                description TEXT NOT NULL,
                created_at INTEGER NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_credits_tx_user ON credits_transactions(user_id, id)",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_credits_tx_job ON credits_transactions(job_id)",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Atomically check funds, decrease the balance, and append the debit.
    /// Fails with [`LedgerError::InsufficientCredits`] leaving no trace.
    pub async fn debit(
        &self,
        user_id: &str,
        amount: i64,
        job_id: &str,
        description: &str,
    ) -> LedgerResult<()> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }

        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT OR IGNORE INTO credits_accounts (user_id, balance) VALUES (?, 0)")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        let balance: i64 = sqlx::query("SELECT balance FROM credits_accounts WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(&mut *tx)
            .await?
            .try_get("balance")?;

        if balance < amount {
            // The transaction drops here, rolling back the account insert.
            return Err(LedgerError::InsufficientCredits);
        }

        sqlx::query("UPDATE credits_accounts SET balance = balance - ? WHERE user_id = ?")
            .bind(amount)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "INSERT INTO credits_transactions (user_id, delta, kind, job_id, description, created_at)
             VALUES (?, ?, 'debit', ?, ?, ?)",
        )
        .bind(user_id)
        .bind(-amount)
        .bind(job_id)
        .bind(description)
        .bind(Utc::now().timestamp())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        info!(user_id, amount, job_id, "debited credits");
        Ok(())
    }

    /// Append a credit (refund, topup, adjustment) and increase the balance
    pub async fn credit(
        &self,
        user_id: &str,
        amount: i64,
        kind: CreditKind,
        description: &str,
        job_id: Option<&str>,
    ) -> LedgerResult<()> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO credits_accounts (user_id, balance) VALUES (?, ?)
             ON CONFLICT(user_id) DO UPDATE SET balance = balance + excluded.balance",
        )
        .bind(user_id)
        .bind(amount)
        .execute(&mut *tx)
        .await?;
        sqlx::query(
            "INSERT INTO credits_transactions (user_id, delta, kind, job_id, description, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(amount)
        .bind(kind.as_tx().as_str())
        .bind(job_id)
        .bind(description)
        .bind(Utc::now().timestamp())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        info!(user_id, amount, kind = kind.as_tx().as_str(), "credited");
        Ok(())
    }

    /// Current balance; users never seen by the ledger hold zero
    pub async fn balance(&self, user_id: &str) -> LedgerResult<i64> {
        let row = sqlx::query("SELECT balance FROM credits_accounts WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(match row {
            Some(row) => row.try_get("balance")?,
            None => 0,
        })
    }

    /// Transactions newest first, bounded by `limit`
    pub async fn history(&self, user_id: &str, limit: i64) -> LedgerResult<Vec<Transaction>> {
        let rows = sqlx::query(
            "SELECT id, user_id, delta, kind, job_id, description, created_at
             FROM credits_transactions WHERE user_id = ?
             ORDER BY id DESC LIMIT ?",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_transaction).collect()
    }

    /// Total debited for a job (positive number, 0 when never charged)
    pub async fn debit_total_for_job(&self, job_id: &str) -> LedgerResult<i64> {
        self.sum_for_job(job_id, TxKind::Debit).await.map(|v| -v)
    }

    /// Total refunded for a job
    pub async fn refund_total_for_job(&self, job_id: &str) -> LedgerResult<i64> {
        self.sum_for_job(job_id, TxKind::Refund).await
    }

    async fn sum_for_job(&self, job_id: &str, kind: TxKind) -> LedgerResult<i64> {
        let row = sqlx::query(
            "SELECT COALESCE(SUM(delta), 0) AS total
             FROM credits_transactions WHERE job_id = ? AND kind = ?",
        )
        .bind(job_id)
        .bind(kind.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(row.try_get("total")?)
    }
}

fn row_to_transaction(row: sqlx::sqlite::SqliteRow) -> LedgerResult<Transaction> {
    let kind_raw: String = row.try_get("kind")?;
    Ok(Transaction {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        delta: row.try_get("delta")?,
        // Kinds are written exclusively by this module; an unknown kind is
        // an adjustment from an operator tool and is preserved as such.
        kind: TxKind::parse(&kind_raw).unwrap_or(TxKind::Adjustment),
        job_id: row.try_get("job_id")?,
        description: row.try_get("description")?,
        created_at: row.try_get("created_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn ledger() -> (tempfile::TempDir, CreditsLedger) {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("credits.db").display());
        let pool = scene_store::connect(&url).await.unwrap();
        let ledger = CreditsLedger::new(pool);
        ledger.init().await.unwrap();
        (dir, ledger)
    }

    #[tokio::test]
    async fn debit_requires_sufficient_funds() {
        let (_dir, ledger) = ledger().await;
        ledger.credit("u1", 500, CreditKind::Topup, "initial", None).await.unwrap();

        ledger.debit("u1", 200, "qcf-1", "universe job").await.unwrap();
        assert_eq!(ledger.balance("u1").await.unwrap(), 300);

        let err = ledger.debit("u1", 400, "qcf-2", "too expensive").await.unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientCredits));
        // A failed debit leaves balance and log unchanged.
        assert_eq!(ledger.balance("u1").await.unwrap(), 300);
        assert_eq!(ledger.history("u1", 10).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn zero_balance_user_cannot_be_debited() {
        let (_dir, ledger) = ledger().await;
        let err = ledger.debit("u2", 1, "qcf-3", "no funds").await.unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientCredits));
        assert_eq!(ledger.balance("u2").await.unwrap(), 0);
        assert!(ledger.history("u2", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn balance_equals_sum_of_deltas() {
        let (_dir, ledger) = ledger().await;
        ledger.credit("u3", 1000, CreditKind::Topup, "topup", None).await.unwrap();
        ledger.debit("u3", 200, "qcf-4", "debit").await.unwrap();
        ledger
            .credit("u3", 200, CreditKind::Refund, "refund for failed job", Some("qcf-4"))
            .await
            .unwrap();

        let history = ledger.history("u3", 10).await.unwrap();
        let sum: i64 = history.iter().map(|t| t.delta).sum();
        assert_eq!(sum, ledger.balance("u3").await.unwrap());
        assert_eq!(sum, 1000);
        // Newest first.
        assert_eq!(history[0].kind, TxKind::Refund);
    }

    #[tokio::test]
    async fn per_job_totals_match_refund_invariant() {
        let (_dir, ledger) = ledger().await;
        ledger.credit("u4", 500, CreditKind::Topup, "topup", None).await.unwrap();
        ledger.debit("u4", 200, "qcf-5", "debit").await.unwrap();
        assert_eq!(ledger.debit_total_for_job("qcf-5").await.unwrap(), 200);
        assert_eq!(ledger.refund_total_for_job("qcf-5").await.unwrap(), 0);

        ledger
            .credit("u4", 200, CreditKind::Refund, "refund", Some("qcf-5"))
            .await
            .unwrap();
        assert_eq!(ledger.refund_total_for_job("qcf-5").await.unwrap(), 200);
    }

    #[tokio::test]
    async fn rejects_non_positive_amounts() {
        let (_dir, ledger) = ledger().await;
        assert!(matches!(
            ledger.debit("u5", 0, "qc-1", "zero").await.unwrap_err(),
            LedgerError::InvalidAmount(0)
        ));
        assert!(matches!(
            ledger.credit("u5", -5, CreditKind::Topup, "negative", None).await.unwrap_err(),
            LedgerError::InvalidAmount(-5)
        ));
    }
}
