//! Persistence layer.
//!
//! A single SQLite database holding users, per-currency wallets and the
//! append-only history log. Balances are integer hundredths
//! (`amount_minor`). Every wallet mutation runs in one transaction
//! together with its history row, and debits are guarded so a balance
//! can never go below zero.

use chrono::{SecondsFormat, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Sqlite, SqlitePool, Transaction};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::conversion::{from_minor_units, to_minor_units};
use crate::types::{Currency, HistoryEntry, HistoryKind, KantorError, User, Wallet};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    email TEXT NOT NULL UNIQUE,
    password TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS wallets (
    user_id INTEGER NOT NULL REFERENCES users(id),
    currency TEXT NOT NULL,
    amount_minor INTEGER NOT NULL DEFAULT 0 CHECK (amount_minor >= 0),
    PRIMARY KEY (user_id, currency)
);

CREATE TABLE IF NOT EXISTS history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id),
    date TEXT NOT NULL,
    type TEXT NOT NULL,
    details TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_history_user ON history (user_id, id);
"#;

/// One side of a wallet mutation.
#[derive(Debug, Clone, Copy)]
pub struct Leg {
    pub currency: Currency,
    pub amount: Decimal,
}

#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open (creating if missing) the database file at `path`.
    pub async fn open(path: &str) -> Result<Self, KantorError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        info!(path, "Database ready");
        Ok(store)
    }

    /// A private in-memory database. Used by tests.
    pub async fn in_memory() -> Result<Self, KantorError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

        // Each in-memory connection is its own database, so pin the pool to one.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<(), KantorError> {
        sqlx::query(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }

    // -- Users -----------------------------------------------------------

    /// Insert a user and a zero-balance wallet for every supported currency.
    pub async fn create_user(&self, email: &str, password_hash: &str) -> Result<i64, KantorError> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query("INSERT INTO users (email, password) VALUES (?, ?)")
            .bind(email)
            .bind(password_hash)
            .execute(&mut *tx)
            .await;

        let user_id = match inserted {
            Ok(result) => result.last_insert_rowid(),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                return Err(KantorError::EmailTaken);
            }
            Err(e) => return Err(e.into()),
        };

        for currency in Currency::ALL {
            sqlx::query("INSERT INTO wallets (user_id, currency, amount_minor) VALUES (?, ?, 0)")
                .bind(user_id)
                .bind(currency.code())
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        debug!(user_id, "User created with empty wallets");
        Ok(user_id)
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, KantorError> {
        let row: Option<(i64, String)> =
            sqlx::query_as("SELECT id, password FROM users WHERE email = ?")
                .bind(email)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|(id, password_hash)| User { id, password_hash }))
    }

    // -- Reads -----------------------------------------------------------

    /// All wallets of a user in supported-currency order.
    pub async fn wallets(&self, user_id: i64) -> Result<Vec<Wallet>, KantorError> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT currency, amount_minor FROM wallets WHERE user_id = ?")
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?;

        let mut wallets = rows
            .into_iter()
            .map(|(code, minor)| -> Result<Wallet, KantorError> {
                let currency = Currency::from_str(&code)
                    .map_err(|_| KantorError::Storage(format!("unknown wallet currency: {code}")))?;
                Ok(Wallet { currency, amount: from_minor_units(minor) })
            })
            .collect::<Result<Vec<_>, _>>()?;

        wallets.sort_by_key(|w| Currency::ALL.iter().position(|c| *c == w.currency));
        Ok(wallets)
    }

    pub async fn balance(&self, user_id: i64, currency: Currency) -> Result<Decimal, KantorError> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT amount_minor FROM wallets WHERE user_id = ? AND currency = ?")
                .bind(user_id)
                .bind(currency.code())
                .fetch_optional(&self.pool)
                .await?;

        row.map(|(minor,)| from_minor_units(minor))
            .ok_or_else(|| KantorError::Storage(format!("no {currency} wallet for user {user_id}")))
    }

    /// History of a user, newest first.
    pub async fn history(&self, user_id: i64) -> Result<Vec<HistoryEntry>, KantorError> {
        let rows: Vec<(String, String, String)> = sqlx::query_as(
            "SELECT date, type, details FROM history WHERE user_id = ? ORDER BY id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(date, kind, details)| -> Result<HistoryEntry, KantorError> {
                Ok(HistoryEntry { date, kind: HistoryKind::from_str(&kind)?, details })
            })
            .collect()
    }

    // -- Mutations -------------------------------------------------------

    /// Credit one wallet and log it.
    pub async fn credit(
        &self,
        user_id: i64,
        leg: Leg,
        kind: HistoryKind,
        details: &str,
    ) -> Result<(), KantorError> {
        let mut tx = self.pool.begin().await?;
        credit_in(&mut tx, user_id, leg).await?;
        append_history(&mut tx, user_id, kind, details).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Debit `debit`, credit `credit` and log it, all or nothing.
    ///
    /// Fails with `InsufficientFunds` (and changes nothing) when the source
    /// balance does not cover the debit.
    pub async fn transfer(
        &self,
        user_id: i64,
        debit: Leg,
        credit: Leg,
        kind: HistoryKind,
        details: &str,
    ) -> Result<(), KantorError> {
        let debit_minor = to_minor_units(debit.amount)?;
        let mut tx = self.pool.begin().await?;

        let debited = sqlx::query(
            "UPDATE wallets SET amount_minor = amount_minor - ? \
             WHERE user_id = ? AND currency = ? AND amount_minor >= ?",
        )
        .bind(debit_minor)
        .bind(user_id)
        .bind(debit.currency.code())
        .bind(debit_minor)
        .execute(&mut *tx)
        .await?;

        if debited.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(KantorError::InsufficientFunds {
                currency: debit.currency,
                needed: debit.amount,
            });
        }

        credit_in(&mut tx, user_id, credit).await?;
        append_history(&mut tx, user_id, kind, details).await?;
        tx.commit().await?;
        Ok(())
    }
}

/// Add to one wallet without letting the balance leave the i64 range.
///
/// The headroom guard sits in the `WHERE` clause so the check and the
/// write are one statement. A miss is either a missing wallet or a full one.
async fn credit_in(tx: &mut Transaction<'_, Sqlite>, user_id: i64, leg: Leg) -> Result<(), KantorError> {
    let minor = to_minor_units(leg.amount)?;
    let headroom = i64::MAX - minor;
    let credited = sqlx::query(
        "UPDATE wallets SET amount_minor = amount_minor + ? \
         WHERE user_id = ? AND currency = ? AND amount_minor <= ?",
    )
    .bind(minor)
    .bind(user_id)
    .bind(leg.currency.code())
    .bind(headroom)
    .execute(&mut **tx)
    .await?;

    if credited.rows_affected() > 0 {
        return Ok(());
    }

    let existing: Option<(i64,)> =
        sqlx::query_as("SELECT amount_minor FROM wallets WHERE user_id = ? AND currency = ?")
            .bind(user_id)
            .bind(leg.currency.code())
            .fetch_optional(&mut **tx)
            .await?;

    match existing {
        Some((balance,)) => {
            warn!(user_id, currency = %leg.currency, balance, minor, "Credit would overflow wallet");
            Err(KantorError::BalanceLimit { currency: leg.currency })
        }
        None => Err(KantorError::Storage(format!(
            "no {} wallet for user {user_id}",
            leg.currency
        ))),
    }
}

async fn append_history(
    tx: &mut Transaction<'_, Sqlite>,
    user_id: i64,
    kind: HistoryKind,
    details: &str,
) -> Result<(), KantorError> {
    sqlx::query("INSERT INTO history (user_id, date, type, details) VALUES (?, ?, ?, ?)")
        .bind(user_id)
        .bind(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true))
        .bind(kind.as_str())
        .bind(details)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
