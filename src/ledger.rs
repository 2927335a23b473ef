// Coin ledger: wallets and the append-only transaction log
//
// Balance changes are always in-transaction increments or decrements paired
// with a transaction row, so `balance == sum(EARNED) - sum(REDEEMED)` holds
// at every commit.

use crate::database::{Database, DbPool};
use crate::error::{LedgerError, LedgerResult};
use crate::models::{
    LedgerTransaction, ReconcileReport, TransactionType, Wallet, WalletQuery, WalletView,
};
use crate::rewards::RewardDecision;
use sqlx::{FromRow, PgConnection};
use tracing::{error, info, warn};

pub const MAX_PAGE_SIZE: i64 = 200;

const TRANSACTION_COLUMNS: &str =
    "id, wallet_id, type, amount, note, unit_kind, unit_id, created_at";

/// Credit a granted reward. Runs on the caller's transaction: wallet
/// creation, log append, balance increment and the `coins_earned` counter
/// all commit together with the completion record update.
pub async fn apply_reward(
    conn: &mut PgConnection,
    user_id: i64,
    decision: &RewardDecision,
) -> LedgerResult<LedgerTransaction> {
    if !decision.grant || decision.amount <= 0 {
        return Err(LedgerError::Validation(format!(
            "reward for {} {} is not grantable",
            decision.unit.kind, decision.unit.id
        )));
    }

    let wallet = lock_or_create_wallet(conn, user_id).await?;

    let entry = sqlx::query_as::<_, LedgerTransaction>(&format!(
        r#"
        INSERT INTO transactions (wallet_id, type, amount, note, unit_kind, unit_id)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING {}
        "#,
        TRANSACTION_COLUMNS
    ))
    .bind(wallet.id)
    .bind(TransactionType::Earned)
    .bind(decision.amount)
    .bind(&decision.reason)
    .bind(decision.unit.kind)
    .bind(decision.unit.id)
    .fetch_one(&mut *conn)
    .await?;

    let balance = sqlx::query_scalar::<_, i64>(
        "UPDATE wallets SET balance = balance + $2, updated_at = NOW() WHERE id = $1 RETURNING balance",
    )
    .bind(wallet.id)
    .bind(decision.amount)
    .fetch_one(&mut *conn)
    .await?;

    let updated = sqlx::query("UPDATE users SET coins_earned = coins_earned + $2 WHERE id = $1")
        .bind(user_id)
        .bind(decision.amount)
        .execute(&mut *conn)
        .await?;
    if updated.rows_affected() == 0 {
        return Err(LedgerError::NotFound(format!("user {}", user_id)));
    }

    info!(
        "Granted {} coins to user {} for {} {} (balance {})",
        decision.amount, user_id, decision.unit.kind, decision.unit.id, balance
    );

    Ok(entry)
}

/// Spend coins. Rejects anything that would take the balance below zero.
pub async fn redeem(
    pool: &DbPool,
    user_id: i64,
    amount: i64,
    note: &str,
) -> LedgerResult<LedgerTransaction> {
    if amount <= 0 {
        return Err(LedgerError::Validation(
            "redemption amount must be positive".to_string(),
        ));
    }
    let note = note.trim();
    if note.is_empty() {
        return Err(LedgerError::Validation(
            "redemption note is required".to_string(),
        ));
    }
    if !Database::user_exists(pool, user_id).await? {
        return Err(LedgerError::NotFound(format!("user {}", user_id)));
    }

    let mut tx = pool.begin().await?;

    let wallet = sqlx::query_as::<_, Wallet>(
        "SELECT id, user_id, balance FROM wallets WHERE user_id = $1 FOR UPDATE",
    )
    .bind(user_id)
    .fetch_optional(&mut *tx)
    .await?;

    let wallet = match wallet {
        Some(wallet) if wallet.balance >= amount => wallet,
        other => {
            let available = other.map(|w| w.balance).unwrap_or(0);
            warn!(
                "Rejected redemption of {} coins for user {} (available {})",
                amount, user_id, available
            );
            return Err(LedgerError::InsufficientBalance {
                requested: amount,
                available,
            });
        }
    };

    let entry = sqlx::query_as::<_, LedgerTransaction>(&format!(
        r#"
        INSERT INTO transactions (wallet_id, type, amount, note)
        VALUES ($1, $2, $3, $4)
        RETURNING {}
        "#,
        TRANSACTION_COLUMNS
    ))
    .bind(wallet.id)
    .bind(TransactionType::Redeemed)
    .bind(amount)
    .bind(note)
    .fetch_one(&mut *tx)
    .await?;

    let debited = sqlx::query(
        "UPDATE wallets SET balance = balance - $2, updated_at = NOW() WHERE id = $1 AND balance >= $2",
    )
    .bind(wallet.id)
    .bind(amount)
    .execute(&mut *tx)
    .await?;
    if debited.rows_affected() == 0 {
        // dropping `tx` rolls back the appended entry
        return Err(LedgerError::InsufficientBalance {
            requested: amount,
            available: wallet.balance,
        });
    }

    tx.commit().await?;

    info!(
        "Redeemed {} coins for user {} (balance {})",
        amount,
        user_id,
        wallet.balance - amount
    );

    Ok(entry)
}

/// Wallet balance and a page of its transactions. Never creates a wallet.
///
/// All reads share one REPEATABLE READ snapshot, so the balance, the count
/// and the page always describe the same ledger state.
pub async fn get_wallet(
    pool: &DbPool,
    user_id: i64,
    page: WalletQuery,
) -> LedgerResult<WalletView> {
    if !(1..=MAX_PAGE_SIZE).contains(&page.limit) {
        return Err(LedgerError::Validation(format!(
            "limit must be between 1 and {}",
            MAX_PAGE_SIZE
        )));
    }
    if page.offset < 0 {
        return Err(LedgerError::Validation(
            "offset must not be negative".to_string(),
        ));
    }

    let mut tx = pool.begin().await?;
    sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
        .execute(&mut *tx)
        .await?;

    let user_exists =
        sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM users WHERE id = $1)")
            .bind(user_id)
            .fetch_one(&mut *tx)
            .await?;
    if !user_exists {
        return Err(LedgerError::NotFound(format!("user {}", user_id)));
    }

    let wallet = sqlx::query_as::<_, Wallet>(
        "SELECT id, user_id, balance FROM wallets WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_optional(&mut *tx)
    .await?;

    let Some(wallet) = wallet else {
        tx.commit().await?;
        return Ok(WalletView {
            user_id,
            balance: 0,
            total: 0,
            limit: page.limit,
            offset: page.offset,
            transactions: Vec::new(),
        });
    };

    let total =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM transactions WHERE wallet_id = $1")
            .bind(wallet.id)
            .fetch_one(&mut *tx)
            .await?;

    let transactions = sqlx::query_as::<_, LedgerTransaction>(&format!(
        r#"
        SELECT {}
        FROM transactions
        WHERE wallet_id = $1
        ORDER BY created_at DESC, id DESC
        LIMIT $2 OFFSET $3
        "#,
        TRANSACTION_COLUMNS
    ))
    .bind(wallet.id)
    .bind(page.limit)
    .bind(page.offset)
    .fetch_all(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(WalletView {
        user_id,
        balance: wallet.balance,
        total,
        limit: page.limit,
        offset: page.offset,
        transactions,
    })
}

#[derive(Debug, FromRow)]
struct LedgerTotals {
    earned: i64,
    redeemed: i64,
}

/// Recompute totals from the transaction log. `users.coins_earned` is a cache
/// and is rewritten when it drifted; the wallet balance is only checked.
pub async fn reconcile(pool: &DbPool, user_id: i64) -> LedgerResult<ReconcileReport> {
    let mut tx = pool.begin().await?;

    let coins_earned_before = sqlx::query_scalar::<_, i64>(
        "SELECT coins_earned FROM users WHERE id = $1 FOR UPDATE",
    )
    .bind(user_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| LedgerError::NotFound(format!("user {}", user_id)))?;

    let wallet = sqlx::query_as::<_, Wallet>(
        "SELECT id, user_id, balance FROM wallets WHERE user_id = $1 FOR UPDATE",
    )
    .bind(user_id)
    .fetch_optional(&mut *tx)
    .await?;

    let (totals, wallet_balance) = match &wallet {
        Some(wallet) => {
            let totals = sqlx::query_as::<_, LedgerTotals>(
                r#"
                SELECT
                    COALESCE(SUM(amount) FILTER (WHERE type = 'EARNED'), 0)::BIGINT AS earned,
                    COALESCE(SUM(amount) FILTER (WHERE type = 'REDEEMED'), 0)::BIGINT AS redeemed
                FROM transactions
                WHERE wallet_id = $1
                "#,
            )
            .bind(wallet.id)
            .fetch_one(&mut *tx)
            .await?;
            (totals, wallet.balance)
        }
        None => (
            LedgerTotals {
                earned: 0,
                redeemed: 0,
            },
            0,
        ),
    };

    if coins_earned_before != totals.earned {
        warn!(
            "coins_earned drift for user {}: cached {}, ledger {}; repairing",
            user_id, coins_earned_before, totals.earned
        );
        sqlx::query("UPDATE users SET coins_earned = $2 WHERE id = $1")
            .bind(user_id)
            .bind(totals.earned)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;

    let report = ReconcileReport {
        user_id,
        ledger_earned: totals.earned,
        ledger_redeemed: totals.redeemed,
        wallet_balance,
        coins_earned_before,
        coins_earned_after: totals.earned,
        balance_consistent: wallet_balance == totals.earned - totals.redeemed,
    };

    if report.drift_detected() {
        info!(
            "Reconciled user {}: coins_earned {} -> {}",
            user_id, report.coins_earned_before, report.coins_earned_after
        );
    }
    if !report.balance_consistent {
        error!(
            "Wallet balance for user {} is {} but the ledger sums to {}",
            user_id,
            report.wallet_balance,
            report.ledger_balance()
        );
    }

    Ok(report)
}

async fn lock_or_create_wallet(conn: &mut PgConnection, user_id: i64) -> LedgerResult<Wallet> {
    sqlx::query(
        "INSERT INTO wallets (user_id, balance) VALUES ($1, 0) ON CONFLICT (user_id) DO NOTHING",
    )
    .bind(user_id)
    .execute(&mut *conn)
    .await?;

    let wallet = sqlx::query_as::<_, Wallet>(
        "SELECT id, user_id, balance FROM wallets WHERE user_id = $1 FOR UPDATE",
    )
    .bind(user_id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(wallet)
}
