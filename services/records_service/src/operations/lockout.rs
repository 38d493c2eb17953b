//! Exponential backoff after failed logins.
//!
//! An account is locked while `now < lock_account_until`. Every failed login pushes that instant
//! to `now + 2.5^n` milliseconds, where `n` is the failure count including this one. Nothing
//! unlocks an account explicitly; the window just runs out.

use chrono::{DateTime, Duration, Utc};

use crate::clock::Clock;
use crate::error::RecordsResult;
use crate::model::{Account, Role, Student, Teacher};
use crate::operations::accounts::find_credential_by_username;
use crate::store::entity_store::patch_error;
use crate::store::{Attr, EntityStore, FieldPath, Patch};

const BACKOFF_BASE_MILLIS: f64 = 2.5;
const MAX_LOCK_WINDOW_MICROS: i64 = 3650 * 24 * 60 * 60 * 1_000_000;

/// Lockout state of a username. Both fields are `None` when no account has that username.
#[derive(Clone, Debug, PartialEq)]
pub struct LockStatus {
    pub locked: bool,
    pub failed_login_attempts: Option<u32>,
    pub lock_account_until: Option<DateTime<Utc>>,
}

impl LockStatus {
    fn unknown() -> Self {
        LockStatus {
            locked: false,
            failed_login_attempts: None,
            lock_account_until: None,
        }
    }

    fn of(account: &Account, now: DateTime<Utc>) -> Self {
        LockStatus {
            locked: now < account.lock_account_until(),
            failed_login_attempts: Some(account.failed_login_attempts()),
            lock_account_until: Some(account.lock_account_until()),
        }
    }
}

/// How long an account stays locked after its `failed_attempts`-th consecutive failure.
pub fn lock_window(failed_attempts: u32) -> Duration {
    let micros = BACKOFF_BASE_MILLIS.powf(f64::from(failed_attempts)) * 1000.0;
    if !micros.is_finite() || micros >= MAX_LOCK_WINDOW_MICROS as f64 {
        return Duration::microseconds(MAX_LOCK_WINDOW_MICROS);
    }

    Duration::microseconds(micros.round() as i64)
}

/// Counts a failed login against `username` and extends its lock. Students are checked before
/// teachers. Returns `None` for a username nobody has.
///
/// The count is read, then incremented in a separate write, so two concurrent failures may both
/// compute the same window.
#[tracing::instrument(skip(store, clock))]
pub async fn record_failed_login(store: &EntityStore, clock: &dyn Clock, username: &str) -> RecordsResult<Option<LockStatus>> {
    let account = if username.trim().is_empty() {
        None
    } else {
        find_credential_by_username(store, username).await?
    };
    let account = match account {
        Some(account) => account,
        None => {
            tracing::info!("Failed login for unknown username.");
            return Ok(None);
        }
    };

    let failed_login_attempts = account.failed_login_attempts().saturating_add(1);
    let lock_account_until = clock.now() + lock_window(failed_login_attempts);
    let patch = Patch::new()
        .increment(FieldPath::attr(Attr::FailedLoginAttempts), 1)
        .set(FieldPath::attr(Attr::LockAccountUntil), lock_account_until)
        .map_err(patch_error)?;

    update_account(store, account.role(), account.id(), &patch).await?;

    tracing::info!(failed_login_attempts, %lock_account_until, "Account locked.");
    Ok(Some(LockStatus {
        locked: true,
        failed_login_attempts: Some(failed_login_attempts),
        lock_account_until: Some(lock_account_until),
    }))
}

/// Lockout state of `username`. A username nobody has, blank included, is reported unlocked with
/// no counters.
#[tracing::instrument(skip(store, clock))]
pub async fn is_locked(store: &EntityStore, clock: &dyn Clock, username: &str) -> RecordsResult<LockStatus> {
    if username.trim().is_empty() {
        return Ok(LockStatus::unknown());
    }
    Ok(find_credential_by_username(store, username)
        .await?
        .map(|account| LockStatus::of(&account, clock.now()))
        .unwrap_or_else(LockStatus::unknown))
}

/// Clears the failure count after a successful login. The lock instant is left alone; it is
/// already in the past by then.
#[tracing::instrument(skip(store))]
pub async fn reset_attempts(store: &EntityStore, user_id: &str, role: Role) -> RecordsResult<()> {
    let patch = Patch::new()
        .set(FieldPath::attr(Attr::FailedLoginAttempts), 0)
        .map_err(patch_error)?;

    update_account(store, role, user_id, &patch).await
}

async fn update_account(store: &EntityStore, role: Role, id: &str, patch: &Patch) -> RecordsResult<()> {
    match role {
        Role::Student => store.update::<Student>(id, patch).await,
        Role::Teacher => store.update::<Teacher>(id, patch).await,
    }
}
