//! Session-level advisory locks.
//!
//! The advisory lock is the fast path that keeps two instances from even
//! attempting the same tick. It is best-effort: the row lock in
//! [`job_locks`](super::job_locks) stays authoritative, so hash collisions
//! across distinct `(tenant, lock)` pairs are tolerable.

use sqlx::pool::PoolConnection;
use sqlx::Postgres;
use tracing::warn;

use super::Store;

/// Advisory lock id for a `(tenant, lock)` pair: DJB2 over
/// `"{tenant_id}:{lock}"`, truncated to 32 bits, widened to the Postgres
/// advisory-lock integer width. Every instance must derive ids the same way
/// for the locks to interoperate.
pub fn advisory_lock_id(tenant_id: &str, lock: &str) -> i64 {
    let key = format!("{tenant_id}:{lock}");
    let mut hash: u32 = 5381;
    for c in key.chars() {
        hash = hash
            .wrapping_shl(5)
            .wrapping_add(hash)
            .wrapping_add(c as u32);
    }
    i64::from(hash)
}

/// A held advisory lock, pinned to the connection that acquired it.
///
/// Advisory locks are session-scoped, so release must happen on the same
/// connection as the acquisition; the guard keeps that connection out of the
/// pool until [`release`](AdvisoryLock::release) runs. If the guard is
/// dropped without releasing, the connection is detached and closed instead
/// of being returned to the pool, which releases the lock server-side.
pub struct AdvisoryLock {
    conn: Option<PoolConnection<Postgres>>,
    lock_id: i64,
}

impl Store {
    /// Non-blocking advisory acquisition. `None` means another session holds
    /// the lock.
    pub async fn try_advisory_lock(&self, lock_id: i64) -> Result<Option<AdvisoryLock>, sqlx::Error> {
        let mut conn = self.pool().acquire().await?;
        let acquired: bool = sqlx::query_scalar("SELECT pg_try_advisory_lock($1)")
            .bind(lock_id)
            .fetch_one(&mut *conn)
            .await?;

        if acquired {
            Ok(Some(AdvisoryLock {
                conn: Some(conn),
                lock_id,
            }))
        } else {
            Ok(None)
        }
    }
}

impl AdvisoryLock {
    /// Release the lock and return the connection to the pool. Idempotent at
    /// the server: unlocking an unheld lock is a no-op warning.
    pub async fn release(mut self) {
        let Some(mut conn) = self.conn.take() else {
            return;
        };

        match sqlx::query_scalar::<_, bool>("SELECT pg_advisory_unlock($1)")
            .bind(self.lock_id)
            .fetch_one(&mut *conn)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                warn!(lock_id = self.lock_id, "advisory unlock reported lock not held");
            }
            Err(error) => {
                warn!(lock_id = self.lock_id, %error, "failed to release advisory lock");
                // The session still holds the lock; close it instead of
                // handing it back to the pool.
                drop(conn.detach());
                return;
            }
        }
    }
}

impl Drop for AdvisoryLock {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            warn!(
                lock_id = self.lock_id,
                "advisory lock dropped without release, closing its session"
            );
            drop(conn.detach());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Reference values computed with the DJB2 definition
    // (h = 5381; h = h * 33 + c), truncated to 32 bits. These must never
    // change: instances hash independently and the ids have to agree.
    #[test]
    fn djb2_known_vectors() {
        assert_eq!(advisory_lock_id("t1", "sync"), 1_540_004_289);
        assert_eq!(advisory_lock_id("", ""), i64::from(djb2(":")));
        assert_eq!(advisory_lock_id("t1", "sync"), i64::from(djb2("t1:sync")));
        assert_eq!(
            advisory_lock_id("tenant-a", "daily-report"),
            i64::from(djb2("tenant-a:daily-report"))
        );
    }

    #[test]
    fn distinct_pairs_hash_differently() {
        assert_ne!(
            advisory_lock_id("t1", "sync"),
            advisory_lock_id("t2", "sync")
        );
        assert_ne!(
            advisory_lock_id("t1", "sync"),
            advisory_lock_id("t1", "import")
        );
    }

    #[test]
    fn id_is_stable_and_non_negative() {
        let a = advisory_lock_id("t1", "sync");
        let b = advisory_lock_id("t1", "sync");
        assert_eq!(a, b);
        assert!(a >= 0);
        assert!(a <= i64::from(u32::MAX));
    }

    fn djb2(s: &str) -> u32 {
        let mut h: u32 = 5381;
        for c in s.chars() {
            h = h.wrapping_mul(33).wrapping_add(c as u32);
        }
        h
    }
}
