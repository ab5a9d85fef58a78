//! Background removal of expired cache rows.

use std::time::Duration;

use ogshot_core::CacheDb;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Delete expired images once, logging the outcome.
pub async fn purge_once(db: &CacheDb) -> u64 {
    match db.purge_expired_images().await {
        Ok(0) => 0,
        Ok(deleted) => {
            tracing::info!(deleted, "purged expired images");
            deleted
        }
        Err(e) => {
            tracing::warn!(error = %e, "expired image purge failed");
            0
        }
    }
}

/// Run [`purge_once`] every `every`, starting immediately.
pub fn spawn(db: CacheDb, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            purge_once(&db).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_purge_once_removes_expired() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.put_image("https://wesbos.test/og?old", b"old", Duration::ZERO)
            .await
            .unwrap();
        db.put_image("https://wesbos.test/og?new", b"new", Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(purge_once(&db).await, 1);
        assert_eq!(purge_once(&db).await, 0);
        assert_eq!(db.count_images().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_spawned_sweeper_runs_first_tick() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.put_image("https://wesbos.test/og?old", b"old", Duration::ZERO)
            .await
            .unwrap();

        let handle = spawn(db.clone(), Duration::from_secs(3600));
        for _ in 0..50 {
            if db.count_images().await.unwrap() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        handle.abort();

        assert_eq!(db.count_images().await.unwrap(), 0);
    }
}
