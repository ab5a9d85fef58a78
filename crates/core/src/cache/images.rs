//! Image entry operations.
//!
//! Each row maps an exact URL string to the PNG bytes captured from it.
//! Rows past their `expires_at` are invisible to reads and are removed by
//! [`CacheDb::purge_expired_images`].

use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

use super::connection::CacheDb;
use super::hash::content_etag;
use crate::Error;

/// A cached image with its metadata.
#[derive(Debug, Clone)]
pub struct CachedImage {
    pub key: String,
    pub bytes: Bytes,
    pub etag: String,
    pub created_at: String,
    pub expires_at: String,
}

impl CachedImage {
    /// A new entry for `bytes`, created now and expiring after `ttl`.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if `ttl` does not fit in a timestamp.
    pub fn fresh(key: &str, bytes: Bytes, ttl: Duration) -> Result<Self, Error> {
        let now = Utc::now();
        Ok(Self {
            key: key.to_string(),
            etag: content_etag(&bytes),
            created_at: timestamp(now),
            expires_at: timestamp(expiry_after(now, ttl)?),
            bytes,
        })
    }

    /// Time left before the entry expires, zero once it has.
    ///
    /// An unparseable `expires_at` counts as already expired.
    pub fn remaining_ttl(&self) -> Duration {
        self.remaining_ttl_at(Utc::now())
    }

    fn remaining_ttl_at(&self, now: DateTime<Utc>) -> Duration {
        DateTime::parse_from_rfc3339(&self.expires_at)
            .ok()
            .and_then(|expires| (expires.with_timezone(&Utc) - now).to_std().ok())
            .unwrap_or(Duration::ZERO)
    }
}

/// Format a timestamp the way every row stores it.
///
/// Fixed-width RFC 3339 in UTC, so string comparison in SQL orders the same
/// way as time does.
pub(crate) fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn expiry_after(now: DateTime<Utc>, ttl: Duration) -> Result<DateTime<Utc>, Error> {
    TimeDelta::from_std(ttl)
        .ok()
        .and_then(|delta| now.checked_add_signed(delta))
        .ok_or_else(|| Error::InvalidInput(format!("ttl of {}s is out of range", ttl.as_secs())))
}

impl CacheDb {
    /// Insert or overwrite the image stored under `key`.
    ///
    /// The expiration is `ttl` from now; an existing row gets a fresh one.
    pub async fn put_image(&self, key: &str, bytes: &[u8], ttl: Duration) -> Result<(), Error> {
        let image = CachedImage::fresh(key, Bytes::copy_from_slice(bytes), ttl)?;
        self.insert_image(image).await
    }

    /// Insert or overwrite a prepared entry, keeping its timestamps and etag.
    pub async fn insert_image(&self, image: CachedImage) -> Result<(), Error> {
        let CachedImage { key, bytes, etag, created_at, expires_at } = image;
        let bytes = bytes.to_vec();

        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO og_images (key, bytes, byte_len, etag, created_at, expires_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                     ON CONFLICT(key) DO UPDATE SET
                        bytes = excluded.bytes,
                        byte_len = excluded.byte_len,
                        etag = excluded.etag,
                        created_at = excluded.created_at,
                        expires_at = excluded.expires_at",
                    params![&key, &bytes, bytes.len() as i64, &etag, &created_at, &expires_at],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Get an unexpired image by exact key.
    ///
    /// Returns None if the key doesn't exist or its entry has expired.
    pub async fn get_image(&self, key: &str) -> Result<Option<CachedImage>, Error> {
        let key = key.to_string();
        let now = timestamp(Utc::now());
        self.conn
            .call(move |conn| -> Result<Option<CachedImage>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT key, bytes, etag, created_at, expires_at
                     FROM og_images WHERE key = ?1 AND expires_at > ?2",
                )?;

                let result = stmt.query_row(params![key, now], |row| {
                    Ok(CachedImage {
                        key: row.get(0)?,
                        bytes: Bytes::from(row.get::<_, Vec<u8>>(1)?),
                        etag: row.get(2)?,
                        created_at: row.get(3)?,
                        expires_at: row.get(4)?,
                    })
                });

                match result {
                    Ok(image) => Ok(Some(image)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Delete expired images.
    ///
    /// Returns the number of deleted entries.
    pub async fn purge_expired_images(&self) -> Result<u64, Error> {
        let now = timestamp(Utc::now());
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count = conn.execute("DELETE FROM og_images WHERE expires_at <= ?1", params![now])?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Count stored rows, expired or not.
    pub async fn count_images(&self) -> Result<u64, Error> {
        self.conn
            .call(|conn| -> Result<u64, Error> {
                let count: i64 = conn.query_row("SELECT COUNT(*) FROM og_images", [], |row| row.get(0))?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const THIRTY_DAYS: Duration = Duration::from_secs(2_592_000);

    #[tokio::test]
    async fn test_put_and_get() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.put_image("https://site.test/og?title=Hello", b"png-1", THIRTY_DAYS)
            .await
            .unwrap();

        let image = db.get_image("https://site.test/og?title=Hello").await.unwrap().unwrap();
        assert_eq!(image.key, "https://site.test/og?title=Hello");
        assert_eq!(&image.bytes[..], b"png-1");
        assert_eq!(image.etag, content_etag(b"png-1"));
        assert!(image.expires_at > image.created_at);
    }

    #[tokio::test]
    async fn test_get_missing() {
        let db = CacheDb::open_in_memory().await.unwrap();
        assert!(db.get_image("https://site.test/og?").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let key = "https://site.test/og?title=Hello";
        db.put_image(key, b"old", THIRTY_DAYS).await.unwrap();
        db.put_image(key, b"new", THIRTY_DAYS).await.unwrap();

        let image = db.get_image(key).await.unwrap().unwrap();
        assert_eq!(&image.bytes[..], b"new");
        assert_eq!(db.count_images().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_keys_are_exact_strings() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.put_image("https://site.test/og?a=1&b=2", b"ab", THIRTY_DAYS)
            .await
            .unwrap();

        assert!(db.get_image("https://site.test/og?b=2&a=1").await.unwrap().is_none());
        assert!(db.get_image("https://site.test/og?a=1&b=2").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_expired_entry_is_a_miss() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.put_image("https://site.test/og?x=1", b"stale", Duration::ZERO)
            .await
            .unwrap();

        assert!(db.get_image("https://site.test/og?x=1").await.unwrap().is_none());
        assert_eq!(db.count_images().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_purge_expired_keeps_fresh() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.put_image("https://site.test/og?x=1", b"stale", Duration::ZERO)
            .await
            .unwrap();
        db.put_image("https://site.test/og?x=2", b"fresh", THIRTY_DAYS)
            .await
            .unwrap();

        let deleted = db.purge_expired_images().await.unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(db.count_images().await.unwrap(), 1);
        assert!(db.get_image("https://site.test/og?x=2").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_ttl_out_of_range() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let result = db.put_image("k", b"v", Duration::from_secs(u64::MAX)).await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_fresh_entry_metadata() {
        let image = CachedImage::fresh("k", Bytes::from_static(b"png"), THIRTY_DAYS).unwrap();
        assert_eq!(image.etag, content_etag(b"png"));
        assert!(image.expires_at > image.created_at);

        let left = image.remaining_ttl();
        assert!(left <= THIRTY_DAYS);
        assert!(left > THIRTY_DAYS - Duration::from_secs(60));
    }

    #[test]
    fn test_remaining_ttl_counts_down() {
        let mut image = CachedImage::fresh("k", Bytes::from_static(b"png"), THIRTY_DAYS).unwrap();
        image.expires_at = "2026-01-02T00:00:00.000Z".into();

        let now = DateTime::parse_from_rfc3339("2026-01-01T23:00:00Z").unwrap().with_timezone(&Utc);
        assert_eq!(image.remaining_ttl_at(now), Duration::from_secs(3_600));

        let later = DateTime::parse_from_rfc3339("2026-01-03T00:00:00Z").unwrap().with_timezone(&Utc);
        assert_eq!(image.remaining_ttl_at(later), Duration::ZERO);

        image.expires_at = "garbage".into();
        assert_eq!(image.remaining_ttl_at(now), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_stored_etag_and_expiry_round_trip() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let written = CachedImage::fresh("https://site.test/og?x=1", Bytes::from_static(b"png"), THIRTY_DAYS).unwrap();
        db.insert_image(written.clone()).await.unwrap();

        let read = db.get_image("https://site.test/og?x=1").await.unwrap().unwrap();
        assert_eq!(read.etag, written.etag);
        assert_eq!(read.created_at, written.created_at);
        assert_eq!(read.expires_at, written.expires_at);
    }

    #[test]
    fn test_timestamp_format_is_fixed_width() {
        let at = DateTime::parse_from_rfc3339("2026-01-02T03:04:05Z").unwrap().with_timezone(&Utc);
        assert_eq!(timestamp(at), "2026-01-02T03:04:05.000Z");
    }
}
