use crate::domain::asset::Asset;
use crate::domain::error::ErrorResponse;
use crate::domain::error::ErrorResponse::{NotFoundError, StoreFailure};
use crate::domain::upload::Upload;
use crate::repository::AssetRepository;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{FromRow, SqlitePool};
use std::str::FromStr;
use std::time::Duration;
use tracing::{error, info, instrument};

const SCHEMA: [&str; 2] = [
    "CREATE TABLE IF NOT EXISTS images (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL CONSTRAINT name_length CHECK (length(name) <= 255),
        data BLOB NOT NULL CONSTRAINT data_present CHECK (length(data) > 0),
        content_type TEXT NOT NULL CONSTRAINT content_type_length CHECK (length(content_type) BETWEEN 1 AND 100),
        created_at INTEGER NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_images_recency ON images (created_at DESC, id DESC)",
];

const LIST_SQL: &str =
    "SELECT id, name, data, content_type, created_at FROM images ORDER BY created_at DESC, id DESC";

const GET_SQL: &str = "SELECT id, name, data, content_type, created_at FROM images WHERE id = ?";

#[derive(Debug, FromRow)]
struct AssetRow {
    id: i64,
    name: String,
    data: Vec<u8>,
    content_type: String,
    created_at: i64,
}

impl TryFrom<AssetRow> for Asset {
    type Error = ErrorResponse;

    fn try_from(row: AssetRow) -> Result<Self, Self::Error> {
        Ok(Asset {
            created_at: from_micros(row.id, row.created_at)?,
            id: row.id,
            name: row.name,
            data: row.data,
            content_type: row.content_type,
        })
    }
}

fn from_micros(id: i64, micros: i64) -> Result<DateTime<Utc>, ErrorResponse> {
    DateTime::from_timestamp_micros(micros).ok_or_else(|| {
        error!("Image {id} has an unrepresentable created_at of {micros}");
        StoreFailure {
            reason: format!("corrupt created_at on image {id}"),
        }
    })
}

/// Maps a driver error onto the taxonomy. Schema CHECK violations are the
/// length and presence bounds, so they are the caller's fault.
fn store_error(operation: &str, err: sqlx::Error) -> ErrorResponse {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_check_violation() => {
            info!("Rejected {operation}: {}", db_err.message());
            ErrorResponse::validation(db_err.message().to_string())
        }
        _ => {
            error!("Store failure during {operation}: {err}");
            StoreFailure {
                reason: err.to_string(),
            }
        }
    }
}

/// SQLite-backed store. The pool is the only shared state; each operation is
/// one statement and therefore one implicit transaction.
#[derive(Debug, Clone)]
pub struct SqliteAssetRepository {
    pool: SqlitePool,
}

impl SqliteAssetRepository {
    /// Opens (creating if missing) the database at `url` and ensures the schema.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        // Every connection to `:memory:` is its own database, so keep exactly
        // one alive for the lifetime of the pool.
        let pool_options = if url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(max_connections.max(1))
        };

        let pool = pool_options.connect_with(options).await?;
        let repository = SqliteAssetRepository { pool };
        repository.migrate().await?;
        info!("Image store ready at {url}");
        Ok(repository)
    }

    async fn migrate(&self) -> Result<(), sqlx::Error> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

impl AssetRepository for SqliteAssetRepository {
    #[instrument(skip(self))]
    async fn list(&self) -> Result<Vec<Asset>, ErrorResponse> {
        let rows: Vec<AssetRow> = sqlx::query_as(LIST_SQL)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| store_error("list", e))?;
        rows.into_iter().map(Asset::try_from).collect()
    }

    #[instrument(skip(self))]
    async fn get(&self, id: i64) -> Result<Asset, ErrorResponse> {
        let row: Option<AssetRow> = sqlx::query_as(GET_SQL)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| store_error("get", e))?;
        row.ok_or(NotFoundError { id })?.try_into()
    }

    #[instrument(skip(self))]
    async fn exists(&self, id: i64) -> Result<bool, ErrorResponse> {
        let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM images WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| store_error("exists", e))?;
        Ok(found.is_some())
    }

    #[instrument(skip(self, upload), fields(name = %upload.name, bytes = upload.data.len()))]
    async fn insert(&self, upload: Upload) -> Result<Asset, ErrorResponse> {
        let created_at = Utc::now();
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO images (name, data, content_type, created_at) VALUES (?, ?, ?, ?) RETURNING id",
        )
        .bind(&upload.name)
        .bind(&upload.data)
        .bind(&upload.content_type)
        .bind(created_at.timestamp_micros())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| store_error("insert", e))?;

        info!("Stored image {id} ({} bytes)", upload.data.len());
        Ok(Asset {
            id,
            name: upload.name,
            data: upload.data,
            content_type: upload.content_type,
            // Stored precision is microseconds.
            created_at: from_micros(id, created_at.timestamp_micros())?,
        })
    }

    #[instrument(skip(self, upload), fields(name = %upload.name, bytes = upload.data.len()))]
    async fn replace(&self, id: i64, upload: Upload) -> Result<Asset, ErrorResponse> {
        let created_at: Option<i64> = sqlx::query_scalar(
            "UPDATE images SET name = ?, data = ?, content_type = ? WHERE id = ? RETURNING created_at",
        )
        .bind(&upload.name)
        .bind(&upload.data)
        .bind(&upload.content_type)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| store_error("replace", e))?;

        let created_at = created_at.ok_or(NotFoundError { id })?;
        info!("Replaced image {id} ({} bytes)", upload.data.len());
        Ok(Asset {
            id,
            name: upload.name,
            data: upload.data,
            content_type: upload.content_type,
            created_at: from_micros(id, created_at)?,
        })
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: i64) -> Result<(), ErrorResponse> {
        let result = sqlx::query("DELETE FROM images WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| store_error("delete", e))?;

        if result.rows_affected() == 0 {
            return Err(NotFoundError { id });
        }
        info!("Deleted image {id}");
        Ok(())
    }

    async fn ping(&self) -> Result<(), ErrorResponse> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(|e| store_error("ping", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::upload::MAX_UPLOAD_BYTES;

    async fn repository() -> SqliteAssetRepository {
        SqliteAssetRepository::connect("sqlite::memory:", 1)
            .await
            .unwrap()
    }

    fn upload(name: &str, data: &[u8]) -> Upload {
        Upload::new(name.to_string(), Some("image/png".to_string()), data.to_vec())
    }

    #[tokio::test]
    async fn empty_store_lists_nothing() {
        let repository = repository().await;
        assert_eq!(repository.list().await.unwrap(), Vec::new());
    }

    #[tokio::test]
    async fn insert_then_list_returns_exact_bytes() {
        let repository = repository().await;
        let payload: Vec<u8> = (0..=255u8).cycle().take(4096).collect();

        let created = repository.insert(upload("a.png", &payload)).await.unwrap();
        let listed = repository.list().await.unwrap();

        assert_eq!(listed, vec![created.clone()]);
        assert_eq!(listed[0].data, payload);
        assert_eq!(listed[0].name, "a.png");
        assert_eq!(listed[0].content_type, "image/png");
    }

    #[tokio::test]
    async fn list_is_newest_first_and_stable_under_replace() {
        let repository = repository().await;
        let first = repository.insert(upload("1.png", b"one")).await.unwrap();
        let second = repository.insert(upload("2.png", b"two")).await.unwrap();
        let third = repository.insert(upload("3.png", b"three")).await.unwrap();

        let ids = |assets: Vec<Asset>| assets.into_iter().map(|a| a.id).collect::<Vec<_>>();
        assert_eq!(ids(repository.list().await.unwrap()), vec![third.id, second.id, first.id]);

        repository.replace(second.id, upload("2b.png", b"two again")).await.unwrap();
        assert_eq!(ids(repository.list().await.unwrap()), vec![third.id, second.id, first.id]);
    }

    #[tokio::test]
    async fn equal_timestamps_break_ties_by_id() {
        let repository = repository().await;
        for name in ["a", "b", "c"] {
            sqlx::query("INSERT INTO images (name, data, content_type, created_at) VALUES (?, x'01', 'image/png', 42)")
                .bind(name)
                .execute(&repository.pool)
                .await
                .unwrap();
        }
        let names: Vec<String> = repository.list().await.unwrap().into_iter().map(|a| a.name).collect();
        assert_eq!(names, vec!["c", "b", "a"]);
    }

    #[tokio::test]
    async fn replace_keeps_identity() {
        let repository = repository().await;
        let original = repository.insert(upload("old.png", b"old")).await.unwrap();

        let replacement = Upload::new("new.jpg".into(), Some("image/jpeg".into()), b"new".to_vec());
        let replaced = repository.replace(original.id, replacement).await.unwrap();

        assert_eq!(replaced.id, original.id);
        assert_eq!(replaced.created_at, original.created_at);
        assert_eq!(replaced.name, "new.jpg");
        assert_eq!(replaced.content_type, "image/jpeg");
        assert_eq!(repository.get(original.id).await.unwrap(), replaced);
    }

    #[tokio::test]
    async fn ghost_ids_are_not_found_and_change_nothing() {
        let repository = repository().await;
        let kept = repository.insert(upload("kept.png", b"kept")).await.unwrap();

        assert_eq!(
            repository.replace(999, upload("x.png", b"x")).await,
            Err(NotFoundError { id: 999 })
        );
        assert_eq!(repository.delete(999).await, Err(NotFoundError { id: 999 }));
        assert_eq!(repository.get(999).await, Err(NotFoundError { id: 999 }));
        assert_eq!(repository.list().await.unwrap(), vec![kept]);
    }

    #[tokio::test]
    async fn delete_is_irreversible_and_ids_are_not_reused() {
        let repository = repository().await;
        let doomed = repository.insert(upload("doomed.png", b"bye")).await.unwrap();

        repository.delete(doomed.id).await.unwrap();

        assert!(repository.list().await.unwrap().is_empty());
        assert_eq!(repository.delete(doomed.id).await, Err(NotFoundError { id: doomed.id }));
        assert_eq!(
            repository.replace(doomed.id, upload("back.png", b"back")).await,
            Err(NotFoundError { id: doomed.id })
        );

        let next = repository.insert(upload("next.png", b"next")).await.unwrap();
        assert!(next.id > doomed.id);
    }

    #[tokio::test]
    async fn schema_bounds_surface_as_validation_errors() {
        let repository = repository().await;

        let long_name = "n".repeat(256);
        let result = repository.insert(upload(&long_name, b"data")).await;
        assert!(matches!(result, Err(ErrorResponse::ValidationError { .. })));

        let long_type = Upload::new("a.png".into(), Some("t".repeat(101)), b"data".to_vec());
        let result = repository.insert(long_type).await;
        assert!(matches!(result, Err(ErrorResponse::ValidationError { .. })));

        let exact = Upload::new("n".repeat(255), Some("t".repeat(100)), b"data".to_vec());
        assert!(repository.insert(exact).await.is_ok());
        assert_eq!(repository.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn largest_payload_round_trips() {
        let repository = repository().await;
        let payload = vec![0xab; MAX_UPLOAD_BYTES];
        let created = repository.insert(upload("max.bin", &payload)).await.unwrap();
        assert_eq!(repository.get(created.id).await.unwrap().data, payload);
    }

    #[tokio::test]
    async fn concurrent_inserts_get_distinct_ids_and_own_bytes() {
        let repository = std::sync::Arc::new(repository().await);
        let handles: Vec<_> = (0..16u8)
            .map(|i| {
                let repository = repository.clone();
                tokio::spawn(async move {
                    repository
                        .insert(upload(&format!("{i}.png"), &[i; 64]))
                        .await
                        .unwrap()
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        let listed = repository.list().await.unwrap();
        let mut ids: Vec<i64> = listed.iter().map(|a| a.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 16);
        for asset in listed {
            let i: u8 = asset.name.trim_end_matches(".png").parse().unwrap();
            assert_eq!(asset.data, vec![i; 64]);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn replace_racing_delete_never_resurrects() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("race.db").display());
        let repository = std::sync::Arc::new(SqliteAssetRepository::connect(&url, 4).await.unwrap());

        for round in 0..50u8 {
            let id = repository.insert(upload("target.png", &[round; 32])).await.unwrap().id;

            let replacer = {
                let repository = repository.clone();
                tokio::spawn(async move {
                    repository
                        .replace(id, upload("replaced.png", b"replaced"))
                        .await
                })
            };
            let deleter = {
                let repository = repository.clone();
                tokio::spawn(async move { repository.delete(id).await })
            };

            let replaced = replacer.await.unwrap();
            let deleted = deleter.await.unwrap();

            match replaced {
                Ok(asset) => assert_eq!(asset.id, id),
                Err(e) => assert_eq!(e, NotFoundError { id }),
            }
            assert_eq!(deleted, Ok(()));
            assert!(repository.list().await.unwrap().iter().all(|a| a.id != id));
            assert_eq!(repository.exists(id).await, Ok(false));
        }
        repository.close().await;
    }

    #[tokio::test]
    async fn exists_tracks_the_lifecycle() {
        let repository = repository().await;
        assert_eq!(repository.exists(1).await, Ok(false));
        let created = repository.insert(upload("a.png", b"a")).await.unwrap();
        assert_eq!(repository.exists(created.id).await, Ok(true));
        repository.delete(created.id).await.unwrap();
        assert_eq!(repository.exists(created.id).await, Ok(false));
    }

    #[tokio::test]
    async fn ping_succeeds_on_open_pool() {
        assert_eq!(repository().await.ping().await, Ok(()));
    }
}
