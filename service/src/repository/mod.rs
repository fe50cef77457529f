use crate::domain::asset::Asset;
use crate::domain::error::ErrorResponse;
use crate::domain::upload::Upload;
use std::future::Future;

pub mod sqlite_repository;

/// Durable storage for assets. Every method is a single atomic statement
/// against the store; implementations must not hold an application-wide lock.
pub trait AssetRepository: Send + Sync + 'static {
    /// All assets, newest `created_at` first, ties broken by highest id.
    fn list(&self) -> impl Future<Output = Result<Vec<Asset>, ErrorResponse>> + Send;

    fn get(&self, id: i64) -> impl Future<Output = Result<Asset, ErrorResponse>> + Send;

    /// Whether `id` is currently stored, without loading its bytes.
    fn exists(&self, id: i64) -> impl Future<Output = Result<bool, ErrorResponse>> + Send;

    /// Persists a new asset under a freshly issued, never reused id.
    fn insert(&self, upload: Upload) -> impl Future<Output = Result<Asset, ErrorResponse>> + Send;

    /// Overwrites name, data and content type in place. `id` and `created_at`
    /// are untouched; a missing row is `NotFoundError`, never an insert.
    fn replace(
        &self,
        id: i64,
        upload: Upload,
    ) -> impl Future<Output = Result<Asset, ErrorResponse>> + Send;

    fn delete(&self, id: i64) -> impl Future<Output = Result<(), ErrorResponse>> + Send;

    /// Cheap round trip used by the status endpoint.
    fn ping(&self) -> impl Future<Output = Result<(), ErrorResponse>> + Send;
}
