#[cfg(feature = "http-directory")]
pub mod http;
pub mod memory;

use crate::dao::storage::StorageResult;
use futures::future::BoxFuture;

/// Abstraction over the session-content service.
///
/// The sync engine only reads the ordered drill list of a session and relays completion
/// and note writes; durable persistence of those writes is the directory's concern.
pub trait SessionDirectory: Send + Sync {
    /// Ordered drill identifiers of a session, or `None` when the session does not exist.
    fn drill_order(&self, session_id: String)
    -> BoxFuture<'static, StorageResult<Option<Vec<String>>>>;
    /// Persist the completion flag of a drill (last write wins).
    fn record_completion(
        &self,
        session_id: String,
        drill_id: String,
        completed: bool,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Persist the coach note of a drill (last write wins).
    fn record_note(
        &self,
        session_id: String,
        drill_id: String,
        text: String,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Cheap reachability probe.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
}
