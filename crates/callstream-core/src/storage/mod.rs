//! Persistence trait abstraction for the call-stream relational store.
//!
//! Services depend on [`Storage`] rather than a concrete backend, so the
//! Persister and Media Router can be exercised in tests against
//! [`MemoryStorage`] without a running database.

mod memory;
mod postgres;
mod rows;

pub use memory::MemoryStorage;
pub use postgres::PostgresStorage;
pub use rows::{
    GroupCallRow, GroupCallStatusChangeRow, IndiCallRow, IndiCallStatusChangeRow, KeepAliveRow,
    PttRow, SdsDataRow, SdsStatusRow, VoiceRow,
};

use async_trait::async_trait;

use crate::error::AppResult;

/// Persistence operations required by the Persister and Media Router.
///
/// Each method corresponds to exactly one of the tables named in the
/// external interface: keep-alives upsert by server id, call rows split
/// insert-on-setup / update-on-subsequent-change, and voice blobs are
/// written once at finalization.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Upserts a keep-alive row by `log_server_no`.
    async fn upsert_keepalive(&self, row: KeepAliveRow) -> AppResult<()>;

    /// Inserts a new point-to-point call row (duplex or simplex), returning
    /// the assigned database id.
    async fn insert_indicall(&self, row: IndiCallRow) -> AppResult<i64>;

    /// Updates a point-to-point call row at release time (end time, cause).
    async fn finalize_indicall(&self, db_id: i64, call_end: u64, disconnect_cause: &str) -> AppResult<()>;

    /// Appends a status-change audit row for a point-to-point call.
    async fn insert_indicall_status_change(&self, row: IndiCallStatusChangeRow) -> AppResult<()>;

    /// Appends a PTT audit row for a point-to-point call.
    async fn insert_indicall_ptt(&self, row: PttRow) -> AppResult<()>;

    /// Writes the finalized voice blob for a point-to-point call.
    async fn insert_voiceindicall(&self, row: VoiceRow) -> AppResult<()>;

    /// Reads back a previously persisted point-to-point voice blob.
    async fn fetch_voiceindicall(&self, db_id: i64) -> AppResult<Option<Vec<u8>>>;

    /// Inserts a new group call row, returning the assigned database id.
    async fn insert_groupcall(&self, row: GroupCallRow) -> AppResult<i64>;

    /// Updates a group call row at release time.
    async fn finalize_groupcall(&self, db_id: i64, call_end: u64, disconnect_cause: &str) -> AppResult<()>;

    /// Appends a status-change audit row for a group call.
    async fn insert_groupcall_status_change(&self, row: GroupCallStatusChangeRow) -> AppResult<()>;

    /// Appends a PTT audit row for a group call.
    async fn insert_groupcall_ptt(&self, row: PttRow) -> AppResult<()>;

    /// Writes the finalized voice blob for a group call.
    async fn insert_voicegroupcall(&self, row: VoiceRow) -> AppResult<()>;

    /// Reads back a previously persisted group-call voice blob.
    async fn fetch_voicegroupcall(&self, db_id: i64) -> AppResult<Option<Vec<u8>>>;

    /// Appends an SDS status-message row.
    async fn insert_sdsstatus(&self, row: SdsStatusRow) -> AppResult<()>;

    /// Appends an SDS text-message row.
    async fn insert_sdsdata(&self, row: SdsDataRow) -> AppResult<()>;
}
