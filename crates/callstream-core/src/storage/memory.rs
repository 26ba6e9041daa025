//! An in-memory [`Storage`] implementation, used by worker tests so they
//! don't need a running database.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicI64, Ordering};

use crate::error::AppResult;

use super::rows::{
    GroupCallRow, GroupCallStatusChangeRow, IndiCallRow, IndiCallStatusChangeRow, KeepAliveRow,
    PttRow, SdsDataRow, SdsStatusRow, VoiceRow,
};
use super::Storage;

#[derive(Debug, Clone)]
pub struct FinalizedCall {
    call_end: Option<u64>,
    disconnect_cause: Option<String>,
}

/// Thread-safe in-memory storage, suitable for unit and integration tests.
#[derive(Default)]
pub struct MemoryStorage {
    next_id: AtomicI64,
    pub keepalives: DashMap<u16, KeepAliveRow>,
    pub indicalls: DashMap<i64, IndiCallRow>,
    pub indicall_finalized: DashMap<i64, FinalizedCall>,
    pub indicall_status_changes: DashMap<i64, Vec<IndiCallStatusChangeRow>>,
    pub indicall_ptts: DashMap<i64, Vec<PttRow>>,
    pub voiceindicalls: DashMap<i64, VoiceRow>,
    pub groupcalls: DashMap<i64, GroupCallRow>,
    pub groupcall_finalized: DashMap<i64, FinalizedCall>,
    pub groupcall_status_changes: DashMap<i64, Vec<GroupCallStatusChangeRow>>,
    pub groupcall_ptts: DashMap<i64, Vec<PttRow>>,
    pub voicegroupcalls: DashMap<i64, VoiceRow>,
    pub sdsstatuses: DashMap<u64, SdsStatusRow>,
    pub sdsdatas: DashMap<u64, SdsDataRow>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn upsert_keepalive(&self, row: KeepAliveRow) -> AppResult<()> {
        self.keepalives.insert(row.log_server_no, row);
        Ok(())
    }

    async fn insert_indicall(&self, row: IndiCallRow) -> AppResult<i64> {
        let id = self.allocate_id();
        self.indicalls.insert(id, row);
        Ok(id)
    }

    async fn finalize_indicall(&self, db_id: i64, call_end: u64, disconnect_cause: &str) -> AppResult<()> {
        self.indicall_finalized.insert(
            db_id,
            FinalizedCall {
                call_end: Some(call_end),
                disconnect_cause: Some(disconnect_cause.to_string()),
            },
        );
        Ok(())
    }

    async fn insert_indicall_status_change(&self, row: IndiCallStatusChangeRow) -> AppResult<()> {
        self.indicall_status_changes
            .entry(row.call_id as i64)
            .or_default()
            .push(row);
        Ok(())
    }

    async fn insert_indicall_ptt(&self, row: PttRow) -> AppResult<()> {
        self.indicall_ptts
            .entry(row.call_id as i64)
            .or_default()
            .push(row);
        Ok(())
    }

    async fn insert_voiceindicall(&self, row: VoiceRow) -> AppResult<()> {
        self.voiceindicalls.insert(row.db_id, row);
        Ok(())
    }

    async fn fetch_voiceindicall(&self, db_id: i64) -> AppResult<Option<Vec<u8>>> {
        Ok(self
            .voiceindicalls
            .get(&db_id)
            .map(|row| row.voice_data.clone()))
    }

    async fn insert_groupcall(&self, row: GroupCallRow) -> AppResult<i64> {
        let id = self.allocate_id();
        self.groupcalls.insert(id, row);
        Ok(id)
    }

    async fn finalize_groupcall(&self, db_id: i64, call_end: u64, disconnect_cause: &str) -> AppResult<()> {
        self.groupcall_finalized.insert(
            db_id,
            FinalizedCall {
                call_end: Some(call_end),
                disconnect_cause: Some(disconnect_cause.to_string()),
            },
        );
        Ok(())
    }

    async fn insert_groupcall_status_change(&self, row: GroupCallStatusChangeRow) -> AppResult<()> {
        self.groupcall_status_changes
            .entry(row.call_id as i64)
            .or_default()
            .push(row);
        Ok(())
    }

    async fn insert_groupcall_ptt(&self, row: PttRow) -> AppResult<()> {
        self.groupcall_ptts
            .entry(row.call_id as i64)
            .or_default()
            .push(row);
        Ok(())
    }

    async fn insert_voicegroupcall(&self, row: VoiceRow) -> AppResult<()> {
        self.voicegroupcalls.insert(row.db_id, row);
        Ok(())
    }

    async fn fetch_voicegroupcall(&self, db_id: i64) -> AppResult<Option<Vec<u8>>> {
        Ok(self
            .voicegroupcalls
            .get(&db_id)
            .map(|row| row.voice_data.clone()))
    }

    async fn insert_sdsstatus(&self, row: SdsStatusRow) -> AppResult<()> {
        self.sdsstatuses.insert(row.received_at, row);
        Ok(())
    }

    async fn insert_sdsdata(&self, row: SdsDataRow) -> AppResult<()> {
        self.sdsdatas.insert(row.received_at, row);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_indicall(call_id: u32) -> IndiCallRow {
        IndiCallRow {
            call_id,
            timeout: 30,
            call_begin: 1000,
            seq_no_begin: 1,
            calling_ssi: 1,
            calling_mnc: 1,
            calling_mcc: 901,
            calling_esn: None,
            calling_descr: "a".into(),
            called_ssi: 2,
            called_mnc: 1,
            called_mcc: 901,
            called_esn: None,
            called_descr: "b".into(),
            simplex_duplex: 0,
        }
    }

    #[tokio::test]
    async fn insert_and_finalize_indicall_round_trips() {
        let storage = MemoryStorage::new();
        let id = storage.insert_indicall(sample_indicall(100)).await.unwrap();
        storage.finalize_indicall(id, 2000, "Normal").await.unwrap();
        assert!(storage.indicall_finalized.contains_key(&id));
    }

    #[tokio::test]
    async fn voice_blob_is_retrievable_after_insert() {
        let storage = MemoryStorage::new();
        let row = VoiceRow {
            db_id: 1,
            call_begin: 0,
            call_end: 10,
            voice_data_len: 3,
            voice_data: vec![1, 2, 3],
            duration: "0:00:10.000".into(),
        };
        storage.insert_voiceindicall(row).await.unwrap();
        let fetched = storage.fetch_voiceindicall(1).await.unwrap();
        assert_eq!(fetched, Some(vec![1, 2, 3]));
    }

    #[tokio::test]
    async fn unknown_voice_blob_is_none() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.fetch_voiceindicall(999).await.unwrap(), None);
    }
}
