//! PostgreSQL-backed [`Storage`] implementation.

use async_trait::async_trait;
use deadpool_postgres::{Config as PoolConfig, Pool, Runtime};
use tokio_postgres::NoTls;

use crate::error::AppError;
use crate::error::AppResult;

use super::rows::{
    GroupCallRow, GroupCallStatusChangeRow, IndiCallRow, IndiCallStatusChangeRow, KeepAliveRow,
    PttRow, SdsDataRow, SdsStatusRow, VoiceRow,
};
use super::Storage;

/// A connection-pooled Postgres storage backend.
pub struct PostgresStorage {
    pool: Pool,
}

impl PostgresStorage {
    /// Builds a pool from a `postgres://` connection string (the
    /// `persistence_manager.pg_conn_info` configuration value).
    pub fn connect(conn_info: &str) -> AppResult<Self> {
        let mut cfg = PoolConfig::new();
        cfg.url = Some(conn_info.to_string());
        let pool = cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| AppError::Config(format!("invalid pg_conn_info: {e}")))?;
        Ok(Self { pool })
    }

    async fn client(&self) -> AppResult<deadpool_postgres::Client> {
        self.pool.get().await.map_err(AppError::from)
    }
}

#[async_trait]
impl Storage for PostgresStorage {
    async fn upsert_keepalive(&self, row: KeepAliveRow) -> AppResult<()> {
        let client = self.client().await?;
        client
            .execute(
                "INSERT INTO d_callstream_keepalive \
                 (log_server_no, last_heartbeat, timeout, sw_ver, sw_ver_string, log_server_descr) \
                 VALUES ($1, to_timestamp($2), $3, $4, $5, $6) \
                 ON CONFLICT (log_server_no) DO UPDATE SET \
                 last_heartbeat = EXCLUDED.last_heartbeat, timeout = EXCLUDED.timeout, \
                 sw_ver = EXCLUDED.sw_ver, sw_ver_string = EXCLUDED.sw_ver_string, \
                 log_server_descr = EXCLUDED.log_server_descr",
                &[
                    &i32::from(row.log_server_no),
                    &(row.last_heartbeat as f64),
                    &i32::from(row.timeout),
                    &(row.sw_ver as i64),
                    &row.sw_ver_string,
                    &row.log_server_descr,
                ],
            )
            .await?;
        Ok(())
    }

    async fn insert_indicall(&self, row: IndiCallRow) -> AppResult<i64> {
        let client = self.client().await?;
        let record = client
            .query_one(
                "INSERT INTO d_callstream_indicall \
                 (call_id, timeout, call_begin, seq_no_begin, \
                  calling_ssi, calling_mnc, calling_mcc, calling_esn, calling_descr, \
                  called_ssi, called_mnc, called_mcc, called_esn, called_descr, simplex_duplex) \
                 VALUES ($1, $2, to_timestamp($3), $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15) \
                 RETURNING db_id",
                &[
                    &(row.call_id as i64),
                    &i32::from(row.timeout),
                    &(row.call_begin as f64),
                    &i32::from(row.seq_no_begin),
                    &(row.calling_ssi as i64),
                    &i32::from(row.calling_mnc),
                    &i32::from(row.calling_mcc),
                    &row.calling_esn,
                    &row.calling_descr,
                    &(row.called_ssi as i64),
                    &i32::from(row.called_mnc),
                    &i32::from(row.called_mcc),
                    &row.called_esn,
                    &row.called_descr,
                    &i32::from(row.simplex_duplex),
                ],
            )
            .await?;
        Ok(record.get::<_, i64>("db_id"))
    }

    async fn finalize_indicall(&self, db_id: i64, call_end: u64, disconnect_cause: &str) -> AppResult<()> {
        let client = self.client().await?;
        client
            .execute(
                "UPDATE d_callstream_indicall SET call_end = to_timestamp($2), disconnect_cause = $3 \
                 WHERE db_id = $1",
                &[&db_id, &(call_end as f64), &disconnect_cause],
            )
            .await?;
        Ok(())
    }

    async fn insert_indicall_status_change(&self, row: IndiCallStatusChangeRow) -> AppResult<()> {
        let client = self.client().await?;
        client
            .execute(
                "INSERT INTO d_callstream_indicall_status_change \
                 (call_id, seq_no, received_at, action_id, timeout) \
                 VALUES ($1, $2, to_timestamp($3), $4, $5)",
                &[
                    &(row.call_id as i64),
                    &i32::from(row.seq_no),
                    &(row.received_at as f64),
                    &i32::from(row.action_id),
                    &i32::from(row.timeout),
                ],
            )
            .await?;
        Ok(())
    }

    async fn insert_indicall_ptt(&self, row: PttRow) -> AppResult<()> {
        let client = self.client().await?;
        client
            .execute(
                "INSERT INTO d_callstream_indicall_ptt (call_id, seq_no, received_at, talking_party) \
                 VALUES ($1, $2, to_timestamp($3), $4)",
                &[
                    &(row.call_id as i64),
                    &i32::from(row.seq_no),
                    &(row.received_at as f64),
                    &i32::from(row.talking_party),
                ],
            )
            .await?;
        Ok(())
    }

    async fn insert_voiceindicall(&self, row: VoiceRow) -> AppResult<()> {
        let client = self.client().await?;
        client
            .execute(
                "INSERT INTO d_callstream_voiceindicall \
                 (db_id, call_begin, call_end, voice_data_len, voice_data, duration) \
                 VALUES ($1, to_timestamp($2), to_timestamp($3), $4, $5, $6::interval)",
                &[
                    &row.db_id,
                    &(row.call_begin as f64),
                    &(row.call_end as f64),
                    &(row.voice_data_len as i64),
                    &row.voice_data,
                    &row.duration,
                ],
            )
            .await?;
        Ok(())
    }

    async fn fetch_voiceindicall(&self, db_id: i64) -> AppResult<Option<Vec<u8>>> {
        let client = self.client().await?;
        let rows = client
            .query(
                "SELECT voice_data FROM d_callstream_voiceindicall WHERE db_id = $1",
                &[&db_id],
            )
            .await?;
        Ok(rows.first().map(|r| r.get::<_, Vec<u8>>("voice_data")))
    }

    async fn insert_groupcall(&self, row: GroupCallRow) -> AppResult<i64> {
        let client = self.client().await?;
        let record = client
            .query_one(
                "INSERT INTO d_callstream_groupcall \
                 (call_id, timeout, call_begin, seq_no_begin, \
                  group_ssi, group_mnc, group_mcc, group_esn, group_descr) \
                 VALUES ($1, $2, to_timestamp($3), $4, $5, $6, $7, $8, $9) \
                 RETURNING db_id",
                &[
                    &(row.call_id as i64),
                    &i32::from(row.timeout),
                    &(row.call_begin as f64),
                    &i32::from(row.seq_no_begin),
                    &(row.group_ssi as i64),
                    &i32::from(row.group_mnc),
                    &i32::from(row.group_mcc),
                    &row.group_esn,
                    &row.group_descr,
                ],
            )
            .await?;
        Ok(record.get::<_, i64>("db_id"))
    }

    async fn finalize_groupcall(&self, db_id: i64, call_end: u64, disconnect_cause: &str) -> AppResult<()> {
        let client = self.client().await?;
        client
            .execute(
                "UPDATE d_callstream_groupcall SET call_end = to_timestamp($2), disconnect_cause = $3 \
                 WHERE db_id = $1",
                &[&db_id, &(call_end as f64), &disconnect_cause],
            )
            .await?;
        Ok(())
    }

    async fn insert_groupcall_status_change(&self, row: GroupCallStatusChangeRow) -> AppResult<()> {
        let client = self.client().await?;
        client
            .execute(
                "INSERT INTO d_callstream_groupcall_status_change \
                 (call_id, seq_no, received_at, action_id, timeout) \
                 VALUES ($1, $2, to_timestamp($3), $4, $5)",
                &[
                    &(row.call_id as i64),
                    &i32::from(row.seq_no),
                    &(row.received_at as f64),
                    &i32::from(row.action_id),
                    &i32::from(row.timeout),
                ],
            )
            .await?;
        Ok(())
    }

    async fn insert_groupcall_ptt(&self, row: PttRow) -> AppResult<()> {
        let client = self.client().await?;
        client
            .execute(
                "INSERT INTO d_callstream_groupcall_ptt (call_id, seq_no, received_at, talking_party) \
                 VALUES ($1, $2, to_timestamp($3), $4)",
                &[
                    &(row.call_id as i64),
                    &i32::from(row.seq_no),
                    &(row.received_at as f64),
                    &i32::from(row.talking_party),
                ],
            )
            .await?;
        Ok(())
    }

    async fn insert_voicegroupcall(&self, row: VoiceRow) -> AppResult<()> {
        let client = self.client().await?;
        client
            .execute(
                "INSERT INTO d_callstream_voicegroupcall \
                 (db_id, call_begin, call_end, voice_data_len, voice_data, duration) \
                 VALUES ($1, to_timestamp($2), to_timestamp($3), $4, $5, $6::interval)",
                &[
                    &row.db_id,
                    &(row.call_begin as f64),
                    &(row.call_end as f64),
                    &(row.voice_data_len as i64),
                    &row.voice_data,
                    &row.duration,
                ],
            )
            .await?;
        Ok(())
    }

    async fn fetch_voicegroupcall(&self, db_id: i64) -> AppResult<Option<Vec<u8>>> {
        let client = self.client().await?;
        let rows = client
            .query(
                "SELECT voice_data FROM d_callstream_voicegroupcall WHERE db_id = $1",
                &[&db_id],
            )
            .await?;
        Ok(rows.first().map(|r| r.get::<_, Vec<u8>>("voice_data")))
    }

    async fn insert_sdsstatus(&self, row: SdsStatusRow) -> AppResult<()> {
        let client = self.client().await?;
        client
            .execute(
                "INSERT INTO d_callstream_sdsstatus \
                 (received_at, calling_ssi, calling_mnc, calling_mcc, called_ssi, called_mnc, called_mcc, precoded_status_value) \
                 VALUES (to_timestamp($1), $2, $3, $4, $5, $6, $7, $8)",
                &[
                    &(row.received_at as f64),
                    &(row.calling_ssi as i64),
                    &i32::from(row.calling_mnc),
                    &i32::from(row.calling_mcc),
                    &(row.called_ssi as i64),
                    &i32::from(row.called_mnc),
                    &i32::from(row.called_mcc),
                    &i32::from(row.precoded_status_value),
                ],
            )
            .await?;
        Ok(())
    }

    async fn insert_sdsdata(&self, row: SdsDataRow) -> AppResult<()> {
        let client = self.client().await?;
        client
            .execute(
                "INSERT INTO d_callstream_sdsdata \
                 (received_at, calling_ssi, calling_mnc, calling_mcc, called_ssi, called_mnc, called_mcc, \
                  user_data_length, user_data) \
                 VALUES (to_timestamp($1), $2, $3, $4, $5, $6, $7, $8, $9)",
                &[
                    &(row.received_at as f64),
                    &(row.calling_ssi as i64),
                    &i32::from(row.calling_mnc),
                    &i32::from(row.calling_mcc),
                    &(row.called_ssi as i64),
                    &i32::from(row.called_mnc),
                    &i32::from(row.called_mcc),
                    &i32::from(row.user_data_length),
                    &row.user_data,
                ],
            )
            .await?;
        Ok(())
    }
}
