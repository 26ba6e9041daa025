//! Plain row structs mirroring the persisted schema's tables.

/// `d_callstream_keepalive`.
#[derive(Debug, Clone)]
pub struct KeepAliveRow {
    pub log_server_no: u16,
    pub last_heartbeat: u64,
    pub timeout: u16,
    pub sw_ver: u32,
    pub sw_ver_string: String,
    pub log_server_descr: String,
}

/// `d_callstream_indicall` (point-to-point: duplex or simplex).
#[derive(Debug, Clone)]
pub struct IndiCallRow {
    pub call_id: u32,
    pub timeout: u16,
    pub call_begin: u64,
    pub seq_no_begin: u16,
    pub calling_ssi: u32,
    pub calling_mnc: u16,
    pub calling_mcc: u16,
    pub calling_esn: Option<String>,
    pub calling_descr: String,
    pub called_ssi: u32,
    pub called_mnc: u16,
    pub called_mcc: u16,
    pub called_esn: Option<String>,
    pub called_descr: String,
    pub simplex_duplex: u8,
}

/// `d_callstream_indicall_status_change`.
#[derive(Debug, Clone)]
pub struct IndiCallStatusChangeRow {
    pub call_id: u32,
    pub seq_no: u16,
    pub received_at: u64,
    pub action_id: u8,
    pub timeout: u16,
}

/// `d_callstream_indicall_ptt` and `d_callstream_groupcall_ptt` share shape.
#[derive(Debug, Clone)]
pub struct PttRow {
    pub call_id: u32,
    pub seq_no: u16,
    pub received_at: u64,
    pub talking_party: u8,
}

/// `d_callstream_voiceindicall` and `d_callstream_voicegroupcall` share shape.
#[derive(Debug, Clone)]
pub struct VoiceRow {
    pub db_id: i64,
    pub call_begin: u64,
    pub call_end: u64,
    pub voice_data_len: u64,
    pub voice_data: Vec<u8>,
    pub duration: String,
}

/// `d_callstream_groupcall`.
#[derive(Debug, Clone)]
pub struct GroupCallRow {
    pub call_id: u32,
    pub timeout: u16,
    pub call_begin: u64,
    pub seq_no_begin: u16,
    pub group_ssi: u32,
    pub group_mnc: u16,
    pub group_mcc: u16,
    pub group_esn: Option<String>,
    pub group_descr: String,
}

/// `d_callstream_groupcall_status_change`.
#[derive(Debug, Clone)]
pub struct GroupCallStatusChangeRow {
    pub call_id: u32,
    pub seq_no: u16,
    pub received_at: u64,
    pub action_id: u8,
    pub timeout: u16,
}

/// `d_callstream_sdsstatus`.
#[derive(Debug, Clone)]
pub struct SdsStatusRow {
    pub received_at: u64,
    pub calling_ssi: u32,
    pub calling_mnc: u16,
    pub calling_mcc: u16,
    pub called_ssi: u32,
    pub called_mnc: u16,
    pub called_mcc: u16,
    pub precoded_status_value: u16,
}

/// `d_callstream_sdsdata`.
#[derive(Debug, Clone)]
pub struct SdsDataRow {
    pub received_at: u64,
    pub calling_ssi: u32,
    pub calling_mnc: u16,
    pub calling_mcc: u16,
    pub called_ssi: u32,
    pub called_mnc: u16,
    pub called_mcc: u16,
    pub user_data_length: u16,
    pub user_data: String,
}
