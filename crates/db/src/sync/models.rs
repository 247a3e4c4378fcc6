use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use adsync_common::error::{AdsyncError, AdsyncResult};

/// The resumable position of one sync run, serialized as an opaque blob in
/// `sync_state.cursor_value` and round-tripped verbatim between runs.
///
/// Account ids are numeric strings; all resume comparisons parse them as
/// integers. Absent fields are omitted from the serialized form so the
/// terminal checkpoint (`iterative_sync_cursor` only) clears the granular
/// cursors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCursor {
    /// Sub-manager account currently being processed, or next to resume from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submanager_cursor: Option<String>,

    /// Managed account currently being processed within that sub-manager;
    /// absent when resuming at a fresh sub-manager.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub managed_account_cursor: Option<String>,

    /// Start-of-day of the previous full run. Once set it supersedes
    /// `column_data_cursor` as the query lower bound for every account.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iterative_sync_cursor: Option<String>,

    /// Last confirmed-complete date boundary within the managed account named
    /// by `managed_account_cursor` (inclusive lower bound for the next fetch).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column_data_cursor: Option<String>,
}

impl SyncCursor {
    pub fn to_json(&self) -> AdsyncResult<String> {
        serde_json::to_string(self).map_err(|e| AdsyncError::State(e.to_string()))
    }

    pub fn from_json(raw: &str) -> AdsyncResult<Self> {
        serde_json::from_str(raw).map_err(|e| AdsyncError::State(e.to_string()))
    }
}

/// One `sync_state` row: the persisted state of a connector source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncState {
    pub id: Uuid,
    pub source: String,
    pub cursor_value: Option<String>,
    pub status: String,
    pub error_message: Option<String>,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SyncState {
    /// Parse the stored cursor blob; an absent blob is an empty cursor.
    pub fn cursor(&self) -> AdsyncResult<SyncCursor> {
        match self.cursor_value.as_deref() {
            Some(raw) => SyncCursor::from_json(raw),
            None => Ok(SyncCursor::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_round_trips_all_fields() {
        let cursor = SyncCursor {
            submanager_cursor: Some("700001".to_string()),
            managed_account_cursor: Some("800002".to_string()),
            iterative_sync_cursor: Some("2024-03-01".to_string()),
            column_data_cursor: Some("2024-02-27".to_string()),
        };

        let blob = cursor.to_json().unwrap();
        let parsed = SyncCursor::from_json(&blob).unwrap();
        assert_eq!(parsed, cursor);
    }

    #[test]
    fn absent_fields_are_omitted_from_the_blob() {
        let cursor = SyncCursor {
            iterative_sync_cursor: Some("2024-03-01".to_string()),
            ..SyncCursor::default()
        };

        let blob = cursor.to_json().unwrap();
        assert_eq!(blob, r#"{"iterative_sync_cursor":"2024-03-01"}"#);
    }

    #[test]
    fn parses_blob_with_missing_fields() {
        let parsed = SyncCursor::from_json(r#"{"submanager_cursor":"42"}"#).unwrap();
        assert_eq!(parsed.submanager_cursor.as_deref(), Some("42"));
        assert!(parsed.managed_account_cursor.is_none());
        assert!(parsed.iterative_sync_cursor.is_none());
        assert!(parsed.column_data_cursor.is_none());
    }

    #[test]
    fn state_without_blob_yields_empty_cursor() {
        let state = SyncState {
            id: Uuid::new_v4(),
            source: "sa360".to_string(),
            cursor_value: None,
            status: "idle".to_string(),
            error_message: None,
            last_synced_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        assert_eq!(state.cursor().unwrap(), SyncCursor::default());
    }

    #[test]
    fn state_with_malformed_blob_errors() {
        let state = SyncState {
            id: Uuid::new_v4(),
            source: "sa360".to_string(),
            cursor_value: Some("not json".to_string()),
            status: "idle".to_string(),
            error_message: None,
            last_synced_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        assert!(state.cursor().is_err());
    }
}
