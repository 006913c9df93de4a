//! Queued Mutation Model
//!
//! A `QueuedMutation` is one local change (a checklist completion, a photo
//! attached as evidence, or a comment) that has been written to the device
//! but not yet acknowledged by the remote API.
//!
//! Payloads are a closed sum type. Every place that dispatches on the kind of
//! a mutation matches `MutationPayload` exhaustively, so adding a new kind is
//! a compile error until every dispatcher handles it.

use crate::shared::error::SharedError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use uuid::Uuid;

/// Kind of a queued mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationKind {
    /// Checklist item completion state
    Checklist,
    /// Photo evidence for a checklist item
    Photo,
    /// Comment on a project entity
    Comment,
}

impl MutationKind {
    pub const ALL: [MutationKind; 3] = [
        MutationKind::Checklist,
        MutationKind::Photo,
        MutationKind::Comment,
    ];

    /// Stable name used in record ids and the store's `kind` column
    pub fn as_str(&self) -> &'static str {
        match self {
            MutationKind::Checklist => "checklist",
            MutationKind::Photo => "photo",
            MutationKind::Comment => "comment",
        }
    }
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MutationKind {
    type Err = SharedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "checklist" => Ok(MutationKind::Checklist),
            "photo" => Ok(MutationKind::Photo),
            "comment" => Ok(MutationKind::Comment),
            other => Err(SharedError::validation(
                "kind",
                format!("unknown mutation kind '{}'", other),
            )),
        }
    }
}

/// Checklist item completion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistPayload {
    pub checklist_item_id: String,
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// When the user ticked (or unticked) the item on the device
    pub completed_at: DateTime<Utc>,
}

/// Photo evidence waiting to be uploaded
///
/// The image itself stays on disk; the queue only holds a reference to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoPayload {
    pub checklist_item_id: String,
    pub local_path: PathBuf,
    pub file_name: String,
    pub content_type: String,
}

impl PhotoPayload {
    /// Build a payload from a file on disk, deriving name and content type
    pub fn from_path(checklist_item_id: impl Into<String>, local_path: impl Into<PathBuf>) -> Self {
        let local_path = local_path.into();
        let file_name = local_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "photo".to_string());
        let content_type = content_type_for(&local_path).to_string();

        Self {
            checklist_item_id: checklist_item_id.into(),
            local_path,
            file_name,
            content_type,
        }
    }
}

fn content_type_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase());

    match extension.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("heic") => "image/heic",
        Some("gif") => "image/gif",
        _ => "application/octet-stream",
    }
}

/// Comment on a project entity (checklist item, certificate, project)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentPayload {
    pub target_id: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_id: Option<String>,
}

/// Typed payload of a queued mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum MutationPayload {
    Checklist(ChecklistPayload),
    Photo(PhotoPayload),
    Comment(CommentPayload),
}

impl MutationPayload {
    pub fn kind(&self) -> MutationKind {
        match self {
            MutationPayload::Checklist(_) => MutationKind::Checklist,
            MutationPayload::Photo(_) => MutationKind::Photo,
            MutationPayload::Comment(_) => MutationKind::Comment,
        }
    }

    /// Reject payloads the remote API could never accept
    pub fn validate(&self) -> Result<(), SharedError> {
        match self {
            MutationPayload::Checklist(checklist) => {
                require_non_empty("checklist_item_id", &checklist.checklist_item_id)
            }
            MutationPayload::Photo(photo) => {
                require_non_empty("checklist_item_id", &photo.checklist_item_id)?;
                if photo.local_path.as_os_str().is_empty() {
                    return Err(SharedError::validation("local_path", "must not be empty"));
                }
                require_non_empty("file_name", &photo.file_name)?;
                require_non_empty("content_type", &photo.content_type)
            }
            MutationPayload::Comment(comment) => {
                require_non_empty("target_id", &comment.target_id)?;
                require_non_empty("text", &comment.text)
            }
        }
    }
}

fn require_non_empty(field: &str, value: &str) -> Result<(), SharedError> {
    if value.trim().is_empty() {
        Err(SharedError::validation(field, "must not be empty"))
    } else {
        Ok(())
    }
}

/// A durable record of one pending local change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedMutation {
    /// `{kind}-{unix_millis}-{random}`, unique for the lifetime of the store
    pub id: String,
    pub payload: MutationPayload,
    pub created_at: DateTime<Utc>,
    /// Set only after the remote API acknowledged the mutation
    pub synced: bool,
    /// Failed dispatch attempts so far
    pub attempts: u32,
    pub last_error: Option<String>,
}

impl QueuedMutation {
    /// Create a fresh, unsynced record for `payload`
    pub fn new(payload: MutationPayload) -> Self {
        let created_at = Utc::now();
        Self {
            id: Self::generate_id(payload.kind(), created_at),
            payload,
            created_at,
            synced: false,
            attempts: 0,
            last_error: None,
        }
    }

    pub fn generate_id(kind: MutationKind, at: DateTime<Utc>) -> String {
        format!(
            "{}-{}-{}",
            kind.as_str(),
            at.timestamp_millis(),
            Uuid::new_v4().simple()
        )
    }

    pub fn kind(&self) -> MutationKind {
        self.payload.kind()
    }
}
