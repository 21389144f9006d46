use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

use crate::background::Background;
use crate::export::ResultLocation;
use crate::stroke::Stroke;
use crate::util::time;

/// Identifier handed out by a [`DrawingStore`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DrawingId(pub Uuid);

impl DrawingId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DrawingId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DrawingId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("No drawing stored under {0}")]
    NotFound(DrawingId),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A saved drawing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawingRecord {
    pub strokes: Vec<Stroke>,
    pub background: Background,
    pub is_draft: bool,
    pub is_favorite: bool,
    /// Exported GIF, if one was made
    pub preview: Option<ResultLocation>,
    /// Seconds since the Unix epoch, stamped by the store
    pub updated_at: u64,
}

impl DrawingRecord {
    pub fn new(strokes: Vec<Stroke>, background: Background) -> Self {
        Self {
            strokes,
            background,
            is_draft: true,
            is_favorite: false,
            preview: None,
            updated_at: 0,
        }
    }

    pub fn with_preview(mut self, preview: ResultLocation) -> Self {
        self.preview = Some(preview);
        self
    }

    pub fn favorite(mut self, is_favorite: bool) -> Self {
        self.is_favorite = is_favorite;
        self
    }

    pub fn draft(mut self, is_draft: bool) -> Self {
        self.is_draft = is_draft;
        self
    }
}

/// Persistence for finished or in-progress drawings
pub trait DrawingStore: Send + Sync {
    fn save(&self, record: DrawingRecord) -> StoreResult<DrawingId>;

    fn update(&self, id: DrawingId, record: DrawingRecord) -> StoreResult<()>;

    fn load(&self, id: DrawingId) -> StoreResult<Option<DrawingRecord>>;
}

/// Keeps drawings for the lifetime of the process
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<DrawingId, DrawingRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl DrawingStore for MemoryStore {
    fn save(&self, mut record: DrawingRecord) -> StoreResult<DrawingId> {
        let id = DrawingId::new();
        record.updated_at = time::timestamp_secs();
        log::info!("Saved drawing {} ({} strokes)", id, record.strokes.len());
        self.records.write().insert(id, record);
        Ok(id)
    }

    fn update(&self, id: DrawingId, mut record: DrawingRecord) -> StoreResult<()> {
        let mut records = self.records.write();
        let slot = records.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        record.updated_at = time::timestamp_secs();
        *slot = record;
        log::debug!("Updated drawing {}", id);
        Ok(())
    }

    fn load(&self, id: DrawingId) -> StoreResult<Option<DrawingRecord>> {
        Ok(self.records.read().get(&id).cloned())
    }
}
