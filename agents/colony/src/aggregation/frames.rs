use std::collections::HashMap;
use std::sync::RwLock;

use eyre::Result;

use colony_core::StackFrame;

use crate::db::ColonyDb;

/// Write-through cache over the `stack_frame` table: each distinct frame is
/// assigned a stable id exactly once; repeat encodings hit the in-process
/// map.
#[derive(Debug)]
pub struct FrameInterner {
    db: ColonyDb,
    cache: RwLock<HashMap<StackFrame, i64>>,
}

impl FrameInterner {
    /// Interner backed by the given store.
    pub fn new(db: ColonyDb) -> Self {
        Self {
            db,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Encode a call stack into its ordered frame-id list, interning any
    /// frames not seen before.
    pub async fn encode_stack(&self, frames: &[StackFrame]) -> Result<Vec<i64>> {
        let mut ids = Vec::with_capacity(frames.len());
        for frame in frames {
            ids.push(self.intern(frame).await?);
        }
        Ok(ids)
    }

    async fn intern(&self, frame: &StackFrame) -> Result<i64> {
        if let Some(id) = self
            .cache
            .read()
            .expect("interner lock poisoned")
            .get(frame)
        {
            return Ok(*id);
        }

        let id = self.db.intern_frame(frame).await?;
        self.cache
            .write()
            .expect("interner lock poisoned")
            .insert(frame.clone(), id);
        Ok(id)
    }
}
