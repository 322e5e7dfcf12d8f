// src/sim/board.rs

//! Message boards with two phases.
//!
//! Writers append while the board is in *post* phase. `sync_start` freezes
//! the posted buffer into a read window and enters *read* phase;
//! `sync_finish` marks the synchronisation point complete and reopens
//! posting. Readers are always scheduled after `sync_finish`, so the
//! frozen window stays readable until the next freeze replaces it — which
//! is also what clears the previous iteration's messages.
//!
//! Levelisation guarantees each transition happens in its phase-appropriate
//! level, so a wrong-phase call is an invariant breach and panics.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::errors::{SimError, SimResult};
use crate::model::{Message, Value, VarDecl};

/// One posted message: field values in schema order.
pub type MessageRow = Vec<Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardPhase {
    Post,
    Read,
}

struct BoardInner {
    phase: BoardPhase,
    posted: Vec<MessageRow>,
    frozen: Arc<Vec<MessageRow>>,
}

pub struct MessageBoard {
    name: String,
    schema: Vec<VarDecl>,
    inner: Mutex<BoardInner>,
}

impl MessageBoard {
    pub fn new(message: &Message) -> Self {
        Self {
            name: message.name.clone(),
            schema: message.variables.clone(),
            inner: Mutex::new(BoardInner {
                phase: BoardPhase::Post,
                posted: Vec::new(),
                frozen: Arc::new(Vec::new()),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BoardInner> {
        self.inner.lock().expect("message board mutex poisoned")
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &[VarDecl] {
        &self.schema
    }

    pub fn phase(&self) -> BoardPhase {
        self.lock().phase
    }

    /// Append one message. Arity mismatches are user errors; posting in
    /// read phase means the scheduler broke the barrier contract.
    pub fn post(&self, row: MessageRow) -> SimResult<()> {
        if row.len() != self.schema.len() {
            return Err(SimError::InvalidArgument(format!(
                "message '{}' expects {} fields, got {}",
                self.name,
                self.schema.len(),
                row.len()
            )));
        }
        let mut inner = self.lock();
        assert_eq!(
            inner.phase,
            BoardPhase::Post,
            "message board '{}' posted to outside post phase",
            self.name
        );
        inner.posted.push(row);
        Ok(())
    }

    /// Freeze the posted buffer into the read window. The previous window
    /// is dropped here.
    pub fn sync_start(&self) {
        let mut inner = self.lock();
        assert_eq!(
            inner.phase,
            BoardPhase::Post,
            "sync_start on message board '{}' outside post phase",
            self.name
        );
        inner.frozen = Arc::new(std::mem::take(&mut inner.posted));
        inner.phase = BoardPhase::Read;
    }

    /// Complete the synchronisation point and reopen posting. The frozen
    /// window stays readable for the downstream reader functions.
    pub fn sync_finish(&self) {
        let mut inner = self.lock();
        assert_eq!(
            inner.phase,
            BoardPhase::Read,
            "sync_finish on message board '{}' outside read phase",
            self.name
        );
        inner.phase = BoardPhase::Post;
    }

    /// The current read window.
    pub fn read(&self) -> Arc<Vec<MessageRow>> {
        Arc::clone(&self.lock().frozen)
    }
}
