//! Recording memory — an in-memory `ConversationMemory` that exposes what
//! it was told.

use std::sync::Mutex;

use async_trait::async_trait;
use whodunit_engine::application::ports::ConversationMemory;

/// A memory that records every line and recalls the most recent ones.
#[derive(Debug, Default)]
pub struct RecordingMemory {
    lines: Mutex<Vec<String>>,
}

impl RecordingMemory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every remembered line, in order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }
}

#[async_trait]
impl ConversationMemory for RecordingMemory {
    async fn remember(&self, line: String) {
        self.lines.lock().unwrap().push(line);
    }

    async fn recall(&self, limit: usize) -> Vec<String> {
        let lines = self.lines.lock().unwrap();
        let skip = lines.len().saturating_sub(limit);
        lines[skip..].to_vec()
    }
}
