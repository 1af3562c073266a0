//! Turn sequencer: an ordered actor list plus a cursor.

use serde::{Deserialize, Serialize};

use super::roster::ParticipantId;

/// Ordered actors for a turn-based phase. Invariant: `cursor <= order.len()`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnOrder {
    order: Vec<ParticipantId>,
    cursor: usize,
}

impl TurnOrder {
    /// Starts a fresh order with the cursor at the first actor.
    #[must_use]
    pub fn new(order: Vec<ParticipantId>) -> Self {
        Self { order, cursor: 0 }
    }

    /// The acting participant, or `None` when the phase is complete.
    #[must_use]
    pub fn current(&self) -> Option<&ParticipantId> {
        self.order.get(self.cursor)
    }

    /// Moves to the next actor, saturating at the end.
    pub fn advance_cursor(&mut self) {
        if self.cursor < self.order.len() {
            self.cursor += 1;
        }
    }

    /// Whether every actor has had a turn.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.cursor >= self.order.len()
    }

    /// Whether no order has been generated for the phase yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    #[must_use]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    #[must_use]
    pub fn ids(&self) -> &[ParticipantId] {
        &self.order
    }

    /// Forgets the order; used on stage transitions.
    pub fn clear(&mut self) {
        self.order.clear();
        self.cursor = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order() -> TurnOrder {
        TurnOrder::new(vec![ParticipantId::new("a"), ParticipantId::new("b")])
    }

    #[test]
    fn test_current_walks_order_then_reports_complete() {
        // Arrange
        let mut turns = order();

        // Act / Assert
        assert_eq!(turns.current().map(ParticipantId::as_str), Some("a"));
        turns.advance_cursor();
        assert_eq!(turns.current().map(ParticipantId::as_str), Some("b"));
        turns.advance_cursor();
        assert!(turns.current().is_none());
        assert!(turns.is_complete());
    }

    #[test]
    fn test_advance_cursor_saturates_at_len() {
        let mut turns = order();

        for _ in 0..5 {
            turns.advance_cursor();
        }

        assert_eq!(turns.cursor(), 2);
    }

    #[test]
    fn test_clear_resets_cursor() {
        let mut turns = order();
        turns.advance_cursor();

        turns.clear();

        assert!(turns.is_empty());
        assert_eq!(turns.cursor(), 0);
    }

    #[test]
    fn test_empty_order_is_complete() {
        assert!(TurnOrder::default().is_complete());
    }
}
