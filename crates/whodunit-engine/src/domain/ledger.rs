//! Append-only message ledger with audience-filtered replay.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::roster::ParticipantId;

/// Category of a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// Engine-authored announcements (stage transitions, presence, summaries).
    System,
    /// A participant's public statement.
    Chat,
    /// The narrator's closing reveal.
    NarratorReveal,
    /// Visible only to the addressee.
    Private,
}

/// One line of the shared record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageEntry {
    pub sequence: u64,
    pub author_id: ParticipantId,
    pub author_name: String,
    pub body: String,
    pub kind: MessageKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub addressee: Option<ParticipantId>,
    pub timestamp: DateTime<Utc>,
}

/// Who is reading the history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Viewer {
    /// Public entries only.
    Everyone,
    /// Public entries plus private entries addressed to this participant.
    Participant(ParticipantId),
}

impl Viewer {
    /// Whether this viewer may see `entry`.
    #[must_use]
    pub fn can_see(&self, entry: &MessageEntry) -> bool {
        match (&entry.addressee, self) {
            (None, _) => true,
            (Some(_), Self::Everyone) => false,
            (Some(addressee), Self::Participant(id)) => addressee == id,
        }
    }
}

/// An entry before the ledger assigns its sequence number.
#[derive(Debug, Clone)]
pub struct NewEntry {
    pub author_id: ParticipantId,
    pub author_name: String,
    pub body: String,
    pub kind: MessageKind,
    pub addressee: Option<ParticipantId>,
}

impl NewEntry {
    /// A public entry.
    #[must_use]
    pub fn public(
        author_id: ParticipantId,
        author_name: impl Into<String>,
        body: impl Into<String>,
        kind: MessageKind,
    ) -> Self {
        Self {
            author_id,
            author_name: author_name.into(),
            body: body.into(),
            kind,
            addressee: None,
        }
    }

    /// A private entry addressed to one participant.
    #[must_use]
    pub fn private(
        author_id: ParticipantId,
        author_name: impl Into<String>,
        body: impl Into<String>,
        addressee: ParticipantId,
    ) -> Self {
        Self {
            author_id,
            author_name: author_name.into(),
            body: body.into(),
            kind: MessageKind::Private,
            addressee: Some(addressee),
        }
    }
}

/// Ordered, append-only record of everything said in a game.
#[derive(Debug, Clone, Default)]
pub struct MessageLedger {
    entries: Vec<MessageEntry>,
}

impl MessageLedger {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry, assigning the next sequence number.
    pub fn append(&mut self, entry: NewEntry, timestamp: DateTime<Utc>) -> &MessageEntry {
        let sequence = self.entries.len() as u64 + 1;
        self.entries.push(MessageEntry {
            sequence,
            author_id: entry.author_id,
            author_name: entry.author_name,
            body: entry.body,
            kind: entry.kind,
            addressee: entry.addressee,
            timestamp,
        });
        &self.entries[self.entries.len() - 1]
    }

    /// Replays the entries `viewer` may see, in order.
    ///
    /// The returned iterator is cloneable, so callers can restart it.
    pub fn history<'a>(
        &'a self,
        viewer: &'a Viewer,
    ) -> impl Iterator<Item = &'a MessageEntry> + Clone + 'a {
        self.entries.iter().filter(move |entry| viewer.can_see(entry))
    }

    /// Number of entries, private ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been appended yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every entry, unfiltered.
    #[must_use]
    pub fn entries(&self) -> &[MessageEntry] {
        &self.entries
    }
}
