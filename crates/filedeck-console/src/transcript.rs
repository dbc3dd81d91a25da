//! The terminal display transcript

/// One display unit in the terminal transcript
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptEntry {
    /// Ready banner installed when a session activates
    Banner(String),
    /// Local echo of a submitted command
    Echo(String),
    /// Verbatim output chunk from the remote process
    Output(String),
    /// Diagnostic reported by the host
    Error(String),
    /// Local lifecycle note
    Notice(String),
}

impl TranscriptEntry {
    /// The entry's display text, without kind-specific decoration
    pub fn text(&self) -> &str {
        match self {
            TranscriptEntry::Banner(text)
            | TranscriptEntry::Echo(text)
            | TranscriptEntry::Output(text)
            | TranscriptEntry::Error(text)
            | TranscriptEntry::Notice(text) => text,
        }
    }
}

/// Ordered, append-only record of everything displayed in the terminal view
/// for the current session.
///
/// Entries are never truncated or reordered within a session's lifetime; the
/// only wholesale mutation is a reset, used by the local `clear` directive and
/// by the banner installation when a fresh session activates.
#[derive(Debug, Default)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: TranscriptEntry) {
        self.entries.push(entry);
    }

    /// Drop every entry, leaving the display empty
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
