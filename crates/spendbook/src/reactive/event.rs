//! ChangeEvent — what part of the session state a commit touched, and who
//! caused it.

/// Where a committed change came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOrigin {
    /// A user intent: edit, import, reset or backup restore.
    Local,
    /// Data received from the remote store (watch notification or pull).
    Remote,
}

/// Emitted by the session after each committed mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    /// Only the ledger changed.
    Receipts { origin: ChangeOrigin },
    /// The taxonomy changed; structural edits may also have rewritten items.
    Taxonomy { origin: ChangeOrigin },
    /// Both stores were replaced wholesale.
    Snapshot { origin: ChangeOrigin },
}

impl ChangeEvent {
    pub fn origin(&self) -> ChangeOrigin {
        match self {
            Self::Receipts { origin } | Self::Taxonomy { origin } | Self::Snapshot { origin } => {
                *origin
            }
        }
    }

    pub fn is_remote(&self) -> bool {
        self.origin() == ChangeOrigin::Remote
    }

    /// Whether the taxonomy blob needs rewriting. Ledger-only edits never
    /// change the taxonomy; every other commit may touch both stores.
    pub fn touches_taxonomy(&self) -> bool {
        !matches!(self, Self::Receipts { .. })
    }
}
