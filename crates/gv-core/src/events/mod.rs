//! Completions reported back by asynchronous load work

use std::fmt;
use std::sync::Arc;

use arrow::record_batch::RecordBatch;

use crate::features::Feature;
use crate::pagination::PageRequest;
use crate::schema::FileInfo;

/// Identifies one load session. A reset starts a new session so that late
/// results of the old one can be recognised and dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct SessionId(u64);

impl SessionId {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn get(self) -> u64 {
        self.0
    }

    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The four user-facing failure categories
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadErrorKind {
    Network,
    MissingMetadata,
    Decode,
    Projection,
}

impl fmt::Display for LoadErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LoadErrorKind::Network => "network error",
            LoadErrorKind::MissingMetadata => "missing metadata",
            LoadErrorKind::Decode => "decode error",
            LoadErrorKind::Projection => "projection error",
        };
        f.write_str(label)
    }
}

/// One decoded page
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub batches: Vec<RecordBatch>,
    /// Features with row ids already offset to global row positions
    pub features: Vec<Feature>,
    /// Non-fatal problems, e.g. a geometry column whose CRS could not be
    /// resolved
    pub warnings: Vec<String>,
}

impl Page {
    pub fn num_rows(&self) -> usize {
        self.batches.iter().map(|b| b.num_rows()).sum()
    }
}

/// Result of a `Discover` or `FetchPage` effect
#[derive(Debug, Clone)]
pub enum LoadEvent {
    Discovered {
        session: SessionId,
        file: Arc<FileInfo>,
    },
    PageLoaded {
        session: SessionId,
        request: PageRequest,
        page: Page,
    },
    Failed {
        session: SessionId,
        kind: LoadErrorKind,
        message: String,
    },
}

impl LoadEvent {
    pub fn session(&self) -> SessionId {
        match self {
            LoadEvent::Discovered { session, .. }
            | LoadEvent::PageLoaded { session, .. }
            | LoadEvent::Failed { session, .. } => *session,
        }
    }
}
