use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_DOCUMENT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of an open document (editor, buffer, file handle).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct DocumentId(u64);

impl DocumentId {
    /// Allocate a fresh id
    pub fn next() -> Self {
        Self(NEXT_DOCUMENT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What checkers and the scheduler know about the document being checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentMeta {
    pub id: DocumentId,
    pub project_path: Option<PathBuf>,
    pub relative_path: Option<PathBuf>,
}

impl DocumentMeta {
    /// A buffer that has never been saved
    pub fn unsaved(id: DocumentId) -> Self {
        Self {
            id,
            project_path: None,
            relative_path: None,
        }
    }

    pub fn with_path(
        id: DocumentId,
        project_path: Option<PathBuf>,
        relative_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            id,
            project_path,
            relative_path: Some(relative_path.into()),
        }
    }

    /// Split `path` against the first project root containing it.
    ///
    /// Paths outside every root keep their full path as the relative part and
    /// have no project.
    pub fn relativize(id: DocumentId, project_roots: &[PathBuf], path: &Path) -> Self {
        for root in project_roots {
            if let Ok(relative) = path.strip_prefix(root) {
                if !relative.as_os_str().is_empty() {
                    return Self::with_path(id, Some(root.clone()), relative);
                }
            }
        }
        Self::with_path(id, None, path)
    }

    /// Lower-cased extension of the relative path, if any
    pub fn extension(&self) -> Option<String> {
        self.relative_path
            .as_deref()
            .and_then(|p| p.extension())
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
    }

    pub fn job_key(&self) -> JobKey {
        match &self.relative_path {
            Some(relative) => JobKey::Path {
                project: self.project_path.clone(),
                relative: relative.clone(),
            },
            None => JobKey::Unsaved(self.id),
        }
    }
}

/// Deduplication key for check jobs.
///
/// Two requests with the same key are served by a single aggregation pass.
/// Path-less documents are keyed by their own id so unrelated unsaved buffers
/// never share results.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum JobKey {
    Path {
        project: Option<PathBuf>,
        relative: PathBuf,
    },
    Unsaved(DocumentId),
}
