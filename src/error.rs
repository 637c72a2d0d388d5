//! Failures reported by [SortInPlace](crate::sort::SortInPlace).
//!
//! Every failure is fatal. The file being sorted is never modified unless the whole operation
//! succeeds, and all intermediate files are removed before the error reaches the caller.

use std::fmt::{Display, Formatter};
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// The phase of the operation in which a failure occurred.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Reading the input, sorting blocks and writing them to spill files
    Spilling,
    /// Merging the spill files into the staging file
    Merging,
    /// Replacing the input file with the staging file
    Replacing,
    /// Verifying the order of a file
    Checking,
}

impl Display for Phase {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Spilling => write!(f, "spilling"),
            Phase::Merging => write!(f, "merging"),
            Phase::Replacing => write!(f, "replacing"),
            Phase::Checking => write!(f, "checking"),
        }
    }
}

#[derive(Debug, Error)]
pub enum SortError {
    /// The key function failed on a line.
    ///
    /// `line` is the 1-based line number in the input while spilling or checking, and the
    /// 1-based record position inside the spill file while merging.
    #[error("key extraction failed while {phase}, line: {line}, error: {source}")]
    KeyExtraction {
        phase: Phase,
        line: u64,
        #[source]
        source: anyhow::Error,
    },

    /// A spill, staging or input file could not be created, read or written.
    #[error("storage failure while {phase}, path: {}, error: {source}", path.display())]
    Storage {
        phase: Phase,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The sorted staging file could not be renamed over the input file.
    #[error("failed to replace {} with {}, error: {source}", to.display(), from.display())]
    Replace {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl SortError {
    pub(crate) fn storage(phase: Phase, path: &Path, source: io::Error) -> SortError {
        SortError::Storage {
            phase,
            path: path.to_path_buf(),
            source,
        }
    }

    /// The phase in which this error occurred
    pub fn phase(&self) -> Phase {
        match self {
            SortError::KeyExtraction { phase, .. } => *phase,
            SortError::Storage { phase, .. } => *phase,
            SortError::Replace { .. } => Phase::Replacing,
        }
    }
}
