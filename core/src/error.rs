use thiserror::Error;

#[derive(Debug, Error)]
pub enum CarbonError {
    /// A fixed-layout structure was constructed from a buffer shorter than
    /// its declared size. Always a caller/structure error, never recoverable
    /// by retrying.
    #[error("truncated {what}: need {need} bytes, have {have}")]
    Truncated {
        what: &'static str,
        need: usize,
        have: usize,
    },

    /// The B-tree header record failed its sanity checks. The tree is
    /// unusable, but other trees on the volume may still open.
    #[error("invalid B-tree: {0}")]
    InvalidTree(String),

    /// A structural contradiction was hit mid-traversal (wrong node kind,
    /// offset table out of bounds, ...). Fatal for the lookup, not for the
    /// process.
    #[error("corrupt B-tree: {0}")]
    CorruptTree(String),

    /// A field or operation that does not exist in the active volume format
    /// was queried. Callers are expected to check the `has_*()` predicates
    /// first.
    #[error("operation not supported by this volume format: {0}")]
    UnsupportedOperation(&'static str),

    /// A fork claims more allocation blocks than its extent records
    /// describe. Surfaced instead of silently truncating the file.
    #[error("file {file_id}: extents are missing {missing_blocks} of the fork's blocks")]
    FragmentedExtentMissing { file_id: u32, missing_blocks: u64 },

    /// The byte region does not carry a recognizable HFS/HFS+ volume, or the
    /// volume header failed validation.
    #[error("invalid volume: {0}")]
    InvalidVolume(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
