//! The crate-wide failure taxonomy (spec: Error handling design).
//!
//! Errors from the lowest levels (`device`, `fat`) are returned unchanged;
//! `fsobject` is the only layer allowed to downgrade a lower error into
//! [`Fat32Error::FsPartiallyConsistent`], and only once a directory entry
//! has already been mutated on disk.

use std::io;

/// Operation outcomes for the FAT32 engine.
///
/// There is no `Ok` variant here — success is `Result::Ok(_)`. This enum is
/// the `Err` side of every fallible call in the crate.
#[derive(Debug, thiserror::Error)]
pub enum Fat32Error {
    /// A lower-level OS primitive failed; the source `io::Error` is kept
    /// verbatim so its raw_os_error can be mapped to a POSIX errno upstream.
    #[error("i/o error: {0}")]
    Errno(#[from] io::Error),

    /// The mount target is not a block device.
    #[error("not a block device")]
    NonBlockDevice,

    /// I/O succeeded but returned fewer bytes than required.
    #[error("device returned fewer bytes than required (truncated or corrupt)")]
    InvalidDevice,

    /// On-disk data failed structural validation (BPB, FSInfo, FAT chain).
    #[error("on-disk filesystem structure failed validation")]
    InvalidFs,

    /// Cluster number out of range for this volume.
    #[error("cluster number out of range")]
    InvalidCluster,

    /// A walk for n links reached end-of-chain prematurely.
    #[error("cluster chain ended before the requested link")]
    ClusterChainEnded,

    /// No free clusters remain.
    #[error("no free clusters remain")]
    FsFull,

    /// A write failed mid-operation, leaving on-disk state neither fully
    /// old nor fully new. fsck required.
    #[error("filesystem left inconsistent by a partial write; fsck required")]
    FsInconsistent,

    /// The user-visible view is correct but some orphan clusters remain
    /// allocated. fsck recommended, not required for continued use.
    #[error("filesystem left partially consistent; orphan clusters may remain; fsck recommended")]
    FsPartiallyConsistent,
}

pub type Result<T> = std::result::Result<T, Fat32Error>;
