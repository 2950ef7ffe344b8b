//! Unified handle for {file, subdirectory, root} (spec §3, §4.7).

use crate::device::Store;
use crate::direntry::{self, DirEntry};
use crate::diriter::DirIter;
use crate::error::{Fat32Error, Result};
use crate::filesystem::Filesystem;

/// Which kind of object a non-root [`FsObject`] wraps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsObjectKind {
    File,
    Dir,
    RootDir,
}

/// A tagged view on a file, directory, or the root directory.
///
/// Non-root variants carry an owned copy of their 32-byte directory entry
/// and the device offset at which that entry lives (needed to mark it
/// free). Root carries only a reference to its owning [`Filesystem`].
/// `FsObject` borrows the `Filesystem` rather than owning it, matching
/// spec §9's non-owning-reference resolution of the original's cyclic
/// `Filesystem`/`FsObject` references.
#[derive(Debug)]
pub struct FsObject<'fs, S: Store> {
    kind: FsObjectKind,
    name: Option<String>,
    entry: Option<DirEntry>,
    offset: Option<u64>,
    fs: &'fs Filesystem<S>,
}

impl<'fs, S: Store> FsObject<'fs, S> {
    pub fn root(fs: &'fs Filesystem<S>) -> Self {
        FsObject {
            kind: FsObjectKind::RootDir,
            name: None,
            entry: None,
            offset: None,
            fs,
        }
    }

    /// Builds an object from a yielded directory entry. Classified as
    /// `Dir` unless the entry lacks the `DIRECTORY` attribute, in which
    /// case it's `File` (spec §4.7).
    pub fn from_direntry(
        fs: &'fs Filesystem<S>,
        entry: DirEntry,
        name: String,
        offset: u64,
    ) -> Self {
        let kind = if entry.is_directory() {
            FsObjectKind::Dir
        } else {
            FsObjectKind::File
        };
        FsObject {
            kind,
            name: Some(name),
            entry: Some(entry),
            offset: Some(offset),
            fs,
        }
    }

    pub fn fs(&self) -> &'fs Filesystem<S> {
        self.fs
    }

    pub fn kind(&self) -> FsObjectKind {
        self.kind
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn is_file(&self) -> bool {
        self.kind == FsObjectKind::File
    }

    pub fn is_directory(&self) -> bool {
        matches!(self.kind, FsObjectKind::Dir | FsObjectKind::RootDir)
    }

    pub fn is_root_directory(&self) -> bool {
        self.kind == FsObjectKind::RootDir
    }

    fn is_empty_file_sentinel(&self) -> bool {
        self.is_file() && self.first_cluster() == 0
    }

    /// For root, the BPB's root cluster; otherwise reassembled from the
    /// owned directory entry's high/low cluster words.
    pub fn first_cluster(&self) -> u32 {
        match self.kind {
            FsObjectKind::RootDir => self.fs.bpb().root_cluster,
            _ => self.entry.as_ref().expect("non-root has an entry").first_cluster(),
        }
    }

    /// Only defined on files (spec §4.7); panics (debug-only) if called
    /// on a directory, mirroring the original's `assert`.
    pub fn size(&self) -> u32 {
        debug_assert!(self.is_file());
        self.entry.as_ref().expect("file has an entry").file_size()
    }

    /// Writes `0xE5` to the stored entry's `name[0]` byte. Not permitted
    /// on root.
    pub fn mark_free(&self) -> Result<()> {
        debug_assert!(!self.is_root_directory());
        let offset = self.offset.expect("non-root has an offset");
        let _write_guard = self.fs.fat_write();
        direntry::mark_free(self.fs.store(), offset)
    }

    /// Constructs a dot-filtering iterator and reports whether its first
    /// `next()` yields nothing.
    pub fn is_empty_directory(&self) -> Result<bool> {
        debug_assert!(self.is_directory());
        let mut iter = DirIter::new(self.fs, self.first_cluster(), false);
        Ok(iter.next()?.is_none())
    }

    /// Deletes this object: marks its directory entry free, then frees
    /// its cluster chain unless it was already the empty-file sentinel.
    /// If the entry write succeeds but the chain free fails, the result
    /// downgrades to [`Fat32Error::FsPartiallyConsistent`] -- the
    /// directory entry is gone but some clusters may remain orphaned,
    /// fsck-recoverable (spec §4.7 state machine).
    pub fn delete(&self) -> Result<()> {
        let cluster = self.first_cluster();
        self.mark_free()?;

        if self.is_empty_file_sentinel() {
            return Ok(());
        }

        let write_guard = self.fs.fat_write();
        match write_guard.free_chain(cluster) {
            Ok(()) => Ok(()),
            Err(Fat32Error::InvalidDevice) => Err(Fat32Error::InvalidDevice),
            Err(Fat32Error::Errno(_)) | Err(Fat32Error::FsInconsistent) | Err(Fat32Error::InvalidFs) => {
                Err(Fat32Error::FsPartiallyConsistent)
            }
            Err(other) => Err(other),
        }
    }

    /// Shrinks a file to `new_length` bytes. Growing (`new_length >
    /// current`) is out of scope (spec §4.7) and panics.
    pub fn truncate(&self, new_length: u32) -> Result<()> {
        debug_assert!(self.is_file());

        let current = self.size();
        if new_length == current {
            return Ok(());
        }
        if new_length > current {
            panic!("fs_object truncate: growing a file is out of scope");
        }

        let csize = self.fs.cluster_size();
        let needed = (new_length + csize - 1) / csize;
        let offset = self.offset.expect("file has an offset");
        let old_entry = self.entry.as_ref().expect("file has an entry");

        if needed == 0 {
            let empty_entry = old_entry.with_empty_file();
            direntry::write_entry(self.fs.store(), offset, &empty_entry)?;

            let write_guard = self.fs.fat_write();
            return match write_guard.free_chain(self.first_cluster()) {
                Ok(()) => Ok(()),
                Err(Fat32Error::InvalidDevice) => Err(Fat32Error::InvalidDevice),
                Err(Fat32Error::Errno(_))
                | Err(Fat32Error::FsInconsistent)
                | Err(Fat32Error::InvalidFs) => Err(Fat32Error::FsPartiallyConsistent),
                Err(other) => Err(other),
            };
        }

        let write_guard = self.fs.fat_write();
        let last_kept = write_guard
            .get_nth_entry(self.first_cluster(), needed - 1)
            .map_err(|e| match e {
                Fat32Error::ClusterChainEnded => Fat32Error::InvalidFs,
                other => other,
            })?
            .cluster();
        let successor = write_guard.get_entry(last_kept)?;

        // If the chain already ends exactly at `needed` clusters, shrinking
        // only narrows the last cluster's used portion -- nothing to free.
        if successor.is_end() {
            let new_entry = old_entry.with_size(new_length);
            return direntry::write_entry(self.fs.store(), offset, &new_entry);
        }

        let next = successor.cluster();
        write_guard.mark_cluster_last(last_kept)?;

        let new_entry = old_entry.with_size(new_length);
        direntry::write_entry(self.fs.store(), offset, &new_entry)?;

        match write_guard.free_chain(next) {
            Ok(()) => Ok(()),
            Err(Fat32Error::InvalidDevice) => Err(Fat32Error::InvalidDevice),
            Err(Fat32Error::Errno(_)) | Err(Fat32Error::FsInconsistent) | Err(Fat32Error::InvalidFs) => {
                Err(Fat32Error::FsPartiallyConsistent)
            }
            Err(other) => Err(other),
        }
    }
}
