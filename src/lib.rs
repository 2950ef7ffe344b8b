//! FAT32 on-disk engine for a user-space filesystem driver.
//!
//! This crate implements the hard engineering underneath a FUSE-style
//! kernel-callback shim: BPB/FSInfo parsing, FAT traversal and mutation,
//! directory-entry decoding and iteration, path resolution, and the
//! `Filesystem`/`FsObject` types the shim drives. The shim itself, CLI
//! parsing, long-filename decoding, and the generic open-file associative
//! container are out of scope -- callers own those.

pub mod bpb;
pub mod config;
pub mod device;
pub mod direntry;
pub mod diriter;
pub mod error;
pub mod fat;
pub mod filesystem;
pub mod fsinfo;
pub mod fsobject;
pub mod handle;
pub mod path;

pub use bpb::Bpb;
pub use config::MountParams;
pub use device::{Device, Store};
pub use direntry::DirEntry;
pub use diriter::DirIter;
pub use error::{Fat32Error, Result};
pub use fat::{Fat, FatEntry};
pub use filesystem::Filesystem;
pub use fsinfo::FsInfo;
pub use fsobject::{FsObject, FsObjectKind};
pub use handle::{Handle, HandleAllocator, INVALID_HANDLE};
