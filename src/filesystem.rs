//! Opens the backing device, owns BPB/FSInfo/FAT and the write lock, and
//! is the root handle every other component borrows from (spec §4.9).

use std::os::unix::fs::FileTypeExt;
use std::sync::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::bpb::Bpb;
use crate::config::MountParams;
use crate::device::{Device, Store};
use crate::error::{Fat32Error, Result};
use crate::fat::Fat;
use crate::fsinfo::FsInfo;
use crate::fsobject::FsObject;
use crate::handle::{Handle, HandleAllocator};
use crate::path;

/// The mounted filesystem. BPB and FSInfo are read-only after mount; FAT
/// mutations, directory-entry mutations and the free-cluster hint are all
/// serialized through the single `RwLock` around `Fat` (spec §5, §9's
/// resolution of the source's underspecified write lock). [`FsObject`] and
/// [`crate::diriter::DirIter`] borrow this rather than owning it.
pub struct Filesystem<S: Store> {
    store: S,
    bpb: Bpb,
    fs_info: FsInfo,
    fat: RwLock<Fat<S>>,
    handle_alloc: Mutex<HandleAllocator>,
}

impl Filesystem<Device> {
    /// Opens `path` RDWR (retrying on interrupt), confirms it's a block
    /// device, reads and validates BPB then FSInfo, and seeds the FAT's
    /// free-cluster hint from FSInfo's advisory value. Any failure here
    /// leaves nothing behind to unwind -- everything acquired is local to
    /// this call until the final `Ok` (spec §4.9).
    pub fn open<P: AsRef<std::path::Path>>(path: P, params: MountParams) -> Result<Self> {
        let device = Device::open_rdwr(path)?;
        if !device.metadata()?.file_type().is_block_device() {
            return Err(Fat32Error::NonBlockDevice);
        }
        Self::open_on_store(device, params)
    }
}

impl<S: Store> Filesystem<S> {
    /// The device/store-agnostic half of [`Filesystem::open`], usable
    /// directly against an in-memory store in tests.
    pub fn open_on_store(store: S, _params: MountParams) -> Result<Self> {
        let bpb = Bpb::read(&store)?;
        let fs_info = FsInfo::read(&store, &bpb)?;

        let mut fat = Fat::new(store.try_clone()?, bpb);
        fat.seed_hint(fs_info.free_cluster_hint);

        Ok(Filesystem {
            store,
            bpb,
            fs_info,
            fat: RwLock::new(fat),
            handle_alloc: Mutex::new(HandleAllocator::new()),
        })
    }

    /// Builds a `Filesystem` directly from an already-parsed BPB, skipping
    /// FSInfo validation. Used by tests that only care about FAT/directory
    /// behaviour and hand-build geometry rather than a full FSInfo sector.
    #[cfg(test)]
    pub fn from_parts(store: S, bpb: Bpb, _params: MountParams) -> Self {
        let fat = Fat::new(store.try_clone().expect("clone test store"), bpb);
        Filesystem {
            store,
            bpb,
            fs_info: FsInfo {
                free_cluster_count: crate::fsinfo::UNKNOWN,
                free_cluster_hint: crate::fsinfo::UNKNOWN,
            },
            fat: RwLock::new(fat),
            handle_alloc: Mutex::new(HandleAllocator::new()),
        }
    }

    pub fn bpb(&self) -> &Bpb {
        &self.bpb
    }

    pub fn fs_info(&self) -> &FsInfo {
        &self.fs_info
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn cluster_size(&self) -> u32 {
        self.bpb.cluster_size
    }

    /// Read-only access to the FAT, for operations that only walk chains
    /// (directory iteration, attribute lookup) and can proceed concurrently
    /// with other readers (spec §5).
    pub fn fat_read(&self) -> RwLockReadGuard<'_, Fat<S>> {
        self.fat.read().expect("fat lock poisoned")
    }

    /// Exclusive access to the FAT, required for any operation that
    /// mutates FAT entries, directory entries, or the free-cluster hint
    /// (spec §5, §9).
    pub fn fat_write(&self) -> RwLockWriteGuard<'_, Fat<S>> {
        self.fat.write().expect("fat lock poisoned")
    }

    /// Issues the next handle, or `None` on the practically-unreachable
    /// 64-bit counter exhaustion (spec §4.10).
    pub fn allocate_handle(&self) -> Option<Handle> {
        self.handle_alloc.lock().expect("handle allocator poisoned").allocate()
    }

    /// Reads one whole cluster's worth of bytes into `buf`. `buf` must be
    /// exactly `cluster_size()` bytes (spec §4.9).
    pub fn read_cluster(&self, cluster: u32, buf: &mut [u8]) -> Result<()> {
        if !self.bpb.is_valid_cluster(cluster) {
            return Err(Fat32Error::InvalidCluster);
        }
        debug_assert_eq!(buf.len(), self.cluster_size() as usize);
        self.store.read_exact_at(buf, self.bpb.cluster_to_offset(cluster))
    }

    /// Resolves `path` to an object, delegating to the path resolver
    /// (spec §4.8, §4.9).
    pub fn get_object<'fs>(&'fs self, path: &str) -> Result<Option<FsObject<'fs, S>>> {
        path::resolve(self, path)
    }
}
