//! The File Allocation Table: entry read/write, chain walking, free-cluster
//! search, chain truncation/free (spec §4.4).

use crate::bpb::Bpb;
use crate::device::Store;
use crate::error::{Fat32Error, Result};

const ENTRY_SIZE: u32 = 4;
const MASK: u32 = 0x0FFF_FFFF;
const BAD: u32 = 0x0FFF_FFF7;
const EOC_MIN: u32 = 0x0FFF_FFF8;
const LAST_MARK: u32 = 0xFFFF_FFFF;

/// A single 32-bit FAT entry, decoded to its low 28 meaningful bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FatEntry(u32);

impl FatEntry {
    pub fn from_raw(raw: u32) -> Self {
        FatEntry(raw & MASK)
    }

    pub fn is_free(&self) -> bool {
        self.0 == 0
    }

    pub fn is_bad(&self) -> bool {
        self.0 == BAD
    }

    pub fn is_end(&self) -> bool {
        self.0 >= EOC_MIN
    }

    /// The next cluster number, meaningful only when neither free, bad,
    /// nor end-of-chain.
    pub fn cluster(&self) -> u32 {
        self.0
    }
}

pub(crate) fn fat_entry_offset(bpb: &Bpb, cluster: u32) -> u64 {
    let entry_fat_offset = cluster * ENTRY_SIZE;
    let entry_sector =
        bpb.reserved_sectors_count as u32 + entry_fat_offset / bpb.bytes_per_sector as u32;
    let entry_sector_offset = entry_fat_offset % bpb.bytes_per_sector as u32;
    bpb.sector_offset_to_offset(entry_sector, entry_sector_offset)
}

/// Owns a duplicate descriptor of the backing device, the FAT's free
/// cluster hint, and read-only references to BPB geometry (spec §4.4).
///
/// The hint starts at 2 -- the minimum valid cluster -- not at whatever
/// FSInfo advertises, because that hint may be stale (spec §9).
pub struct Fat<S: Store> {
    store: S,
    bpb: Bpb,
    free_cluster_hint: u32,
}

impl<S: Store> Fat<S> {
    pub fn new(store: S, bpb: Bpb) -> Self {
        Fat {
            store,
            bpb,
            free_cluster_hint: 2,
        }
    }

    /// Seeds the hint from an advisory FSInfo value, but only if it names
    /// a cluster in range; an out-of-range or "unknown" hint is ignored
    /// and the scan still starts from 2.
    pub fn seed_hint(&mut self, hint: u32) {
        if self.bpb.is_valid_cluster(hint) {
            self.free_cluster_hint = hint;
        }
    }

    fn entry_offset(&self, cluster: u32) -> u64 {
        fat_entry_offset(&self.bpb, cluster)
    }

    /// Reads the FAT entry for `cluster`.
    pub fn get_entry(&self, cluster: u32) -> Result<FatEntry> {
        let mut raw = [0u8; ENTRY_SIZE as usize];
        self.store.read_exact_at(&mut raw, self.entry_offset(cluster))?;
        Ok(FatEntry::from_raw(u32::from_le_bytes(raw)))
    }

    fn set_raw_entry(&self, cluster: u32, value: u32) -> Result<()> {
        self.store
            .write_exact_at(&value.to_le_bytes(), self.entry_offset(cluster))
    }

    /// Walks `n` links starting at `cluster`, returning the cluster number
    /// reached -- `cluster` itself counts as position 0, so `n == 0` is a
    /// no-op returning `cluster` unread. Bounded to `cluster_count` steps
    /// so a corrupted, cyclic chain can't loop forever (spec §9 open
    /// question).
    ///
    /// The result wraps a cluster *number*, not a FAT table entry: callers
    /// needing the real next-pointer out of `cluster` at position `n`
    /// still need a separate `get_entry` call on it.
    pub fn get_nth_entry(&self, cluster: u32, n: u32) -> Result<FatEntry> {
        let mut current = cluster;
        let bound = self.bpb.cluster_count();
        for step in 0..n {
            if step > bound {
                return Err(Fat32Error::InvalidFs);
            }
            let entry = self.get_entry(current)?;
            if entry.is_end() {
                return Err(Fat32Error::ClusterChainEnded);
            }
            if entry.is_free() || entry.is_bad() {
                return Err(Fat32Error::InvalidFs);
            }
            current = entry.cluster();
        }
        Ok(FatEntry::from_raw(current))
    }

    /// Scans for a free cluster starting at the hint, wrapping once back
    /// to cluster 2 before giving up with `FsFull` (spec §4.4, §9: the
    /// hint is only a starting point for an exhaustive linear scan).
    /// On success the hint advances to the cluster found.
    pub fn find_free_cluster(&mut self) -> Result<u32> {
        let upper = self.bpb.cluster_count() + 2;
        let start = self.free_cluster_hint.max(2);

        for cluster in (start..upper).chain(2..start) {
            if self.get_entry(cluster)?.is_free() {
                self.free_cluster_hint = cluster;
                return Ok(cluster);
            }
        }
        Err(Fat32Error::FsFull)
    }

    /// Writes `value`'s low 28 bits as the entry for `cluster`.
    pub fn set_entry(&self, cluster: u32, value: u32) -> Result<()> {
        self.set_raw_entry(cluster, value & MASK)
    }

    /// Marks `cluster` as the last in its chain.
    pub fn mark_cluster_last(&self, cluster: u32) -> Result<()> {
        self.set_raw_entry(cluster, LAST_MARK).map_err(|e| match e {
            Fat32Error::Errno(_) | Fat32Error::InvalidDevice => Fat32Error::FsInconsistent,
            other => other,
        })
    }

    /// Walks the chain from `cluster`, zeroing each entry. Encountering a
    /// bad or free cluster mid-chain is `InvalidFs`; a write failure
    /// partway through is `FsInconsistent` (some entries cleared, some
    /// not) per spec §4.4.
    pub fn free_chain(&self, cluster: u32) -> Result<()> {
        if cluster == 0 {
            // "empty file" sentinel: nothing allocated to free.
            return Ok(());
        }

        let mut current = cluster;
        let bound = self.bpb.cluster_count();
        let mut steps = 0u32;

        loop {
            if steps > bound {
                return Err(Fat32Error::InvalidFs);
            }
            steps += 1;

            let entry = self.get_entry(current)?;
            if entry.is_free() || entry.is_bad() {
                return Err(Fat32Error::InvalidFs);
            }

            let next = entry.cluster();
            let is_end = entry.is_end();

            if let Err(e) = self.set_raw_entry(current, 0) {
                return Err(match e {
                    Fat32Error::Errno(_) | Fat32Error::InvalidDevice => Fat32Error::FsInconsistent,
                    other => other,
                });
            }

            if is_end {
                return Ok(());
            }
            current = next;
        }
    }
}
