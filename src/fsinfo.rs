//! FSInfo sector: advisory free-cluster count and hint (spec §3, §4.2).

use index_fixed::index_fixed;

use crate::bpb::Bpb;
use crate::device::Store;
use crate::error::{Fat32Error, Result};

pub const FS_INFO_LEAD_SIGNATURE: u32 = 0x41615252;
pub const FS_INFO_STRUCT_SIGNATURE: u32 = 0x61417272;
pub const FS_INFO_TRAIL_SIGNATURE: u32 = 0xAA550000;

/// Sentinel meaning "unknown" for both advisory fields.
pub const UNKNOWN: u32 = 0xFFFFFFFF;

const FS_INFO_SECTOR_SIZE: usize = 512;

/// A parsed FSInfo sector. Never trusted as authoritative (spec §4.4,
/// §9): the free-cluster count and hint are only a starting point for an
/// exhaustive scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FsInfo {
    pub free_cluster_count: u32,
    pub free_cluster_hint: u32,
}

impl FsInfo {
    /// Positions at the FSInfo sector, reads 512 bytes, validates both
    /// signatures and restores the original logical read position (the
    /// latter is implicit here since every read takes an explicit
    /// offset -- spec §4.2's "restores original file offset" requirement
    /// is automatically satisfied by never mutating shared cursor state).
    pub fn read<S: Store>(store: &S, bpb: &Bpb) -> Result<Self> {
        let offset = bpb.sector_to_offset(bpb.fs_info_sector as u32);
        let mut raw = [0u8; FS_INFO_SECTOR_SIZE];
        store.read_exact_at(&mut raw, offset)?;

        let lead_signature = u32::from_le_bytes(*index_fixed!(&raw; 0, .. 4));
        let struct_signature = u32::from_le_bytes(*index_fixed!(&raw; 484, .. 488));
        let trail_signature = u32::from_le_bytes(*index_fixed!(&raw; 508, .. 512));

        if lead_signature != FS_INFO_LEAD_SIGNATURE
            || struct_signature != FS_INFO_STRUCT_SIGNATURE
            || trail_signature != FS_INFO_TRAIL_SIGNATURE
        {
            return Err(Fat32Error::InvalidFs);
        }

        let free_cluster_count = u32::from_le_bytes(*index_fixed!(&raw; 488, .. 492));
        let free_cluster_hint = u32::from_le_bytes(*index_fixed!(&raw; 492, .. 496));

        log::debug!(
            "fsinfo: free_cluster_count={:#x} free_cluster_hint={:#x}",
            free_cluster_count,
            free_cluster_hint
        );

        Ok(FsInfo {
            free_cluster_count,
            free_cluster_hint,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::MemStore;

    fn write_fsinfo_sector(buf: &mut [u8], hint: u32) {
        buf[0..4].copy_from_slice(&FS_INFO_LEAD_SIGNATURE.to_le_bytes());
        buf[484..488].copy_from_slice(&FS_INFO_STRUCT_SIGNATURE.to_le_bytes());
        buf[508..512].copy_from_slice(&FS_INFO_TRAIL_SIGNATURE.to_le_bytes());
        buf[488..492].copy_from_slice(&UNKNOWN.to_le_bytes());
        buf[492..496].copy_from_slice(&hint.to_le_bytes());
    }

    fn bpb_for_test() -> Bpb {
        let mut raw = [0u8; crate::bpb::BPB_REGION_SIZE];
        raw[0] = 0xEB;
        raw[2] = 0x90;
        raw[11..13].copy_from_slice(&512u16.to_le_bytes());
        raw[13] = 1;
        raw[14..16].copy_from_slice(&32u16.to_le_bytes());
        raw[48..50].copy_from_slice(&1u16.to_le_bytes());
        Bpb::parse(&raw)
    }

    #[test]
    fn reads_valid_sector() {
        let bpb = bpb_for_test();
        let mut image = vec![0u8; 512 * 33];
        let mut sector = [0u8; 512];
        write_fsinfo_sector(&mut sector, 12345);
        let offset = bpb.sector_to_offset(bpb.fs_info_sector as u32) as usize;
        image[offset..offset + 512].copy_from_slice(&sector);

        let store = MemStore::new(image);
        let fs_info = FsInfo::read(&store, &bpb).expect("valid fsinfo");
        assert_eq!(fs_info.free_cluster_hint, 12345);
        assert_eq!(fs_info.free_cluster_count, UNKNOWN);
    }

    #[test]
    fn rejects_bad_signature() {
        let bpb = bpb_for_test();
        let mut image = vec![0u8; 512 * 33];
        let mut sector = [0u8; 512];
        write_fsinfo_sector(&mut sector, 12345);
        sector[0] = 0;
        let offset = bpb.sector_to_offset(bpb.fs_info_sector as u32) as usize;
        image[offset..offset + 512].copy_from_slice(&sector);

        let store = MemStore::new(image);
        assert!(matches!(
            FsInfo::read(&store, &bpb),
            Err(Fat32Error::InvalidFs)
        ));
    }
}
