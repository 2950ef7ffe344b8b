//! Boot Parameter Block: parsing, validation and the geometry it derives
//! (spec §3, §4.1).

use index_fixed::index_fixed;

use crate::device::Store;
use crate::error::{Fat32Error, Result};

/// Maximum size of a cluster in bytes (32 KiB).
pub const MAX_CLUSTER_SIZE: u32 = 32 * 1024;

/// The `fs_version` value that marks a volume as FAT32.
pub const FAT32_FS_VERSION: u16 = 0x0000;

/// Size in bytes of the on-disk region [`Bpb::parse`] consumes.
pub const BPB_REGION_SIZE: usize = 90;

/// A parsed, validated Boot Parameter Block, plus the geometry derived
/// from it once at mount time (spec §3: "BPB ... never mutated").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bpb {
    pub jmp_boot: [u8; 3],
    pub bytes_per_sector: u16,
    pub sectors_per_cluster: u8,
    pub reserved_sectors_count: u16,
    pub fats_count: u8,
    pub root_entries_count: u16,
    pub total_sectors_count_16: u16,
    pub media_type: u8,
    pub fat_size_16: u16,
    pub total_sectors_count: u32,
    pub fat_size: u32,
    pub fs_version: u16,
    pub root_cluster: u32,
    pub fs_info_sector: u16,
    pub boot_signature: u8,

    /// `bytes_per_sector * sectors_per_cluster`, cached at parse time.
    pub cluster_size: u32,
    /// First sector of the data (cluster) region.
    pub first_data_sector: u32,
}

impl Bpb {
    /// Parses the fixed byte layout at sector 0 and derives geometry.
    /// Does not validate -- call [`Bpb::validate`] (or use
    /// [`Bpb::parse_and_validate`]) before trusting the result.
    pub fn parse(raw: &[u8; BPB_REGION_SIZE]) -> Self {
        let jmp_boot = *index_fixed!(raw; 0, .. 3);
        let bytes_per_sector = u16::from_le_bytes(*index_fixed!(raw; 11, .. 13));
        let sectors_per_cluster = raw[13];
        let reserved_sectors_count = u16::from_le_bytes(*index_fixed!(raw; 14, .. 16));
        let fats_count = raw[16];
        let root_entries_count = u16::from_le_bytes(*index_fixed!(raw; 17, .. 19));
        let total_sectors_count_16 = u16::from_le_bytes(*index_fixed!(raw; 19, .. 21));
        let media_type = raw[21];
        let fat_size_16 = u16::from_le_bytes(*index_fixed!(raw; 22, .. 24));
        let total_sectors_count = u32::from_le_bytes(*index_fixed!(raw; 32, .. 36));
        let fat_size = u32::from_le_bytes(*index_fixed!(raw; 36, .. 40));
        let fs_version = u16::from_le_bytes(*index_fixed!(raw; 42, .. 44));
        let root_cluster = u32::from_le_bytes(*index_fixed!(raw; 44, .. 48));
        let fs_info_sector = u16::from_le_bytes(*index_fixed!(raw; 48, .. 50));
        let boot_signature = raw[62];

        let cluster_size = bytes_per_sector as u32 * sectors_per_cluster as u32;
        let first_data_sector =
            reserved_sectors_count as u32 + fats_count as u32 * fat_size;

        Bpb {
            jmp_boot,
            bytes_per_sector,
            sectors_per_cluster,
            reserved_sectors_count,
            fats_count,
            root_entries_count,
            total_sectors_count_16,
            media_type,
            fat_size_16,
            total_sectors_count,
            fat_size,
            fs_version,
            root_cluster,
            fs_info_sector,
            boot_signature,
            cluster_size,
            first_data_sector,
        }
    }

    /// Reads and validates the BPB from `raw`, the [`BPB_REGION_SIZE`]-byte
    /// region at sector 0.
    pub fn parse_and_validate(raw: &[u8; BPB_REGION_SIZE]) -> Result<Self> {
        let bpb = Self::parse(raw);
        if !bpb.validate() {
            return Err(Fat32Error::InvalidFs);
        }
        log::debug!(
            "bpb: bytes_per_sector={} sectors_per_cluster={} cluster_size={} \
             reserved={} fats={} fat_size={} root_cluster={} cluster_count={}",
            bpb.bytes_per_sector,
            bpb.sectors_per_cluster,
            bpb.cluster_size,
            bpb.reserved_sectors_count,
            bpb.fats_count,
            bpb.fat_size,
            bpb.root_cluster,
            bpb.cluster_count(),
        );
        Ok(bpb)
    }

    /// Reads the 90-byte region at sector 0, validates it, then checks the
    /// backing store is at least as large as `total_sectors ×
    /// bytes_per_sector` implies (spec §6, §8 scenario 1) -- a store too
    /// short for its own advertised geometry is `InvalidDevice`, the same
    /// kind a short positioned read reports.
    pub fn read<S: Store>(store: &S) -> Result<Self> {
        let mut raw = [0u8; BPB_REGION_SIZE];
        store.read_exact_at(&mut raw, 0)?;
        let bpb = Self::parse_and_validate(&raw)?;

        let minimum = bpb.total_sectors_count as u64 * bpb.bytes_per_sector as u64;
        if store.len()? < minimum {
            return Err(Fat32Error::InvalidDevice);
        }

        Ok(bpb)
    }

    /// Applies every structural rule from spec §3 and §4.1.
    pub fn validate(&self) -> bool {
        let jmp = self.jmp_boot;
        if !((jmp[0] == 0xEB && jmp[2] == 0x90) || jmp[0] == 0xE9) {
            return false;
        }

        // bytes_per_sector in {512, 1024, 2048, 4096}
        if !matches!(self.bytes_per_sector, 512 | 1024 | 2048 | 4096) {
            return false;
        }

        // sectors_per_cluster: power of two, product within MAX_CLUSTER_SIZE
        let spc = self.sectors_per_cluster;
        let product = spc as u32 * self.bytes_per_sector as u32;
        if spc == 0 || (spc & (spc - 1)) != 0 || product > MAX_CLUSTER_SIZE {
            return false;
        }

        if self.reserved_sectors_count == 0 {
            return false;
        }

        if self.root_entries_count != 0 {
            return false;
        }

        if self.total_sectors_count_16 != 0 {
            return false;
        }

        if self.fat_size_16 != 0 {
            return false;
        }

        if self.total_sectors_count == 0 {
            return false;
        }

        if self.fats_count == 0 {
            return false;
        }

        if self.fat_size == 0 {
            return false;
        }

        if self.fs_version != FAT32_FS_VERSION {
            return false;
        }

        if self.fs_info_sector < 1 || self.fs_info_sector > self.reserved_sectors_count {
            return false;
        }

        // FAT12/FAT16 volumes are out of scope; FAT32 requires a large
        // enough cluster count.
        let cluster_count = self.cluster_count();
        if cluster_count < 65525 {
            return false;
        }

        if self.root_cluster < 2 || !self.is_valid_cluster(self.root_cluster) {
            return false;
        }

        true
    }

    /// `(total_sectors - reserved - fats*fat_size) / sectors_per_cluster`.
    pub fn cluster_count(&self) -> u32 {
        let data_sectors =
            self.total_sectors_count - self.first_data_sector;
        data_sectors / self.sectors_per_cluster as u32
    }

    /// Valid cluster numbers are `[2, cluster_count + 1]`.
    pub fn is_valid_cluster(&self, cluster: u32) -> bool {
        cluster >= 2 && cluster <= self.cluster_count() + 1
    }

    pub fn sector_to_offset(&self, sector: u32) -> u64 {
        self.bytes_per_sector as u64 * sector as u64
    }

    pub fn sector_offset_to_offset(&self, sector: u32, offset: u32) -> u64 {
        self.sector_to_offset(sector) + offset as u64
    }

    pub fn cluster_first_sector(&self, cluster: u32) -> u32 {
        self.first_data_sector + (cluster - 2) * self.sectors_per_cluster as u32
    }

    pub fn cluster_to_offset(&self, cluster: u32) -> u64 {
        self.sector_to_offset(self.cluster_first_sector(cluster))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_bpb_bytes(total_sectors: u32, cluster_count_target: u32) -> [u8; BPB_REGION_SIZE] {
        let mut raw = [0u8; BPB_REGION_SIZE];
        raw[0] = 0xEB;
        raw[1] = 0x3C;
        raw[2] = 0x90;
        raw[11..13].copy_from_slice(&512u16.to_le_bytes());
        raw[13] = 8; // sectors_per_cluster
        raw[14..16].copy_from_slice(&32u16.to_le_bytes()); // reserved
        raw[16] = 2; // fats_count
        let fat_size = (cluster_count_target + 2) * 4 / 512 + 1;
        raw[32..36].copy_from_slice(&total_sectors.to_le_bytes());
        raw[36..40].copy_from_slice(&fat_size.to_le_bytes());
        raw[44..48].copy_from_slice(&2u32.to_le_bytes()); // root_cluster
        raw[48..50].copy_from_slice(&1u16.to_le_bytes()); // fs_info_sector
        raw[62] = 0x29;
        raw
    }

    #[test]
    fn parse_then_validate_round_trips_geometry() {
        let cluster_count_target = 70000;
        let reserved = 32u32;
        let fats = 2u32;
        let spc = 8u32;
        let fat_size = (cluster_count_target + 2) * 4 / 512 + 1;
        let total_sectors = reserved + fats * fat_size + cluster_count_target * spc;
        let raw = valid_bpb_bytes(total_sectors, cluster_count_target);

        let bpb = Bpb::parse_and_validate(&raw).expect("valid bpb");
        assert_eq!(bpb.cluster_size, 512 * 8);
        assert_eq!(bpb.first_data_sector, reserved + fats * fat_size);
        assert!(bpb.cluster_count() >= 65525);
        assert!(bpb.is_valid_cluster(2));
        assert!(bpb.is_valid_cluster(bpb.cluster_count() + 1));
        assert!(!bpb.is_valid_cluster(bpb.cluster_count() + 2));
        assert!(!bpb.is_valid_cluster(1));
    }

    #[test]
    fn rejects_bad_jump_boot() {
        let mut raw = valid_bpb_bytes(2_000_000, 70000);
        raw[0] = 0x00;
        assert!(!Bpb::parse(&raw).validate());
    }

    #[test]
    fn rejects_non_power_of_two_sectors_per_cluster() {
        let mut raw = valid_bpb_bytes(2_000_000, 70000);
        raw[13] = 3;
        assert!(!Bpb::parse(&raw).validate());
    }

    #[test]
    fn rejects_small_cluster_count_as_not_fat32() {
        let raw = valid_bpb_bytes(2_000, 100);
        assert!(!Bpb::parse(&raw).validate());
    }

    #[test]
    fn rejects_fs_info_sector_outside_reserved_region() {
        let mut raw = valid_bpb_bytes(2_000_000, 70000);
        raw[48..50].copy_from_slice(&100u16.to_le_bytes());
        assert!(!Bpb::parse(&raw).validate());
    }

    #[test]
    fn read_rejects_store_shorter_than_advertised_geometry() {
        use crate::device::MemStore;

        let cluster_count_target = 70000;
        let reserved = 32u32;
        let fats = 2u32;
        let spc = 8u32;
        let fat_size = (cluster_count_target + 2) * 4 / 512 + 1;
        let total_sectors = reserved + fats * fat_size + cluster_count_target * spc;
        let raw = valid_bpb_bytes(total_sectors, cluster_count_target);
        let minimum = total_sectors as u64 * 512;

        let mut full_image = vec![0u8; minimum as usize];
        full_image[0..BPB_REGION_SIZE].copy_from_slice(&raw);
        let store = MemStore::new(full_image);
        assert!(Bpb::read(&store).is_ok());

        let mut short_image = vec![0u8; BPB_REGION_SIZE];
        short_image.copy_from_slice(&raw);
        let store = MemStore::new(short_image);
        assert!(matches!(Bpb::read(&store), Err(Fat32Error::InvalidDevice)));
    }
}
