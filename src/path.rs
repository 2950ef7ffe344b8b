//! Splits a path into components and descends via the directory iterator
//! to locate the object it names (spec §4.8).

use crate::device::Store;
use crate::diriter::DirIter;
use crate::error::Result;
use crate::filesystem::Filesystem;
use crate::fsobject::FsObject;

/// Resolves an absolute, slash-delimited path against `fs`, starting from
/// the root directory. Empty components (consecutive or trailing slashes)
/// are skipped. Components are matched against decoded short names
/// case-insensitively, since 8.3 names are stored uppercased on disk but
/// callers query in whatever case they like. Returns `Ok(None)` for "not
/// found" -- this layer never invents an error of its own, it only
/// forwards whatever the iterator or device reports (spec §7).
pub fn resolve<'fs, S: Store>(fs: &'fs Filesystem<S>, path: &str) -> Result<Option<FsObject<'fs, S>>> {
    let mut current = FsObject::root(fs);

    for component in path.split('/').filter(|c| !c.is_empty()) {
        let mut iter = DirIter::new(fs, current.first_cluster(), false);
        let mut found = None;
        while let Some(child) = iter.next()? {
            if child.name().map_or(false, |n| n.eq_ignore_ascii_case(component)) {
                found = Some(child);
                break;
            }
        }
        match found {
            Some(child) => current = child,
            None => return Ok(None),
        }
    }

    Ok(Some(current))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bpb::Bpb;
    use crate::config::MountParams;
    use crate::device::MemStore;
    use crate::direntry::DIRENTRY_SIZE;

    fn write_direntry(
        image: &mut [u8],
        offset: usize,
        name: &[u8; 11],
        attr: u8,
        first_cluster: u32,
        size: u32,
    ) {
        let mut raw = [0u8; DIRENTRY_SIZE];
        raw[0..11].copy_from_slice(name);
        raw[11] = attr;
        raw[20..22].copy_from_slice(&((first_cluster >> 16) as u16).to_le_bytes());
        raw[26..28].copy_from_slice(&(first_cluster as u16).to_le_bytes());
        raw[28..32].copy_from_slice(&size.to_le_bytes());
        image[offset..offset + DIRENTRY_SIZE].copy_from_slice(&raw);
    }

    fn test_bpb() -> Bpb {
        let mut raw = [0u8; crate::bpb::BPB_REGION_SIZE];
        raw[0] = 0xEB;
        raw[2] = 0x90;
        raw[11..13].copy_from_slice(&512u16.to_le_bytes());
        raw[13] = 1;
        raw[14..16].copy_from_slice(&2u16.to_le_bytes());
        raw[16] = 1;
        raw[32..36].copy_from_slice(&(2 + 20 + 40).to_le_bytes());
        raw[36..40].copy_from_slice(&2u32.to_le_bytes());
        raw[44..48].copy_from_slice(&2u32.to_le_bytes());
        raw[48..50].copy_from_slice(&1u16.to_le_bytes());
        Bpb::parse(&raw)
    }

    /// Builds `/a/b/c.txt` three levels deep: root (cluster 2) contains
    /// dir `a` (cluster 3); `a` contains dir `b` (cluster 4); `b` contains
    /// file `c.txt` (cluster 5).
    fn three_level_image() -> (Bpb, Vec<u8>) {
        let bpb = test_bpb();
        let image_len = bpb.sector_to_offset(bpb.first_data_sector) + bpb.cluster_size as u64 * 40;
        let mut image = vec![0u8; image_len as usize];

        let root_off = bpb.cluster_to_offset(2) as usize;
        write_direntry(&mut image, root_off, b"A          ", 0x10, 3, 0);
        image[root_off + 32] = 0x00;

        let a_off = bpb.cluster_to_offset(3) as usize;
        write_direntry(&mut image, a_off, b"B          ", 0x10, 4, 0);
        image[a_off + 32] = 0x00;

        let b_off = bpb.cluster_to_offset(4) as usize;
        write_direntry(&mut image, b_off, b"C       TXT", 0x20, 5, 3 * bpb.cluster_size - 17);
        image[b_off + 32] = 0x00;

        (bpb, image)
    }

    #[test]
    fn resolves_three_levels_deep() {
        let (bpb, image) = three_level_image();
        let csize = bpb.cluster_size;
        let fs = Filesystem::from_parts(MemStore::new(image), bpb, MountParams::default());

        let obj = resolve(&fs, "/a/b/c.txt").unwrap().expect("found");
        assert!(obj.is_file());
        assert_eq!(obj.size(), 3 * csize - 17);
        assert_eq!(obj.first_cluster(), 5);
    }

    #[test]
    fn skips_empty_components_from_extra_slashes() {
        let (bpb, image) = three_level_image();
        let fs = Filesystem::from_parts(MemStore::new(image), bpb, MountParams::default());

        let obj = resolve(&fs, "//a//b/c.txt/").unwrap().expect("found");
        assert!(obj.is_file());
    }

    #[test]
    fn missing_component_returns_none_not_error() {
        let (bpb, image) = three_level_image();
        let fs = Filesystem::from_parts(MemStore::new(image), bpb, MountParams::default());

        assert!(resolve(&fs, "/a/missing").unwrap().is_none());
    }

    #[test]
    fn empty_path_resolves_to_root() {
        let (bpb, image) = three_level_image();
        let fs = Filesystem::from_parts(MemStore::new(image), bpb, MountParams::default());

        let obj = resolve(&fs, "/").unwrap().expect("root");
        assert!(obj.is_root_directory());
    }
}
