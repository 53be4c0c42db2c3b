// Capacity and usage accounting over the decoded structures

use std::collections::BTreeMap;

use fatpack_core::{FatpackError, FatpackResult};
use serde::Serialize;

use crate::boot_sector::BootSector;
use crate::constants::DIR_ENTRY_SIZE;
use crate::directory::DirEntry;

/// Region sizes and data-area usage, all in bytes.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct DiskReport {
    pub partition_size: u64,
    pub reserved_size: u64,
    pub fat_size: u64,
    pub root_directory_size: u64,
    pub data_area_size: u64,
    pub used_space: u64,
    pub available_space: u64,
}

impl DiskReport {
    /// Used space counts every live entry, root and subdirectory alike, at
    /// whole-cluster granularity. Directories contribute 0 through their own
    /// zero file_size. Usage exceeding the data area is surfaced as an error
    /// instead of wrapping the subtraction.
    pub fn analyze(
        boot_sector: &BootSector,
        root_entries: &[DirEntry],
        subdirectories: &BTreeMap<String, Vec<DirEntry>>,
    ) -> FatpackResult<Self> {
        let sector = u64::from(boot_sector.sector_size);
        let partition_size = u64::from(boot_sector.total_sector_count) * sector;
        let reserved_size = u64::from(boot_sector.num_reserved_sectors) * sector;
        let fat_size =
            u64::from(boot_sector.num_fats) * u64::from(boot_sector.sectors_per_fat) * sector;
        let root_directory_size =
            u64::from(boot_sector.max_num_root_entries) * DIR_ENTRY_SIZE as u64;
        let data_area_size = partition_size
            .saturating_sub(reserved_size)
            .saturating_sub(fat_size)
            .saturating_sub(root_directory_size);

        let cluster_bytes = u64::from(boot_sector.sectors_per_cluster) * sector;
        let mut used_space = 0u64;
        for entry in root_entries.iter().chain(subdirectories.values().flatten()) {
            if entry.is_tombstone() {
                continue;
            }
            let clusters = (u64::from(entry.file_size) + cluster_bytes - 1) / cluster_bytes;
            used_space += clusters * cluster_bytes;
        }

        let available_space = data_area_size.checked_sub(used_space).ok_or(
            FatpackError::UsageInconsistency {
                used: used_space,
                data_area: data_area_size,
            },
        )?;

        Ok(Self {
            partition_size,
            reserved_size,
            fat_size,
            root_directory_size,
            data_area_size,
            used_space,
            available_space,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boot_sector::DiskLayout;
    use crate::constants::ATTR_ARCHIVE;
    use crate::directory::{read_root, read_subdirectories};
    use crate::test_helpers::{blank_floppy, put_entry, ROOT_DIR_OFFSET};
    use std::io::Cursor;

    fn decode(image: &[u8]) -> DiskReport {
        let mut cursor = Cursor::new(image);
        let boot_sector = BootSector::read(&mut cursor).unwrap();
        let layout = DiskLayout::from_boot_sector(&boot_sector);
        let root = read_root(&mut cursor, &boot_sector, &layout).unwrap();
        let subdirectories = read_subdirectories(&mut cursor, &layout, &root).unwrap();
        DiskReport::analyze(&boot_sector, &root, &subdirectories).unwrap()
    }

    #[test]
    fn fresh_floppy_reports_an_empty_data_area() {
        let report = decode(&blank_floppy());
        assert_eq!(report.partition_size, 2880 * 512);
        assert_eq!(report.reserved_size, 512);
        assert_eq!(report.fat_size, 2 * 9 * 512);
        assert_eq!(report.root_directory_size, 224 * 32);
        assert_eq!(
            report.data_area_size,
            report.partition_size - report.reserved_size - report.fat_size
                - report.root_directory_size
        );
        assert_eq!(report.used_space, 0);
        assert_eq!(report.available_space, report.data_area_size);
    }

    #[test]
    fn used_space_rounds_file_sizes_up_to_whole_clusters() {
        let mut image = blank_floppy();
        put_entry(&mut image, ROOT_DIR_OFFSET, "DATA", "BIN", ATTR_ARCHIVE, 2, 5000);
        let report = decode(&image);
        // ceil(5000 / 512) = 10 clusters.
        assert_eq!(report.used_space, 10 * 512);
        assert_eq!(report.available_space, report.data_area_size - 5120);
    }

    #[test]
    fn serializes_for_machine_consumers() {
        let report = decode(&blank_floppy());
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["used_space"], 0);
        assert_eq!(json["partition_size"], 1_474_560);
    }
}
