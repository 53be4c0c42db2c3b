// Boot sector / BIOS Parameter Block decoding and region layout math

use std::io::{Read, Seek, SeekFrom};

use fatpack_core::{FatpackError, FatpackResult};
use log::debug;
use serde::Serialize;

use crate::constants::*;

/// BPB fields needed for layout math, immutable after load.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct BootSector {
    pub sector_size: u16,
    pub sectors_per_cluster: u8,
    pub num_reserved_sectors: u16,
    pub num_fats: u8,
    pub max_num_root_entries: u16,
    pub total_sector_count: u16,
    pub sectors_per_fat: u16,
}

impl BootSector {
    /// Decode the fixed-offset BPB fields. No signature or magic-number
    /// validation is performed; a non-FAT12 image is misread, not rejected.
    pub fn read<R: Read + Seek>(reader: &mut R) -> FatpackResult<Self> {
        let mut header = [0u8; 24];
        reader.seek(SeekFrom::Start(0))?;
        reader.read_exact(&mut header)?;

        let u16_at = |offset: usize| u16::from_le_bytes([header[offset], header[offset + 1]]);

        let boot_sector = Self {
            sector_size: u16_at(BPB_BYTES_PER_SEC),
            sectors_per_cluster: header[BPB_SEC_PER_CLUS],
            num_reserved_sectors: u16_at(BPB_RSVD_SEC_CNT),
            num_fats: header[BPB_NUM_FATS],
            max_num_root_entries: u16_at(BPB_ROOT_ENT_CNT),
            total_sector_count: u16_at(BPB_TOT_SEC16),
            sectors_per_fat: u16_at(BPB_FAT_SZ16),
        };
        debug!(
            "boot sector: {} bytes/sector, {} sectors/cluster, {} FATs of {} sectors, {} root entries",
            boot_sector.sector_size,
            boot_sector.sectors_per_cluster,
            boot_sector.num_fats,
            boot_sector.sectors_per_fat,
            boot_sector.max_num_root_entries,
        );
        Ok(boot_sector)
    }
}

/// Byte offsets of the on-disk regions, derived once from the boot sector.
///
/// The data offset is computed from the reserved, FAT, and root-directory
/// region sizes rather than assuming the data area begins at sector 33; on
/// the standard 1.44MB geometry the two agree.
#[derive(Debug, Clone, Copy)]
pub struct DiskLayout {
    pub fat_offset: u64,
    pub fat_bytes: u64,
    pub root_dir_offset: u64,
    pub root_dir_bytes: u64,
    pub data_offset: u64,
    pub bytes_per_cluster: u32,
    pub fat_entry_count: usize,
    /// Whole clusters the data area actually holds. The FAT carries more
    /// slots than this; the surplus never maps to bytes inside the image.
    pub data_clusters: u32,
}

impl DiskLayout {
    pub fn from_boot_sector(boot_sector: &BootSector) -> Self {
        let sector = u64::from(boot_sector.sector_size);
        let fat_offset = u64::from(boot_sector.num_reserved_sectors) * sector;
        let fat_bytes = u64::from(boot_sector.sectors_per_fat) * sector;
        let root_dir_offset = fat_offset + u64::from(boot_sector.num_fats) * fat_bytes;
        let root_dir_bytes = u64::from(boot_sector.max_num_root_entries) * DIR_ENTRY_SIZE as u64;
        let data_offset = root_dir_offset + root_dir_bytes;
        let bytes_per_cluster =
            u32::from(boot_sector.sectors_per_cluster) * u32::from(boot_sector.sector_size);
        // One FAT copy holds fat_bytes * 8 bits at 12 bits per entry.
        let fat_entry_count = (fat_bytes * 8 / 12) as usize;
        let partition_bytes = u64::from(boot_sector.total_sector_count) * sector;
        let data_clusters = (partition_bytes.saturating_sub(data_offset)
            / u64::from(bytes_per_cluster.max(1))) as u32;
        Self {
            fat_offset,
            fat_bytes,
            root_dir_offset,
            root_dir_bytes,
            data_offset,
            bytes_per_cluster,
            fat_entry_count,
            data_clusters,
        }
    }

    /// Highest cluster number the data area can back.
    pub fn max_cluster(&self) -> u16 {
        (1 + u64::from(self.data_clusters)).min(u64::from(u16::MAX)) as u16
    }

    /// Byte offset of data cluster `cluster`. Cluster numbering starts at 2
    /// and ends at `max_cluster`; anything outside that range has no data
    /// offset inside the image.
    pub fn cluster_offset(&self, cluster: u16) -> FatpackResult<u64> {
        if cluster < 2 || cluster > self.max_cluster() {
            return Err(FatpackError::CorruptImage(format!(
                "cluster {cluster} is outside the data area"
            )));
        }
        Ok(self.data_offset + u64::from(cluster - 2) * u64::from(self.bytes_per_cluster))
    }
}
