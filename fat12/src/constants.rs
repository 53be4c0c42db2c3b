// FAT12 on-disk constants

// BPB field offsets within the boot sector
pub const BPB_BYTES_PER_SEC: usize = 0x0B;
pub const BPB_SEC_PER_CLUS: usize = 0x0D;
pub const BPB_RSVD_SEC_CNT: usize = 0x0E;
pub const BPB_NUM_FATS: usize = 0x10;
pub const BPB_ROOT_ENT_CNT: usize = 0x11;
pub const BPB_TOT_SEC16: usize = 0x13;
pub const BPB_FAT_SZ16: usize = 0x16;

// FAT entry value classes (12-bit)
pub const FAT12_FREE: u16 = 0x000;
pub const FAT12_MAX_CHAIN: u16 = 0xFEF; // highest value that still names a next cluster
pub const FAT12_RESERVED: u16 = 0xFF0;
pub const FAT12_BAD: u16 = 0xFF7;
pub const FAT12_EOC_MIN: u16 = 0xFF8; // any value >= this ends a chain
pub const FAT12_EOC: u16 = 0xFFF;

// Directory entries
pub const DIR_ENTRY_SIZE: usize = 32;
pub const DELETED_MARKER: u8 = 0xE5;
pub const END_OF_DIR_MARKER: u8 = 0x00;

pub const ATTR_DIRECTORY: u8 = 0x10;
pub const ATTR_ARCHIVE: u8 = 0x20;

/// Usable slots in a single-cluster directory after `.` and `..`.
/// Directories are read one level deep and one cluster wide only.
pub const SUBDIR_ENTRY_SLOTS: usize = 14;
