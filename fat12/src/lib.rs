// FAT12 on-disk structure engine
// Decodes boot sector, packed FAT, and directory tables from a disk image,
// and writes modified FAT and root-directory regions back in place.

pub mod alloc;
pub mod boot_sector;
pub mod constants;
pub mod directory;
pub mod fat;
pub mod image;
pub mod report;
pub mod test_helpers;

pub use boot_sector::{BootSector, DiskLayout};
pub use directory::{DirEntry, SlotKind};
pub use fat::FatTable;
pub use fatpack_core::{FatpackError, FatpackResult};
pub use image::Fat12Image;
pub use report::DiskReport;
