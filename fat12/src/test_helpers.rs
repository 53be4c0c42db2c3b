// Test helpers: synthesize FAT12 floppy images byte by byte
// The helpers write raw on-disk structures directly so tests never depend
// on the codecs they exercise.

use std::io::Write;

use tempfile::NamedTempFile;

use crate::constants::{ATTR_DIRECTORY, DIR_ENTRY_SIZE};

pub const SECTOR_SIZE: usize = 512;
pub const SECTORS_PER_FAT: usize = 9;
pub const ROOT_DIR_OFFSET: usize = 19 * SECTOR_SIZE;
pub const DATA_OFFSET: usize = 33 * SECTOR_SIZE;

/// A freshly formatted 1.44MB floppy image: standard BPB, media descriptor
/// entries in both FAT copies, empty root directory.
pub fn blank_floppy() -> Vec<u8> {
    let mut image = vec![0u8; 1_474_560];
    image[11..13].copy_from_slice(&512u16.to_le_bytes());
    image[13] = 1; // sectors per cluster
    image[14..16].copy_from_slice(&1u16.to_le_bytes()); // reserved sectors
    image[16] = 2; // FAT copies
    image[17..19].copy_from_slice(&224u16.to_le_bytes()); // root entries
    image[19..21].copy_from_slice(&2880u16.to_le_bytes()); // total sectors
    image[22..24].copy_from_slice(&9u16.to_le_bytes()); // sectors per FAT

    // FAT[0] = 0xFF0 (media descriptor), FAT[1] = 0xFFF.
    for fat in 0..2 {
        let base = SECTOR_SIZE + fat * SECTORS_PER_FAT * SECTOR_SIZE;
        image[base] = 0xF0;
        image[base + 1] = 0xFF;
        image[base + 2] = 0xFF;
    }
    image
}

/// Poke one 12-bit entry into both FAT copies.
pub fn set_fat_entry(image: &mut [u8], cluster: usize, value: u16) {
    for fat in 0..2 {
        let base = SECTOR_SIZE + fat * SECTORS_PER_FAT * SECTOR_SIZE;
        let offset = base + cluster / 2 * 3;
        if cluster % 2 == 0 {
            image[offset] = (value & 0xFF) as u8;
            image[offset + 1] = (image[offset + 1] & 0xF0) | ((value >> 8) & 0x0F) as u8;
        } else {
            image[offset + 1] = (image[offset + 1] & 0x0F) | (((value & 0x0F) << 4) as u8);
            image[offset + 2] = (value >> 4) as u8;
        }
    }
}

/// Write a live 32-byte directory record at an absolute byte offset.
pub fn put_entry(
    image: &mut [u8],
    offset: usize,
    name: &str,
    extension: &str,
    attributes: u8,
    first_cluster: u16,
    file_size: u32,
) {
    let slot = &mut image[offset..offset + DIR_ENTRY_SIZE];
    slot.fill(0);
    slot[0..11].fill(b' ');
    slot[..name.len()].copy_from_slice(name.as_bytes());
    slot[8..8 + extension.len()].copy_from_slice(extension.as_bytes());
    slot[11] = attributes;
    slot[26..28].copy_from_slice(&first_cluster.to_le_bytes());
    slot[28..32].copy_from_slice(&file_size.to_le_bytes());
}

/// Write the `.` and `..` records of a single-cluster directory and mark
/// its cluster as end-of-chain.
pub fn put_subdirectory(image: &mut [u8], cluster: u16, parent_cluster: u16) {
    let offset = DATA_OFFSET + (cluster as usize - 2) * SECTOR_SIZE;
    put_entry(image, offset, ".", "", ATTR_DIRECTORY, cluster, 0);
    put_entry(
        image,
        offset + DIR_ENTRY_SIZE,
        "..",
        "",
        ATTR_DIRECTORY,
        parent_cluster,
        0,
    );
    set_fat_entry(image, cluster as usize, 0xFFF);
}

/// Lay `content` into consecutive clusters starting at `first_cluster` and
/// link the chain in the FAT.
pub fn put_chain(image: &mut [u8], first_cluster: u16, content: &[u8]) {
    let mut cluster = first_cluster as usize;
    for (i, chunk) in content.chunks(SECTOR_SIZE).enumerate() {
        let offset = DATA_OFFSET + (cluster - 2) * SECTOR_SIZE;
        image[offset..offset + chunk.len()].copy_from_slice(chunk);
        let last = (i + 1) * SECTOR_SIZE >= content.len();
        if last {
            set_fat_entry(image, cluster, 0xFFF);
        } else {
            set_fat_entry(image, cluster, (cluster + 1) as u16);
            cluster += 1;
        }
    }
    if content.is_empty() {
        set_fat_entry(image, first_cluster as usize, 0xFFF);
    }
}

/// Persist image bytes to a temp file for engine tests.
pub fn write_image(bytes: &[u8]) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("create temp image");
    file.write_all(bytes).expect("write temp image");
    file.flush().expect("flush temp image");
    file
}
