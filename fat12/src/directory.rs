// 32-byte directory records: slot decode/encode, root and subdirectory scans
// Subdirectories are read one level deep and one cluster wide; the 14 slots
// after `.` and `..` are all a single-cluster directory can hold.

use std::collections::BTreeMap;
use std::io::{Read, Seek, SeekFrom};

use fatpack_core::{FatpackError, FatpackResult};
use log::debug;
use serde::Serialize;

use crate::boot_sector::{BootSector, DiskLayout};
use crate::constants::*;

/// Slot classification by the first name byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum SlotKind {
    #[default]
    Live,
    /// First name byte 0xE5.
    Deleted,
    /// First name byte 0x00.
    EndOfDirectory,
}

/// A decoded directory slot. Tombstone slots carry only their kind; the
/// remaining 31 bytes are never interpreted as field data.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DirEntry {
    pub slot: SlotKind,
    pub name: String,
    pub extension: String,
    pub attributes: u8,
    pub reserved: u16,
    pub creation_time: u16,
    pub creation_date: u16,
    pub last_access_date: u16,
    pub last_write_time: u16,
    pub last_write_date: u16,
    pub first_logical_cluster: u16,
    pub file_size: u32,
    pub is_directory: bool,
    /// Slash-terminated logical path of the containing directory.
    pub path: String,
    pub parent_name: String,
    pub parent_cluster: u16,
}

impl DirEntry {
    pub fn is_tombstone(&self) -> bool {
        self.slot != SlotKind::Live
    }

    /// `NAME.EXT`, or just `NAME` for entries without an extension.
    pub fn full_name(&self) -> String {
        if self.extension.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.name, self.extension)
        }
    }
}

fn u16_at(raw: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([raw[offset], raw[offset + 1]])
}

fn u32_at(raw: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([raw[offset], raw[offset + 1], raw[offset + 2], raw[offset + 3]])
}

fn decode_name(raw: &[u8]) -> String {
    raw.iter()
        .filter(|&&b| b != b' ')
        .map(|&b| (b as char).to_ascii_uppercase())
        .collect()
}

/// Decode one 32-byte slot. `raw` must be exactly `DIR_ENTRY_SIZE` bytes.
pub(crate) fn decode_slot(raw: &[u8]) -> DirEntry {
    match raw[0] {
        END_OF_DIR_MARKER => {
            return DirEntry {
                slot: SlotKind::EndOfDirectory,
                ..DirEntry::default()
            }
        }
        DELETED_MARKER => {
            return DirEntry {
                slot: SlotKind::Deleted,
                ..DirEntry::default()
            }
        }
        _ => {}
    }

    let attributes = raw[11];
    DirEntry {
        slot: SlotKind::Live,
        name: decode_name(&raw[0..8]),
        extension: decode_name(&raw[8..11]),
        attributes,
        reserved: u16_at(raw, 12),
        creation_time: u16_at(raw, 14),
        creation_date: u16_at(raw, 16),
        last_access_date: u16_at(raw, 18),
        // bytes 20..22 are skipped
        last_write_time: u16_at(raw, 22),
        last_write_date: u16_at(raw, 24),
        first_logical_cluster: u16_at(raw, 26),
        file_size: u32_at(raw, 28),
        is_directory: attributes & ATTR_DIRECTORY != 0,
        ..DirEntry::default()
    }
}

/// Encode one slot back into its fixed 32-byte layout. Tombstone slots
/// re-emit only their marker byte over a zeroed record.
pub(crate) fn encode_slot(entry: &DirEntry) -> [u8; DIR_ENTRY_SIZE] {
    let mut raw = [0u8; DIR_ENTRY_SIZE];
    match entry.slot {
        SlotKind::EndOfDirectory => return raw,
        SlotKind::Deleted => {
            raw[0] = DELETED_MARKER;
            return raw;
        }
        SlotKind::Live => {}
    }

    raw[0..11].fill(b' ');
    for (i, b) in entry.name.bytes().take(8).enumerate() {
        raw[i] = b.to_ascii_uppercase();
    }
    for (i, b) in entry.extension.bytes().take(3).enumerate() {
        raw[8 + i] = b.to_ascii_uppercase();
    }
    raw[11] = entry.attributes;
    raw[12..14].copy_from_slice(&entry.reserved.to_le_bytes());
    raw[14..16].copy_from_slice(&entry.creation_time.to_le_bytes());
    raw[16..18].copy_from_slice(&entry.creation_date.to_le_bytes());
    raw[18..20].copy_from_slice(&entry.last_access_date.to_le_bytes());
    // bytes 20..22 stay zero
    raw[22..24].copy_from_slice(&entry.last_write_time.to_le_bytes());
    raw[24..26].copy_from_slice(&entry.last_write_date.to_le_bytes());
    raw[26..28].copy_from_slice(&entry.first_logical_cluster.to_le_bytes());
    raw[28..32].copy_from_slice(&entry.file_size.to_le_bytes());
    raw
}

fn read_region<R: Read + Seek>(
    reader: &mut R,
    offset: u64,
    bytes: usize,
    what: &str,
) -> FatpackResult<Vec<u8>> {
    reader.seek(SeekFrom::Start(offset))?;
    let mut raw = vec![0u8; bytes];
    reader.read_exact(&mut raw).map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            FatpackError::CorruptImage(format!("truncated {what}"))
        } else {
            FatpackError::IoError(e)
        }
    })?;
    Ok(raw)
}

/// Decode `count` consecutive 32-byte slots starting at `offset`.
pub fn read_flat<R: Read + Seek>(
    reader: &mut R,
    offset: u64,
    count: usize,
) -> FatpackResult<Vec<DirEntry>> {
    let raw = read_region(reader, offset, count * DIR_ENTRY_SIZE, "directory region")?;
    Ok(raw.chunks_exact(DIR_ENTRY_SIZE).map(decode_slot).collect())
}

/// Decode the full fixed-size root directory. Every entry gets the root
/// path and the root region's sector index as a parent sentinel; the
/// sentinel is never dereferenced as a real cluster.
pub fn read_root<R: Read + Seek>(
    reader: &mut R,
    boot_sector: &BootSector,
    layout: &DiskLayout,
) -> FatpackResult<Vec<DirEntry>> {
    let mut entries = read_flat(
        reader,
        layout.root_dir_offset,
        usize::from(boot_sector.max_num_root_entries),
    )?;
    let root_sentinel = (layout.root_dir_offset / u64::from(boot_sector.sector_size)) as u16;
    for entry in &mut entries {
        entry.path = "/".to_string();
        entry.parent_cluster = root_sentinel;
    }
    Ok(entries)
}

fn resolve_parent_name(
    parent_cluster: u16,
    subdirectories: &BTreeMap<String, Vec<DirEntry>>,
) -> String {
    if parent_cluster == 0 {
        return "/".to_string();
    }
    for (name, entries) in subdirectories {
        if entries
            .iter()
            .any(|e| !e.is_tombstone() && e.first_logical_cluster == parent_cluster)
        {
            return name.clone();
        }
    }
    "/".to_string()
}

/// Decode one cluster's worth of entries for every directory in the root.
/// `..` supplies the parent cluster; the parent name is resolved by a linear
/// scan over the subdirectories decoded so far.
pub fn read_subdirectories<R: Read + Seek>(
    reader: &mut R,
    layout: &DiskLayout,
    root_entries: &[DirEntry],
) -> FatpackResult<BTreeMap<String, Vec<DirEntry>>> {
    let mut subdirectories = BTreeMap::new();

    for root_entry in root_entries {
        if root_entry.is_tombstone() || !root_entry.is_directory {
            continue;
        }

        let cluster_offset = layout.cluster_offset(root_entry.first_logical_cluster)?;
        let raw = read_region(
            reader,
            cluster_offset,
            (2 + SUBDIR_ENTRY_SLOTS) * DIR_ENTRY_SIZE,
            "subdirectory cluster",
        )?;

        // The `..` entry's cluster field names the parent directory.
        let parent_cluster = u16_at(&raw, DIR_ENTRY_SIZE + 26);
        let parent_name = resolve_parent_name(parent_cluster, &subdirectories);
        let dir_path = format!("{}{}/", root_entry.path, root_entry.name);
        debug!(
            "subdirectory {} at cluster {}, parent cluster {}",
            dir_path, root_entry.first_logical_cluster, parent_cluster
        );

        let mut entries = Vec::with_capacity(SUBDIR_ENTRY_SLOTS);
        for chunk in raw[2 * DIR_ENTRY_SIZE..].chunks_exact(DIR_ENTRY_SIZE) {
            let mut entry = decode_slot(chunk);
            entry.path = dir_path.clone();
            entry.parent_name = parent_name.clone();
            entry.parent_cluster = parent_cluster;
            if entry.is_directory && parent_cluster != 0 {
                entry.path = format!("{}{}/", dir_path, entry.name);
            }
            entries.push(entry);
        }
        subdirectories.insert(root_entry.name.clone(), entries);
    }

    Ok(subdirectories)
}
