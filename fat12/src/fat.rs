// Packed 12-bit File Allocation Table codec
// On disk, two 12-bit entries share three bytes; the low entry's high nibble
// and the high entry's low nibble meet in the middle byte.

use std::io::{Read, Seek, SeekFrom};

use fatpack_core::{FatpackError, FatpackResult};

use crate::boot_sector::DiskLayout;
use crate::constants::{FAT12_EOC_MIN, FAT12_FREE, FAT12_MAX_CHAIN};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FatTable {
    entries: Vec<u16>,
}

impl FatTable {
    /// Decode the first FAT copy from the image into 12-bit values.
    pub fn decode<R: Read + Seek>(reader: &mut R, layout: &DiskLayout) -> FatpackResult<Self> {
        reader.seek(SeekFrom::Start(layout.fat_offset))?;
        let mut entries = vec![0u16; layout.fat_entry_count];
        let mut group = [0u8; 3];
        for pair in entries.chunks_mut(2) {
            reader.read_exact(&mut group).map_err(|e| {
                if e.kind() == std::io::ErrorKind::UnexpectedEof {
                    FatpackError::CorruptImage("truncated FAT region".to_string())
                } else {
                    FatpackError::IoError(e)
                }
            })?;
            pair[0] = u16::from(group[0]) | (u16::from(group[1] & 0x0F) << 8);
            if let Some(second) = pair.get_mut(1) {
                *second = u16::from(group[1] >> 4) | (u16::from(group[2]) << 4);
            }
        }
        Ok(Self { entries })
    }

    /// Repack the table into its exact on-disk byte layout. An odd trailing
    /// entry packs against an implicit zero.
    pub fn encode(&self) -> Vec<u8> {
        let mut packed = Vec::with_capacity(self.entries.len().div_ceil(2) * 3);
        for pair in self.entries.chunks(2) {
            let first = pair[0];
            let second = pair.get(1).copied().unwrap_or(0);
            packed.push((first & 0xFF) as u8);
            packed.push((((first >> 8) & 0x0F) | ((second & 0x0F) << 4)) as u8);
            packed.push(((second >> 4) & 0xFF) as u8);
        }
        packed
    }

    pub fn from_entries(entries: Vec<u16>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[u16] {
        &self.entries
    }

    pub fn entry(&self, cluster: u16) -> FatpackResult<u16> {
        self.entries
            .get(usize::from(cluster))
            .copied()
            .ok_or_else(|| {
                FatpackError::CorruptImage(format!("FAT has no entry for cluster {cluster}"))
            })
    }

    pub fn set_entry(&mut self, cluster: u16, value: u16) -> FatpackResult<()> {
        let slot = self.entries.get_mut(usize::from(cluster)).ok_or_else(|| {
            FatpackError::CorruptImage(format!("FAT has no entry for cluster {cluster}"))
        })?;
        *slot = value;
        Ok(())
    }

    pub fn is_free(value: u16) -> bool {
        value == FAT12_FREE
    }

    /// True when the value names the next cluster of a chain rather than a
    /// free/reserved/bad/end marker.
    pub fn is_chain_link(value: u16) -> bool {
        (1..=FAT12_MAX_CHAIN).contains(&value)
    }

    pub fn is_end_of_chain(value: u16) -> bool {
        value >= FAT12_EOC_MIN
    }
}
