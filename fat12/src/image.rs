// FAT12 image engine
// One-shot full decode on open (boot sector -> FAT -> root -> subdirectories),
// then export, import, and reporting against the in-memory model. Import is
// the only write path: it reopens the image read-write, streams the data
// clusters, then rewrites the FAT and root-directory regions in full.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use fatpack_core::{FatpackError, FatpackResult};
use log::{debug, info};

use crate::alloc::{find_free_cluster, free_cluster_count, required_clusters};
use crate::boot_sector::{BootSector, DiskLayout};
use crate::constants::*;
use crate::directory::{self, DirEntry};
use crate::fat::FatTable;
use crate::report::DiskReport;

pub struct Fat12Image {
    path: PathBuf,
    boot_sector: BootSector,
    layout: DiskLayout,
    fat: FatTable,
    root_entries: Vec<DirEntry>,
    subdirectories: BTreeMap<String, Vec<DirEntry>>,
}

impl Fat12Image {
    /// Open an image and decode its full structure into memory. The read
    /// handle is dropped afterwards; each operation reopens the file for
    /// exactly as long as it needs it.
    pub fn open<P: AsRef<Path>>(path: P) -> FatpackResult<Self> {
        let path = path.as_ref().to_path_buf();
        info!("Opening FAT12 image: {}", path.display());

        let mut file = File::open(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                FatpackError::ImageNotFound(path.display().to_string())
            } else {
                FatpackError::IoError(e)
            }
        })?;

        let boot_sector = BootSector::read(&mut file)?;
        let layout = DiskLayout::from_boot_sector(&boot_sector);
        debug!(
            "layout: FAT at {:#x}, root directory at {:#x}, data at {:#x}",
            layout.fat_offset, layout.root_dir_offset, layout.data_offset
        );
        let fat = FatTable::decode(&mut file, &layout)?;
        let root_entries = directory::read_root(&mut file, &boot_sector, &layout)?;
        let subdirectories = directory::read_subdirectories(&mut file, &layout, &root_entries)?;
        info!(
            "decoded {} root slots, {} subdirectories, {} free clusters",
            root_entries.len(),
            subdirectories.len(),
            free_cluster_count(&fat, layout.max_cluster())
        );

        Ok(Self {
            path,
            boot_sector,
            layout,
            fat,
            root_entries,
            subdirectories,
        })
    }

    pub fn boot_sector(&self) -> &BootSector {
        &self.boot_sector
    }

    pub fn layout(&self) -> &DiskLayout {
        &self.layout
    }

    pub fn fat(&self) -> &FatTable {
        &self.fat
    }

    pub fn root_entries(&self) -> &[DirEntry] {
        &self.root_entries
    }

    pub fn subdirectories(&self) -> &BTreeMap<String, Vec<DirEntry>> {
        &self.subdirectories
    }

    pub fn report(&self) -> FatpackResult<DiskReport> {
        DiskReport::analyze(&self.boot_sector, &self.root_entries, &self.subdirectories)
    }

    /// Copy a file out of the image to `dest_dir` on the host, returning the
    /// path written. `logical_path` is at most one subdirectory deep, e.g.
    /// `DOCS/NOTES.TXT`; a leading slash is accepted.
    pub fn export(&self, logical_path: &str, dest_dir: &Path) -> FatpackResult<PathBuf> {
        let (subdir, file_name) = split_logical_path(logical_path);
        if file_name.is_empty() {
            return Err(FatpackError::FileNotFound(logical_path.to_string()));
        }

        let entries: &[DirEntry] = match &subdir {
            None => &self.root_entries,
            Some(name) => {
                let entries = self
                    .subdirectories
                    .get(name)
                    .ok_or_else(|| FatpackError::SubdirectoryNotFound(name.clone()))?;
                let dir_path = logical_dir_path(logical_path);
                if !entries.iter().any(|e| e.path == dir_path) {
                    return Err(FatpackError::SubdirectoryNotFound(name.clone()));
                }
                entries
            }
        };

        let entry = entries
            .iter()
            .find(|e| !e.is_tombstone() && !e.is_directory && e.full_name() == file_name)
            .ok_or_else(|| FatpackError::FileNotFound(file_name.clone()))?;

        info!(
            "exporting {} ({} bytes from cluster {})",
            file_name, entry.file_size, entry.first_logical_cluster
        );

        let dest = dest_dir.join(&file_name);
        let mut image = File::open(&self.path)?;
        let mut output = File::create(&dest)?;

        let cluster_bytes = self.layout.bytes_per_cluster as usize;
        let mut buffer = vec![0u8; cluster_bytes];
        let mut remaining = entry.file_size as usize;
        let mut cluster = entry.first_logical_cluster;

        while remaining > 0 {
            image.seek(SeekFrom::Start(self.layout.cluster_offset(cluster)?))?;
            image.read_exact(&mut buffer)?;
            let take = remaining.min(cluster_bytes);
            output.write_all(&buffer[..take])?;
            remaining -= take;
            if remaining == 0 {
                break;
            }
            let next = self.fat.entry(cluster)?;
            if !FatTable::is_chain_link(next) {
                return Err(FatpackError::CorruptImage(format!(
                    "cluster chain of {} ends {} bytes early",
                    file_name, remaining
                )));
            }
            cluster = next;
        }
        output.flush()?;

        Ok(dest)
    }

    /// Copy a host file into the image's root directory, returning the
    /// destination name. All pre-checks run before the first disk write, so
    /// a refused import leaves the image byte-for-byte untouched.
    pub fn import<P: AsRef<Path>>(&mut self, host_path: P) -> FatpackResult<String> {
        let host_path = host_path.as_ref();
        let destination = host_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| FatpackError::InvalidFileName(host_path.display().to_string()))?
            .to_ascii_uppercase();
        let (name, extension) = split_destination(&destination)?;

        if self
            .root_entries
            .iter()
            .any(|e| !e.is_tombstone() && e.full_name() == destination)
        {
            return Err(FatpackError::AlreadyExists(destination));
        }

        let content = std::fs::read(host_path)?;
        let cluster_bytes = self.layout.bytes_per_cluster;
        // Even an empty file owns its first cluster.
        let required = required_clusters(content.len() as u64, cluster_bytes).max(1);
        let available = free_cluster_count(&self.fat, self.layout.max_cluster());
        if available < required {
            return Err(FatpackError::InsufficientSpace {
                required,
                available,
            });
        }

        let slot_index = self
            .root_entries
            .iter()
            .position(|e| e.is_tombstone())
            .ok_or(FatpackError::DirectoryFull)?;

        let first_cluster = find_free_cluster(&self.fat, self.layout.max_cluster())
            .ok_or(FatpackError::OutOfFreeClusters)?;
        info!(
            "importing {} as {} ({} bytes, {} clusters from cluster {})",
            host_path.display(),
            destination,
            content.len(),
            required,
            first_cluster
        );

        let new_entry = DirEntry {
            name,
            extension,
            attributes: ATTR_ARCHIVE,
            first_logical_cluster: first_cluster,
            file_size: content.len() as u32,
            path: "/".to_string(),
            parent_cluster: self.root_entries[slot_index].parent_cluster,
            ..DirEntry::default()
        };

        // Read-write handle scoped to the write-back; dropped on every exit.
        let mut image = OpenOptions::new().read(true).write(true).open(&self.path)?;
        self.write_chain(&mut image, first_cluster, &content, required)?;
        self.root_entries[slot_index] = new_entry;
        self.write_fat_region(&mut image)?;
        self.write_root_directory(&mut image)?;
        image.flush()?;

        Ok(destination)
    }

    /// Stream `content` cluster by cluster, linking the FAT chain as clusters
    /// are consumed and zero-padding the tail of the allocated span.
    fn write_chain(
        &mut self,
        image: &mut File,
        first_cluster: u16,
        content: &[u8],
        required: u32,
    ) -> FatpackResult<()> {
        let cluster_bytes = self.layout.bytes_per_cluster as usize;
        let mut cluster = first_cluster;
        let mut written = 0usize;

        loop {
            image.seek(SeekFrom::Start(self.layout.cluster_offset(cluster)?))?;
            let take = (content.len() - written).min(cluster_bytes);
            image.write_all(&content[written..written + take])?;
            written += take;

            if written < content.len() {
                // Hold the slot so the next scan cannot hand the same
                // cluster back, then link it.
                self.fat.set_entry(cluster, FAT12_RESERVED)?;
                let next = find_free_cluster(&self.fat, self.layout.max_cluster())
                    .ok_or(FatpackError::OutOfFreeClusters)?;
                self.fat.set_entry(cluster, next)?;
                cluster = next;
            } else {
                self.fat.set_entry(cluster, FAT12_EOC)?;
                let tail = required as usize * cluster_bytes - content.len();
                if tail > 0 {
                    image.write_all(&vec![0u8; tail])?;
                }
                return Ok(());
            }
        }
    }

    /// Re-encode the whole FAT and overwrite every on-disk copy.
    fn write_fat_region(&self, image: &mut File) -> FatpackResult<()> {
        let packed = self.fat.encode();
        for copy in 0..self.boot_sector.num_fats {
            let offset = self.layout.fat_offset + u64::from(copy) * self.layout.fat_bytes;
            image.seek(SeekFrom::Start(offset))?;
            image.write_all(&packed)?;
        }
        Ok(())
    }

    /// Overwrite the root-directory region in full from the in-memory slots.
    fn write_root_directory(&self, image: &mut File) -> FatpackResult<()> {
        let mut raw = Vec::with_capacity(self.root_entries.len() * DIR_ENTRY_SIZE);
        for entry in &self.root_entries {
            raw.extend_from_slice(&directory::encode_slot(entry));
        }
        image.seek(SeekFrom::Start(self.layout.root_dir_offset))?;
        image.write_all(&raw)?;
        Ok(())
    }
}

/// Split a logical in-image path into its optional subdirectory segment and
/// the bare file name, both upper-cased.
fn split_logical_path(path: &str) -> (Option<String>, String) {
    let mut parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let file_name = parts
        .pop()
        .map(|s| s.to_ascii_uppercase())
        .unwrap_or_default();
    let subdir = parts.last().map(|s| s.to_ascii_uppercase());
    (subdir, file_name)
}

/// Canonical slash-terminated directory path of a logical path, e.g.
/// `DOCS/NOTES.TXT` -> `/DOCS/`.
fn logical_dir_path(path: &str) -> String {
    let mut parts: Vec<String> = path
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|s| s.to_ascii_uppercase())
        .collect();
    parts.pop();
    if parts.is_empty() {
        "/".to_string()
    } else {
        format!("/{}/", parts.join("/"))
    }
}

/// Split a host basename into 8.3 name and extension on the first dot.
fn split_destination(destination: &str) -> FatpackResult<(String, String)> {
    let (name, extension) = match destination.split_once('.') {
        Some((name, extension)) => (name.to_string(), extension.to_string()),
        None => (destination.to_string(), String::new()),
    };
    if name.is_empty() || name.len() > 8 || extension.len() > 3 {
        return Err(FatpackError::InvalidFileName(destination.to_string()));
    }
    Ok((name, extension))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;
    use std::fs;

    #[test]
    fn splits_logical_paths_one_level_deep() {
        assert_eq!(split_logical_path("NOTES.TXT"), (None, "NOTES.TXT".into()));
        assert_eq!(
            split_logical_path("docs/notes.txt"),
            (Some("DOCS".into()), "NOTES.TXT".into())
        );
        assert_eq!(
            split_logical_path("/DOCS/NOTES.TXT"),
            (Some("DOCS".into()), "NOTES.TXT".into())
        );
        assert_eq!(logical_dir_path("DOCS/NOTES.TXT"), "/DOCS/");
        assert_eq!(logical_dir_path("NOTES.TXT"), "/");
    }

    #[test]
    fn rejects_names_that_do_not_fit_8_3() {
        assert!(split_destination("TOOLONGNAME.TXT").is_err());
        assert!(split_destination("NAME.EXTS").is_err());
        assert!(split_destination(".TXT").is_err());
        assert_eq!(
            split_destination("README").unwrap(),
            ("README".into(), String::new())
        );
        assert_eq!(
            split_destination("A.B").unwrap(),
            ("A".into(), "B".into())
        );
    }

    #[test]
    fn exports_exactly_file_size_bytes_around_cluster_boundaries() {
        for size in [512usize, 1024, 1023, 1025, 1] {
            let content: Vec<u8> = (0..size).map(|i| (i % 251) as u8).collect();
            let mut bytes = blank_floppy();
            put_entry(&mut bytes, ROOT_DIR_OFFSET, "BLOB", "BIN", 0x20, 2, size as u32);
            put_chain(&mut bytes, 2, &content);
            let file = write_image(&bytes);

            let image = Fat12Image::open(file.path()).unwrap();
            let out_dir = tempfile::tempdir().unwrap();
            let dest = image.export("BLOB.BIN", out_dir.path()).unwrap();
            assert_eq!(fs::read(dest).unwrap(), content, "size {size}");
        }
    }

    #[test]
    fn exports_from_a_subdirectory() {
        let mut bytes = blank_floppy();
        put_entry(&mut bytes, ROOT_DIR_OFFSET, "DOCS", "", 0x10, 2, 0);
        put_subdirectory(&mut bytes, 2, 0);
        let content = b"hello from a subdirectory".to_vec();
        put_entry(
            &mut bytes,
            DATA_OFFSET + 2 * 32,
            "NOTES",
            "TXT",
            0x20,
            3,
            content.len() as u32,
        );
        put_chain(&mut bytes, 3, &content);
        let file = write_image(&bytes);

        let image = Fat12Image::open(file.path()).unwrap();
        let out_dir = tempfile::tempdir().unwrap();
        let dest = image.export("DOCS/NOTES.TXT", out_dir.path()).unwrap();
        assert_eq!(fs::read(dest).unwrap(), content);

        assert!(matches!(
            image.export("MISSING/NOTES.TXT", out_dir.path()),
            Err(FatpackError::SubdirectoryNotFound(_))
        ));
        assert!(matches!(
            image.export("DOCS/ABSENT.TXT", out_dir.path()),
            Err(FatpackError::FileNotFound(_))
        ));
    }

    #[test]
    fn import_links_a_chain_and_consumes_exactly_the_needed_clusters() {
        let file = write_image(&blank_floppy());
        let mut image = Fat12Image::open(file.path()).unwrap();
        let max_cluster = image.layout().max_cluster();
        let free_before = free_cluster_count(image.fat(), max_cluster);

        let content: Vec<u8> = (0..5000u32).map(|i| (i % 239) as u8).collect();
        let host_dir = tempfile::tempdir().unwrap();
        let host_path = host_dir.path().join("data.bin");
        fs::write(&host_path, &content).unwrap();

        let destination = image.import(&host_path).unwrap();
        assert_eq!(destination, "DATA.BIN");
        assert_eq!(free_before - free_cluster_count(image.fat(), max_cluster), 10);

        // The chain must terminate with an end-of-chain marker.
        let entry = image
            .root_entries()
            .iter()
            .find(|e| !e.is_tombstone() && e.full_name() == "DATA.BIN")
            .unwrap();
        let mut cluster = entry.first_logical_cluster;
        let mut hops = 1;
        loop {
            let value = image.fat().entry(cluster).unwrap();
            if FatTable::is_end_of_chain(value) {
                break;
            }
            cluster = value;
            hops += 1;
        }
        assert_eq!(hops, 10);
        assert_eq!(entry.file_size, 5000);
    }

    #[test]
    fn import_then_export_round_trips_the_content() {
        let file = write_image(&blank_floppy());
        let mut image = Fat12Image::open(file.path()).unwrap();

        let content: Vec<u8> = (0..3000u32).map(|i| (i * 13 % 256) as u8).collect();
        let host_dir = tempfile::tempdir().unwrap();
        let host_path = host_dir.path().join("round.dat");
        fs::write(&host_path, &content).unwrap();
        image.import(&host_path).unwrap();

        // Reopen so the export runs against what actually hit the disk.
        let reopened = Fat12Image::open(file.path()).unwrap();
        let dest = reopened.export("ROUND.DAT", host_dir.path()).unwrap();
        assert_eq!(fs::read(dest).unwrap(), content);

        let report = reopened.report().unwrap();
        assert_eq!(report.used_space, 6 * 512);
    }

    #[test]
    fn refused_imports_leave_the_image_untouched() {
        let mut bytes = blank_floppy();
        put_entry(&mut bytes, ROOT_DIR_OFFSET, "TAKEN", "TXT", 0x20, 2, 3);
        put_chain(&mut bytes, 2, b"abc");
        let file = write_image(&bytes);
        let before = fs::read(file.path()).unwrap();

        let host_dir = tempfile::tempdir().unwrap();

        // Duplicate name.
        let mut image = Fat12Image::open(file.path()).unwrap();
        let taken = host_dir.path().join("taken.txt");
        fs::write(&taken, b"other").unwrap();
        assert!(matches!(
            image.import(&taken),
            Err(FatpackError::AlreadyExists(_))
        ));
        assert_eq!(fs::read(file.path()).unwrap(), before);

        // More clusters than the data area holds.
        let mut image = Fat12Image::open(file.path()).unwrap();
        let huge = host_dir.path().join("huge.bin");
        fs::write(&huge, vec![0u8; 2 * 1_474_560]).unwrap();
        assert!(matches!(
            image.import(&huge),
            Err(FatpackError::InsufficientSpace { .. })
        ));
        assert_eq!(fs::read(file.path()).unwrap(), before);
    }

    #[test]
    fn imports_larger_than_the_data_area_cannot_grow_the_image() {
        // The FAT's 3072 packed slots overhang the 2847 backed clusters; a
        // file sized into that overhang must be refused up front, not
        // written past the end of the image.
        let file = write_image(&blank_floppy());
        let before = fs::read(file.path()).unwrap();

        let mut image = Fat12Image::open(file.path()).unwrap();
        assert_eq!(
            free_cluster_count(image.fat(), image.layout().max_cluster()),
            2847
        );

        let host_dir = tempfile::tempdir().unwrap();
        let host_path = host_dir.path().join("huge.bin");
        // 1,460,000 bytes = 2852 clusters: past the data area, within the
        // FAT's nominal slot count.
        fs::write(&host_path, vec![0x5Au8; 1_460_000]).unwrap();
        assert!(matches!(
            image.import(&host_path),
            Err(FatpackError::InsufficientSpace {
                required: 2852,
                available: 2847,
            })
        ));

        let after = fs::read(file.path()).unwrap();
        assert_eq!(after.len(), before.len());
        assert_eq!(after, before);
    }

    #[test]
    fn full_root_directory_refuses_imports() {
        let mut bytes = blank_floppy();
        for slot in 0..224 {
            let name = format!("F{slot:03}");
            put_entry(
                &mut bytes,
                ROOT_DIR_OFFSET + slot * 32,
                &name,
                "DAT",
                0x20,
                2,
                0,
            );
        }
        let file = write_image(&bytes);
        let before = fs::read(file.path()).unwrap();

        let mut image = Fat12Image::open(file.path()).unwrap();
        let host_dir = tempfile::tempdir().unwrap();
        let host_path = host_dir.path().join("extra.txt");
        fs::write(&host_path, b"x").unwrap();
        assert!(matches!(
            image.import(&host_path),
            Err(FatpackError::DirectoryFull)
        ));
        assert_eq!(fs::read(file.path()).unwrap(), before);
    }

    #[test]
    fn empty_files_still_own_one_cluster() {
        let file = write_image(&blank_floppy());
        let mut image = Fat12Image::open(file.path()).unwrap();
        let max_cluster = image.layout().max_cluster();
        let free_before = free_cluster_count(image.fat(), max_cluster);

        let host_dir = tempfile::tempdir().unwrap();
        let host_path = host_dir.path().join("empty.txt");
        fs::write(&host_path, b"").unwrap();
        image.import(&host_path).unwrap();
        assert_eq!(free_before - free_cluster_count(image.fat(), max_cluster), 1);

        let reopened = Fat12Image::open(file.path()).unwrap();
        let out = reopened.export("EMPTY.TXT", host_dir.path()).unwrap();
        assert_eq!(fs::read(out).unwrap(), Vec::<u8>::new());
    }
}
