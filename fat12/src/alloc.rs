// Free-cluster accounting and chain sizing
// Plain linear scans; the FAT is small and bounded, so no free list or
// index is kept. Scans stop at `max_cluster`: the FAT's packing rounds its
// slot count up past what the data area holds, and the surplus slots must
// never be handed out.

use crate::fat::FatTable;

/// First free cluster in `2..=max_cluster`, if any.
pub fn find_free_cluster(fat: &FatTable, max_cluster: u16) -> Option<u16> {
    fat.entries()
        .iter()
        .enumerate()
        .take(usize::from(max_cluster) + 1)
        .skip(2)
        .find(|(_, &value)| FatTable::is_free(value))
        .map(|(cluster, _)| cluster as u16)
}

pub fn free_cluster_count(fat: &FatTable, max_cluster: u16) -> u32 {
    fat.entries()
        .iter()
        .take(usize::from(max_cluster) + 1)
        .skip(2)
        .filter(|&&value| FatTable::is_free(value))
        .count() as u32
}

pub fn has_enough_free_clusters(fat: &FatTable, max_cluster: u16, required: u32) -> bool {
    free_cluster_count(fat, max_cluster) >= required
}

/// Clusters needed to hold `byte_len` bytes.
pub fn required_clusters(byte_len: u64, bytes_per_cluster: u32) -> u32 {
    byte_len.div_ceil(u64::from(bytes_per_cluster)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(entries: &[u16]) -> FatTable {
        FatTable::from_entries(entries.to_vec())
    }

    #[test]
    fn free_scan_starts_at_cluster_two() {
        // Clusters 0 and 1 hold media descriptor values, never data.
        let fat = table(&[0x000, 0x000, 0xFFF, 0x000, 0xFFF]);
        assert_eq!(find_free_cluster(&fat, 4), Some(3));
        assert_eq!(free_cluster_count(&fat, 4), 1);
    }

    #[test]
    fn free_scan_ignores_slots_past_the_data_area() {
        // Five FAT slots but only two backed clusters (2 and 3): the free
        // slot at index 4 is packing surplus, not allocatable space.
        let fat = table(&[0xFF0, 0xFFF, 0xFFF, 0xFFF, 0x000]);
        assert_eq!(find_free_cluster(&fat, 3), None);
        assert_eq!(free_cluster_count(&fat, 3), 0);
        assert_eq!(find_free_cluster(&fat, 4), Some(4));
    }

    #[test]
    fn exhausted_table_has_no_free_cluster() {
        let fat = table(&[0xFF0, 0xFFF, 0x003, 0xFFF]);
        assert_eq!(find_free_cluster(&fat, 3), None);
        assert_eq!(free_cluster_count(&fat, 3), 0);
        assert!(!has_enough_free_clusters(&fat, 3, 1));
        assert!(has_enough_free_clusters(&fat, 3, 0));
    }

    #[test]
    fn required_clusters_rounds_up_to_whole_clusters() {
        assert_eq!(required_clusters(0, 512), 0);
        assert_eq!(required_clusters(1, 512), 1);
        assert_eq!(required_clusters(512, 512), 1);
        assert_eq!(required_clusters(513, 512), 2);
        assert_eq!(required_clusters(5000, 512), 10);
    }
}
