use crate::gilib::{IndexConfig, VirtualOffset};

/// Compressed-file range `[begin, end)` that may hold records of interest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Chunk {
    pub begin: VirtualOffset,
    pub end: VirtualOffset,
}

impl Chunk {
    pub fn new(begin: VirtualOffset, end: VirtualOffset) -> Self {
        Self { begin, end }
    }
}

/// Resolves a genomic interval to the compressed ranges worth scanning.
/// Lookups are read-only and may run from many threads.
pub trait BlockIndex: Send + Sync {
    fn config(&self) -> &IndexConfig;

    /// Sequences in index order
    fn sequence_names(&self) -> Vec<String>;

    /// Sorted, non-overlapping chunks for 0-based half-open `[beg, end)`.
    /// Unknown sequences give no chunks.
    fn chunks(&self, sequence: &str, beg: u64, end: u64) -> Vec<Chunk>;
}

/// Merge sorted chunks that overlap or touch
pub fn merge_chunks(chunks: &[Chunk]) -> Vec<Chunk> {
    let mut merged: Vec<Chunk> = Vec::with_capacity(chunks.len());
    for chunk in chunks {
        match merged.last_mut() {
            Some(current) if chunk.begin <= current.end => {
                if chunk.end > current.end {
                    current.end = chunk.end;
                }
            }
            _ => merged.push(*chunk),
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn chunk(begin: u64, end: u64) -> Chunk {
        Chunk::new(VirtualOffset::from_raw(begin), VirtualOffset::from_raw(end))
    }

    #[test]
    fn test_merge_chunks() {
        let merged = merge_chunks(&[chunk(100, 200), chunk(150, 250), chunk(250, 260), chunk(300, 400)]);
        assert_eq!(merged, vec![chunk(100, 260), chunk(300, 400)]);
    }

    #[test]
    fn test_merge_contained() {
        assert_eq!(merge_chunks(&[chunk(0, 500), chunk(10, 20)]), vec![chunk(0, 500)]);
        assert!(merge_chunks(&[]).is_empty());
    }
}
