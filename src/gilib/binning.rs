//! UCSC hierarchical binning over 0-based half-open intervals: six levels of
//! 512Mb, 64Mb, 8Mb, 1Mb, 128kb and 16kb bins.

/// Width of the smallest bin and of a linear-index window, as a shift
pub const MIN_SHIFT: u32 = 14;
pub const DEPTH: u32 = 5;
/// Coordinates at or past this are outside the scheme
pub const MAX_COORD: u64 = 1 << (MIN_SHIFT + 3 * DEPTH);
/// htslib stores per-sequence metadata under this bin
pub const PSEUDO_BIN: u32 = 37450;

/// First bin id of each level, level 0 being the whole range
const LEVEL_OFFSETS: [u32; 6] = [0, 1, 9, 73, 585, 4681];

/// The smallest bin fully containing `[beg, end)`
pub fn reg2bin(beg: u64, end: u64) -> u32 {
    let end = end.max(beg + 1) - 1;
    for level in (1..=DEPTH).rev() {
        let shift = MIN_SHIFT + 3 * (DEPTH - level);
        if beg >> shift == end >> shift {
            return LEVEL_OFFSETS[level as usize] + (beg >> shift) as u32;
        }
    }
    0
}

/// Every bin that may hold a record overlapping `[beg, end)`, ascending
pub fn reg2bins(beg: u64, end: u64) -> Vec<u32> {
    let end = end.min(MAX_COORD);
    if beg >= end {
        return vec![];
    }
    let last = end - 1;
    let mut bins = vec![0];
    for level in 1..=DEPTH {
        let shift = MIN_SHIFT + 3 * (DEPTH - level);
        let offset = LEVEL_OFFSETS[level as usize];
        let first = offset + (beg >> shift) as u32;
        let stop = offset + (last >> shift) as u32;
        bins.extend(first..=stop);
    }
    bins
}

/// Linear-index window holding `pos`
pub fn window(pos: u64) -> usize {
    (pos >> MIN_SHIFT) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};
    use rstest::rstest;

    #[rstest]
    #[case(0, 1, 4681)]
    #[case(16383, 16384, 4681)]
    #[case(16384, 16385, 4682)]
    #[case(16000, 17000, 585)]
    #[case(0, 1 << 17, 585)]
    #[case(0, (1 << 17) + 1, 73)]
    #[case(0, 1 << 29, 0)]
    #[case(100, 100, 4681)]
    fn test_reg2bin(#[case] beg: u64, #[case] end: u64, #[case] bin: u32) {
        assert_eq!(reg2bin(beg, end), bin);
    }

    #[test]
    fn test_reg2bins_small_region() {
        let bins = reg2bins(1000, 2000);
        assert_eq!(bins, vec![0, 1, 9, 73, 585, 4681]);
    }

    #[test]
    fn test_reg2bins_empty_and_clamped() {
        assert!(reg2bins(10, 10).is_empty());
        assert!(reg2bins(MAX_COORD, MAX_COORD + 5).is_empty());
        assert_eq!(reg2bins(0, u64::MAX).len(), 37449);
    }

    #[test]
    fn test_query_bins_cover_record_bins() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..2000 {
            let rec_beg = rng.gen_range(0..MAX_COORD - 10_000);
            let rec_end = rec_beg + rng.gen_range(1..10_000);
            let query_beg = rng.gen_range(rec_beg.saturating_sub(5_000)..rec_end);
            let query_end = (query_beg + rng.gen_range(1..20_000)).max(rec_beg + 1);
            let bins = reg2bins(query_beg, query_end);
            assert!(bins.contains(&reg2bin(rec_beg, rec_end)));
            assert!(bins.windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn test_window() {
        assert_eq!(window(0), 0);
        assert_eq!(window(16383), 0);
        assert_eq!(window(16384), 1);
    }
}
