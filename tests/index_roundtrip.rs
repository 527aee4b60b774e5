mod common;

use common::{write_bgzf, write_index};
use genoidx::{
    BgzfReader, BlockIndex, GenotypeData, IndexConfig, IndexedStore, RangeIndex, VariantView,
};
use pretty_assertions::assert_eq;
use rand::{rngs::StdRng, Rng, SeedableRng};
use rstest::*;
use std::path::Path;
use tempfile::tempdir;

const HEADER: &str = "##fileformat=VCFv4.2\n#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\n";

/// Sorted sites-only VCF with overlapping records and shared positions
fn synthetic_vcf(seed: u64, per_sequence: usize) -> String {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut text = HEADER.to_string();
    let mut n = 0;
    for sequence in ["1", "2", "10"] {
        let mut pos: u64 = rng.gen_range(1..1_000);
        for _ in 0..per_sequence {
            // zero steps give several records at one position
            pos += rng.gen_range(0..6_000);
            let ref_len = match rng.gen_bool(0.1) {
                true => rng.gen_range(2..40_000),
                false => 1,
            };
            text.push_str(&format!(
                "{}\t{}\tv{}\t{}\tG\t.\t.\t.\n",
                sequence,
                pos,
                n,
                "A".repeat(ref_len)
            ));
            n += 1;
        }
    }
    text
}

/// (sequence, start, stop, id) of every record, read front to back
fn linear_scan(path: &Path) -> Vec<(String, u64, u64, String)> {
    let mut reader = BgzfReader::open(path).unwrap();
    let mut line = String::new();
    let mut records = vec![];
    while reader.read_line(&mut line).unwrap() > 0 {
        if line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        let start: u64 = fields[1].parse().unwrap();
        let stop = start + fields[3].len() as u64 - 1;
        records.push((fields[0].to_string(), start, stop, fields[2].to_string()));
    }
    records
}

#[rstest]
#[case(7, 400, 512)]
#[case(11, 150, 4096)]
#[case(42, 60, 0xff00)]
fn test_index_matches_linear_scan(#[case] seed: u64, #[case] per_sequence: usize, #[case] block_size: usize) {
    let dir = tempdir().unwrap();
    let vcf = write_bgzf(dir.path(), "synthetic.vcf.gz", &synthetic_vcf(seed, per_sequence), block_size);
    let tbi = write_index(&vcf, IndexConfig::vcf());
    let store = IndexedStore::open_vcf(&vcf).unwrap();
    let records = linear_scan(&vcf);
    assert_eq!(records.len(), 3 * per_sequence);

    // every present position
    for (sequence, start, _, _) in &records {
        let expected: Vec<&str> = records
            .iter()
            .filter(|(s, p, _, _)| s == sequence && p == start)
            .map(|r| r.3.as_str())
            .collect();
        let found = store.variants_at(sequence, *start).unwrap();
        let found: Vec<&str> = found.iter().map(|v| v.primary_id().unwrap()).collect();
        assert_eq!(found, expected, "{}:{}", sequence, start);
    }

    // random windows, including ones only reached by long records
    let mut rng = StdRng::seed_from_u64(seed + 1);
    for _ in 0..200 {
        let sequence = ["1", "2", "10"][rng.gen_range(0..3)];
        let start = rng.gen_range(1..2_500_000);
        let end = start + rng.gen_range(0..50_000);
        let expected: Vec<String> = records
            .iter()
            .filter(|(s, b, e, _)| s == sequence && *b <= end && *e >= start)
            .map(|r| r.3.clone())
            .collect();
        let found: Vec<String> = store
            .variants_between(sequence, start, end)
            .map(|v| v.unwrap().primary_id().unwrap().to_string())
            .collect();
        assert_eq!(found, expected, "{}:{}-{}", sequence, start, end);
    }

    let whole: Vec<String> = store
        .variants_in("10")
        .map(|v| v.unwrap().primary_id().unwrap().to_string())
        .collect();
    assert_eq!(whole.len(), per_sequence);

    let reread = RangeIndex::read(&tbi).unwrap();
    assert_eq!(reread.sequence_names(), vec!["1", "2", "10"]);
    assert_eq!(reread, genoidx::index_bgzf(&vcf, IndexConfig::vcf()).unwrap());
}

#[test]
fn test_unsorted_source_is_rejected() {
    let dir = tempdir().unwrap();
    let text = format!("{}1\t500\ta\tA\tG\t.\t.\t.\n1\t100\tb\tA\tG\t.\t.\t.\n", HEADER);
    let vcf = write_bgzf(dir.path(), "unsorted.vcf.gz", &text, 512);
    assert!(matches!(
        genoidx::index_bgzf(&vcf, IndexConfig::vcf()),
        Err(genoidx::GenoError::Format { .. })
    ));
}
