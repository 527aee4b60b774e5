#![allow(dead_code)]

use genoidx::{default_index_path, index_bgzf, BgzfWriter, IndexConfig};
use std::{
    fs::File,
    io::Write,
    path::{Path, PathBuf},
};

/// Compress `text` into small BGZF blocks so records straddle block boundaries
pub fn write_bgzf(dir: &Path, name: &str, text: &str, block_size: usize) -> PathBuf {
    let path = dir.join(name);
    let mut writer = BgzfWriter::with_block_size(File::create(&path).unwrap(), block_size);
    writer.write_all(text.as_bytes()).unwrap();
    writer.finish().unwrap();
    path
}

/// Build and persist `<path>.tbi`, returning the index path
pub fn write_index(path: &Path, config: IndexConfig) -> PathBuf {
    let index = index_bgzf(path, config).unwrap();
    let out = default_index_path(path);
    index.write(&out).unwrap();
    out
}

pub const VCF: &str = "##fileformat=VCFv4.2
##INFO=<ID=DP,Number=1,Type=Integer,Description=\"Total Depth\">
##INFO=<ID=AF,Number=A,Type=Float,Description=\"Allele Frequency\">
##FORMAT=<ID=GT,Number=1,Type=String,Description=\"Genotype\">
##contig=<ID=22,length=51304566>
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\ts1\ts2\ts3
22\t14431347\trs11089130\tC\tG\t.\tPASS\tDP=20;AF=0.5\tGT\t0/0\t0/1\t1/1
22\t14433624\trs738829\tA\tG\t.\tPASS\tDP=11;AF=0.33\tGT\t0|1\t0|0\t1|1
";

pub const MAP: &str = "22 rs11089130 0 14431347
22 rs738829 0 14433624
";

pub const PED: &str = "F1 S1 0 0 1 1 C C A G
F2 S2 0 0 2 2 C G A A
F3 S3 0 0 1 -9 G G G G
F4 S4 0 0 2 1 0 0 A G
";

pub const HAPS: &str = "22 rs11089130 14431347 C G 0 0 0 1 1 1
22 rs738829 14433624 A G 0 1 0 0 1 1
";

pub const SAMPLE: &str = "ID_1 ID_2 missing age bmi case
0 0 0 D C B
F1 s1 0 34 22.5 1
F2 s2 0 NA 27.0 0
F3 s3 0.1 51 NA NA
";
