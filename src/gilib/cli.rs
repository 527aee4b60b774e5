extern crate pretty_env_logger;

use crate::gilib::IndexConfig;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};

#[derive(Parser, Clone, Debug)]
#[command(name = "genoidx")]
#[command(about = "Indexed random access to VCF, PED/MAP and IMPUTE2 genotypes")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

pub trait GenoidxParams: std::fmt::Debug {
    fn validate(&self) -> bool;
    fn debug(&self) -> bool;
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    #[command(about = "Build a .tbi index over a BGZF file")]
    Index(IndexArgs),

    #[command(about = "Print variants of a region as JSON lines")]
    Query(QueryArgs),

    #[command(about = "Linkage disequilibrium between two SNPs")]
    Ld(LdArgs),
}

/// Source file layout
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    /// VCF, indexed on CHROM/POS
    Vcf,
    /// PLINK MAP (the index is built over the MAP file), with its PED
    Pedmap,
    /// IMPUTE2 .haps, with its .sample
    Haps,
}

impl Preset {
    pub fn index_config(&self) -> IndexConfig {
        match self {
            Preset::Vcf => IndexConfig::vcf(),
            Preset::Pedmap => IndexConfig::ped_map(),
            Preset::Haps => IndexConfig::impute2(),
        }
    }
}

#[derive(Parser, Debug, Clone)]
pub struct IndexArgs {
    /// BGZF input (plain text with --bgzip)
    #[arg(short, long)]
    pub input: PathBuf,

    #[arg(short, long, value_enum, default_value_t = Preset::Vcf)]
    pub preset: Preset,

    /// Compress a plain text input to <input>.gz first
    #[arg(long, default_value_t = false)]
    pub bgzip: bool,

    /// Verbose logging
    #[arg(long, default_value_t = false)]
    pub debug: bool,
}

impl GenoidxParams for IndexArgs {
    fn debug(&self) -> bool {
        self.debug
    }

    fn validate(&self) -> bool {
        validate_file(&self.input, "--input")
    }
}

/// Files naming one indexed store
#[derive(clap::Args, Clone, Debug)]
pub struct SourceParams {
    /// Indexed BGZF input (VCF, MAP or haps)
    #[arg(short, long, help_heading = "Source")]
    pub input: PathBuf,

    #[arg(short, long, value_enum, default_value_t = Preset::Vcf, help_heading = "Source")]
    pub preset: Preset,

    /// PED file paired with a MAP input
    #[arg(long, help_heading = "Source")]
    pub ped: Option<PathBuf>,

    /// .sample file paired with a haps input
    #[arg(long, help_heading = "Source")]
    pub sample: Option<PathBuf>,

    /// Index path (default <input>.tbi)
    #[arg(long, help_heading = "Source")]
    pub index: Option<PathBuf>,
}

impl SourceParams {
    pub fn validate(&self) -> bool {
        let mut is_ok = validate_file(&self.input, "--input");

        if let Some(index) = &self.index {
            is_ok &= validate_file(index, "--index");
        }

        match self.preset {
            Preset::Pedmap => match &self.ped {
                Some(ped) => is_ok &= validate_file(ped, "--ped"),
                None => {
                    error!("--preset pedmap requires --ped");
                    is_ok = false;
                }
            },
            Preset::Haps => match &self.sample {
                Some(sample) => is_ok &= validate_file(sample, "--sample"),
                None => {
                    error!("--preset haps requires --sample");
                    is_ok = false;
                }
            },
            Preset::Vcf => {
                if self.ped.is_some() || self.sample.is_some() {
                    warn!("--ped/--sample are ignored for --preset vcf");
                }
            }
        }

        is_ok
    }
}

#[derive(Parser, Debug, Clone)]
pub struct QueryArgs {
    #[command(flatten)]
    pub source: SourceParams,

    /// seq, seq:pos or seq:start-end (1-based, inclusive)
    #[arg(short, long)]
    pub region: String,

    /// Make this base the reference allele of every SNP reported
    #[arg(long)]
    pub set_ref: Option<String>,

    /// Complement the alleles and calls of every SNP reported (applied before --set-ref)
    #[arg(long, default_value_t = false)]
    pub swap_strand: bool,

    /// Verbose logging
    #[arg(long, default_value_t = false)]
    pub debug: bool,
}

impl GenoidxParams for QueryArgs {
    fn debug(&self) -> bool {
        self.debug
    }

    fn validate(&self) -> bool {
        let mut is_ok = self.source.validate();

        if Region::parse(&self.region).is_none() {
            error!("--region {} is not seq, seq:pos or seq:start-end", self.region);
            is_ok = false;
        }

        if let Some(base) = &self.set_ref {
            if base.chars().count() != 1 {
                error!("--set-ref must be a single base");
                is_ok = false;
            }
        }

        is_ok
    }
}

#[derive(Parser, Debug, Clone)]
pub struct LdArgs {
    #[command(flatten)]
    pub source: SourceParams,

    /// First SNP as seq:pos
    #[arg(long)]
    pub first: String,

    /// Second SNP as seq:pos
    #[arg(long)]
    pub second: String,

    /// Verbose logging
    #[arg(long, default_value_t = false)]
    pub debug: bool,
}

impl GenoidxParams for LdArgs {
    fn debug(&self) -> bool {
        self.debug
    }

    fn validate(&self) -> bool {
        let mut is_ok = self.source.validate();

        for (label, value) in [("--first", &self.first), ("--second", &self.second)] {
            match Region::parse(value) {
                Some(region) if region.start == region.end => {}
                _ => {
                    error!("{} {} is not seq:pos", label, value);
                    is_ok = false;
                }
            }
        }

        is_ok
    }
}

/// 1-based inclusive interval on one sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    pub sequence: String,
    pub start: u64,
    pub end: u64,
}

impl Region {
    /// A bare sequence name spans the whole sequence
    pub fn parse(text: &str) -> Option<Region> {
        let (sequence, span) = match text.rsplit_once(':') {
            Some((sequence, span)) => (sequence, Some(span)),
            None => (text, None),
        };
        if sequence.is_empty() {
            return None;
        }
        let (start, end) = match span {
            None => (1, crate::gilib::binning::MAX_COORD),
            Some(span) => match span.split_once('-') {
                Some((start, end)) => (parse_pos(start)?, parse_pos(end)?),
                None => {
                    let pos = parse_pos(span)?;
                    (pos, pos)
                }
            },
        };
        if start == 0 || end < start {
            return None;
        }
        Some(Region {
            sequence: sequence.to_string(),
            start,
            end,
        })
    }
}

fn parse_pos(text: &str) -> Option<u64> {
    text.replace(',', "").parse().ok()
}

fn validate_file(path: &Path, label: &str) -> bool {
    if !path.exists() {
        error!("{} does not exist", label);
        return false;
    }
    if !path.is_file() {
        error!("{} is not a file", label);
        return false;
    }
    true
}
