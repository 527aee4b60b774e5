extern crate pretty_env_logger;

#[macro_use]
extern crate log;

use clap::Parser;
use genoidx::{
    compress_file, default_index_path, index_bgzf, Allele, BlockIndex, Cli, Commands, GenoError, GenoidxParams,
    GenotypeData, IndexArgs, IndexedStore, Ld, LdArgs, LdEstimator, Overlay, OverlayVariant, Preset, QueryArgs,
    Region, Result, SourceParams, Variant, VariantView,
};
use serde::Serialize;
use std::{
    io::{self, BufWriter, Write},
    path::PathBuf,
    sync::Arc,
};

/// One `query` output line
#[derive(Serialize)]
struct VariantRecord<'a> {
    sequence: &'a str,
    start: u64,
    stop: Option<u64>,
    id: Option<&'a str>,
    alleles: Vec<&'a str>,
    reference: Option<&'a str>,
    minor_allele: Option<&'a str>,
    maf: f32,
    dosages: Vec<f32>,
    overridden: bool,
    swapped: bool,
}

impl<'a> VariantRecord<'a> {
    fn new(variant: &'a OverlayVariant) -> Self {
        Self {
            sequence: variant.sequence_name(),
            start: variant.start_pos(),
            stop: variant.stop_pos(),
            id: variant.primary_id(),
            alleles: variant.alleles().tokens(),
            reference: variant.ref_allele().map(Allele::as_str),
            minor_allele: variant.minor_allele().map(Allele::as_str),
            maf: variant.minor_allele_frequency(),
            dosages: variant.sample_dosages(),
            overridden: variant.is_overridden(),
            swapped: variant.is_strand_swapped(),
        }
    }
}

#[derive(Serialize)]
struct LdRecord<'a> {
    first: String,
    second: String,
    #[serde(flatten)]
    ld: &'a Ld,
}

fn open_store(source: &SourceParams) -> Result<IndexedStore> {
    let index = source
        .index
        .clone()
        .unwrap_or_else(|| default_index_path(&source.input));
    match (source.preset, &source.ped, &source.sample) {
        (Preset::Vcf, _, _) => IndexedStore::open_vcf_with_index(&source.input, &index),
        (Preset::Pedmap, Some(ped), _) => IndexedStore::open_ped_map_with_index(&source.input, ped, &index),
        (Preset::Haps, _, Some(sample)) => IndexedStore::open_impute2_with_index(&source.input, sample, &index),
        _ => Err(GenoError::format("source is missing its --ped or --sample file")),
    }
}

fn index_main(args: &IndexArgs) -> Result<()> {
    let input = match args.bgzip {
        true => {
            let mut compressed = args.input.clone().into_os_string();
            compressed.push(".gz");
            let compressed = PathBuf::from(compressed);
            compress_file(&args.input, &compressed)?;
            compressed
        }
        false => args.input.clone(),
    };

    let index = index_bgzf(&input, args.preset.index_config())?;
    let out = default_index_path(&input);
    index.write(&out)?;
    info!("wrote {} with {} sequences", out.display(), index.sequence_names().len());
    Ok(())
}

fn query_main(args: &QueryArgs) -> Result<()> {
    let region =
        Region::parse(&args.region).ok_or_else(|| GenoError::format(format!("bad --region {}", args.region)))?;
    let store = open_store(&args.source)?;
    debug!("{} samples", store.decoder().sample_ids().len());
    let mut overlay = Overlay::new(store);

    if args.swap_strand || args.set_ref.is_some() {
        let snps = overlay
            .variants_between(&region.sequence, region.start, region.end)
            .filter(|v| v.as_ref().map_or(true, |v| v.is_snp()))
            .collect::<Result<Vec<_>>>()?;
        if args.swap_strand {
            for snp in &snps {
                overlay.swap_strand(snp)?;
            }
            info!("swapped strand of {} SNPs", snps.len());
        }
        if let Some(base) = &args.set_ref {
            let base = Allele::of(base);
            let mut updated = 0;
            for snp in &snps {
                match overlay.update_ref_allele(snp, &base) {
                    Ok(()) => updated += 1,
                    Err(e) => warn!("{}: {}", snp.backing(), e),
                }
            }
            info!("updated {} of {} SNPs", updated, snps.len());
        }
    }

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let mut count = 0;
    for variant in overlay.variants_between(&region.sequence, region.start, region.end) {
        let variant = variant?;
        serde_json::to_writer(&mut out, &VariantRecord::new(&variant)).map_err(io::Error::from)?;
        writeln!(out)?;
        count += 1;
    }
    out.flush()?;
    info!("reported {} variants", count);
    Ok(())
}

fn snp_at(store: &IndexedStore, text: &str) -> Result<Arc<Variant>> {
    let region = Region::parse(text).ok_or_else(|| GenoError::format(format!("bad position {}", text)))?;
    store
        .snp_variant_at(&region.sequence, region.start)?
        .ok_or_else(|| GenoError::format(format!("no SNP at {}", text)))
}

fn ld_main(args: &LdArgs) -> Result<()> {
    let store = open_store(&args.source)?;
    let first = snp_at(&store, &args.first)?;
    let second = snp_at(&store, &args.second)?;
    let ld = LdEstimator::default().estimate(first.as_ref(), second.as_ref())?;

    let record = LdRecord {
        first: args.first.clone(),
        second: args.second.clone(),
        ld: &ld,
    };
    let mut out = io::stdout().lock();
    serde_json::to_writer(&mut out, &record).map_err(io::Error::from)?;
    writeln!(out)?;
    Ok(())
}

fn main() {
    let args = Cli::parse();
    let params: &dyn GenoidxParams = match &args.command {
        Commands::Index(args) => args,
        Commands::Query(args) => args,
        Commands::Ld(args) => args,
    };

    let level = if params.debug() {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    pretty_env_logger::formatted_timed_builder()
        .filter_level(level)
        .init();

    info!("starting");
    info!("params: {:#?}", params);
    if !params.validate() {
        error!("please fix arguments");
        std::process::exit(1);
    }

    let result = match &args.command {
        Commands::Index(args) => index_main(args),
        Commands::Query(args) => query_main(args),
        Commands::Ld(args) => ld_main(args),
    };
    if let Err(e) = result {
        error!("{}", e);
        std::process::exit(1);
    }
    info!("finished");
}
