use crate::gilib::{
    Annotation, Impute2Context, IndexConfig, PedMapContext, Result, Sample, SampleIds, Variant, VcfContext,
};
use std::sync::Arc;

/// Turns one data line into a variant given per-file context.
/// Contexts are built once per file and never change afterwards.
#[derive(Debug, Clone)]
pub enum LineDecoder {
    Vcf(VcfContext),
    PedMap(PedMapContext),
    Impute2(Impute2Context),
}

impl LineDecoder {
    pub fn decode(&self, line: &str) -> Result<Arc<Variant>> {
        match self {
            LineDecoder::Vcf(ctx) => ctx.decode(line).map(Arc::new),
            LineDecoder::PedMap(ctx) => ctx.decode(line),
            LineDecoder::Impute2(ctx) => ctx.decode(line).map(Arc::new),
        }
    }

    /// Index layout this format is indexed with
    pub fn index_config(&self) -> IndexConfig {
        match self {
            LineDecoder::Vcf(_) => IndexConfig::vcf(),
            LineDecoder::PedMap(_) => IndexConfig::ped_map(),
            LineDecoder::Impute2(_) => IndexConfig::impute2(),
        }
    }

    pub fn sample_ids(&self) -> &SampleIds {
        match self {
            LineDecoder::Vcf(ctx) => ctx.samples(),
            LineDecoder::PedMap(ctx) => ctx.sample_ids(),
            LineDecoder::Impute2(ctx) => ctx.sample_ids(),
        }
    }

    /// VCF carries only sample names
    pub fn samples(&self) -> Vec<Sample> {
        match self {
            LineDecoder::Vcf(ctx) => ctx.samples().iter().map(|id| Sample::new(id.clone(), None)).collect(),
            LineDecoder::PedMap(ctx) => ctx.samples().to_vec(),
            LineDecoder::Impute2(ctx) => ctx.samples().to_vec(),
        }
    }

    pub fn variant_annotations(&self) -> Vec<Annotation> {
        match self {
            LineDecoder::Vcf(ctx) => ctx.annotations().values().cloned().collect(),
            _ => vec![],
        }
    }

    pub fn sample_annotations(&self) -> Vec<Annotation> {
        match self {
            LineDecoder::Vcf(_) => vec![],
            LineDecoder::PedMap(_) => PedMapContext::sample_annotations(),
            LineDecoder::Impute2(ctx) => ctx.sample_annotations().to_vec(),
        }
    }

    /// Declared length of a sequence, when the format has one
    pub fn sequence_length(&self, name: &str) -> Option<u64> {
        match self {
            LineDecoder::Vcf(ctx) => ctx.contigs().get(name).copied().flatten(),
            _ => None,
        }
    }
}
