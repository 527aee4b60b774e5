#[macro_use]
extern crate log;

mod gilib;
pub use self::{
    gilib::binning, gilib::compress_file, gilib::default_index_path, gilib::index_bgzf,
    gilib::merge_chunks, gilib::parse_map_line, gilib::read_map, gilib::read_sample_file,
    gilib::Allele, gilib::AlleleSet, gilib::Annotation, gilib::AnnotationType,
    gilib::AnnotationValue, gilib::BgzfReader, gilib::BgzfWriter, gilib::BlockIndex, gilib::Chunk,
    gilib::Cli, gilib::Commands, gilib::GenoError, gilib::GenoidxParams, gilib::GenotypeData,
    gilib::Impute2Context, gilib::IndexArgs, gilib::IndexConfig, gilib::IndexedStore,
    gilib::LdArgs, gilib::Ld, gilib::LdEstimator, gilib::LdPrecondition, gilib::LineDecoder,
    gilib::MapEntry, gilib::Overlay, gilib::OverlayVariant, gilib::PedMapContext, gilib::Preset,
    gilib::PresetFlags, gilib::QueryArgs, gilib::RangeIndex, gilib::RangeIndexBuilder,
    gilib::Region, gilib::Result, gilib::Sample, gilib::SampleAnnotation,
    gilib::SampleAnnotationKind, gilib::SampleCall, gilib::SampleIds, gilib::SampleValue,
    gilib::Sequence, gilib::SourceParams, gilib::StrandOrientation, gilib::SymbolicAllele,
    gilib::Variant, gilib::VariantBuilder, gilib::VariantIter, gilib::VariantKey,
    gilib::VariantView, gilib::VcfContext, gilib::VirtualOffset, gilib::EOF_MARKER,
    gilib::MAX_BLOCK_DATA,
};
