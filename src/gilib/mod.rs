mod alleles;
pub use crate::gilib::alleles::{Allele, AlleleSet};

mod annotation;
pub use crate::gilib::annotation::{Annotation, AnnotationType};

mod bgzf;
pub use crate::gilib::bgzf::{compress_file, BgzfReader, BgzfWriter, VirtualOffset, EOF_MARKER, MAX_BLOCK_DATA};

pub mod binning;

mod blockindex;
pub use crate::gilib::blockindex::{merge_chunks, BlockIndex, Chunk};

mod cli;
pub use crate::gilib::cli::{
    Cli, Commands, GenoidxParams, IndexArgs, LdArgs, Preset, QueryArgs, Region, SourceParams,
};

mod decoder;
pub use crate::gilib::decoder::LineDecoder;

mod errors;
pub use crate::gilib::errors::{GenoError, LdPrecondition, Result};

mod impute2;
pub use crate::gilib::impute2::Impute2Context;

mod ld;
pub use crate::gilib::ld::{Ld, LdEstimator, StrandOrientation};

mod overlay;
pub use crate::gilib::overlay::{Overlay, OverlayVariant};

mod pedmap;
pub use crate::gilib::pedmap::{parse_map_line, read_map, MapEntry, PedMapContext};

mod sample;
pub use crate::gilib::sample::{read_sample_file, Sample, SampleAnnotation, SampleAnnotationKind, SampleValue};

mod store;
pub use crate::gilib::store::{GenotypeData, IndexedStore, Sequence, VariantIter};

mod tabix;
pub use crate::gilib::tabix::{
    default_index_path, index_bgzf, IndexConfig, PresetFlags, RangeIndex, RangeIndexBuilder,
};

mod variant;
pub use crate::gilib::variant::{
    AnnotationValue, SampleCall, SampleIds, SymbolicAllele, Variant, VariantBuilder, VariantKey, VariantView,
};

mod vcf;
pub use crate::gilib::vcf::VcfContext;
