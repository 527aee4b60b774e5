use crate::gilib::{
    binning, default_index_path, read_map, Annotation, BgzfReader, BlockIndex, Chunk, GenoError, Impute2Context,
    IndexConfig, LineDecoder, PedMapContext, RangeIndex, Result, Sample, SampleCall, Variant, VariantView,
    VcfContext,
};
use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
    sync::Arc,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sequence {
    pub name: String,
    pub length: Option<u64>,
}

/// Lazy, forward-only variants of one query
pub type VariantIter<'a> = Box<dyn Iterator<Item = Result<Arc<Variant>>> + Send + 'a>;

/// Format-agnostic read access to genotype data. Absent sequences and
/// positions give empty results, never errors. Positions are 1-based.
pub trait GenotypeData: Send + Sync {
    fn sequence_names(&self) -> Vec<String>;
    fn sequences(&self) -> Vec<Sequence>;
    fn variant_annotations(&self) -> Vec<Annotation>;
    fn sample_annotations(&self) -> Vec<Annotation>;
    fn samples(&self) -> Vec<Sample>;

    /// Variants overlapping `[start, end]` in position order
    fn variants_between(&self, sequence: &str, start: u64, end: u64) -> VariantIter<'_>;

    fn sequence_by_name(&self, name: &str) -> Option<Sequence> {
        self.sequences().into_iter().find(|s| s.name == name)
    }

    fn variant_annotation(&self, id: &str) -> Option<Annotation> {
        self.variant_annotations().into_iter().find(|a| a.id == id)
    }

    fn sample_annotation(&self, id: &str) -> Option<Annotation> {
        self.sample_annotations().into_iter().find(|a| a.id == id)
    }

    /// Every variant starting exactly at `position`
    fn variants_at(&self, sequence: &str, position: u64) -> Result<Vec<Arc<Variant>>> {
        let mut found = vec![];
        for variant in self.variants_between(sequence, position, position) {
            let variant = variant?;
            if variant.start_pos() == position {
                found.push(variant);
            }
        }
        Ok(found)
    }

    /// Whole sequence; each call starts a fresh pass
    fn variants_in(&self, sequence: &str) -> VariantIter<'_> {
        self.variants_between(sequence, 1, binning::MAX_COORD)
    }

    /// Calls of the first variant at `position`, empty when there is none
    fn sample_calls_at(&self, sequence: &str, position: u64) -> Result<Vec<SampleCall>> {
        Ok(self
            .variants_at(sequence, position)?
            .first()
            .map(|v| v.sample_calls().to_vec())
            .unwrap_or_default())
    }

    fn snp_variant_at(&self, sequence: &str, position: u64) -> Result<Option<Arc<Variant>>> {
        Ok(self.variants_at(sequence, position)?.into_iter().find(|v| v.is_snp()))
    }
}

/// A BGZF source file, its block index and the decoder for its lines
pub struct IndexedStore {
    source: PathBuf,
    index: Arc<dyn BlockIndex>,
    decoder: Arc<LineDecoder>,
}

impl IndexedStore {
    pub fn new(source: PathBuf, index: Arc<dyn BlockIndex>, decoder: LineDecoder) -> Self {
        let expected = decoder.index_config();
        let actual = index.config();
        if (actual.col_seq, actual.col_beg) != (expected.col_seq, expected.col_beg) {
            warn!(
                "index of {} uses columns {}/{}, expected {}/{}",
                source.display(),
                actual.col_seq,
                actual.col_beg,
                expected.col_seq,
                expected.col_beg
            );
        }
        Self {
            source,
            index,
            decoder: Arc::new(decoder),
        }
    }

    pub fn open_vcf(path: &Path) -> Result<Self> {
        Self::open_vcf_with_index(path, &default_index_path(path))
    }

    pub fn open_vcf_with_index(path: &Path, index: &Path) -> Result<Self> {
        let index = RangeIndex::read(index)?;
        let mut reader = BgzfReader::open(path)?;
        let context = VcfContext::read_header(&mut reader).map_err(|e| e.at(path.display().to_string()))?;
        Ok(Self::new(path.to_path_buf(), Arc::new(index), LineDecoder::Vcf(context)))
    }

    /// `map` is the BGZF MAP file the index was built over
    pub fn open_ped_map(map: &Path, ped: &Path) -> Result<Self> {
        Self::open_ped_map_with_index(map, ped, &default_index_path(map))
    }

    pub fn open_ped_map_with_index(map: &Path, ped: &Path, index: &Path) -> Result<Self> {
        let index = RangeIndex::read(index)?;
        let markers = read_map(&mut BgzfReader::open(map)?).map_err(|e| e.at(map.display().to_string()))?;
        let ped_reader = BufReader::new(File::open(ped)?);
        let context = PedMapContext::new(&markers, ped_reader).map_err(|e| e.at(ped.display().to_string()))?;
        Ok(Self::new(map.to_path_buf(), Arc::new(index), LineDecoder::PedMap(context)))
    }

    pub fn open_impute2(haps: &Path, sample: &Path) -> Result<Self> {
        Self::open_impute2_with_index(haps, sample, &default_index_path(haps))
    }

    pub fn open_impute2_with_index(haps: &Path, sample: &Path, index: &Path) -> Result<Self> {
        let index = RangeIndex::read(index)?;
        let context = Impute2Context::from_sample_file(sample)?;
        Ok(Self::new(haps.to_path_buf(), Arc::new(index), LineDecoder::Impute2(context)))
    }

    pub fn decoder(&self) -> &LineDecoder {
        &self.decoder
    }

    pub fn source(&self) -> &Path {
        &self.source
    }
}

impl GenotypeData for IndexedStore {
    fn sequence_names(&self) -> Vec<String> {
        self.index.sequence_names()
    }

    fn sequences(&self) -> Vec<Sequence> {
        self.index
            .sequence_names()
            .into_iter()
            .map(|name| Sequence {
                length: self.decoder.sequence_length(&name),
                name,
            })
            .collect()
    }

    fn variant_annotations(&self) -> Vec<Annotation> {
        self.decoder.variant_annotations()
    }

    fn sample_annotations(&self) -> Vec<Annotation> {
        self.decoder.sample_annotations()
    }

    fn samples(&self) -> Vec<Sample> {
        self.decoder.samples()
    }

    fn variants_between(&self, sequence: &str, start: u64, end: u64) -> VariantIter<'_> {
        let beg = start.saturating_sub(1);
        let end = end.max(start);
        let chunks = self.index.chunks(sequence, beg, end);
        Box::new(RegionIter {
            source: self.source.clone(),
            reader: None,
            chunks: chunks.into_iter(),
            chunk_end: None,
            sequence: sequence.to_string(),
            beg,
            end,
            config: self.index.config().clone(),
            decoder: Arc::clone(&self.decoder),
            line: String::new(),
            done: false,
        })
    }
}

/// Walks the chunks of one query with its own file handle
struct RegionIter {
    source: PathBuf,
    reader: Option<BgzfReader<BufReader<File>>>,
    chunks: std::vec::IntoIter<Chunk>,
    chunk_end: Option<crate::gilib::VirtualOffset>,
    sequence: String,
    beg: u64,
    end: u64,
    config: IndexConfig,
    decoder: Arc<LineDecoder>,
    line: String,
    done: bool,
}

impl RegionIter {
    fn advance(&mut self) -> Result<Option<Arc<Variant>>> {
        if self.chunks.len() == 0 && self.chunk_end.is_none() {
            return Ok(None);
        }
        if self.reader.is_none() {
            self.reader = Some(BgzfReader::open(&self.source)?);
        }
        let Some(reader) = self.reader.as_mut() else {
            return Ok(None);
        };

        loop {
            let chunk_end = match self.chunk_end {
                Some(end) => end,
                None => match self.chunks.next() {
                    Some(chunk) => {
                        reader.seek(chunk.begin)?;
                        self.chunk_end = Some(chunk.end);
                        chunk.end
                    }
                    None => return Ok(None),
                },
            };

            let offset = reader.virtual_offset();
            if offset >= chunk_end || reader.read_line(&mut self.line)? == 0 {
                self.chunk_end = None;
                continue;
            }

            let at = |e: GenoError| e.at(format!("{} at {}", self.source.display(), offset));
            let Some((sequence, beg, end)) = self.config.parse_interval(&self.line).map_err(at)? else {
                continue;
            };
            if sequence != self.sequence || end <= self.beg {
                continue;
            }
            // records are sorted, nothing further can overlap
            if beg >= self.end {
                return Ok(None);
            }
            return self.decoder.decode(&self.line).map(Some).map_err(at);
        }
    }
}

impl Iterator for RegionIter {
    type Item = Result<Arc<Variant>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.advance() {
            Ok(Some(variant)) => Some(Ok(variant)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
