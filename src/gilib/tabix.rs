//! Tabix (`.tbi`) index: read, write, query and build.
//!
//! Layout, little-endian: magic `TBI\1`, `n_ref`, preset, `col_seq`,
//! `col_beg`, `col_end`, `meta`, `skip`, `l_nm`, NUL-terminated names, then
//! per sequence the bins (`bin`, `n_chunk`, chunk begin/end pairs) and the
//! linear index (`n_intv` offsets, one per 16kb window). The whole file is
//! normally BGZF-compressed.
use crate::gilib::{
    binning, merge_chunks, BgzfReader, BgzfWriter, BlockIndex, Chunk, GenoError, Result, VirtualOffset,
};
use bitflags::bitflags;
use flate2::read::MultiGzDecoder;
use indexmap::IndexMap;
use std::{
    collections::BTreeMap,
    fs::File,
    io::{self, BufRead, BufReader, BufWriter, Read, Write},
    path::{Path, PathBuf},
};

const MAGIC: &[u8; 4] = b"TBI\x01";

bitflags! {
    /// Format preset stored in the index header
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PresetFlags: i32 {
        const GENERIC    = 0x0;
        const SAM        = 0x1;
        const VCF        = 0x2;
        const ZERO_BASED = 0x10000; // UCSC-style 0-based half-open coordinates
    }
}

/// Which columns of a data line carry its interval. Column numbers are 1-based;
/// `col_end` of 0 means the record covers a single position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexConfig {
    pub preset: PresetFlags,
    pub col_seq: usize,
    pub col_beg: usize,
    pub col_end: usize,
    pub meta: char,
    pub skip: usize,
}

impl IndexConfig {
    pub fn vcf() -> Self {
        Self {
            preset: PresetFlags::VCF,
            col_seq: 1,
            col_beg: 2,
            col_end: 0,
            meta: '#',
            skip: 0,
        }
    }

    /// PLINK MAP: chromosome, id, cM, bp
    pub fn ped_map() -> Self {
        Self {
            preset: PresetFlags::GENERIC,
            col_seq: 1,
            col_beg: 4,
            col_end: 0,
            meta: '#',
            skip: 0,
        }
    }

    /// IMPUTE2 haps: chromosome, id, position, a0, a1, haplotypes
    pub fn impute2() -> Self {
        Self {
            preset: PresetFlags::GENERIC,
            col_seq: 1,
            col_beg: 3,
            col_end: 0,
            meta: '#',
            skip: 0,
        }
    }

    fn is_tab_separated(&self) -> bool {
        self.preset.intersects(PresetFlags::VCF | PresetFlags::SAM)
    }

    /// Sequence and 0-based half-open interval of a data line.
    /// Blank and meta lines give None.
    pub fn parse_interval<'a>(&self, line: &'a str) -> Result<Option<(&'a str, u64, u64)>> {
        if line.is_empty() || line.starts_with(self.meta) {
            return Ok(None);
        }
        let fields: Vec<&str> = match self.is_tab_separated() {
            true => line.split('\t').collect(),
            false => line.split_whitespace().collect(),
        };
        let column = |col: usize| {
            fields
                .get(col.wrapping_sub(1))
                .copied()
                .ok_or_else(|| GenoError::format(format!("missing column {}", col)))
        };
        let number = |col: usize| -> Result<u64> {
            let raw = column(col)?;
            raw.parse::<u64>()
                .map_err(|_| GenoError::format(format!("column {} value '{}' is not a position", col, raw)))
        };

        let sequence = column(self.col_seq)?;
        let zero_based = self.preset.contains(PresetFlags::ZERO_BASED);
        let beg = match (number(self.col_beg)?, zero_based) {
            (pos, true) => pos,
            (0, false) => return Err(GenoError::format("position 0 in a 1-based file")),
            (pos, false) => pos - 1,
        };

        let end = if self.preset.contains(PresetFlags::VCF) {
            let ref_len = column(4)?.len().max(1) as u64;
            let info_end = fields
                .get(7)
                .and_then(|info| info.split(';').find_map(|kv| kv.strip_prefix("END=")))
                .and_then(|v| v.parse::<u64>().ok());
            info_end.unwrap_or(beg + ref_len)
        } else if self.col_end > 0 {
            number(self.col_end)?
        } else {
            beg + 1
        };
        Ok(Some((sequence, beg, end.max(beg + 1))))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Bin {
    id: u32,
    chunks: Vec<Chunk>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct SequenceIndex {
    bins: Vec<Bin>,
    linear: Vec<VirtualOffset>,
}

impl SequenceIndex {
    /// No record overlapping a position at or past `beg` starts before this
    fn min_offset(&self, beg: u64) -> VirtualOffset {
        match self.linear.last() {
            None => VirtualOffset::default(),
            Some(last) => self.linear.get(binning::window(beg)).copied().unwrap_or(*last),
        }
    }

    fn bin(&self, id: u32) -> Option<&Bin> {
        self.bins
            .binary_search_by_key(&id, |b| b.id)
            .ok()
            .map(|idx| &self.bins[idx])
    }
}

/// In-memory tabix index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeIndex {
    config: IndexConfig,
    sequences: IndexMap<String, SequenceIndex>,
}

/// `<source>.tbi`
pub fn default_index_path(source: &Path) -> PathBuf {
    let mut name = source.as_os_str().to_owned();
    name.push(".tbi");
    PathBuf::from(name)
}

impl RangeIndex {
    /// Load an index file, BGZF-compressed or raw
    pub fn read(path: &Path) -> Result<Self> {
        let mut reader = BufReader::new(File::open(path)?);
        let compressed = reader.fill_buf()?.starts_with(&[0x1f, 0x8b]);
        let index = match compressed {
            true => Self::from_reader(MultiGzDecoder::new(reader)),
            false => Self::from_reader(reader),
        }
        .map_err(|e| e.at(path.display().to_string()))?;
        info!("loaded index {} with {} sequences", path.display(), index.sequences.len());
        Ok(index)
    }

    /// Parse uncompressed index bytes
    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self> {
        let mut magic = [0u8; 4];
        fill(&mut reader, &mut magic)?;
        if &magic != MAGIC {
            return Err(GenoError::format(format!("bad index magic {:?}", magic)));
        }

        let n_ref = read_count(&mut reader, "n_ref")?;
        let preset = PresetFlags::from_bits_retain(read_i32(&mut reader)?);
        let col_seq = read_count(&mut reader, "col_seq")?;
        let col_beg = read_count(&mut reader, "col_beg")?;
        let col_end = read_count(&mut reader, "col_end")?;
        let meta = read_i32(&mut reader)?;
        let skip = read_count(&mut reader, "skip")?;
        let l_nm = read_count(&mut reader, "l_nm")?;
        if col_seq == 0 || col_beg == 0 {
            return Err(GenoError::format("sequence and begin columns must be set"));
        }

        let mut names_buf = vec![0u8; l_nm];
        fill(&mut reader, &mut names_buf)?;
        let names = parse_names(&names_buf)?;
        if names.len() != n_ref {
            return Err(GenoError::format(format!(
                "header declares {} sequences but names {}",
                n_ref,
                names.len()
            )));
        }

        let mut sequences = IndexMap::with_capacity(n_ref);
        for name in names {
            let n_bin = read_count(&mut reader, "n_bin")?;
            let mut bins = Vec::with_capacity(n_bin.min(binning::PSEUDO_BIN as usize + 1));
            for _ in 0..n_bin {
                let id = read_u32(&mut reader)?;
                let n_chunk = read_count(&mut reader, "n_chunk")?;
                let mut chunks = vec![];
                for _ in 0..n_chunk {
                    let begin = VirtualOffset::from_raw(read_u64(&mut reader)?);
                    let end = VirtualOffset::from_raw(read_u64(&mut reader)?);
                    chunks.push(Chunk::new(begin, end));
                }
                bins.push(Bin { id, chunks });
            }
            bins.sort_by_key(|b| b.id);

            let n_intv = read_count(&mut reader, "n_intv")?;
            let mut linear = vec![];
            for _ in 0..n_intv {
                linear.push(VirtualOffset::from_raw(read_u64(&mut reader)?));
            }
            if sequences.insert(name.clone(), SequenceIndex { bins, linear }).is_some() {
                return Err(GenoError::format(format!("sequence {} listed twice", name)));
            }
        }

        let meta = u8::try_from(meta).map(char::from).unwrap_or('#');
        Ok(Self {
            config: IndexConfig {
                preset,
                col_seq,
                col_beg,
                col_end,
                meta,
                skip,
            },
            sequences,
        })
    }

    /// Write BGZF-compressed to `path`
    pub fn write(&self, path: &Path) -> Result<()> {
        let mut writer = BgzfWriter::new(BufWriter::new(File::create(path)?));
        self.write_to(&mut writer)?;
        writer.finish()?;
        debug!("wrote index {}", path.display());
        Ok(())
    }

    /// Serialize uncompressed
    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        let names_len: usize = self.sequences.keys().map(|n| n.len() + 1).sum();
        writer.write_all(MAGIC)?;
        write_i32(writer, self.sequences.len())?;
        writer.write_all(&self.config.preset.bits().to_le_bytes())?;
        write_i32(writer, self.config.col_seq)?;
        write_i32(writer, self.config.col_beg)?;
        write_i32(writer, self.config.col_end)?;
        write_i32(writer, self.config.meta as usize)?;
        write_i32(writer, self.config.skip)?;
        write_i32(writer, names_len)?;
        for name in self.sequences.keys() {
            writer.write_all(name.as_bytes())?;
            writer.write_all(&[0])?;
        }
        for seq in self.sequences.values() {
            write_i32(writer, seq.bins.len())?;
            for bin in &seq.bins {
                writer.write_all(&bin.id.to_le_bytes())?;
                write_i32(writer, bin.chunks.len())?;
                for chunk in &bin.chunks {
                    writer.write_all(&chunk.begin.as_raw().to_le_bytes())?;
                    writer.write_all(&chunk.end.as_raw().to_le_bytes())?;
                }
            }
            write_i32(writer, seq.linear.len())?;
            for offset in &seq.linear {
                writer.write_all(&offset.as_raw().to_le_bytes())?;
            }
        }
        Ok(())
    }

    pub fn contains_sequence(&self, sequence: &str) -> bool {
        self.sequences.contains_key(sequence)
    }
}

impl BlockIndex for RangeIndex {
    fn config(&self) -> &IndexConfig {
        &self.config
    }

    fn sequence_names(&self) -> Vec<String> {
        self.sequences.keys().cloned().collect()
    }

    fn chunks(&self, sequence: &str, beg: u64, end: u64) -> Vec<Chunk> {
        let Some(seq) = self.sequences.get(sequence) else {
            return vec![];
        };
        let min_offset = seq.min_offset(beg);
        let mut chunks: Vec<Chunk> = binning::reg2bins(beg, end)
            .into_iter()
            .filter_map(|id| seq.bin(id))
            .flat_map(|bin| bin.chunks.iter().copied())
            .filter(|chunk| chunk.end > min_offset)
            .collect();
        chunks.sort();
        chunks.dedup();
        let merged = merge_chunks(&chunks);
        debug!("{}:{}-{} resolves to {} chunks", sequence, beg, end, merged.len());
        merged
    }
}

#[derive(Default)]
struct SequenceBuilder {
    bins: BTreeMap<u32, Vec<Chunk>>,
    linear: Vec<Option<VirtualOffset>>,
    last_beg: u64,
}

/// Accumulates records of a sorted file into a [`RangeIndex`]
pub struct RangeIndexBuilder {
    config: IndexConfig,
    sequences: IndexMap<String, SequenceBuilder>,
}

impl RangeIndexBuilder {
    pub fn new(config: IndexConfig) -> Self {
        Self {
            config,
            sequences: IndexMap::new(),
        }
    }

    /// Add one record spanning 0-based `[beg, end)` stored at `chunk`.
    /// Records of a sequence must be contiguous and sorted by begin.
    pub fn push(&mut self, sequence: &str, beg: u64, end: u64, chunk: Chunk) -> Result<()> {
        if end > binning::MAX_COORD {
            return Err(GenoError::format(format!(
                "{}:{} is beyond the indexable range",
                sequence, end
            )));
        }
        let is_current = self.sequences.last().map(|(name, _)| name == sequence).unwrap_or(false);
        if !is_current {
            if self.sequences.contains_key(sequence) {
                return Err(GenoError::format(format!(
                    "records of sequence {} are not contiguous",
                    sequence
                )));
            }
            self.sequences.insert(sequence.to_string(), SequenceBuilder::default());
        }
        let Some((_, seq)) = self.sequences.last_mut() else {
            return Err(GenoError::format("no current sequence"));
        };
        if beg < seq.last_beg {
            return Err(GenoError::format(format!(
                "{}:{} is out of order after {}",
                sequence,
                beg + 1,
                seq.last_beg + 1
            )));
        }
        seq.last_beg = beg;

        let chunks = seq.bins.entry(binning::reg2bin(beg, end)).or_default();
        match chunks.last_mut() {
            Some(last) if last.end == chunk.begin => last.end = chunk.end,
            _ => chunks.push(chunk),
        }

        let last_window = binning::window(end - 1);
        if seq.linear.len() <= last_window {
            seq.linear.resize(last_window + 1, None);
        }
        for slot in &mut seq.linear[binning::window(beg)..=last_window] {
            if slot.is_none() {
                *slot = Some(chunk.begin);
            }
        }
        Ok(())
    }

    pub fn build(self) -> RangeIndex {
        let sequences = self
            .sequences
            .into_iter()
            .map(|(name, seq)| {
                // empty windows take the offset of the next populated one
                let mut linear = vec![VirtualOffset::default(); seq.linear.len()];
                let mut next = VirtualOffset::default();
                for (slot, value) in linear.iter_mut().zip(seq.linear.iter()).rev() {
                    if let Some(offset) = value {
                        next = *offset;
                    }
                    *slot = next;
                }
                let bins = seq.bins.into_iter().map(|(id, chunks)| Bin { id, chunks }).collect();
                (name, SequenceIndex { bins, linear })
            })
            .collect();
        RangeIndex {
            config: self.config,
            sequences,
        }
    }
}

/// Index a sorted BGZF file
pub fn index_bgzf(path: &Path, config: IndexConfig) -> Result<RangeIndex> {
    let mut reader = BgzfReader::open(path)?;
    let mut builder = RangeIndexBuilder::new(config.clone());
    let mut line = String::new();
    let mut line_no = 0usize;
    loop {
        let begin = reader.virtual_offset();
        if reader.read_line(&mut line)? == 0 {
            break;
        }
        line_no += 1;
        if line_no <= config.skip {
            continue;
        }
        let at = |e: GenoError| e.at(format!("{}:{}", path.display(), line_no));
        if let Some((sequence, beg, end)) = config.parse_interval(&line).map_err(at)? {
            let chunk = Chunk::new(begin, reader.virtual_offset());
            builder.push(sequence, beg, end, chunk).map_err(at)?;
        }
    }
    let index = builder.build();
    info!("indexed {} lines of {} over {} sequences", line_no, path.display(), index.sequences.len());
    Ok(index)
}

fn parse_names(buf: &[u8]) -> Result<Vec<String>> {
    buf.split(|b| *b == 0)
        .filter(|name| !name.is_empty())
        .map(|name| {
            std::str::from_utf8(name)
                .map(String::from)
                .map_err(|e| GenoError::format(format!("sequence name is not UTF-8: {}", e)))
        })
        .collect()
}

fn fill<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<()> {
    reader.read_exact(buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => GenoError::format("index is truncated"),
        _ => GenoError::Io(e),
    })
}

fn read_i32<R: Read>(reader: &mut R) -> Result<i32> {
    let mut buf = [0u8; 4];
    fill(reader, &mut buf)?;
    Ok(i32::from_le_bytes(buf))
}

fn read_u32<R: Read>(reader: &mut R) -> Result<u32> {
    let mut buf = [0u8; 4];
    fill(reader, &mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64<R: Read>(reader: &mut R) -> Result<u64> {
    let mut buf = [0u8; 8];
    fill(reader, &mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

/// Non-negative i32 field
fn read_count<R: Read>(reader: &mut R, field: &str) -> Result<usize> {
    let value = read_i32(reader)?;
    usize::try_from(value).map_err(|_| GenoError::format(format!("negative {}: {}", field, value)))
}

fn write_i32<W: Write>(writer: &mut W, value: usize) -> io::Result<()> {
    let value = i32::try_from(value).map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "count overflows i32"))?;
    writer.write_all(&value.to_le_bytes())
}
