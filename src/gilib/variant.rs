use crate::gilib::{Allele, AlleleSet, GenoError, Result};
use indexmap::{IndexMap, IndexSet};
use std::{fmt, sync::Arc};

/// Sample identifiers in file order, shared by every variant of a store
pub type SampleIds = Arc<IndexSet<String>>;

/// One sample's call, None when unknown
pub type SampleCall = Option<Arc<AlleleSet>>;

/// Typed INFO value, coerced from the header's declared schema
#[derive(Debug, Clone, PartialEq)]
pub enum AnnotationValue {
    Integer(i32),
    Float(f32),
    Boolean(bool),
    Char(char),
    String(String),
    IntegerList(Vec<i32>),
    FloatList(Vec<f32>),
    BooleanList(Vec<bool>),
    CharList(Vec<char>),
    StringList(Vec<String>),
}

impl AnnotationValue {
    pub fn as_integer(&self) -> Option<i32> {
        match self {
            AnnotationValue::Integer(v) => Some(*v),
            _ => None,
        }
    }
}

/// ALT of the form `<TYPE>` with the header's description, when declared
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolicAllele {
    pub kind: String,
    pub description: Option<String>,
}

/// Identity of a variant: position alone isn't unique (overlapping records)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VariantKey {
    pub sequence: String,
    pub start: u64,
    pub alleles: Arc<AlleleSet>,
}

/// Immutable decoded record
#[derive(Debug, Clone, PartialEq)]
pub struct Variant {
    sequence: String,
    start: u64,
    stop: Option<u64>,
    ids: Vec<String>,
    alleles: Arc<AlleleSet>,
    ref_allele: Option<Allele>,
    symbolic: Vec<SymbolicAllele>,
    samples: SampleIds,
    calls: Vec<SampleCall>,
    annotations: IndexMap<String, AnnotationValue>,
    minor_allele: Option<Allele>,
    minor_allele_freq: f32,
}

impl Variant {
    pub fn builder(sequence: impl Into<String>, start: u64, alleles: Arc<AlleleSet>) -> VariantBuilder {
        VariantBuilder {
            sequence: sequence.into(),
            start,
            stop: None,
            ids: vec![],
            alleles,
            has_ref: false,
            symbolic: vec![],
            samples: Arc::new(IndexSet::new()),
            calls: vec![],
            annotations: IndexMap::new(),
        }
    }
}

pub struct VariantBuilder {
    sequence: String,
    start: u64,
    stop: Option<u64>,
    ids: Vec<String>,
    alleles: Arc<AlleleSet>,
    has_ref: bool,
    symbolic: Vec<SymbolicAllele>,
    samples: SampleIds,
    calls: Vec<SampleCall>,
    annotations: IndexMap<String, AnnotationValue>,
}

impl VariantBuilder {
    pub fn ids(mut self, ids: Vec<String>) -> Self {
        self.ids = ids;
        self
    }

    pub fn stop(mut self, stop: Option<u64>) -> Self {
        self.stop = stop;
        self
    }

    /// Element 0 of the allele set is the reference allele
    pub fn with_reference(mut self) -> Self {
        self.has_ref = true;
        self
    }

    pub fn symbolic(mut self, symbolic: Vec<SymbolicAllele>) -> Self {
        self.symbolic = symbolic;
        self
    }

    pub fn calls(mut self, samples: SampleIds, calls: Vec<SampleCall>) -> Self {
        self.samples = samples;
        self.calls = calls;
        self
    }

    pub fn annotations(mut self, annotations: IndexMap<String, AnnotationValue>) -> Self {
        self.annotations = annotations;
        self
    }

    pub fn build(self) -> Result<Variant> {
        if self.alleles.is_empty() {
            return Err(GenoError::format(format!(
                "variant {}:{} has no alleles",
                self.sequence, self.start
            )));
        }
        if self.calls.len() != self.samples.len() {
            return Err(GenoError::format(format!(
                "variant {}:{} has {} calls for {} samples",
                self.sequence,
                self.start,
                self.calls.len(),
                self.samples.len()
            )));
        }
        let ref_allele = match self.has_ref {
            true => self.alleles.first().cloned(),
            false => None,
        };
        let (minor_allele, minor_allele_freq) = minor_allele(&self.alleles, &self.calls);
        Ok(Variant {
            sequence: self.sequence,
            start: self.start,
            stop: self.stop,
            ids: self.ids,
            alleles: self.alleles,
            ref_allele,
            symbolic: self.symbolic,
            samples: self.samples,
            calls: self.calls,
            annotations: self.annotations,
            minor_allele,
            minor_allele_freq,
        })
    }
}

/// Second most frequent called allele and its frequency among called alleles.
/// Equal counts keep the earlier allele as major.
fn minor_allele(alleles: &AlleleSet, calls: &[SampleCall]) -> (Option<Allele>, f32) {
    let distinct = alleles.distinct();
    if distinct.len() < 2 {
        return (None, 0.0);
    }
    let mut counts = vec![0usize; distinct.len()];
    for allele in calls.iter().flatten().flat_map(|c| c.iter()) {
        if let Some(idx) = distinct.iter().position(|d| d == allele) {
            counts[idx] += 1;
        }
    }
    let total: usize = counts.iter().sum();
    if total == 0 {
        return (None, 0.0);
    }
    let mut order: Vec<usize> = (0..distinct.len()).collect();
    order.sort_by(|a, b| counts[*b].cmp(&counts[*a]));
    let minor = order[1];
    (
        Some(distinct[minor].clone()),
        counts[minor] as f32 / total as f32,
    )
}

/// Read access shared by plain and overlaid variants
pub trait VariantView {
    /// The decoded record underneath
    fn backing(&self) -> &Variant;
    fn alleles(&self) -> &Arc<AlleleSet>;
    fn ref_allele(&self) -> Option<&Allele>;

    fn key(&self) -> VariantKey {
        let v = self.backing();
        VariantKey {
            sequence: v.sequence.clone(),
            start: v.start,
            alleles: Arc::clone(&v.alleles),
        }
    }

    fn sequence_name(&self) -> &str {
        &self.backing().sequence
    }

    fn start_pos(&self) -> u64 {
        self.backing().start
    }

    fn stop_pos(&self) -> Option<u64> {
        self.backing().stop
    }

    fn primary_id(&self) -> Option<&str> {
        self.backing().ids.first().map(String::as_str)
    }

    fn alternative_ids(&self) -> &[String] {
        let ids = &self.backing().ids;
        if ids.is_empty() {
            &[]
        } else {
            &ids[1..]
        }
    }

    fn symbolic_alleles(&self) -> &[SymbolicAllele] {
        &self.backing().symbolic
    }

    fn sample_ids(&self) -> &SampleIds {
        &self.backing().samples
    }

    /// Calls in sample order; None when unknown
    fn sample_calls(&self) -> &[SampleCall] {
        &self.backing().calls
    }

    fn sample_call(&self, sample: &str) -> Option<&Arc<AlleleSet>> {
        self.sample_ids()
            .get_index_of(sample)
            .and_then(|idx| self.sample_calls()[idx].as_ref())
    }

    fn annotations(&self) -> &IndexMap<String, AnnotationValue> {
        &self.backing().annotations
    }

    fn annotation(&self, key: &str) -> Option<&AnnotationValue> {
        self.backing().annotations.get(key)
    }

    fn minor_allele(&self) -> Option<&Allele> {
        self.backing().minor_allele.as_ref()
    }

    fn minor_allele_frequency(&self) -> f32 {
        self.backing().minor_allele_freq
    }

    fn allele_count(&self) -> usize {
        self.alleles().len()
    }

    fn is_snp(&self) -> bool {
        self.alleles().is_snp()
    }

    fn is_at_or_gc_snp(&self) -> bool {
        self.alleles().is_at_or_gc_snp()
    }

    fn is_biallelic(&self) -> bool {
        self.alleles().is_biallelic()
    }

    fn snp_alleles(&self) -> Result<Vec<char>> {
        self.alleles().as_chars()
    }

    fn snp_ref_allele(&self) -> Result<Option<char>> {
        match self.ref_allele() {
            Some(allele) => allele
                .as_char()
                .map(Some)
                .ok_or_else(|| GenoError::NotASnp(self.alleles().to_string())),
            None => Ok(None),
        }
    }

    /// Per sample count of the reference allele (first allele when the source
    /// has no reference); -1 for unknown calls
    fn sample_dosages(&self) -> Vec<f32> {
        let counted = match self.ref_allele().or_else(|| self.alleles().first()) {
            Some(a) => a.clone(),
            None => return vec![-1.0; self.sample_calls().len()],
        };
        self.sample_calls()
            .iter()
            .map(|call| match call {
                Some(c) => c.iter().filter(|a| **a == counted).count() as f32,
                None => -1.0,
            })
            .collect()
    }
}

impl VariantView for Variant {
    fn backing(&self) -> &Variant {
        self
    }

    fn alleles(&self) -> &Arc<AlleleSet> {
        &self.alleles
    }

    fn ref_allele(&self) -> Option<&Allele> {
        self.ref_allele.as_ref()
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} [{}]", self.sequence, self.start, self.alleles)
    }
}
