use crate::gilib::{
    Allele, AlleleSet, Annotation, GenoError, GenotypeData, Result, Sample, SampleCall, Sequence, Variant,
    VariantKey, VariantView,
};
use std::{collections::HashMap, sync::Arc};

/// Replacement canonical fields for one variant identity
#[derive(Debug, Clone, PartialEq)]
struct Override {
    alleles: Arc<AlleleSet>,
    ref_allele: Option<Allele>,
    minor_allele: Option<Allele>,
    /// Only set once the strand has been swapped
    calls: Option<Vec<SampleCall>>,
}

impl Override {
    fn of(variant: &Variant) -> Self {
        Self {
            alleles: Arc::clone(variant.alleles()),
            ref_allele: variant.ref_allele().cloned(),
            minor_allele: variant.minor_allele().cloned(),
            calls: None,
        }
    }

    fn calls<'a>(&'a self, variant: &'a Variant) -> &'a [SampleCall] {
        match &self.calls {
            Some(calls) => calls,
            None => variant.sample_calls(),
        }
    }
}

/// Copy-on-write view over a read-only store.
///
/// Overrides live in a table keyed by [`VariantKey`]; every read consults it
/// before falling through to the decoded record. The source is never written.
/// Updates need `&mut self`, so a shared `&Overlay` is safe to read from
/// several threads. Successive updates to one identity stack on each other.
pub struct Overlay<S: GenotypeData> {
    source: S,
    overrides: HashMap<VariantKey, Arc<Override>>,
}

impl<S: GenotypeData> Overlay<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            overrides: HashMap::new(),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Current override for `variant`, or one seeded from its decoded record
    fn current<V: VariantView>(&self, variant: &V) -> Override {
        match self.overrides.get(&variant.key()) {
            Some(over) => over.as_ref().clone(),
            None => Override::of(variant.backing()),
        }
    }

    /// Make `allele` the reference (and first) allele of `variant`.
    /// Fails with `IllegalAllele` when it isn't one of the variant's alleles,
    /// leaving earlier overrides untouched.
    pub fn update_ref_allele<V: VariantView>(&mut self, variant: &V, allele: &Allele) -> Result<()> {
        let mut over = self.current(variant);
        over.alleles = over.alleles.with_first(allele).ok_or_else(|| GenoError::IllegalAllele {
            allele: allele.to_string(),
            alleles: over.alleles.to_string(),
        })?;
        over.ref_allele = Some(allele.clone());
        debug!("{} reference allele -> {}", variant.backing(), allele);
        self.overrides.insert(variant.key(), Arc::new(over));
        Ok(())
    }

    /// Complement the alleles and every sample call of a SNP.
    /// Fails with `NotASnp` otherwise, leaving earlier overrides untouched.
    pub fn swap_strand<V: VariantView>(&mut self, variant: &V) -> Result<()> {
        let mut over = self.current(variant);
        if !over.alleles.is_snp() {
            return Err(GenoError::NotASnp(over.alleles.to_string()));
        }
        let calls = over
            .calls(variant.backing())
            .iter()
            .map(|call| call.as_ref().map(|c| c.complement()).transpose())
            .collect::<Result<Vec<_>>>()?;
        over.alleles = over.alleles.complement()?;
        over.ref_allele = over.ref_allele.map(|a| a.complement()).transpose()?;
        over.minor_allele = over.minor_allele.map(|a| a.complement()).transpose()?;
        over.calls = Some(calls);
        debug!("{} strand swapped to {}", variant.backing(), over.alleles);
        self.overrides.insert(variant.key(), Arc::new(over));
        Ok(())
    }

    pub fn override_count(&self) -> usize {
        self.overrides.len()
    }

    pub fn is_modified<V: VariantView>(&self, variant: &V) -> bool {
        self.overrides.contains_key(&variant.key())
    }

    fn view(&self, variant: Arc<Variant>) -> OverlayVariant {
        let over = match self.overrides.is_empty() {
            true => None,
            false => self.overrides.get(&variant.key()).cloned(),
        };
        OverlayVariant { variant, over }
    }

    pub fn variants_at(&self, sequence: &str, position: u64) -> Result<Vec<OverlayVariant>> {
        Ok(self
            .source
            .variants_at(sequence, position)?
            .into_iter()
            .map(|v| self.view(v))
            .collect())
    }

    pub fn variants_between<'a>(
        &'a self,
        sequence: &str,
        start: u64,
        end: u64,
    ) -> impl Iterator<Item = Result<OverlayVariant>> + 'a {
        self.source
            .variants_between(sequence, start, end)
            .map(move |v| v.map(|v| self.view(v)))
    }

    pub fn variants_in<'a>(&'a self, sequence: &str) -> impl Iterator<Item = Result<OverlayVariant>> + 'a {
        self.source
            .variants_in(sequence)
            .map(move |v| v.map(|v| self.view(v)))
    }

    pub fn snp_variant_at(&self, sequence: &str, position: u64) -> Result<Option<OverlayVariant>> {
        Ok(self.source.snp_variant_at(sequence, position)?.map(|v| self.view(v)))
    }

    /// Calls of the first variant at `position`, as swapped
    pub fn sample_calls_at(&self, sequence: &str, position: u64) -> Result<Vec<SampleCall>> {
        Ok(self
            .variants_at(sequence, position)?
            .first()
            .map(|v| v.sample_calls().to_vec())
            .unwrap_or_default())
    }

    pub fn sequence_names(&self) -> Vec<String> {
        self.source.sequence_names()
    }

    pub fn sequences(&self) -> Vec<Sequence> {
        self.source.sequences()
    }

    pub fn samples(&self) -> Vec<Sample> {
        self.source.samples()
    }

    pub fn variant_annotations(&self) -> Vec<Annotation> {
        self.source.variant_annotations()
    }

    pub fn sample_annotations(&self) -> Vec<Annotation> {
        self.source.sample_annotations()
    }
}

/// A decoded variant as seen through an [`Overlay`] at read time
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayVariant {
    variant: Arc<Variant>,
    over: Option<Arc<Override>>,
}

impl OverlayVariant {
    /// The shared record underneath, never modified
    pub fn inner(&self) -> &Arc<Variant> {
        &self.variant
    }

    pub fn is_overridden(&self) -> bool {
        self.over.is_some()
    }

    pub fn is_strand_swapped(&self) -> bool {
        self.over.as_ref().is_some_and(|over| over.calls.is_some())
    }
}

impl VariantView for OverlayVariant {
    fn backing(&self) -> &Variant {
        &self.variant
    }

    fn alleles(&self) -> &Arc<AlleleSet> {
        match &self.over {
            Some(over) => &over.alleles,
            None => self.variant.alleles(),
        }
    }

    fn ref_allele(&self) -> Option<&Allele> {
        match &self.over {
            Some(over) => over.ref_allele.as_ref(),
            None => self.variant.ref_allele(),
        }
    }

    fn sample_calls(&self) -> &[SampleCall] {
        match &self.over {
            Some(over) => over.calls(&self.variant),
            None => self.variant.sample_calls(),
        }
    }

    fn minor_allele(&self) -> Option<&Allele> {
        match &self.over {
            Some(over) => over.minor_allele.as_ref(),
            None => self.variant.minor_allele(),
        }
    }
}
