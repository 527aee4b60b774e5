use crate::gilib::{Allele, GenoError, LdPrecondition, Result, VariantView};
use serde::Serialize;
use std::collections::HashSet;

/// How the second variant's calls were read against its declared alleles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StrandOrientation {
    Direct,
    /// Calls were written on the opposite strand to the declared alleles.
    /// Never chosen for A/T or G/C SNPs, which are ambiguous instead.
    Complemented,
}

/// Pairwise linkage disequilibrium between two biallelic SNPs
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ld {
    pub r2: f64,
    pub d_prime: f64,
    pub orientation: StrandOrientation,
    /// Samples called at both loci
    pub samples: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct LdEstimator {
    /// Largest |D| difference at which both strand readings still agree
    pub tolerance: f64,
}

impl Default for LdEstimator {
    fn default() -> Self {
        Self { tolerance: 1e-9 }
    }
}

/// Haplotype frequencies of one orientation
struct JointTable {
    p_a: f64,
    p_b: f64,
    p_ab: f64,
}

impl JointTable {
    fn d(&self) -> f64 {
        self.p_ab - self.p_a * self.p_b
    }

    fn into_ld(self, orientation: StrandOrientation, samples: usize) -> Ld {
        let (p_a, p_b) = (self.p_a, self.p_b);
        let d = self.d();
        let r2 = (d * d / (p_a * (1.0 - p_a) * p_b * (1.0 - p_b))).clamp(0.0, 1.0);
        let d_max = match d < 0.0 {
            true => (p_a * p_b).min((1.0 - p_a) * (1.0 - p_b)),
            false => (p_a * (1.0 - p_b)).min((1.0 - p_a) * p_b),
        };
        let d_prime = match d_max > 0.0 {
            true => (d / d_max).clamp(-1.0, 1.0),
            false => 0.0,
        };
        Ld {
            r2,
            d_prime,
            orientation,
            samples,
        }
    }
}

impl LdEstimator {
    /// r² and D' from the haplotypes of samples called at both loci.
    /// Haplotype k of `a` is paired with haplotype k of `b`.
    pub fn estimate<A: VariantView, B: VariantView>(&self, a: &A, b: &B) -> Result<Ld> {
        if !(a.is_snp() && a.is_biallelic()) {
            return Err(LdPrecondition::NotBiallelicSnp("first").into());
        }
        if !(b.is_snp() && b.is_biallelic()) {
            return Err(LdPrecondition::NotBiallelicSnp("second").into());
        }

        let b_ids = b.sample_ids();
        let mut shared = 0;
        let mut haplotypes: Vec<(Allele, Allele)> = vec![];
        let mut called = 0;
        for (idx_a, id) in a.sample_ids().iter().enumerate() {
            let Some(idx_b) = b_ids.get_index_of(id) else {
                continue;
            };
            shared += 1;
            let (Some(call_a), Some(call_b)) = (&a.sample_calls()[idx_a], &b.sample_calls()[idx_b]) else {
                continue;
            };
            called += 1;
            haplotypes.extend(call_a.iter().cloned().zip(call_b.iter().cloned()));
        }
        if shared == 0 {
            return Err(LdPrecondition::NoSharedSamples.into());
        }
        if called < 2 {
            return Err(LdPrecondition::TooFewSamples(called).into());
        }

        let a_alleles = a.alleles().distinct();
        if !haplotypes.iter().all(|(ha, _)| a_alleles.contains(ha)) {
            return Err(LdPrecondition::AllelesMismatch("first").into());
        }

        // Decoded calls are always written in the variant's own alleles, so a
        // complemented reading only shows up for calls assembled by hand.
        let b_alleles = b.alleles().distinct();
        let observed: HashSet<&Allele> = haplotypes.iter().map(|(_, hb)| hb).collect();
        let direct = observed.iter().all(|hb| b_alleles.contains(*hb));
        let complemented = || {
            observed
                .iter()
                .all(|hb| hb.complement().map(|c| b_alleles.contains(&c)).unwrap_or(false))
        };

        let table = |flip: bool| -> Result<JointTable> {
            let first_a = &a_alleles[0];
            let first_b = &b_alleles[0];
            let total = haplotypes.len() as f64;
            let (mut n_a, mut n_b, mut n_ab) = (0usize, 0usize, 0usize);
            for (ha, hb) in &haplotypes {
                let hb = match flip {
                    true => hb.complement()?,
                    false => hb.clone(),
                };
                let is_a = ha == first_a;
                let is_b = hb == *first_b;
                n_a += is_a as usize;
                n_b += is_b as usize;
                n_ab += (is_a && is_b) as usize;
            }
            let table = JointTable {
                p_a: n_a as f64 / total,
                p_b: n_b as f64 / total,
                p_ab: n_ab as f64 / total,
            };
            if table.p_a <= 0.0 || table.p_a >= 1.0 {
                return Err(LdPrecondition::Monomorphic("first").into());
            }
            if table.p_b <= 0.0 || table.p_b >= 1.0 {
                return Err(LdPrecondition::Monomorphic("second").into());
            }
            Ok(table)
        };

        let ld = match (b.is_at_or_gc_snp(), direct) {
            (true, true) => {
                let forward = table(false)?;
                let reverse = table(true)?;
                if (forward.d() - reverse.d()).abs() > self.tolerance {
                    return Err(GenoError::AmbiguousStrand {
                        variant: format!("{}:{} [{}]", b.sequence_name(), b.start_pos(), b.alleles()),
                    });
                }
                forward.into_ld(StrandOrientation::Direct, called)
            }
            (false, true) => table(false)?.into_ld(StrandOrientation::Direct, called),
            (_, false) if complemented() => table(true)?.into_ld(StrandOrientation::Complemented, called),
            (_, false) => return Err(LdPrecondition::AllelesMismatch("second").into()),
        };
        debug!(
            "LD {}:{} ~ {}:{} r2={:.4} D'={:.4} n={}",
            a.sequence_name(),
            a.start_pos(),
            b.sequence_name(),
            b.start_pos(),
            ld.r2,
            ld.d_prime,
            ld.samples
        );
        Ok(ld)
    }
}
