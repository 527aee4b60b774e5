use crate::gilib::{
    read_sample_file, Allele, AlleleSet, Annotation, GenoError, Result, Sample, SampleCall, SampleIds, Variant,
};
use std::{path::Path, sync::Arc};

/// Samples of a `.sample` file, paired column-wise with the haplotypes
#[derive(Debug, Clone)]
pub struct Impute2Context {
    samples: Vec<Sample>,
    sample_ids: SampleIds,
    annotations: Vec<Annotation>,
}

impl Impute2Context {
    pub fn new(samples: Vec<Sample>, annotations: Vec<Annotation>) -> Result<Self> {
        let sample_ids: SampleIds = Arc::new(samples.iter().map(|s| s.id.clone()).collect());
        if sample_ids.len() != samples.len() {
            return Err(GenoError::format("sample ids are not unique"));
        }
        Ok(Self {
            samples,
            sample_ids,
            annotations,
        })
    }

    pub fn from_sample_file(path: &Path) -> Result<Self> {
        let (samples, annotations) = read_sample_file(path)?;
        debug!("read {} samples from {}", samples.len(), path.display());
        Self::new(samples, annotations)
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn sample_ids(&self) -> &SampleIds {
        &self.sample_ids
    }

    pub fn sample_annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    /// `chrom id pos a0 a1` followed by two haplotype columns per sample
    pub fn decode(&self, line: &str) -> Result<Variant> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        let expected = 5 + 2 * self.sample_ids.len();
        if fields.len() != expected {
            return Err(GenoError::format(format!(
                "expected {} columns for {} samples, found {}",
                expected,
                self.sample_ids.len(),
                fields.len()
            )));
        }
        let start = fields[2]
            .parse::<u64>()
            .map_err(|_| GenoError::format(format!("position '{}' is not a position", fields[2])))?;
        let (a0, a1) = (Allele::of(fields[3]), Allele::of(fields[4]));
        let alleles = AlleleSet::from_alleles(vec![a0.clone(), a1.clone()]);

        let calls = fields[5..]
            .chunks(2)
            .map(|pair| {
                let called = pair
                    .iter()
                    .map(|hap| match *hap {
                        "0" => Ok(Some(a0.clone())),
                        "1" => Ok(Some(a1.clone())),
                        "?" | "-" | "." => Ok(None),
                        other => Err(GenoError::format(format!("haplotype '{}' is not 0 or 1", other))),
                    })
                    .collect::<Result<Vec<Option<Allele>>>>()?;
                // either haplotype unknown makes the whole call unknown
                Ok(called
                    .into_iter()
                    .collect::<Option<Vec<Allele>>>()
                    .map(AlleleSet::from_alleles))
            })
            .collect::<Result<Vec<SampleCall>>>()?;

        let ids = match fields[1] {
            "." => vec![],
            id => vec![id.to_string()],
        };
        Variant::builder(fields[0], start, alleles)
            .ids(ids)
            .with_reference()
            .calls(Arc::clone(&self.sample_ids), calls)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gilib::VariantView;
    use pretty_assertions::assert_eq;

    fn context() -> Impute2Context {
        let samples = vec![Sample::new("s1", None), Sample::new("s2", None)];
        Impute2Context::new(samples, vec![]).unwrap()
    }

    #[test]
    fn test_decode() {
        let v = context().decode("1 rs42 752566 G A 0 1 1 1").unwrap();
        assert_eq!(v.start_pos(), 752566);
        assert_eq!(v.primary_id(), Some("rs42"));
        assert_eq!(v.ref_allele(), Some(&Allele::of("G")));
        assert_eq!(v.sample_call("s1").unwrap().tokens(), vec!["G", "A"]);
        assert_eq!(v.sample_call("s2").unwrap().tokens(), vec!["A", "A"]);
        assert_eq!(v.sample_dosages(), vec![1.0, 0.0]);
        assert_eq!(v.minor_allele(), Some(&Allele::of("G")));
    }

    #[test]
    fn test_missing_haplotype() {
        let v = context().decode("1 rs42 752566 G A 0 ? 1 1").unwrap();
        assert!(v.sample_call("s1").is_none());
    }

    #[test]
    fn test_errors() {
        let ctx = context();
        assert!(ctx.decode("1 rs42 752566 G A 0 1 1").is_err());
        assert!(ctx.decode("1 rs42 752566 G A 0 2 1 1").is_err());
        assert!(ctx.decode("1 rs42 752566 G A ? 7 1 1").is_err());
        assert!(ctx.decode("1 rs42 752566 G A 0 1 x ?").is_err());
        assert!(ctx.decode("1 rs42 pos G A 0 1 1 1").is_err());
        assert!(Impute2Context::new(vec![Sample::new("a", None), Sample::new("a", None)], vec![]).is_err());
    }
}
