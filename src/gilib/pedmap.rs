use crate::gilib::{
    Allele, AlleleSet, Annotation, AnnotationType, BgzfReader, GenoError, Result, Sample, SampleAnnotationKind,
    SampleCall, SampleIds, SampleValue, Variant,
};
use indexmap::IndexSet;
use std::{
    collections::HashMap,
    io::{BufRead, Read},
    sync::Arc,
};

/// PLINK uses 0 for an uncalled allele
const MISSING_ALLELE: &str = "0";

/// One MAP line: chromosome, marker id, genetic distance, base-pair position
#[derive(Debug, Clone, PartialEq)]
pub struct MapEntry {
    pub sequence: String,
    pub id: String,
    pub distance: f64,
    pub position: u64,
}

pub fn parse_map_line(line: &str) -> Result<MapEntry> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() != 4 {
        return Err(GenoError::format(format!(
            "MAP line needs 4 columns, found {}",
            fields.len()
        )));
    }
    let distance = fields[2]
        .parse::<f64>()
        .map_err(|_| GenoError::format(format!("genetic distance '{}' is not a number", fields[2])))?;
    let position = fields[3]
        .parse::<u64>()
        .map_err(|_| GenoError::format(format!("position '{}' is not a position", fields[3])))?;
    Ok(MapEntry {
        sequence: fields[0].to_string(),
        id: fields[1].to_string(),
        distance,
        position,
    })
}

/// Every marker of a BGZF MAP file in file order
pub fn read_map<R: Read>(reader: &mut BgzfReader<R>) -> Result<Vec<MapEntry>> {
    let mut entries = vec![];
    let mut line = String::new();
    let mut line_no = 0;
    while reader.read_line(&mut line)? > 0 {
        line_no += 1;
        if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }
        entries.push(parse_map_line(&line).map_err(|e| e.at(format!("MAP line {}", line_no)))?);
    }
    Ok(entries)
}

/// Variants registered from a PED file, looked up by the MAP lines that
/// the index points at
#[derive(Debug, Clone)]
pub struct PedMapContext {
    samples: Vec<Sample>,
    sample_ids: SampleIds,
    variants: HashMap<String, Arc<Variant>>,
}

impl PedMapContext {
    /// Load `FID IID PAT MAT SEX PHENO a1 a2 ...` rows, two alleles per marker in MAP order
    pub fn new<B: BufRead>(markers: &[MapEntry], ped: B) -> Result<Self> {
        let mut samples = vec![];
        let mut per_marker: Vec<Vec<SampleCall>> = vec![vec![]; markers.len()];
        let mut observed: Vec<IndexSet<Allele>> = vec![IndexSet::new(); markers.len()];

        for (line_no, line) in ped.lines().enumerate() {
            let line = line?;
            let at = format!("PED line {}", line_no + 1);
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.is_empty() {
                continue;
            }
            if fields.len() != 6 + 2 * markers.len() {
                return Err(GenoError::format(format!(
                    "expected {} columns for {} markers, found {}",
                    6 + 2 * markers.len(),
                    markers.len(),
                    fields.len()
                ))
                .at(at));
            }
            samples.push(ped_sample(&fields).map_err(|e| e.at(at))?);

            for (idx, pair) in fields[6..].chunks(2).enumerate() {
                let call = match (pair[0], pair[1]) {
                    (MISSING_ALLELE, _) | (_, MISSING_ALLELE) => None,
                    (a, b) => {
                        let (a, b) = (Allele::of(a), Allele::of(b));
                        observed[idx].insert(a.clone());
                        observed[idx].insert(b.clone());
                        Some(AlleleSet::from_alleles(vec![a, b]))
                    }
                };
                per_marker[idx].push(call);
            }
        }

        let sample_ids: SampleIds = Arc::new(samples.iter().map(|s| s.id.clone()).collect());
        if sample_ids.len() != samples.len() {
            return Err(GenoError::format("PED sample ids are not unique"));
        }

        let mut variants = HashMap::with_capacity(markers.len());
        for ((marker, calls), alleles) in markers.iter().zip(per_marker).zip(observed) {
            let alleles = match alleles.is_empty() {
                // nothing called: keep the missing code so the set is non-empty
                true => vec![Allele::of(MISSING_ALLELE)],
                false => alleles.into_iter().collect(),
            };
            let variant = Variant::builder(marker.sequence.clone(), marker.position, AlleleSet::from_alleles(alleles))
                .ids(vec![marker.id.clone()])
                .calls(Arc::clone(&sample_ids), calls)
                .build()?;
            if variants.insert(marker.id.clone(), Arc::new(variant)).is_some() {
                return Err(GenoError::format(format!("marker id {} appears twice in MAP", marker.id)));
            }
        }
        debug!("registered {} PED markers for {} samples", variants.len(), samples.len());

        Ok(Self {
            samples,
            sample_ids,
            variants,
        })
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn sample_ids(&self) -> &SampleIds {
        &self.sample_ids
    }

    /// Declarations of the per-sample PED columns
    pub fn sample_annotations() -> Vec<Annotation> {
        vec![
            Annotation::new("sex", "1 male, 2 female", AnnotationType::Integer, false),
            Annotation::new("phenotype", "PED phenotype column", AnnotationType::Float, false),
        ]
    }

    /// Resolve a MAP line to its registered variant
    pub fn decode(&self, line: &str) -> Result<Arc<Variant>> {
        let entry = parse_map_line(line)?;
        self.variants
            .get(&entry.id)
            .cloned()
            .ok_or_else(|| GenoError::format(format!("marker {} is not in the PED data", entry.id)))
    }
}

fn ped_sample(fields: &[&str]) -> Result<Sample> {
    let mut sample = Sample::new(fields[1], Some(fields[0].to_string()));
    let sex = match fields[4] {
        "1" => Some(1),
        "2" => Some(2),
        _ => None,
    };
    sample.annotate("sex", SampleAnnotationKind::Other, SampleValue::Integer(sex));
    let phenotype = match fields[5] {
        "-9" | "0" | "NA" => None,
        raw => Some(
            raw.parse::<f64>()
                .map_err(|_| GenoError::format(format!("phenotype '{}' is not a number", raw)))?,
        ),
    };
    sample.annotate("phenotype", SampleAnnotationKind::Phenotype, SampleValue::Float(phenotype));
    Ok(sample)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gilib::VariantView;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    fn markers() -> Vec<MapEntry> {
        ["22 rs11089130 0 14431347", "22 rs738829 0 14432618"]
            .iter()
            .map(|l| parse_map_line(l).unwrap())
            .collect()
    }

    const PED: &str = "F1 S1 0 0 1 2 C C 0 0\nF2 S2 0 0 2 -9 C G 0 0\n";

    #[test]
    fn test_register_and_decode() {
        let ctx = PedMapContext::new(&markers(), Cursor::new(PED)).unwrap();
        let v = ctx.decode("22\trs11089130\t0\t14431347").unwrap();
        assert_eq!(v.start_pos(), 14431347);
        assert_eq!(v.primary_id(), Some("rs11089130"));
        assert_eq!(v.alleles().tokens(), vec!["C", "G"]);
        assert_eq!(v.ref_allele(), None);
        assert_eq!(v.sample_call("S2").unwrap().tokens(), vec!["C", "G"]);
        assert_eq!(v.sample_dosages(), vec![2.0, 1.0]);

        let all_missing = ctx.decode("22 rs738829 0 14432618").unwrap();
        assert!(all_missing.sample_calls().iter().all(Option::is_none));
    }

    #[test]
    fn test_samples() {
        let ctx = PedMapContext::new(&markers(), Cursor::new(PED)).unwrap();
        assert_eq!(ctx.samples()[0].family_id.as_deref(), Some("F1"));
        assert_eq!(ctx.samples()[0].annotations["phenotype"].value, SampleValue::Float(Some(2.0)));
        assert_eq!(ctx.samples()[1].annotations["phenotype"].value, SampleValue::Float(None));
        assert_eq!(ctx.samples()[1].annotations["sex"].value, SampleValue::Integer(Some(2)));
    }

    #[test]
    fn test_errors() {
        let ctx = PedMapContext::new(&markers(), Cursor::new(PED)).unwrap();
        assert!(ctx.decode("22 rs999 0 5").is_err());
        assert!(ctx.decode("22 rs999 0").is_err());
        assert!(PedMapContext::new(&markers(), Cursor::new("F1 S1 0 0 1 2 C C\n")).is_err());
        assert!(parse_map_line("22 rs1 x 5").is_err());
    }
}
