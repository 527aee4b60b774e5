use crate::gilib::{
    Allele, AlleleSet, Annotation, AnnotationType, AnnotationValue, BgzfReader, GenoError, Result, SampleCall, SampleIds,
    SymbolicAllele, Variant,
};
use indexmap::IndexMap;
use noodles_vcf::{
    self as vcf,
    header::record::value::map::info::{Number, Type},
};
use std::{collections::HashMap, io::Read, sync::Arc};

/// Header-derived state shared by every line of one VCF
#[derive(Debug, Clone)]
pub struct VcfContext {
    samples: SampleIds,
    infos: IndexMap<String, Annotation>,
    alt_descriptions: HashMap<String, String>,
    contigs: IndexMap<String, Option<u64>>,
}

impl VcfContext {
    /// Consume the `#` lines at the start of a BGZF VCF
    pub fn read_header<R: Read>(reader: &mut BgzfReader<R>) -> Result<Self> {
        let mut text = String::new();
        let mut line = String::new();
        loop {
            if reader.read_line(&mut line)? == 0 {
                break;
            }
            if !line.starts_with('#') {
                return Err(GenoError::format("data line before #CHROM header"));
            }
            text.push_str(&line);
            text.push('\n');
            if line.starts_with("#CHROM") {
                break;
            }
        }
        Self::from_header_text(&text)
    }

    pub fn from_header_text(text: &str) -> Result<Self> {
        let header: vcf::Header = text
            .parse()
            .map_err(|e| GenoError::format(format!("invalid VCF header: {}", e)))?;

        let infos = header
            .infos()
            .iter()
            .map(|(id, info)| {
                let ty = match info.ty() {
                    Type::Integer => AnnotationType::Integer,
                    Type::Float => AnnotationType::Float,
                    Type::Flag => AnnotationType::Boolean,
                    Type::Character => AnnotationType::Char,
                    Type::String => AnnotationType::String,
                };
                let is_list = !matches!(info.number(), Number::Count(0) | Number::Count(1));
                let annotation = Annotation::new(id.to_string(), info.description(), ty, is_list);
                (id.to_string(), annotation)
            })
            .collect();

        let alt_descriptions = header
            .alternative_alleles()
            .iter()
            .map(|(id, alt)| (id.to_string(), alt.description().to_string()))
            .collect();

        let contigs = header
            .contigs()
            .iter()
            .map(|(id, contig)| (id.to_string(), contig.length().map(|l| l as u64)))
            .collect();

        let samples: SampleIds = Arc::new(header.sample_names().iter().cloned().collect());
        debug!("VCF header declares {} samples", samples.len());

        Ok(Self {
            samples,
            infos,
            alt_descriptions,
            contigs,
        })
    }

    pub fn samples(&self) -> &SampleIds {
        &self.samples
    }

    pub fn annotations(&self) -> &IndexMap<String, Annotation> {
        &self.infos
    }

    /// Contig names with their declared lengths, in header order
    pub fn contigs(&self) -> &IndexMap<String, Option<u64>> {
        &self.contigs
    }

    pub fn decode(&self, line: &str) -> Result<Variant> {
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 8 {
            return Err(GenoError::format(format!(
                "expected at least 8 columns, found {}",
                fields.len()
            )));
        }
        let expected = match self.samples.is_empty() {
            true => 8,
            false => 9 + self.samples.len(),
        };
        if fields.len() < expected {
            return Err(GenoError::format(format!(
                "expected {} columns for {} samples, found {}",
                expected,
                self.samples.len(),
                fields.len()
            )));
        }

        let start = fields[1]
            .parse::<u64>()
            .map_err(|_| GenoError::format(format!("POS '{}' is not a position", fields[1])))?;
        let ids = match fields[2] {
            "." => vec![],
            ids => ids.split(';').map(String::from).collect(),
        };

        let mut tokens = vec![fields[3]];
        if fields[4] != "." {
            tokens.extend(fields[4].split(','));
        }
        let alleles = AlleleSet::of(&tokens);
        let symbolic = tokens[1..]
            .iter()
            .filter_map(|alt| alt.strip_prefix('<').and_then(|a| a.strip_suffix('>')))
            .map(|kind| SymbolicAllele {
                kind: kind.to_string(),
                description: self.alt_descriptions.get(kind).cloned(),
            })
            .collect();

        let annotations = self.decode_info(fields[7])?;
        let stop = annotations
            .get("END")
            .and_then(|v| v.as_integer())
            .and_then(|end| u64::try_from(end).ok());

        let calls = match self.samples.is_empty() {
            true => vec![],
            false => decode_calls(fields[8], &fields[9..], &alleles)?,
        };

        Variant::builder(fields[0], start, alleles)
            .ids(ids)
            .stop(stop)
            .with_reference()
            .symbolic(symbolic)
            .annotations(annotations)
            .calls(Arc::clone(&self.samples), calls)
            .build()
    }

    /// Declared keys are coerced, undeclared keys are dropped
    fn decode_info(&self, info: &str) -> Result<IndexMap<String, AnnotationValue>> {
        let mut annotations = IndexMap::new();
        if info == "." {
            return Ok(annotations);
        }
        for entry in info.split(';') {
            let (key, raw) = match entry.split_once('=') {
                Some((key, value)) => (key, value.split(',').collect::<Vec<_>>()),
                None => (entry, vec![]),
            };
            let Some(declared) = self.infos.get(key) else {
                continue;
            };
            if let Some(value) = declared.coerce(&raw)? {
                annotations.insert(key.to_string(), value);
            }
        }
        Ok(annotations)
    }
}

fn decode_calls(format: &str, columns: &[&str], alleles: &AlleleSet) -> Result<Vec<SampleCall>> {
    let Some(gt_idx) = format.split(':').position(|key| key == "GT") else {
        return Ok(vec![None; columns.len()]);
    };
    columns
        .iter()
        .map(|column| match column.split(':').nth(gt_idx) {
            Some(gt) => parse_gt(gt, alleles),
            None => Ok(None),
        })
        .collect()
}

/// `0/1`, `1|0`, `1`; any `.` makes the whole call unknown
fn parse_gt(gt: &str, alleles: &AlleleSet) -> Result<SampleCall> {
    let mut called: Vec<Allele> = vec![];
    for idx in gt.split(['/', '|']) {
        if idx == "." || idx.is_empty() {
            return Ok(None);
        }
        let allele = idx
            .parse::<usize>()
            .ok()
            .and_then(|i| alleles.get(i))
            .ok_or_else(|| GenoError::format(format!("GT '{}' does not index alleles [{}]", gt, alleles)))?;
        called.push(allele.clone());
    }
    Ok(Some(AlleleSet::from_alleles(called)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gilib::VariantView;
    use pretty_assertions::assert_eq;

    const HEADER: &str = "##fileformat=VCFv4.2
##INFO=<ID=DP,Number=1,Type=Integer,Description=\"Total Depth\">
##INFO=<ID=AF,Number=A,Type=Float,Description=\"Allele Frequency\">
##INFO=<ID=DB,Number=0,Type=Flag,Description=\"dbSNP membership\">
##INFO=<ID=END,Number=1,Type=Integer,Description=\"End position\">
##ALT=<ID=DEL,Description=\"Deletion\">
##FORMAT=<ID=GT,Number=1,Type=String,Description=\"Genotype\">
##contig=<ID=22,length=51304566>
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\ts1\ts2\ts3
";

    fn context() -> VcfContext {
        VcfContext::from_header_text(HEADER).unwrap()
    }

    #[test]
    fn test_header_schema() {
        let ctx = context();
        assert_eq!(ctx.samples().iter().collect::<Vec<_>>(), vec!["s1", "s2", "s3"]);
        assert!(!ctx.annotations()["DP"].is_list);
        assert!(ctx.annotations()["AF"].is_list);
        assert_eq!(ctx.annotations()["DB"].ty, AnnotationType::Boolean);
        assert_eq!(ctx.contigs()["22"], Some(51304566));
    }

    #[test]
    fn test_decode_snp() {
        let v = context()
            .decode("22\t14431347\trs1;rs1b\tC\tT\t50\tPASS\tDP=14;AF=0.5;DB;XX=1\tGT:DP\t0/0:3\t0|1:4\t./.:0")
            .unwrap();
        assert_eq!(v.sequence_name(), "22");
        assert_eq!(v.start_pos(), 14431347);
        assert_eq!(v.primary_id(), Some("rs1"));
        assert_eq!(v.alternative_ids(), &["rs1b".to_string()]);
        assert_eq!(v.alleles().tokens(), vec!["C", "T"]);
        assert_eq!(v.ref_allele(), Some(&Allele::of("C")));
        assert_eq!(v.annotation("DP"), Some(&AnnotationValue::Integer(14)));
        assert_eq!(v.annotation("AF"), Some(&AnnotationValue::FloatList(vec![0.5])));
        assert_eq!(v.annotation("DB"), Some(&AnnotationValue::Boolean(true)));
        assert_eq!(v.annotation("XX"), None);
        assert_eq!(v.sample_call("s2").unwrap().tokens(), vec!["C", "T"]);
        assert!(v.sample_call("s3").is_none());
        assert_eq!(v.sample_dosages(), vec![2.0, 1.0, -1.0]);
    }

    #[test]
    fn test_decode_symbolic() {
        let v = context()
            .decode("22\t100\t.\tN\t<DEL>\t.\t.\tEND=500\tGT\t0/1\t1\t0")
            .unwrap();
        assert_eq!(v.primary_id(), None);
        assert_eq!(v.stop_pos(), Some(500));
        assert_eq!(
            v.symbolic_alleles(),
            &[SymbolicAllele {
                kind: "DEL".to_string(),
                description: Some("Deletion".to_string())
            }]
        );
        assert_eq!(v.sample_call("s2").unwrap().tokens(), vec!["<DEL>"]);
        assert!(!v.is_snp());
    }

    #[test]
    fn test_decode_errors() {
        let ctx = context();
        assert!(ctx.decode("22\t100\t.\tA").is_err());
        assert!(ctx.decode("22\tx\t.\tA\tG\t.\t.\t.\tGT\t0\t0\t0").is_err());
        assert!(ctx.decode("22\t100\t.\tA\tG\t.\t.\t.\tGT\t0/2\t0\t0").is_err());
        assert!(ctx.decode("22\t100\t.\tA\tG\t.\t.\tDP=deep\tGT\t0\t0\t0").is_err());
        assert!(ctx.decode("22\t100\t.\tA\tG\t.\t.\t.\tGT\t0\t0").is_err());
    }

    #[test]
    fn test_sites_only() {
        let ctx = VcfContext::from_header_text(
            "##fileformat=VCFv4.2\n#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\n",
        )
        .unwrap();
        let v = ctx.decode("1\t5\t.\tA\t.\t.\t.\t.").unwrap();
        assert_eq!(v.allele_count(), 1);
        assert!(v.sample_calls().is_empty());
    }
}
