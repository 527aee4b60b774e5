use crate::gilib::{Annotation, AnnotationType, GenoError, Result};
use indexmap::IndexMap;
use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleAnnotationKind {
    Covariate,
    Phenotype,
    Other,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SampleValue {
    Integer(Option<i64>),
    Float(Option<f64>),
    Boolean(Option<bool>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SampleAnnotation {
    pub id: String,
    pub kind: SampleAnnotationKind,
    pub value: SampleValue,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub id: String,
    pub family_id: Option<String>,
    pub annotations: IndexMap<String, SampleAnnotation>,
}

impl Sample {
    pub fn new(id: impl Into<String>, family_id: Option<String>) -> Self {
        Self {
            id: id.into(),
            family_id,
            annotations: IndexMap::new(),
        }
    }

    pub fn annotate(&mut self, id: &str, kind: SampleAnnotationKind, value: SampleValue) {
        self.annotations.insert(
            id.to_string(),
            SampleAnnotation {
                id: id.to_string(),
                kind,
                value,
            },
        );
    }
}

/// Column type declared on the second header row of a `.sample` file
fn column_type(code: &str) -> Option<(AnnotationType, SampleAnnotationKind)> {
    match code.to_ascii_uppercase().as_str() {
        "D" => Some((AnnotationType::Integer, SampleAnnotationKind::Covariate)),
        "C" => Some((AnnotationType::Float, SampleAnnotationKind::Covariate)),
        "P" => Some((AnnotationType::Float, SampleAnnotationKind::Phenotype)),
        "B" => Some((AnnotationType::Boolean, SampleAnnotationKind::Phenotype)),
        _ => None,
    }
}

fn parse_value(ty: AnnotationType, raw: &str) -> std::result::Result<SampleValue, String> {
    let missing = raw.eq_ignore_ascii_case("NA");
    match ty {
        AnnotationType::Integer if missing => Ok(SampleValue::Integer(None)),
        AnnotationType::Integer => raw
            .parse::<i64>()
            .map(|v| SampleValue::Integer(Some(v)))
            .map_err(|_| format!("'{}' is not an integer", raw)),
        AnnotationType::Boolean if missing => Ok(SampleValue::Boolean(None)),
        AnnotationType::Boolean => match raw {
            "1" => Ok(SampleValue::Boolean(Some(true))),
            "0" => Ok(SampleValue::Boolean(Some(false))),
            _ => raw
                .to_ascii_lowercase()
                .parse::<bool>()
                .map(|v| SampleValue::Boolean(Some(v)))
                .map_err(|_| format!("'{}' is not a boolean", raw)),
        },
        _ if missing => Ok(SampleValue::Float(None)),
        _ => raw
            .parse::<f64>()
            .map(|v| SampleValue::Float(Some(v)))
            .map_err(|_| format!("'{}' is not a number", raw)),
    }
}

/// Parse an IMPUTE2/SHAPEIT `.sample` file: a row of column names, a row of
/// column types, then one row per sample (ID_1 ID_2 missing ...)
pub fn read_sample_file(path: &Path) -> Result<(Vec<Sample>, Vec<Annotation>)> {
    let reader = BufReader::new(File::open(path)?);
    let mut lines = reader.lines().enumerate();
    let location = |n: usize| format!("{}:{}", path.display(), n + 1);

    let names: Vec<String> = match lines.next() {
        Some((_, line)) => line?.split_whitespace().map(String::from).collect(),
        None => return Ok((vec![], vec![])),
    };
    let types: Vec<String> = match lines.next() {
        Some((_, line)) => line?.split_whitespace().map(String::from).collect(),
        None => return Err(GenoError::format("missing column type row").at(location(1))),
    };
    if names.len() < 3 || types.len() != names.len() {
        return Err(GenoError::format(format!(
            "expected at least 3 named columns with one type each, got {} names and {} types",
            names.len(),
            types.len()
        ))
        .at(location(1)));
    }

    let mut columns = vec![];
    let mut declarations = vec![Annotation::new("missing", "missing data proportion", AnnotationType::Float, false)];
    for (idx, (name, code)) in names.iter().zip(types.iter()).enumerate().skip(3) {
        match column_type(code) {
            Some((ty, kind)) => {
                columns.push((idx, name.clone(), ty, kind));
                declarations.push(Annotation::new(name.clone(), format!("{:?}", kind), ty, false));
            }
            None => warn!("unknown sample column type [{}] for {}", code, name),
        }
    }

    let mut samples = vec![];
    for (n, line) in lines {
        let line = line?;
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.is_empty() {
            continue;
        }
        if fields.len() != names.len() {
            return Err(GenoError::format(format!(
                "expected {} columns, found {}",
                names.len(),
                fields.len()
            ))
            .at(location(n)));
        }

        let mut sample = Sample::new(fields[1], Some(fields[0].to_string()));
        let missing = parse_value(AnnotationType::Float, fields[2])
            .map_err(|e| GenoError::format(e).at(location(n)))?;
        sample.annotate("missing", SampleAnnotationKind::Other, missing);
        for (idx, name, ty, kind) in &columns {
            let value = parse_value(*ty, fields[*idx])
                .map_err(|e| GenoError::format(format!("{}: {}", name, e)).at(location(n)))?;
            sample.annotate(name, *kind, value);
        }
        samples.push(sample);
    }

    Ok((samples, declarations))
}
