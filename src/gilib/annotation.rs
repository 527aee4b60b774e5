use crate::gilib::{AnnotationValue, GenoError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnotationType {
    Integer,
    Float,
    Boolean,
    Char,
    String,
}

/// Declaration of a variant-level (INFO) or sample-level annotation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    pub id: String,
    pub description: String,
    pub ty: AnnotationType,
    pub is_list: bool,
}

impl Annotation {
    pub fn new(id: impl Into<String>, description: impl Into<String>, ty: AnnotationType, is_list: bool) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            ty,
            is_list,
        }
    }

    /// Coerce raw comma-split values into this declaration's type.
    /// `.` entries are missing; a flag without a value is true.
    pub fn coerce(&self, raw: &[&str]) -> Result<Option<AnnotationValue>> {
        if raw.is_empty() && self.ty == AnnotationType::Boolean {
            return Ok(Some(match self.is_list {
                true => AnnotationValue::BooleanList(vec![true]),
                false => AnnotationValue::Boolean(true),
            }));
        }
        let values: Vec<&str> = raw.iter().copied().filter(|v| *v != "." && !v.is_empty()).collect();
        if values.is_empty() {
            return Ok(None);
        }

        let value = match (self.ty, self.is_list) {
            (AnnotationType::Integer, false) => AnnotationValue::Integer(self.parse(values[0])?),
            (AnnotationType::Integer, true) => AnnotationValue::IntegerList(self.parse_all(&values)?),
            (AnnotationType::Float, false) => AnnotationValue::Float(self.parse(values[0])?),
            (AnnotationType::Float, true) => AnnotationValue::FloatList(self.parse_all(&values)?),
            (AnnotationType::Boolean, false) => AnnotationValue::Boolean(parse_bool(values[0])),
            (AnnotationType::Boolean, true) => {
                AnnotationValue::BooleanList(values.iter().map(|v| parse_bool(v)).collect())
            }
            (AnnotationType::Char, false) => AnnotationValue::Char(first_char(values[0])),
            (AnnotationType::Char, true) => {
                AnnotationValue::CharList(values.iter().map(|v| first_char(v)).collect())
            }
            (AnnotationType::String, false) => AnnotationValue::String(values[0].to_string()),
            (AnnotationType::String, true) => {
                AnnotationValue::StringList(values.iter().map(|v| v.to_string()).collect())
            }
        };
        Ok(Some(value))
    }

    fn parse<T: std::str::FromStr>(&self, value: &str) -> Result<T> {
        value.parse::<T>().map_err(|_| {
            GenoError::format(format!(
                "INFO {} value '{}' is not {:?}",
                self.id, value, self.ty
            ))
        })
    }

    fn parse_all<T: std::str::FromStr>(&self, values: &[&str]) -> Result<Vec<T>> {
        values.iter().map(|v| self.parse(v)).collect()
    }
}

fn parse_bool(value: &str) -> bool {
    value.eq_ignore_ascii_case("true")
}

fn first_char(value: &str) -> char {
    // callers filter empty values
    value.chars().next().unwrap_or('.')
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_scalar_and_list() {
        let dp = Annotation::new("DP", "depth", AnnotationType::Integer, false);
        assert_eq!(dp.coerce(&["14"]).unwrap(), Some(AnnotationValue::Integer(14)));

        let af = Annotation::new("AF", "freq", AnnotationType::Float, true);
        assert_eq!(
            af.coerce(&["0.5", ".", "0.25"]).unwrap(),
            Some(AnnotationValue::FloatList(vec![0.5, 0.25]))
        );
    }

    #[test]
    fn test_flag_without_value() {
        let db = Annotation::new("DB", "dbsnp", AnnotationType::Boolean, false);
        assert_eq!(db.coerce(&[]).unwrap(), Some(AnnotationValue::Boolean(true)));
    }

    #[test]
    fn test_missing_and_bad_values() {
        let dp = Annotation::new("DP", "depth", AnnotationType::Integer, false);
        assert_eq!(dp.coerce(&["."]).unwrap(), None);
        assert!(matches!(dp.coerce(&["deep"]), Err(GenoError::Format { .. })));
    }

    #[test]
    fn test_char_and_string() {
        let c = Annotation::new("C", "", AnnotationType::Char, false);
        assert_eq!(c.coerce(&["xyz"]).unwrap(), Some(AnnotationValue::Char('x')));
        let s = Annotation::new("S", "", AnnotationType::String, true);
        assert_eq!(
            s.coerce(&["a", "b"]).unwrap(),
            Some(AnnotationValue::StringList(vec!["a".into(), "b".into()]))
        );
    }
}
