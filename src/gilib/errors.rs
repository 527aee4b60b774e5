use thiserror::Error;

pub type Result<T> = std::result::Result<T, GenoError>;

/// Every failure a query, decode, overlay update or LD computation can raise.
/// Absent data (unknown sequence, empty position) is never an error.
#[derive(Debug, Error)]
pub enum GenoError {
    /// Malformed index or source-file content
    #[error("malformed input{}: {message}", fmt_location(.location))]
    Format {
        location: Option<String>,
        message: String,
    },

    /// Underlying read or decompression failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// SNP-only operation on alleles that are not all single bases
    #[error("not a SNP: [{0}]")]
    NotASnp(String),

    /// Overlay update naming an allele the variant does not carry
    #[error("allele {allele} is not one of [{alleles}]")]
    IllegalAllele { allele: String, alleles: String },

    #[error("cannot compute LD: {0}")]
    LdComputation(#[from] LdPrecondition),

    #[error("strand of {variant} cannot be resolved; both orientations disagree")]
    AmbiguousStrand { variant: String },
}

/// The precondition an LD computation failed on
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LdPrecondition {
    #[error("{0} variant is not a biallelic SNP")]
    NotBiallelicSnp(&'static str),
    #[error("variants share no samples")]
    NoSharedSamples,
    #[error("only {0} samples are called at both loci, need at least 2")]
    TooFewSamples(usize),
    #[error("{0} variant calls do not match its declared alleles on either strand")]
    AllelesMismatch(&'static str),
    #[error("{0} variant is monomorphic in the shared samples")]
    Monomorphic(&'static str),
}

fn fmt_location(location: &Option<String>) -> String {
    match location {
        Some(loc) => format!(" at {}", loc),
        None => String::new(),
    }
}

impl GenoError {
    /// Format error without a known location; callers that know where the
    /// input came from attach it with [`GenoError::at`]
    pub fn format(message: impl Into<String>) -> Self {
        GenoError::Format {
            location: None,
            message: message.into(),
        }
    }

    /// Attach a location to a format error that doesn't have one yet
    pub fn at(self, loc: impl Into<String>) -> Self {
        match self {
            GenoError::Format {
                location: None,
                message,
            } => GenoError::Format {
                location: Some(loc.into()),
                message,
            },
            other => other,
        }
    }
}
