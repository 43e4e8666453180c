use core::fmt;

/// Library-wide error for histogrammar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HgError {
    /// A constructor parameter violated its contract (non-positive bin count,
    /// `low >= high`, negative entries, ...).
    Validation { context: String },

    /// Two aggregators of incompatible shape were merged.
    StructureMismatch { context: String },

    /// A quantity was named twice, or two differently named quantities met in
    /// a merge.
    NameConflict { context: String },

    /// A JSON `"type"` tag with no registered factory.
    UnknownType { tag: String },

    /// Structurally wrong JSON fragment: missing required key, unexpected
    /// key, or a value of the wrong kind. `context` names the offending
    /// primitive field.
    JsonFormat { context: String },

    /// Text that does not parse as JSON at all.
    InvalidJson { message: String },
}

impl fmt::Display for HgError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HgError::Validation { context } => {
                write!(f, "histogrammar: invalid parameter: {}", context)
            }
            HgError::StructureMismatch { context } => write!(
                f,
                "histogrammar: cannot merge structurally different aggregators: {}. \
hint: both sides of a merge must share bin counts, edges, cutoffs, and sub-aggregator types",
                context
            ),
            HgError::NameConflict { context } => write!(
                f,
                "histogrammar: quantity name conflict: {}. \
hint: a quantity may be named once; merged quantities must agree on their name",
                context
            ),
            HgError::UnknownType { tag } => write!(
                f,
                "histogrammar: unrecognized aggregator type {:?}. \
hint: custom types must be registered with Factory::register before reading",
                tag
            ),
            HgError::JsonFormat { context } => {
                write!(f, "histogrammar: wrong JSON format for {}", context)
            }
            HgError::InvalidJson { message } => {
                write!(f, "histogrammar: invalid JSON: {}", message)
            }
        }
    }
}

impl std::error::Error for HgError {}

pub type HgResult<T> = Result<T, HgError>;

impl HgError {
    pub(crate) fn validation(context: impl Into<String>) -> Self {
        HgError::Validation {
            context: context.into(),
        }
    }

    pub(crate) fn mismatch(context: impl Into<String>) -> Self {
        HgError::StructureMismatch {
            context: context.into(),
        }
    }

    pub(crate) fn name_conflict(context: impl Into<String>) -> Self {
        HgError::NameConflict {
            context: context.into(),
        }
    }

    pub(crate) fn json_format(context: impl Into<String>) -> Self {
        HgError::JsonFormat {
            context: context.into(),
        }
    }
}
