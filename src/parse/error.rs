use std::fmt::Display;

/// Failure to cut an embedded literal out of a vendor page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    AnchorNotFound(String),
    NoLiteral(String),
    Unterminated(String),
}

impl ExtractionError {
    pub fn anchor_not_found(anchor: &str) -> Self {
        Self::AnchorNotFound(anchor.to_string())
    }
    pub fn no_literal(anchor: &str) -> Self {
        Self::NoLiteral(anchor.to_string())
    }
    pub fn unterminated(anchor: &str) -> Self {
        Self::Unterminated(anchor.to_string())
    }
}

impl Display for ExtractionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AnchorNotFound(anchor) => write!(f, "anchor `{anchor}` not found in page"),
            Self::NoLiteral(anchor) => {
                write!(f, "no object or array literal follows anchor `{anchor}`")
            }
            Self::Unterminated(anchor) => {
                write!(f, "literal after anchor `{anchor}` never closes")
            }
        }
    }
}

impl std::error::Error for ExtractionError {}
