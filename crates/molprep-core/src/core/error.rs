use std::fmt;

/// Coarse classification shared by every error the crate reports.
///
/// Format errors concern the bytes of a file, range errors values a format cannot
/// represent, metadata errors missing or inconsistent annotations, and lookup
/// errors identifiers that resolve to nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Format,
    Range,
    Metadata,
    Lookup,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorCategory::Format => "format",
            ErrorCategory::Range => "range",
            ErrorCategory::Metadata => "metadata",
            ErrorCategory::Lookup => "lookup",
        };
        f.write_str(name)
    }
}
