use std::fmt;

/// Errors of the expression layer. Pattern-match failure is not an error here:
/// matching returns `None` and the caller moves on to the next template.
#[derive(Debug, Clone, PartialEq)]
pub enum SymbolicError {
    /// `solve_transcendental` could not reduce the equation to closed form
    UnsolvableEquation { equation: String, symbol: String },
    /// text could not be parsed into an expression
    Parse(String),
    /// numeric evaluation met a symbol with no value
    UnboundSymbol(String),
    /// a guarded asin/acos/sqrt received an argument outside its domain
    DomainAbort(String),
}

impl fmt::Display for SymbolicError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SymbolicError::UnsolvableEquation { equation, symbol } => {
                write!(f, "cannot solve {} = 0 for {}", equation, symbol)
            }
            SymbolicError::Parse(msg) => write!(f, "parse error: {}", msg),
            SymbolicError::UnboundSymbol(name) => write!(f, "symbol {} has no value", name),
            SymbolicError::DomainAbort(msg) => write!(f, "domain guard failed: {}", msg),
        }
    }
}

impl std::error::Error for SymbolicError {}
