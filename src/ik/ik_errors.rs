use crate::symbolic::symbolic_errors::SymbolicError;
use std::fmt;

/// Compilation failures. The engine never returns a partial solver tree: any of these
/// aborts the whole compilation and names the variables or equations involved.
#[derive(Debug, Clone, PartialEq)]
pub enum IkError {
    Symbolic(SymbolicError),
    /// the chain does not split into a translation part and a rotation part
    NoSeparationPoint { variables: Vec<String> },
    /// no strategy determines the remaining variables
    UnresolvableVariableSet { variables: Vec<String> },
    InvalidChain(String),
    InvalidConfig(String),
    CodeGeneration(String),
}

impl fmt::Display for IkError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            IkError::Symbolic(e) => write!(f, "{}", e),
            IkError::NoSeparationPoint { variables } => {
                write!(f, "cannot separate translation from rotation for {:?}", variables)
            }
            IkError::UnresolvableVariableSet { variables } => {
                write!(f, "cannot solve for variables {:?}", variables)
            }
            IkError::InvalidChain(msg) => write!(f, "invalid chain: {}", msg),
            IkError::InvalidConfig(msg) => write!(f, "invalid config: {}", msg),
            IkError::CodeGeneration(msg) => write!(f, "code generation failed: {}", msg),
        }
    }
}

impl std::error::Error for IkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            IkError::Symbolic(e) => Some(e),
            _ => None,
        }
    }
}

impl From<SymbolicError> for IkError {
    fn from(e: SymbolicError) -> Self {
        IkError::Symbolic(e)
    }
}
