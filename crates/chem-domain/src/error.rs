use thiserror::Error;

/// Errores del dominio (fórmulas brutas).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Fórmula mal formada '{input}': {reason}")]
    MalformedFormula { input: String, reason: String },
}
