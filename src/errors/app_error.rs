use chem_adapters::AdapterError;
use chem_core::CoreError;
use chem_domain::DomainError;
use chem_policies::PolicyError;
use chemengine::EngineError;
use thiserror::Error;

/// Error paraguas de la aplicación.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Error del motor: {0}")]
    Engine(#[from] EngineError),
    #[error("Error del núcleo: {0}")]
    Core(#[from] CoreError),
    #[error("Error de dominio: {0}")]
    Domain(#[from] DomainError),
    #[error("Error de política: {0}")]
    Policy(#[from] PolicyError),
    #[error("Error en flujo: {0}")]
    Adapter(#[from] AdapterError),
    #[error("Error en IO: {0}")]
    Io(#[from] std::io::Error),
    #[error("Error de serialización: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use chemengine::Handle;

    #[test]
    fn test_engine_variant_from() {
        let err: AppError = EngineError::Failure("sin memoria".into()).into();
        assert_eq!(err.to_string(), "Error del motor: error del motor: sin memoria");
    }

    #[test]
    fn test_core_variant_from() {
        let err: AppError = CoreError::InvalidHandle(Handle::new(7)).into();
        assert!(matches!(err, AppError::Core(CoreError::InvalidHandle(h)) if h.raw() == 7));
    }

    #[test]
    fn test_domain_variant_format() {
        let err: AppError = DomainError::MalformedFormula { input: "2H".into(),
                                                            reason: "inválido".into() }.into();
        assert_eq!(err.to_string(), "Error de dominio: Fórmula mal formada '2H': inválido");
    }

    #[test]
    fn test_io_variant_from() {
        let io_err = std::io::Error::other("falló IO");
        let err: AppError = io_err.into();
        assert_eq!(err.to_string(), "Error en IO: falló IO");
    }
}
