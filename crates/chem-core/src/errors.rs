//! Errores de la capa de handles.
//!
//! El fin de secuencia NO es un error: `ObjectIter::next_object` devuelve
//! `Ok(None)`.

use chemengine::{EngineError, Handle};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum CoreError {
    #[error("handle inválido {0} (liberado o desconocido)")] InvalidHandle(Handle),
    #[error("fallo al clonar: {0}")] Clone(String),
    #[error("fallo del motor: {0}")] Engine(EngineError),
}

impl From<EngineError> for CoreError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::InvalidHandle(h) => CoreError::InvalidHandle(h),
            EngineError::CloneFailed { handle, reason } => CoreError::Clone(format!("{handle}: {reason}")),
            other => CoreError::Engine(other),
        }
    }
}
