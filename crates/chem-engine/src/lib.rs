//! chemengine: contrato de capacidades del motor químico nativo.
//!
//! El motor es una caja negra que devuelve handles enteros opacos. Este crate
//! define:
//! - `Handle` / `SessionId`: identificadores opacos del lado nativo.
//! - `NativeEngine`: las operaciones que el resto del workspace consume.
//! - `MockEngine`: backend en memoria determinista (tests, demo, CLI).
//! - `RdkitEngine` (feature `rdkit`): backend real vía Python/RDKit.
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub mod config;
pub mod mock;
#[cfg(feature = "rdkit")]
pub mod rdkit;

pub use config::EngineConfig;
pub use mock::MockEngine;
#[cfg(feature = "rdkit")]
pub use rdkit::RdkitEngine;

/// Identificador opaco de un objeto del lado nativo.
///
/// El handle no lleva etiqueta de tipo: que sea molécula, reacción, arreglo o
/// iterador lo decide la operación que el llamador invoque sobre él.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Handle(i32);

impl Handle {
    /// "Sin objeto" / "fin de secuencia". Nunca es un objeto válido.
    pub const SENTINEL: Handle = Handle(0);

    pub const fn new(raw: i32) -> Self { Handle(raw) }
    pub const fn raw(self) -> i32 { self.0 }
    pub const fn is_sentinel(self) -> bool { self.0 == Self::SENTINEL.0 }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "#{}", self.0) }
}

/// Sesión nativa: cada `Session` del core reserva una.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "sid:{}", self.0) }
}

/// Valor de opción del motor (opciones de carga y de enumeración).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl From<bool> for OptionValue {
    fn from(v: bool) -> Self { OptionValue::Bool(v) }
}
impl From<i64> for OptionValue {
    fn from(v: i64) -> Self { OptionValue::Int(v) }
}
impl From<f64> for OptionValue {
    fn from(v: f64) -> Self { OptionValue::Float(v) }
}
impl From<&str> for OptionValue {
    fn from(v: &str) -> Self { OptionValue::Str(v.to_string()) }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Bool(b) => write!(f, "{b}"),
            OptionValue::Int(i) => write!(f, "{i}"),
            OptionValue::Float(x) => write!(f, "{x}"),
            OptionValue::Str(s) => f.write_str(s),
        }
    }
}

/// Nombres de opciones que usan los flujos de este workspace.
pub mod options {
    pub const IGNORE_STEREOCHEMISTRY_ERRORS: &str = "ignore-stereochemistry-errors";
    pub const TREAT_X_AS_PSEUDOATOM: &str = "treat-x-as-pseudoatom";
    pub const RPE_MAX_DEPTH: &str = "rpe-max-depth";
    pub const RPE_MAX_PRODUCTS_COUNT: &str = "rpe-max-products-count";
    pub const RPE_MULTISTEP_REACTIONS: &str = "rpe-multistep-reactions";
    pub const RPE_SELF_REACTION: &str = "rpe-self-reaction";
    pub const RPE_MODE: &str = "rpe-mode";
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    #[error("handle inválido o ya liberado: {0}")]
    InvalidHandle(Handle),
    #[error("no se puede clonar {handle}: {reason}")]
    CloneFailed { handle: Handle, reason: String },
    #[error("opción desconocida: {0}")]
    UnknownOption(String),
    #[error("error del motor: {0}")]
    Failure(String),
    #[error("Error inicializando el motor: {0}")]
    Init(String),
}

/// Capacidades que el motor nativo ofrece a la capa de handles.
///
/// Todas las llamadas son bloqueantes. El motor puede compartirse entre hilos,
/// pero las llamadas de una misma sesión deben serializarse (lo hace
/// `chem_core::Session`).
pub trait NativeEngine: Send + Sync {
    fn version(&self) -> String;

    fn alloc_session(&self) -> Result<SessionId, EngineError>;
    /// Libera la sesión y todos los handles que sigan vivos en ella.
    fn release_session(&self, sid: SessionId) -> Result<(), EngineError>;

    /// Libera una referencia. `InvalidHandle` si ya no existe.
    fn free(&self, sid: SessionId, handle: Handle) -> Result<(), EngineError>;
    /// Copia independiente: siempre un handle nuevo, nunca un alias.
    fn clone_object(&self, sid: SessionId, handle: Handle) -> Result<Handle, EngineError>;
    /// Siguiente elemento del cursor, o `Handle::SENTINEL` si se agotó.
    fn next(&self, sid: SessionId, cursor: Handle) -> Result<Handle, EngineError>;
    /// Consulta independiente de `next`: no mueve el cursor.
    fn has_next(&self, sid: SessionId, cursor: Handle) -> Result<bool, EngineError>;
    /// Número de handles vivos en la sesión (detección de fugas).
    fn count_references(&self, sid: SessionId) -> Result<usize, EngineError>;

    fn set_option(&self, sid: SessionId, name: &str, value: &OptionValue) -> Result<(), EngineError>;
    fn reset_options(&self, sid: SessionId) -> Result<(), EngineError>;

    fn load_molecule(&self, sid: SessionId, data: &str) -> Result<Handle, EngineError>;
    fn load_reaction(&self, sid: SessionId, data: &str) -> Result<Handle, EngineError>;
    fn gross_formula(&self, sid: SessionId, handle: Handle) -> Result<String, EngineError>;
    fn smiles(&self, sid: SessionId, handle: Handle) -> Result<String, EngineError>;

    fn create_array(&self, sid: SessionId) -> Result<Handle, EngineError>;
    fn array_add(&self, sid: SessionId, array: Handle, item: Handle) -> Result<(), EngineError>;
    fn count(&self, sid: SessionId, handle: Handle) -> Result<usize, EngineError>;
    /// Cursor sobre los elementos del arreglo; `SENTINEL` si no hay nada que iterar.
    fn iterate_array(&self, sid: SessionId, array: Handle) -> Result<Handle, EngineError>;

    /// Enumera productos de `reaction` con la tabla `monomers` (arreglo de
    /// arreglos, uno por reactivo). Devuelve un arreglo de reacciones producto
    /// o `SENTINEL` si no se pudo enumerar nada.
    fn reaction_product_enumerate(&self,
                                  sid: SessionId,
                                  reaction: Handle,
                                  monomers: Handle)
                                  -> Result<Handle, EngineError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_is_zero() {
        assert!(Handle::SENTINEL.is_sentinel());
        assert!(Handle::new(0).is_sentinel());
        assert!(!Handle::new(7).is_sentinel());
        assert_eq!(Handle::new(7).to_string(), "#7");
    }

    #[test]
    fn error_messages() {
        let e = EngineError::InvalidHandle(Handle::new(3));
        assert_eq!(e.to_string(), "handle inválido o ya liberado: #3");
        let e = EngineError::CloneFailed { handle: Handle::new(4), reason: "iterator".into() };
        assert_eq!(e.to_string(), "no se puede clonar #4: iterator");
    }

    #[test]
    fn option_value_conversions() {
        assert_eq!(OptionValue::from(true), OptionValue::Bool(true));
        assert_eq!(OptionValue::from("grid").to_string(), "grid");
        assert_eq!(OptionValue::from(5i64).to_string(), "5");
    }
}
