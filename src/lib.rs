//! ChemBind Rust Library
//!
//! Fachada del workspace:
//! - `engine`: contrato del motor nativo y backends (`chemengine`).
//! - `lifecycle`: sesiones, objetos envueltos e iteradores (`chem-core`).
//! - `formula`: fórmulas brutas y su comparación (`chem-domain`).
//! - `policies`: política de coincidencia (`chem-policies`).
//! - `workflows`: flujos por lotes (`chem-adapters`).
//! - `errors`: error paraguas `AppError`.
//!
//! Puede usarse desde `main.rs` o por otros crates/clientes.

pub mod errors;

pub use chem_adapters as workflows;
pub use chem_core as lifecycle;
pub use chem_domain as formula;
pub use chem_policies as policies;
pub use chemengine as engine;

pub use errors::AppError;

pub mod prelude {
    pub use chem_adapters::{BatchReport, EnumerationSettings, FilterSettings, FormulaFilter, QueryRow,
                            ReactionEnumerator, TargetRow};
    pub use chem_core::{ChemObject, CursorState, ObjectIter, Session};
    pub use chem_domain::{FormulaMap, FormulaRelation};
    pub use chem_policies::{FormulaMatchPolicy, MatchParams, MatchPolicy, Quantifier, RelationMode};
    pub use chemengine::{EngineConfig, MockEngine, NativeEngine};

    pub use crate::AppError;
}
