//! chem-adapters: flujos por lotes sobre la capa de handles
//!
//! Este crate provee:
//! - `FormulaFilter`: separa una tabla de estructuras en matched / unmatched /
//!   invalid según su fórmula bruta frente a una tabla de consultas.
//! - `ReactionEnumerator`: enumera productos de una reacción sobre listas de
//!   monómeros.
//! - `BatchReport`: resumen auditable (run id, tiempos, contadores,
//!   advertencias) que acompaña a cada corrida.
//!
//! Nota: los flujos nunca abortan por un elemento inválido; lo desvían a su
//! canal `invalid` y siguen.

pub mod error;
pub mod report;
pub mod steps;

pub use error::AdapterError;
pub use report::BatchReport;
pub use steps::*;
