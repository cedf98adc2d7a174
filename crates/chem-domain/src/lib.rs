// chem-domain library entry point
pub mod error;
pub mod formula;
pub use error::DomainError;
pub use formula::{FormulaMap, FormulaRelation};
