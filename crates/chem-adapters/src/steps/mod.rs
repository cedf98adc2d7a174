pub mod enumerate;
pub mod formula_filter;

pub use enumerate::{EnumerationMode, EnumerationOutcome, EnumerationSettings, InvalidItem, Product, ReactionEnumerator};
pub use formula_filter::{FilterOutcome, FilterSettings, FilteredRow, FormulaFilter, InvalidRow, QueryRow, TargetRow};
