//! chem-policies – Política de coincidencia de fórmulas
//!
//! Decide si un objetivo "pasa" frente a una tabla de fórmulas de consulta:
//! un conjunto de relaciones deseadas (`RelationMode`) más un cuantificador
//! (`Quantifier`). La política es pura: no toca el motor ni handles.

use std::str::FromStr;

use chem_domain::{FormulaMap, FormulaRelation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PolicyError {
    #[error("modo de relación desconocido: '{0}' (se esperaba eq, le o ge)")]
    UnknownRelationMode(String),
    #[error("se piden al menos {min} coincidencias pero sólo hay {available} consultas")]
    Unsatisfiable { min: usize, available: usize },
}

/// Relaciones objetivo/consulta que cuentan como coincidencia.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RelationMode {
    /// Sólo `Equal`.
    #[default]
    Equal,
    /// `Equal` o `TargetIsSubset`.
    LessOrEqual,
    /// `Equal` o `TargetIsSuperset`.
    GreaterOrEqual,
}

impl RelationMode {
    pub fn desired(self) -> &'static [FormulaRelation] {
        match self {
            RelationMode::Equal => &[FormulaRelation::Equal],
            RelationMode::LessOrEqual => &[FormulaRelation::Equal, FormulaRelation::TargetIsSubset],
            RelationMode::GreaterOrEqual => &[FormulaRelation::Equal, FormulaRelation::TargetIsSuperset],
        }
    }

    pub fn accepts(self, relation: FormulaRelation) -> bool { self.desired().contains(&relation) }
}

impl FromStr for RelationMode {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "eq" | "equal" => Ok(RelationMode::Equal),
            "le" | "less_or_equal" => Ok(RelationMode::LessOrEqual),
            "ge" | "greater_or_equal" => Ok(RelationMode::GreaterOrEqual),
            other => Err(PolicyError::UnknownRelationMode(other.to_string())),
        }
    }
}

/// Cuántas consultas deben coincidir para que el objetivo pase.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "quantifier", content = "min")]
pub enum Quantifier {
    /// `match_count >= n`.
    MatchAnyAtLeast(usize),
    /// `match_count == total de consultas` (incluidas las inválidas).
    MatchAll,
}

impl Default for Quantifier {
    fn default() -> Self { Quantifier::MatchAnyAtLeast(1) }
}

/// Parámetros de la política.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MatchParams {
    pub relation: RelationMode,
    pub quantifier: Quantifier,
}

impl MatchParams {
    pub fn new(relation: RelationMode, quantifier: Quantifier) -> Self { Self { relation, quantifier } }

    /// Comprueba que los parámetros puedan satisfacerse con `query_count`
    /// consultas. Un umbral inalcanzable no es fatal para el lote (el objetivo
    /// simplemente nunca pasa); el llamador decide si lo reporta.
    pub fn validate(&self, query_count: usize) -> Result<(), PolicyError> {
        match self.quantifier {
            Quantifier::MatchAnyAtLeast(min) if min > query_count => {
                Err(PolicyError::Unsatisfiable { min, available: query_count })
            }
            _ => Ok(()),
        }
    }
}

/// Fila de consulta ya parseada. `formula == None` para celdas ausentes o no
/// parseables: se saltan al contar, pero siguen contando en el total.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct QueryFormula {
    pub key: String,
    pub formula: Option<FormulaMap>,
}

impl QueryFormula {
    pub fn new(key: impl Into<String>, formula: Option<FormulaMap>) -> Self {
        Self { key: key.into(),
               formula }
    }

    pub fn is_valid(&self) -> bool { self.formula.is_some() }
}

/// Resultado de evaluar un objetivo.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MatchDecision {
    pub match_count: usize,
    /// Claves de las consultas que coincidieron, en el orden de la tabla.
    pub matched_keys: Vec<String>,
    pub passed: bool,
}

impl MatchDecision {
    /// "q1, q3"
    pub fn matched_keys_joined(&self) -> String { self.matched_keys.join(", ") }
}

/// Contrato de políticas de coincidencia deterministas.
pub trait MatchPolicy {
    fn id(&self) -> &'static str;
    fn evaluate(&self, target: &FormulaMap, queries: &[QueryFormula]) -> MatchDecision;
}

/// Política por fórmula bruta: relación deseada + cuantificador.
#[derive(Clone, Debug, Default)]
pub struct FormulaMatchPolicy {
    params: MatchParams,
}

impl FormulaMatchPolicy {
    pub fn new(params: MatchParams) -> Self { Self { params } }

    pub fn params(&self) -> &MatchParams { &self.params }
}

impl MatchPolicy for FormulaMatchPolicy {
    fn id(&self) -> &'static str { "formula_match" }

    fn evaluate(&self, target: &FormulaMap, queries: &[QueryFormula]) -> MatchDecision {
        let matched_keys: Vec<String> =
            queries.iter()
                   .filter_map(|q| q.formula.as_ref().map(|f| (q, f)))
                   .filter(|(_, f)| self.params.relation.accepts(target.compare(f)))
                   .map(|(q, _)| q.key.clone())
                   .collect();
        let match_count = matched_keys.len();
        let passed = match self.params.quantifier {
            Quantifier::MatchAnyAtLeast(min) => match_count >= min,
            Quantifier::MatchAll => match_count == queries.len(),
        };
        MatchDecision { match_count,
                        matched_keys,
                        passed }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn q(key: &str, formula: &str) -> QueryFormula { QueryFormula::new(key, Some(formula.parse().unwrap())) }

    fn target(s: &str) -> FormulaMap { s.parse().unwrap() }

    #[test]
    fn match_any_at_least_two_with_subset_relation() {
        let policy = FormulaMatchPolicy::new(MatchParams::new(RelationMode::LessOrEqual, Quantifier::MatchAnyAtLeast(2)));
        let queries = vec![q("q1", "C2H6"), q("q2", "NaCl"), q("q3", "CH4")];
        // CH4 ⊆ C2H6 y CH4 == CH4: dos de tres.
        let d = policy.evaluate(&target("CH4"), &queries);
        assert_eq!(d.match_count, 2);
        assert!(d.passed);
        assert_eq!(d.matched_keys_joined(), "q1, q3");

        // C2H6: igual a q1, superconjunto de q3 (no deseado): uno de tres.
        let d = policy.evaluate(&target("C2H6"), &queries);
        assert_eq!(d.match_count, 1);
        assert!(!d.passed);
        assert_eq!(d.matched_keys, vec!["q1".to_string()]);
    }

    #[test]
    fn relation_modes_select_desired_relations() {
        let queries = vec![q("small", "CH4"), q("same", "C2H6"), q("big", "C3H8")];
        let t = target("C2H6");
        let count = |mode| {
            FormulaMatchPolicy::new(MatchParams::new(mode, Quantifier::MatchAnyAtLeast(0))).evaluate(&t, &queries)
                                                                                            .matched_keys
        };
        assert_eq!(count(RelationMode::Equal), vec!["same"]);
        assert_eq!(count(RelationMode::LessOrEqual), vec!["same", "big"]);
        assert_eq!(count(RelationMode::GreaterOrEqual), vec!["small", "same"]);
    }

    #[test]
    fn match_all_counts_invalid_queries_in_total() {
        let policy = FormulaMatchPolicy::new(MatchParams::new(RelationMode::Equal, Quantifier::MatchAll));
        let all_valid = vec![q("a", "H2O"), q("b", "OH2")];
        assert!(policy.evaluate(&target("H2O"), &all_valid).passed);

        let with_invalid = vec![q("a", "H2O"), QueryFormula::new("broken", None)];
        let d = policy.evaluate(&target("H2O"), &with_invalid);
        assert_eq!(d.match_count, 1);
        assert!(!d.passed);
    }

    #[test]
    fn empty_query_table() {
        let any = FormulaMatchPolicy::new(MatchParams::default());
        assert!(!any.evaluate(&target("H2O"), &[]).passed);
        let all = FormulaMatchPolicy::new(MatchParams::new(RelationMode::Equal, Quantifier::MatchAll));
        assert!(all.evaluate(&target("H2O"), &[]).passed);
        let zero = FormulaMatchPolicy::new(MatchParams::new(RelationMode::Equal, Quantifier::MatchAnyAtLeast(0)));
        assert!(zero.evaluate(&target("H2O"), &[]).passed);
    }

    #[test]
    fn relation_mode_from_str() {
        assert_eq!("eq".parse::<RelationMode>().unwrap(), RelationMode::Equal);
        assert_eq!("LE".parse::<RelationMode>().unwrap(), RelationMode::LessOrEqual);
        assert_eq!("ge".parse::<RelationMode>().unwrap(), RelationMode::GreaterOrEqual);
        assert!(matches!("lt".parse::<RelationMode>(), Err(PolicyError::UnknownRelationMode(_))));
    }

    #[test]
    fn validate_flags_unreachable_threshold() {
        let p = MatchParams::new(RelationMode::Equal, Quantifier::MatchAnyAtLeast(3));
        assert_eq!(p.validate(2), Err(PolicyError::Unsatisfiable { min: 3, available: 2 }));
        assert!(p.validate(3).is_ok());
        assert!(MatchParams::new(RelationMode::Equal, Quantifier::MatchAll).validate(0).is_ok());
    }

    #[test]
    fn params_serialize_tagged() {
        let p = MatchParams::new(RelationMode::LessOrEqual, Quantifier::MatchAnyAtLeast(2));
        let v = serde_json::to_value(p).unwrap();
        assert_eq!(v, json!({"relation": "less_or_equal", "quantifier": {"quantifier": "MatchAnyAtLeast", "min": 2}}));
        let back: MatchParams = serde_json::from_value(v).unwrap();
        assert_eq!(back, p);
        let all = serde_json::to_value(Quantifier::MatchAll).unwrap();
        assert_eq!(all, json!({"quantifier": "MatchAll"}));
    }
}
