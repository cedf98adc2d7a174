//! Filtro por fórmula bruta
//!
//! - Parsea la tabla de consultas una sola vez.
//! - Por cada objetivo, con la sesión bloqueada: fija las opciones de carga,
//!   carga la molécula, lee su fórmula bruta, restaura las opciones y libera
//!   el handle.
//! - Objetivos sin celda, que no cargan o cuya fórmula no se puede parsear
//!   van al canal `invalid` con un motivo; el lote continúa.
//! - La coincidencia (pura, sin motor) corre en paralelo con `rayon` y
//!   conserva el orden de entrada.

use chem_core::{CoreError, NativeEngine, OptionValue, Session};
use chem_domain::FormulaMap;
use chem_policies::{FormulaMatchPolicy, MatchDecision, MatchParams, MatchPolicy, QueryFormula};
use chemengine::{options, EngineConfig};
use log::debug;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::report::BatchReport;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TargetRow {
    pub key: String,
    /// `None` = celda ausente.
    pub structure: Option<String>,
}

impl TargetRow {
    pub fn new(key: impl Into<String>, structure: Option<&str>) -> Self {
        Self { key: key.into(),
               structure: structure.map(str::to_string) }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct QueryRow {
    pub key: String,
    pub formula: Option<String>,
}

impl QueryRow {
    pub fn new(key: impl Into<String>, formula: Option<&str>) -> Self {
        Self { key: key.into(),
               formula: formula.map(str::to_string) }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct FilterSettings {
    pub params: MatchParams,
    pub ignore_stereochemistry_errors: bool,
    pub treat_x_as_pseudoatom: bool,
    /// Agrega la columna con las claves de las consultas que coincidieron.
    pub append_query_keys: bool,
    /// Agrega la columna con el número de coincidencias.
    pub append_match_count: bool,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self { params: MatchParams::default(),
               ignore_stereochemistry_errors: false,
               treat_x_as_pseudoatom: false,
               append_query_keys: false,
               append_match_count: false }
    }
}

impl FilterSettings {
    /// Opciones de carga tomadas de la configuración del motor.
    pub fn from_config(config: &EngineConfig, params: MatchParams) -> Self {
        Self { params,
               ignore_stereochemistry_errors: config.ignore_stereochemistry_errors,
               treat_x_as_pseudoatom: config.treat_x_as_pseudoatom,
               ..Self::default() }
    }

    fn loader_options(&self) -> [(&'static str, OptionValue); 2] {
        [(options::IGNORE_STEREOCHEMISTRY_ERRORS, OptionValue::Bool(self.ignore_stereochemistry_errors)),
         (options::TREAT_X_AS_PSEUDOATOM, OptionValue::Bool(self.treat_x_as_pseudoatom))]
    }
}

/// Fila de salida (matched / unmatched).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct FilteredRow {
    pub key: String,
    pub structure: String,
    pub gross_formula: FormulaMap,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_query_keys: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_count: Option<usize>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct InvalidRow {
    pub key: String,
    pub structure: Option<String>,
    pub reason: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct FilterOutcome {
    pub matched: Vec<FilteredRow>,
    pub unmatched: Vec<FilteredRow>,
    pub invalid: Vec<InvalidRow>,
    pub report: BatchReport,
}

pub struct FormulaFilter<E: NativeEngine> {
    session: Session<E>,
    settings: FilterSettings,
    policy: FormulaMatchPolicy,
}

impl<E: NativeEngine> FormulaFilter<E> {
    pub fn new(session: Session<E>, settings: FilterSettings) -> Self {
        let policy = FormulaMatchPolicy::new(settings.params);
        Self { session,
               settings,
               policy }
    }

    pub fn settings(&self) -> &FilterSettings { &self.settings }

    /// Parsea la tabla de consultas. Las celdas ausentes o mal formadas quedan
    /// como `formula: None` y se reporta una sola advertencia por tabla.
    pub fn parse_queries(rows: &[QueryRow], report: &mut BatchReport) -> Vec<QueryFormula> {
        if rows.is_empty() {
            report.warn("query table is empty");
            return Vec::new();
        }
        let mut bad = Vec::new();
        let queries: Vec<QueryFormula> =
            rows.iter()
                .map(|row| {
                    let formula = row.formula.as_deref().and_then(|raw| match FormulaMap::parse(raw) {
                                                            Ok(f) => Some(f),
                                                            Err(e) => {
                                                                debug!("query {} skipped: {}", row.key, e);
                                                                None
                                                            }
                                                        });
                    if formula.is_none() {
                        bad.push(row.key.as_str());
                    }
                    QueryFormula::new(row.key.clone(), formula)
                })
                .collect();
        if !bad.is_empty() {
            report.warn(format!("query table contains {} missing or invalid cells: {}", bad.len(), bad.join(", ")));
        }
        queries
    }

    /// Carga la estructura con las opciones de carga activas y devuelve su
    /// fórmula bruta. Las opciones se restauran y el handle se libera siempre.
    fn load_gross_formula(&self, structure: &str) -> Result<String, CoreError> {
        self.session.with_options(&self.settings.loader_options(), |s| {
                        let mut molecule = s.load_molecule(structure)?;
                        let formula = molecule.gross_formula();
                        molecule.dispose();
                        formula
                    })
    }

    pub fn run(&self, targets: &[TargetRow], query_rows: &[QueryRow]) -> FilterOutcome {
        let mut report = BatchReport::start("formula_filter");
        let queries = Self::parse_queries(query_rows, &mut report);
        if let Err(e) = self.settings.params.validate(queries.len()) {
            report.warn(e.to_string());
        }

        let mut loaded: Vec<(&TargetRow, &str, FormulaMap)> = Vec::with_capacity(targets.len());
        let mut invalid = Vec::new();
        let mut missing_reported = false;
        for row in targets {
            report.processed += 1;
            let Some(structure) = row.structure.as_deref() else {
                if !missing_reported {
                    report.warn("target table contains missing cells");
                    missing_reported = true;
                }
                invalid.push(InvalidRow { key: row.key.clone(),
                                          structure: None,
                                          reason: "missing cell".into() });
                continue;
            };
            let parsed = self.load_gross_formula(structure)
                             .map_err(|e| format!("could not load target structure: {e}"))
                             .and_then(|raw| FormulaMap::parse(&raw).map_err(|e| e.to_string()));
            match parsed {
                Ok(formula) => loaded.push((row, structure, formula)),
                Err(reason) => {
                    report.warn(format!("target '{}' is invalid: {}", row.key, reason));
                    invalid.push(InvalidRow { key: row.key.clone(),
                                              structure: Some(structure.to_string()),
                                              reason });
                }
            }
        }

        let policy = &self.policy;
        let decisions: Vec<MatchDecision> = loaded.par_iter()
                                                  .map(|(_, _, formula)| policy.evaluate(formula, &queries))
                                                  .collect();

        let mut matched = Vec::new();
        let mut unmatched = Vec::new();
        for ((row, structure, formula), decision) in loaded.into_iter().zip(decisions) {
            let out = FilteredRow { key: row.key.clone(),
                                    structure: structure.to_string(),
                                    gross_formula: formula,
                                    matched_query_keys: self.settings
                                                            .append_query_keys
                                                            .then(|| decision.matched_keys_joined()),
                                    match_count: self.settings.append_match_count.then_some(decision.match_count) };
            if decision.passed {
                matched.push(out);
            } else {
                unmatched.push(out);
            }
        }

        report.succeeded = matched.len();
        report.rejected = unmatched.len();
        report.invalid = invalid.len();
        report.finish();
        debug!("formula filter {}: {} matched, {} unmatched, {} invalid",
               report.run_id,
               report.succeeded,
               report.rejected,
               report.invalid);
        FilterOutcome { matched,
                        unmatched,
                        invalid,
                        report }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chem_policies::{Quantifier, RelationMode};
    use chemengine::MockEngine;
    use std::sync::Arc;

    fn session() -> Session<MockEngine> {
        let engine = MockEngine::new().with_formula("CCO", "C2 H6 O")
                                      .with_formula("C", "C H4")
                                      .with_formula("[Na+].[Cl-]", "Cl Na")
                                      .with_formula("weird", "c2h6");
        Session::open(Arc::new(engine)).unwrap()
    }

    #[test]
    fn parse_queries_warns_once_for_bad_cells() {
        let mut report = BatchReport::start("formula_filter");
        let rows = vec![QueryRow::new("q1", Some("C2H6O")),
                        QueryRow::new("q2", None),
                        QueryRow::new("q3", Some("2X"))];
        let queries = FormulaFilter::<MockEngine>::parse_queries(&rows, &mut report);
        assert_eq!(queries.len(), 3);
        assert!(queries[0].is_valid());
        assert!(!queries[1].is_valid());
        assert!(!queries[2].is_valid());
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].contains("q2, q3"));
    }

    #[test]
    fn parse_queries_warns_on_empty_table() {
        let mut report = BatchReport::start("formula_filter");
        assert!(FormulaFilter::<MockEngine>::parse_queries(&[], &mut report).is_empty());
        assert_eq!(report.warnings, vec!["query table is empty".to_string()]);
    }

    #[test]
    fn invalid_targets_are_diverted() {
        let s = session();
        let filter = FormulaFilter::new(s.clone(), FilterSettings::default());
        let targets = vec![TargetRow::new("t1", Some("CCO")),
                           TargetRow::new("t2", None),
                           TargetRow::new("t3", Some("not-a-molecule")),
                           TargetRow::new("t4", Some("weird")),
                           TargetRow::new("t5", None)];
        let out = filter.run(&targets, &[QueryRow::new("q1", Some("C2H6O"))]);
        assert_eq!(out.matched.len(), 1);
        let invalid: Vec<&str> = out.invalid.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(invalid, vec!["t2", "t3", "t4", "t5"]);
        // una sola advertencia por celdas ausentes
        assert_eq!(out.report.warnings.iter().filter(|w| w.contains("missing cells")).count(), 1);
        assert_eq!(out.report.processed, 5);
        assert_eq!(s.count_references().unwrap(), 0);
    }

    #[test]
    fn optional_columns_follow_settings() {
        let settings = FilterSettings { params: MatchParams::new(RelationMode::LessOrEqual, Quantifier::MatchAnyAtLeast(1)),
                                        append_query_keys: true,
                                        append_match_count: true,
                                        ..FilterSettings::default() };
        let filter = FormulaFilter::new(session(), settings);
        let out = filter.run(&[TargetRow::new("methane", Some("C"))],
                             &[QueryRow::new("ethane", Some("C2H6")), QueryRow::new("methane", Some("CH4"))]);
        let row = &out.matched[0];
        assert_eq!(row.matched_query_keys.as_deref(), Some("ethane, methane"));
        assert_eq!(row.match_count, Some(2));
        assert_eq!(row.gross_formula.to_string(), "CH4");

        let plain = FormulaFilter::new(session(), FilterSettings::default());
        let out = plain.run(&[TargetRow::new("methane", Some("C"))], &[QueryRow::new("x", Some("CH4"))]);
        assert_eq!(out.matched[0].matched_query_keys, None);
        assert_eq!(out.matched[0].match_count, None);
    }

    #[test]
    fn unreachable_threshold_is_reported() {
        let settings = FilterSettings { params: MatchParams::new(RelationMode::Equal, Quantifier::MatchAnyAtLeast(2)),
                                        ..FilterSettings::default() };
        let out = FormulaFilter::new(session(), settings).run(&[TargetRow::new("t", Some("C"))],
                                                              &[QueryRow::new("q", Some("CH4"))]);
        assert_eq!(out.unmatched.len(), 1);
        assert!(out.report.warnings.iter().any(|w| w.contains("al menos 2")));
    }
}
