//! Resumen auditable de una corrida por lotes.

use chrono::{DateTime, Utc};
use log::warn;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct BatchReport {
    pub run_id: Uuid,
    /// "formula_filter" | "reaction_enumeration"
    pub workflow: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Elementos de entrada considerados.
    pub processed: usize,
    /// Filtro: objetivos que pasaron. Enumeración: productos emitidos.
    pub succeeded: usize,
    /// Filtro: objetivos que no pasaron.
    pub rejected: usize,
    pub invalid: usize,
    pub warnings: Vec<String>,
}

impl BatchReport {
    pub fn start(workflow: &str) -> Self {
        Self { run_id: Uuid::new_v4(),
               workflow: workflow.to_string(),
               started_at: Utc::now(),
               finished_at: None,
               processed: 0,
               succeeded: 0,
               rejected: 0,
               invalid: 0,
               warnings: Vec::new() }
    }

    /// Registra la advertencia en el log y en el reporte.
    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!("[{} {}] {}", self.workflow, self.run_id, message);
        self.warnings.push(message);
    }

    pub fn finish(&mut self) { self.finished_at = Some(Utc::now()); }

    pub fn is_finished(&self) -> bool { self.finished_at.is_some() }

    pub fn duration_ms(&self) -> Option<i64> { self.finished_at.map(|end| (end - self.started_at).num_milliseconds()) }
}
