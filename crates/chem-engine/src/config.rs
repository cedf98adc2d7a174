//! Configuración del motor desde variables de entorno.
//! Usa `.env` (si existe) y valores por defecto razonables.

use dotenvy::dotenv;
use once_cell::sync::Lazy;
use std::env;

// Carga perezosa del archivo .env una sola vez.
static DOTENV_LOADED: Lazy<()> = Lazy::new(|| {
    let _ = dotenv(); // ignora error si no existe .env
});

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Intérprete de Python para el backend RDKit (opcional).
    pub python_path: Option<String>,
    pub ignore_stereochemistry_errors: bool,
    pub treat_x_as_pseudoatom: bool,
    pub rpe_max_products: i64,
    pub rpe_max_depth: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { python_path: None,
               ignore_stereochemistry_errors: false,
               treat_x_as_pseudoatom: false,
               rpe_max_products: 1000,
               rpe_max_depth: 2 }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        // asegura que .env se haya cargado
        Lazy::force(&DOTENV_LOADED);
        let defaults = Self::default();
        let python_path = env::var("CHEM_PYTHON_PATH").ok().filter(|v| !v.trim().is_empty());
        let ignore_stereochemistry_errors =
            env::var("CHEM_IGNORE_STEREOCHEMISTRY_ERRORS").ok()
                                                          .and_then(|v| parse_bool(&v))
                                                          .unwrap_or(defaults.ignore_stereochemistry_errors);
        let treat_x_as_pseudoatom = env::var("CHEM_TREAT_X_AS_PSEUDOATOM").ok()
                                                                          .and_then(|v| parse_bool(&v))
                                                                          .unwrap_or(defaults.treat_x_as_pseudoatom);
        let rpe_max_products = env::var("CHEM_RPE_MAX_PRODUCTS").ok()
                                                                .and_then(|v| v.parse().ok())
                                                                .unwrap_or(defaults.rpe_max_products);
        let rpe_max_depth = env::var("CHEM_RPE_MAX_DEPTH").ok()
                                                          .and_then(|v| v.parse().ok())
                                                          .unwrap_or(defaults.rpe_max_depth);
        Self { python_path,
               ignore_stereochemistry_errors,
               treat_x_as_pseudoatom,
               rpe_max_products,
               rpe_max_depth }
    }
}

/// Acepta `1/0`, `true/false`, `yes/no`, `on/off` (sin distinguir mayúsculas).
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_bool_variants() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool(" off "), Some(false));
        assert_eq!(parse_bool("1"), Some(true));
        assert_eq!(parse_bool("quizá"), None);
    }

    #[test]
    fn defaults_are_conservative() {
        let c = EngineConfig::default();
        assert!(!c.ignore_stereochemistry_errors);
        assert!(!c.treat_x_as_pseudoatom);
        assert_eq!(c.rpe_max_products, 1000);
        assert_eq!(c.rpe_max_depth, 2);
        assert!(c.python_path.is_none());
    }
}
