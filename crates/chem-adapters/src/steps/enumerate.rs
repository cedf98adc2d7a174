//! Enumeración de productos de reacción
//!
//! Carga la reacción y una lista de monómeros por reactivo, fija las opciones
//! `rpe-*` y recorre los productos con el protocolo de iteración del core.
//! Un monómero que no carga o un producto que no se puede leer se desvían a
//! `invalid`; la corrida sigue. Todos los handles creados se liberan antes
//! de devolver.

use chem_core::{ChemObject, CoreError, NativeEngine, OptionValue, Session};
use chemengine::{options, EngineConfig};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::AdapterError;
use crate::report::BatchReport;

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum EnumerationMode {
    /// Todos los monómeros en un mismo recipiente.
    #[default]
    OneTube,
    /// Una combinación por celda.
    Grid,
}

impl EnumerationMode {
    pub fn as_option(self) -> &'static str {
        match self {
            EnumerationMode::OneTube => "one-tube",
            EnumerationMode::Grid => "grid",
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct EnumerationSettings {
    /// Profundidad máxima; sólo aplica con `multistep`.
    pub max_depth: i64,
    pub max_products: i64,
    pub multistep: bool,
    pub self_reaction: bool,
    pub mode: EnumerationMode,
}

impl Default for EnumerationSettings {
    fn default() -> Self { Self::from_config(&EngineConfig::default()) }
}

impl EnumerationSettings {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self { max_depth: config.rpe_max_depth,
               max_products: config.rpe_max_products,
               multistep: false,
               self_reaction: false,
               mode: EnumerationMode::OneTube }
    }

    fn engine_options(&self) -> Vec<(&'static str, OptionValue)> {
        vec![(options::RPE_MAX_DEPTH, OptionValue::Int(self.max_depth)),
             (options::RPE_MAX_PRODUCTS_COUNT, OptionValue::Int(self.max_products)),
             (options::RPE_MULTISTEP_REACTIONS, OptionValue::Bool(self.multistep)),
             (options::RPE_MODE, OptionValue::from(self.mode.as_option())),
             (options::RPE_SELF_REACTION, OptionValue::Bool(self.self_reaction))]
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Product {
    /// Posición del producto en la secuencia del motor.
    pub index: usize,
    pub smiles: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct InvalidItem {
    /// "monomer[r][i]" o "product[i]"
    pub location: String,
    pub input: Option<String>,
    pub reason: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct EnumerationOutcome {
    pub products: Vec<Product>,
    pub invalid: Vec<InvalidItem>,
    pub report: BatchReport,
}

pub struct ReactionEnumerator<E: NativeEngine> {
    session: Session<E>,
    settings: EnumerationSettings,
}

impl<E: NativeEngine> ReactionEnumerator<E> {
    pub fn new(session: Session<E>, settings: EnumerationSettings) -> Self { Self { session, settings } }

    pub fn settings(&self) -> &EnumerationSettings { &self.settings }

    /// Tabla de monómeros: un arreglo por reactivo con las moléculas que
    /// cargaron.
    fn build_table(session: &Session<E>,
                   monomers: &[Vec<String>],
                   invalid: &mut Vec<InvalidItem>,
                   report: &mut BatchReport)
                   -> Result<ChemObject<E>, CoreError> {
        let table = session.create_array()?;
        for (r, list) in monomers.iter().enumerate() {
            let reactant = session.create_array()?;
            for (i, data) in list.iter().enumerate() {
                report.processed += 1;
                match session.load_molecule(data) {
                    Ok(molecule) => reactant.array_add(&molecule)?,
                    Err(e) => {
                        report.warn(format!("monomer {data} for reactant {r} could not be loaded: {e}"));
                        invalid.push(InvalidItem { location: format!("monomer[{r}][{i}]"),
                                                   input: Some(data.clone()),
                                                   reason: e.to_string() });
                    }
                }
            }
            table.array_add(&reactant)?;
        }
        Ok(table)
    }

    /// Enumera los productos de `reaction` sobre `monomers` (una lista por
    /// reactivo). Sin productos no es un error: el resultado queda vacío.
    ///
    /// # Errores
    /// - `AdapterError::ReactantMismatch` si el número de listas no coincide
    ///   con los reactivos de la reacción.
    /// - `AdapterError::Core` si la reacción no carga o el motor falla al
    ///   avanzar el cursor de productos.
    pub fn run(&self, reaction: &str, monomers: &[Vec<String>]) -> Result<EnumerationOutcome, AdapterError> {
        let mut report = BatchReport::start("reaction_enumeration");
        let mut products = Vec::new();
        let mut invalid = Vec::new();

        let options = self.settings.engine_options();
        let result = self.session.with_options(&options, |s| {
                                     let rxn = s.load_reaction(reaction)?;
                                     let expected = rxn.count()?;
                                     if expected != monomers.len() {
                                         return Ok(Err(AdapterError::ReactantMismatch { expected,
                                                                                        given: monomers.len() }));
                                     }
                                     let table = Self::build_table(s, monomers, &mut invalid, &mut report)?;
                                     let Some(out) = s.reaction_product_enumerate(&rxn, &table)? else {
                                         debug!("no products for {reaction}");
                                         return Ok(Ok(()));
                                     };
                                     let Some(mut cursor) = out.iter()? else {
                                         return Ok(Ok(()));
                                     };
                                     // Un fallo al avanzar corta el lote; sólo la lectura del
                                     // producto se desvía a `invalid`.
                                     let mut index = 0;
                                     while let Some(p) = cursor.next_object()? {
                                         match p.smiles() {
                                             Ok(smiles) => products.push(Product { index, smiles }),
                                             Err(e) => {
                                                 report.warn(format!("product {index} could not be read: {e}"));
                                                 invalid.push(InvalidItem { location: format!("product[{index}]"),
                                                                            input: None,
                                                                            reason: e.to_string() });
                                             }
                                         }
                                         index += 1;
                                     }
                                     Ok(Ok(()))
                                 });
        result??;

        report.succeeded = products.len();
        report.invalid = invalid.len();
        report.processed += products.len() + invalid.iter().filter(|i| i.location.starts_with("product")).count();
        report.finish();
        Ok(EnumerationOutcome { products,
                                invalid,
                                report })
    }
}
