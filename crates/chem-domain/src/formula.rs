// formula.rs
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::DomainError;

/// Relación de una fórmula objetivo respecto a una fórmula de consulta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FormulaRelation {
    Equal,
    /// Cada cuenta del objetivo es <= la de la consulta.
    TargetIsSubset,
    /// Cada cuenta del objetivo es >= la de la consulta.
    TargetIsSuperset,
    Incomparable,
}

impl fmt::Display for FormulaRelation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FormulaRelation::Equal => "equal",
            FormulaRelation::TargetIsSubset => "target-is-subset",
            FormulaRelation::TargetIsSuperset => "target-is-superset",
            FormulaRelation::Incomparable => "incomparable",
        };
        f.write_str(s)
    }
}

/// Composición elemental parseada de una fórmula bruta ("C6H12O6").
///
/// Símbolo (sensible a mayúsculas) -> cuenta. Conserva el orden de aparición;
/// la igualdad no depende del orden. Inmutable una vez construida.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormulaMap {
    elements: IndexMap<String, u32>,
}

impl FormulaMap {
    /// Parsea una fórmula bruta.
    ///
    /// Se ignoran los espacios ("C6 H12 O6" == "C6H12O6"). Cada elemento es
    /// una mayúscula, minúsculas opcionales y una cuenta opcional (por defecto
    /// 1). Si un símbolo se repite, gana la última aparición (no se suman).
    ///
    /// # Errores
    /// `DomainError::MalformedFormula` si el texto no se puede partir en pares
    /// símbolo/cuenta.
    pub fn parse(input: &str) -> Result<Self, DomainError> {
        let malformed = |reason: String| DomainError::MalformedFormula { input: input.to_string(),
                                                                          reason };
        let compact: String = input.chars().filter(|c| !c.is_whitespace()).collect();
        let mut elements = IndexMap::new();
        let mut chars = compact.chars().enumerate().peekable();

        while let Some((pos, c)) = chars.next() {
            if !c.is_ascii_uppercase() {
                return Err(malformed(format!("se esperaba un símbolo de elemento en la posición {pos}, hay '{c}'")));
            }
            let mut symbol = String::from(c);
            while let Some((_, n)) = chars.next_if(|(_, n)| n.is_ascii_lowercase()) {
                symbol.push(n);
            }
            let mut digits = String::new();
            while let Some((_, d)) = chars.next_if(|(_, d)| d.is_ascii_digit()) {
                digits.push(d);
            }
            let count = if digits.is_empty() {
                1
            } else {
                digits.parse::<u32>()
                      .map_err(|_| malformed(format!("cuenta fuera de rango para {symbol}: {digits}")))?
            };
            // Última aparición gana.
            elements.insert(symbol, count);
        }
        Ok(Self { elements })
    }

    pub fn get(&self, symbol: &str) -> Option<u32> { self.elements.get(symbol).copied() }

    pub fn contains(&self, symbol: &str) -> bool { self.elements.contains_key(symbol) }

    pub fn len(&self) -> usize { self.elements.len() }

    pub fn is_empty(&self) -> bool { self.elements.is_empty() }

    /// Pares (símbolo, cuenta) en orden de aparición.
    pub fn elements(&self) -> impl Iterator<Item = (&str, u32)> + '_ {
        self.elements.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Todas las cuentas de `self` son <= las de `other` (en las claves de `self`).
    fn counts_le(&self, other: &FormulaMap) -> bool {
        self.elements
            .iter()
            .all(|(symbol, count)| other.get(symbol).is_some_and(|o| *count <= o))
    }

    fn counts_ge(&self, other: &FormulaMap) -> bool {
        self.elements
            .iter()
            .all(|(symbol, count)| other.get(symbol).is_some_and(|o| *count >= o))
    }

    fn keys_cover(&self, other: &FormulaMap) -> bool { other.elements.keys().all(|k| self.contains(k)) }

    /// Compara `self` (objetivo) con `query`.
    ///
    /// - Mismas claves: `Equal`, o `TargetIsSubset` si todo <=, o
    ///   `TargetIsSuperset` si todo >=, si no `Incomparable`.
    /// - Claves del objetivo estrictamente más amplias: `TargetIsSuperset` si
    ///   cada cuenta de la consulta es <= la del objetivo.
    /// - Claves de la consulta estrictamente más amplias: `TargetIsSubset` si
    ///   cada cuenta del objetivo es <= la de la consulta.
    /// - Claves no relacionadas: `Incomparable`.
    pub fn compare(&self, query: &FormulaMap) -> FormulaRelation {
        let target_contains_query = self.keys_cover(query);
        let query_contains_target = query.keys_cover(self);

        match (target_contains_query, query_contains_target) {
            (true, true) => {
                if self == query {
                    FormulaRelation::Equal
                } else if self.counts_le(query) {
                    FormulaRelation::TargetIsSubset
                } else if self.counts_ge(query) {
                    FormulaRelation::TargetIsSuperset
                } else {
                    FormulaRelation::Incomparable
                }
            }
            (true, false) if query.counts_le(self) => FormulaRelation::TargetIsSuperset,
            (false, true) if self.counts_le(query) => FormulaRelation::TargetIsSubset,
            _ => FormulaRelation::Incomparable,
        }
    }
}

impl FromStr for FormulaMap {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> { FormulaMap::parse(s) }
}

/// Notación de Hill: C, luego H, luego el resto en orden alfabético. Sin
/// carbono, todo alfabético. La cuenta 1 se omite.
impl fmt::Display for FormulaMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut sorted: Vec<&str> = self.elements.keys().map(String::as_str).collect();
        sorted.sort_unstable();
        let ordered: Vec<&str> = if self.contains("C") {
            let head = ["C", "H"].into_iter().filter(|s| self.contains(s));
            head.chain(sorted.into_iter().filter(|s| *s != "C" && *s != "H")).collect()
        } else {
            sorted
        };
        for symbol in ordered {
            let count = self.elements[symbol];
            if count == 1 {
                write!(f, "{symbol}")?;
            } else {
                write!(f, "{symbol}{count}")?;
            }
        }
        Ok(())
    }
}
