//! Motor en memoria, determinista, para tests, demo y la CLI.
//!
//! No hace química: las fórmulas brutas salen de un registro
//! (`with_formula`) y la enumeración de productos es el producto cartesiano de
//! los monómeros. Lo que sí reproduce fielmente es el modelo de handles:
//! sesiones, tabla de objetos por sesión, centinela, cursores y conteo de
//! referencias.

use dashmap::{DashMap, DashSet};
use log::{debug, warn};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI32, AtomicU64, AtomicUsize, Ordering};

use crate::{options, EngineError, Handle, NativeEngine, OptionValue, SessionId};

#[derive(Debug, Clone)]
enum MockObject {
    Molecule { structure: String, formula: Option<String> },
    Reaction { text: String, reactants: usize },
    Array(Vec<MockObject>),
    Cursor { items: Vec<MockObject>, pos: usize },
}

impl MockObject {
    fn kind(&self) -> &'static str {
        match self {
            MockObject::Molecule { .. } => "molecule",
            MockObject::Reaction { .. } => "reaction",
            MockObject::Array(_) => "array",
            MockObject::Cursor { .. } => "iterator",
        }
    }
}

#[derive(Debug, Default)]
struct SessionState {
    objects: HashMap<i32, MockObject>,
    options: HashMap<String, OptionValue>,
}

const KNOWN_OPTIONS: &[&str] = &[options::IGNORE_STEREOCHEMISTRY_ERRORS,
                                 options::TREAT_X_AS_PSEUDOATOM,
                                 options::RPE_MAX_DEPTH,
                                 options::RPE_MAX_PRODUCTS_COUNT,
                                 options::RPE_MULTISTEP_REACTIONS,
                                 options::RPE_SELF_REACTION,
                                 options::RPE_MODE];

#[derive(Debug)]
pub struct MockEngine {
    sessions: DashMap<u64, SessionState>,
    next_sid: AtomicU64,
    next_handle: AtomicI32,
    formulas: DashMap<String, String>,
    smiles_failures: DashSet<String>,
    next_budget: AtomicUsize,
}

impl Default for MockEngine {
    fn default() -> Self { Self::new() }
}

impl MockEngine {
    pub fn new() -> Self {
        Self { sessions: DashMap::new(),
               next_sid: AtomicU64::new(1),
               next_handle: AtomicI32::new(1),
               formulas: DashMap::new(),
               smiles_failures: DashSet::new(),
               next_budget: AtomicUsize::new(usize::MAX) }
    }

    /// Registra la fórmula bruta que devolverá `gross_formula` para `structure`.
    /// Sólo las estructuras registradas se pueden cargar como molécula.
    pub fn with_formula(self, structure: &str, formula: &str) -> Self {
        self.formulas.insert(structure.to_string(), formula.to_string());
        self
    }

    /// `smiles()` falla para cualquier objeto cuya estructura contenga `pattern`.
    pub fn with_smiles_failure(self, pattern: &str) -> Self {
        self.smiles_failures.insert(pattern.to_string());
        self
    }

    /// Tras `n` avances exitosos, el siguiente `next()` devuelve error.
    pub fn with_next_failure_after(self, n: usize) -> Self {
        self.next_budget.store(n, Ordering::SeqCst);
        self
    }

    /// Sesiones aún reservadas.
    pub fn open_sessions(&self) -> usize { self.sessions.len() }

    fn alloc_handle(&self) -> Handle { Handle::new(self.next_handle.fetch_add(1, Ordering::SeqCst)) }

    fn unknown_session(sid: SessionId) -> EngineError { EngineError::Failure(format!("sesión desconocida: {sid}")) }

    fn with_session<T>(&self,
                       sid: SessionId,
                       f: impl FnOnce(&mut SessionState) -> Result<T, EngineError>)
                       -> Result<T, EngineError> {
        let mut state = self.sessions.get_mut(&sid.0).ok_or_else(|| Self::unknown_session(sid))?;
        f(&mut state)
    }

    fn insert(&self, sid: SessionId, obj: MockObject) -> Result<Handle, EngineError> {
        let handle = self.alloc_handle();
        self.with_session(sid, |s| {
                s.objects.insert(handle.raw(), obj);
                Ok(handle)
            })
    }

    fn get(&self, sid: SessionId, handle: Handle) -> Result<MockObject, EngineError> {
        self.with_session(sid, |s| s.objects.get(&handle.raw()).cloned().ok_or(EngineError::InvalidHandle(handle)))
    }

    fn smiles_of(&self, obj: &MockObject) -> Result<String, EngineError> {
        let text = match obj {
            MockObject::Molecule { structure, .. } => structure.clone(),
            MockObject::Reaction { text, .. } => text.clone(),
            other => return Err(EngineError::Failure(format!("smiles no disponible para {}", other.kind()))),
        };
        if self.smiles_failures.iter().any(|p| text.contains(p.as_str())) {
            return Err(EngineError::Failure(format!("no se pudo generar SMILES para '{text}'")));
        }
        Ok(text)
    }
}

impl NativeEngine for MockEngine {
    fn version(&self) -> String { format!("mock-engine {}", env!("CARGO_PKG_VERSION")) }

    fn alloc_session(&self) -> Result<SessionId, EngineError> {
        let sid = self.next_sid.fetch_add(1, Ordering::SeqCst);
        self.sessions.insert(sid, SessionState::default());
        debug!("mock: sesión {sid} abierta");
        Ok(SessionId(sid))
    }

    fn release_session(&self, sid: SessionId) -> Result<(), EngineError> {
        let (_, state) = self.sessions.remove(&sid.0).ok_or_else(|| Self::unknown_session(sid))?;
        if !state.objects.is_empty() {
            warn!("mock: sesión {sid} liberada con {} handles vivos", state.objects.len());
        }
        debug!("mock: sesión {sid} liberada");
        Ok(())
    }

    fn free(&self, sid: SessionId, handle: Handle) -> Result<(), EngineError> {
        self.with_session(sid, |s| s.objects.remove(&handle.raw()).map(|_| ()).ok_or(EngineError::InvalidHandle(handle)))
    }

    fn clone_object(&self, sid: SessionId, handle: Handle) -> Result<Handle, EngineError> {
        let obj = self.get(sid, handle)?;
        if let MockObject::Cursor { .. } = obj {
            return Err(EngineError::CloneFailed { handle,
                                                  reason: "los iteradores no se pueden clonar".into() });
        }
        self.insert(sid, obj)
    }

    fn next(&self, sid: SessionId, cursor: Handle) -> Result<Handle, EngineError> {
        let item = self.with_session(sid, |s| match s.objects.get_mut(&cursor.raw()) {
                           Some(MockObject::Cursor { items, pos }) => {
                               if *pos >= items.len() {
                                   return Ok(None);
                               }
                               *pos += 1;
                               Ok(Some(items[*pos - 1].clone()))
                           }
                           Some(other) => Err(EngineError::Failure(format!("{} no es un iterador", other.kind()))),
                           None => Err(EngineError::InvalidHandle(cursor)),
                       })?;
        let Some(item) = item else {
            return Ok(Handle::SENTINEL);
        };
        let spent = self.next_budget.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |budget| match budget {
                                                       0 => None,
                                                       usize::MAX => Some(budget),
                                                       n => Some(n - 1),
                                                   });
        if spent.is_err() {
            return Err(EngineError::Failure("fallo inyectado en next()".into()));
        }
        self.insert(sid, item)
    }

    fn has_next(&self, sid: SessionId, cursor: Handle) -> Result<bool, EngineError> {
        match self.get(sid, cursor)? {
            MockObject::Cursor { items, pos } => Ok(pos < items.len()),
            other => Err(EngineError::Failure(format!("{} no es un iterador", other.kind()))),
        }
    }

    fn count_references(&self, sid: SessionId) -> Result<usize, EngineError> {
        self.with_session(sid, |s| Ok(s.objects.len()))
    }

    fn set_option(&self, sid: SessionId, name: &str, value: &OptionValue) -> Result<(), EngineError> {
        if !KNOWN_OPTIONS.contains(&name) {
            return Err(EngineError::UnknownOption(name.to_string()));
        }
        self.with_session(sid, |s| {
                s.options.insert(name.to_string(), value.clone());
                Ok(())
            })
    }

    fn reset_options(&self, sid: SessionId) -> Result<(), EngineError> {
        self.with_session(sid, |s| {
                s.options.clear();
                Ok(())
            })
    }

    fn load_molecule(&self, sid: SessionId, data: &str) -> Result<Handle, EngineError> {
        let structure = data.trim();
        let formula = self.formulas
                          .get(structure)
                          .map(|f| f.value().clone())
                          .ok_or_else(|| EngineError::Failure(format!("no se pudo cargar la molécula '{structure}'")))?;
        self.insert(sid,
                    MockObject::Molecule { structure: structure.to_string(),
                                           formula: Some(formula) })
    }

    fn load_reaction(&self, sid: SessionId, data: &str) -> Result<Handle, EngineError> {
        let text = data.trim();
        let (left, _) = text.split_once(">>")
                            .ok_or_else(|| EngineError::Failure(format!("no es una reacción: '{text}'")))?;
        let reactants = left.split('.').filter(|c| !c.trim().is_empty()).count();
        self.insert(sid,
                    MockObject::Reaction { text: text.to_string(),
                                           reactants })
    }

    fn gross_formula(&self, sid: SessionId, handle: Handle) -> Result<String, EngineError> {
        match self.get(sid, handle)? {
            MockObject::Molecule { formula: Some(f), .. } => Ok(f),
            MockObject::Molecule { structure, formula: None } => {
                Err(EngineError::Failure(format!("fórmula no disponible para '{structure}'")))
            }
            other => Err(EngineError::Failure(format!("grossFormula no aplica a {}", other.kind()))),
        }
    }

    fn smiles(&self, sid: SessionId, handle: Handle) -> Result<String, EngineError> {
        let obj = self.get(sid, handle)?;
        self.smiles_of(&obj)
    }

    fn create_array(&self, sid: SessionId) -> Result<Handle, EngineError> { self.insert(sid, MockObject::Array(Vec::new())) }

    fn array_add(&self, sid: SessionId, array: Handle, item: Handle) -> Result<(), EngineError> {
        let obj = self.get(sid, item)?;
        self.with_session(sid, |s| match s.objects.get_mut(&array.raw()) {
                Some(MockObject::Array(items)) => {
                    items.push(obj);
                    Ok(())
                }
                Some(other) => Err(EngineError::Failure(format!("{} no es un arreglo", other.kind()))),
                None => Err(EngineError::InvalidHandle(array)),
            })
    }

    fn count(&self, sid: SessionId, handle: Handle) -> Result<usize, EngineError> {
        match self.get(sid, handle)? {
            MockObject::Array(items) => Ok(items.len()),
            MockObject::Reaction { reactants, .. } => Ok(reactants),
            other => Err(EngineError::Failure(format!("count no aplica a {}", other.kind()))),
        }
    }

    fn iterate_array(&self, sid: SessionId, array: Handle) -> Result<Handle, EngineError> {
        match self.get(sid, array)? {
            MockObject::Array(items) => self.insert(sid, MockObject::Cursor { items, pos: 0 }),
            other => Err(EngineError::Failure(format!("{} no es un arreglo", other.kind()))),
        }
    }

    fn reaction_product_enumerate(&self,
                                  sid: SessionId,
                                  reaction: Handle,
                                  monomers: Handle)
                                  -> Result<Handle, EngineError> {
        let reactants = match self.get(sid, reaction)? {
            MockObject::Reaction { reactants, .. } => reactants,
            other => return Err(EngineError::Failure(format!("{} no es una reacción", other.kind()))),
        };
        let table = match self.get(sid, monomers)? {
            MockObject::Array(lists) => lists,
            other => return Err(EngineError::Failure(format!("{} no es una tabla de monómeros", other.kind()))),
        };
        if table.len() != reactants {
            return Err(EngineError::Failure(format!("la reacción tiene {} reactivos pero se dieron {} listas de monómeros",
                                                    reactants,
                                                    table.len())));
        }
        let mut lists: Vec<Vec<String>> = Vec::with_capacity(table.len());
        for entry in &table {
            let MockObject::Array(items) = entry else {
                return Err(EngineError::Failure(format!("se esperaba un arreglo de monómeros, hay {}", entry.kind())));
            };
            let mut names = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    MockObject::Molecule { structure, .. } => names.push(structure.clone()),
                    other => {
                        return Err(EngineError::Failure(format!("monómero inválido: {}", other.kind())));
                    }
                }
            }
            lists.push(names);
        }
        let limit = self.with_session(sid, |s| {
                            Ok(match s.options.get(options::RPE_MAX_PRODUCTS_COUNT) {
                                Some(OptionValue::Int(n)) if *n >= 0 => *n as usize,
                                _ => usize::MAX,
                            })
                        })?;

        if lists.is_empty() || lists.iter().any(|l| l.is_empty()) {
            return Ok(Handle::SENTINEL);
        }
        let mut products = Vec::new();
        let mut idx = vec![0usize; lists.len()];
        'outer: while products.len() < limit {
            let tuple: Vec<&str> = idx.iter().zip(&lists).map(|(i, l)| l[*i].as_str()).collect();
            products.push(MockObject::Molecule { structure: tuple.join("."),
                                                 formula: None });
            // Avance tipo odómetro sobre la tabla de monómeros.
            for pos in (0..idx.len()).rev() {
                idx[pos] += 1;
                if idx[pos] < lists[pos].len() {
                    continue 'outer;
                }
                idx[pos] = 0;
            }
            break;
        }
        if products.is_empty() {
            return Ok(Handle::SENTINEL);
        }
        self.insert(sid, MockObject::Array(products))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> MockEngine { MockEngine::new().with_formula("CCO", "C2 H6 O").with_formula("C", "C H4") }

    #[test]
    fn handles_are_scoped_to_sessions() {
        let e = engine();
        let s1 = e.alloc_session().unwrap();
        let s2 = e.alloc_session().unwrap();
        let h = e.load_molecule(s1, "CCO").unwrap();
        assert_eq!(e.count_references(s1).unwrap(), 1);
        assert_eq!(e.count_references(s2).unwrap(), 0);
        assert_eq!(e.free(s2, h), Err(EngineError::InvalidHandle(h)));
        e.free(s1, h).unwrap();
        assert_eq!(e.free(s1, h), Err(EngineError::InvalidHandle(h)));
        e.release_session(s1).unwrap();
        e.release_session(s2).unwrap();
        assert_eq!(e.open_sessions(), 0);
    }

    #[test]
    fn unknown_structure_fails_to_load() {
        let e = engine();
        let sid = e.alloc_session().unwrap();
        assert!(matches!(e.load_molecule(sid, "XYZ"), Err(EngineError::Failure(_))));
        assert_eq!(e.count_references(sid).unwrap(), 0);
    }

    #[test]
    fn cursor_reports_sentinel_at_end() {
        let e = engine();
        let sid = e.alloc_session().unwrap();
        let arr = e.create_array(sid).unwrap();
        let m = e.load_molecule(sid, "C").unwrap();
        e.array_add(sid, arr, m).unwrap();
        let cur = e.iterate_array(sid, arr).unwrap();
        assert!(e.has_next(sid, cur).unwrap());
        assert!(e.has_next(sid, cur).unwrap());
        let first = e.next(sid, cur).unwrap();
        assert!(!first.is_sentinel());
        assert_eq!(e.gross_formula(sid, first).unwrap(), "C H4");
        assert!(!e.has_next(sid, cur).unwrap());
        assert!(e.next(sid, cur).unwrap().is_sentinel());
        assert!(matches!(e.clone_object(sid, cur), Err(EngineError::CloneFailed { .. })));
    }

    #[test]
    fn enumeration_is_cartesian_and_limited() {
        let e = engine();
        let sid = e.alloc_session().unwrap();
        let rxn = e.load_reaction(sid, "A.B>>AB").unwrap();
        let table = e.create_array(sid).unwrap();
        for list in [["CCO", "C"], ["C", "CCO"]] {
            let arr = e.create_array(sid).unwrap();
            for s in list {
                let m = e.load_molecule(sid, s).unwrap();
                e.array_add(sid, arr, m).unwrap();
            }
            e.array_add(sid, table, arr).unwrap();
        }
        let out = e.reaction_product_enumerate(sid, rxn, table).unwrap();
        assert_eq!(e.count(sid, out).unwrap(), 4);

        e.set_option(sid, options::RPE_MAX_PRODUCTS_COUNT, &OptionValue::Int(3)).unwrap();
        let limited = e.reaction_product_enumerate(sid, rxn, table).unwrap();
        assert_eq!(e.count(sid, limited).unwrap(), 3);
        assert!(matches!(e.set_option(sid, "no-such-option", &OptionValue::Bool(true)),
                         Err(EngineError::UnknownOption(_))));
    }

    #[test]
    fn next_failure_budget_is_shared_across_threads() {
        let e = MockEngine::new().with_formula("C", "C H4").with_next_failure_after(3);
        let e = &e;
        let served: usize = std::thread::scope(|scope| {
            let mut workers = Vec::new();
            for _ in 0..4 {
                workers.push(scope.spawn(move || {
                                      let sid = e.alloc_session().unwrap();
                                      let arr = e.create_array(sid).unwrap();
                                      for _ in 0..2 {
                                          let m = e.load_molecule(sid, "C").unwrap();
                                          e.array_add(sid, arr, m).unwrap();
                                      }
                                      let cur = e.iterate_array(sid, arr).unwrap();
                                      (0..2).filter(|_| e.next(sid, cur).is_ok()).count()
                                  }));
            }
            workers.into_iter().map(|w| w.join().unwrap()).sum()
        });
        assert_eq!(served, 3);
    }
}
