//! Cursor de iteración tipo "pull" sobre una secuencia nativa.

use std::iter::FusedIterator;

use chemengine::NativeEngine;

use crate::errors::CoreError;
use crate::object::ChemObject;

/// Estado de un cursor.
///
/// Transiciones válidas:
/// - `Fresh` -> `Active` (primer `next` con elemento)
/// - `Fresh` | `Active` -> `Exhausted` (el motor devuelve el centinela)
///
/// `Exhausted` es terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    Fresh,
    Active,
    Exhausted,
}

/// Objeto envuelto cuyo handle es una posición dentro de una secuencia nativa.
#[derive(Debug)]
pub struct ObjectIter<E: NativeEngine> {
    cursor: ChemObject<E>,
    state: CursorState,
    fused: bool,
}

impl<E: NativeEngine> ObjectIter<E> {
    pub fn new(cursor: ChemObject<E>) -> Self {
        Self { cursor,
               state: CursorState::Fresh,
               fused: false }
    }

    pub fn state(&self) -> CursorState { self.state }

    pub fn cursor(&self) -> &ChemObject<E> { &self.cursor }

    /// Avanza el cursor. `Ok(None)` marca el fin de la secuencia y, a partir de
    /// ahí, el cursor no vuelve a consultar al motor. Un error del motor se
    /// propaga tal cual (no es fin de secuencia).
    pub fn next_object(&mut self) -> Result<Option<ChemObject<E>>, CoreError> {
        if self.state == CursorState::Exhausted {
            return Ok(None);
        }
        let cursor = self.cursor.live_handle()?;
        let next = self.cursor.session().with_engine(|e, sid| e.next(sid, cursor))?;
        match self.cursor.session().wrap(next) {
            Some(item) => {
                self.state = CursorState::Active;
                Ok(Some(item))
            }
            None => {
                self.state = CursorState::Exhausted;
                Ok(None)
            }
        }
    }

    /// Pregunta al motor por separado; no comparte lookahead con `next_object`.
    pub fn has_next(&self) -> Result<bool, CoreError> {
        if self.state == CursorState::Exhausted {
            return Ok(false);
        }
        let cursor = self.cursor.live_handle()?;
        self.cursor.session().with_engine(|e, sid| e.has_next(sid, cursor))
    }

    /// Libera el cursor nativo (idempotente) y lo deja agotado.
    pub fn dispose(&mut self) {
        self.cursor.dispose();
        self.state = CursorState::Exhausted;
    }
}

/// Tras el primer error el iterador termina.
impl<E: NativeEngine> Iterator for ObjectIter<E> {
    type Item = Result<ChemObject<E>, CoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.fused {
            return None;
        }
        match self.next_object() {
            Ok(Some(item)) => Some(Ok(item)),
            Ok(None) => {
                self.fused = true;
                None
            }
            Err(e) => {
                self.fused = true;
                Some(Err(e))
            }
        }
    }
}

impl<E: NativeEngine> FusedIterator for ObjectIter<E> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Session;
    use chemengine::MockEngine;
    use std::sync::Arc;

    fn filled_array(engine: MockEngine, items: &[&str]) -> (Session<MockEngine>, ChemObject<MockEngine>) {
        let s = Session::open(Arc::new(engine)).unwrap();
        let arr = s.create_array().unwrap();
        for it in items {
            let m = s.load_molecule(it).unwrap();
            arr.array_add(&m).unwrap();
        }
        (s, arr)
    }

    fn engine() -> MockEngine { MockEngine::new().with_formula("CCO", "C2H6O").with_formula("C", "CH4") }

    #[test]
    fn state_machine_reaches_terminal_state() {
        let (_s, arr) = filled_array(engine(), &["CCO", "C"]);
        let mut it = arr.iter().unwrap().unwrap();
        assert_eq!(it.state(), CursorState::Fresh);
        assert!(it.has_next().unwrap());
        assert!(it.has_next().unwrap(), "has_next no debe mover el cursor");
        let a = it.next_object().unwrap().unwrap();
        assert_eq!(it.state(), CursorState::Active);
        assert_eq!(a.gross_formula().unwrap(), "C2H6O");
        let b = it.next_object().unwrap().unwrap();
        assert_eq!(b.gross_formula().unwrap(), "CH4");
        assert!(!it.has_next().unwrap());
        assert!(it.next_object().unwrap().is_none());
        assert_eq!(it.state(), CursorState::Exhausted);
        for _ in 0..3 {
            assert!(it.next_object().unwrap().is_none());
            assert!(!it.has_next().unwrap());
        }
    }

    #[test]
    fn empty_sequence_goes_straight_to_exhausted() {
        let (_s, arr) = filled_array(engine(), &[]);
        let mut it = arr.iter().unwrap().unwrap();
        assert!(!it.has_next().unwrap());
        assert!(it.next_object().unwrap().is_none());
        assert_eq!(it.state(), CursorState::Exhausted);
    }

    #[test]
    fn iterator_adapter_collects_and_releases() {
        let (s, arr) = filled_array(engine(), &["CCO", "C", "CCO"]);
        let before = s.count_references().unwrap();
        {
            let it = arr.iter().unwrap().unwrap();
            let formulas: Vec<String> = it.map(|o| o.and_then(|o| o.gross_formula())).collect::<Result<_, _>>().unwrap();
            assert_eq!(formulas, vec!["C2H6O", "CH4", "C2H6O"]);
        }
        assert_eq!(s.count_references().unwrap(), before);
    }

    #[test]
    fn engine_failure_during_advance_is_not_end_of_sequence() {
        let (_s, arr) = filled_array(engine().with_next_failure_after(1), &["CCO", "C"]);
        let mut it = arr.iter().unwrap().unwrap();
        assert!(it.next_object().unwrap().is_some());
        assert!(matches!(it.next_object(), Err(CoreError::Engine(_))));
        assert_eq!(it.state(), CursorState::Active);

        let (_s, arr) = filled_array(engine().with_next_failure_after(0), &["CCO"]);
        let mut fused = arr.iter().unwrap().unwrap();
        assert!(matches!(fused.next(), Some(Err(_))));
        assert!(fused.next().is_none());
    }

    #[test]
    fn disposed_cursor_is_exhausted() {
        let (_s, arr) = filled_array(engine(), &["CCO"]);
        let mut it = arr.iter().unwrap().unwrap();
        it.dispose();
        assert!(it.next_object().unwrap().is_none());
        assert!(!it.has_next().unwrap());
    }
}
