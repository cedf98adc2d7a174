//! Objeto envuelto: un handle nativo más la sesión que lo creó.

use chemengine::{Handle, NativeEngine};
use log::{debug, warn};

use crate::errors::CoreError;
use crate::iter::ObjectIter;
use crate::session::Session;

/// Dueño exclusivo de un handle nativo.
///
/// Exactamente una liberación llega al motor por handle: `dispose()` explícito
/// o, si nunca se llamó, al soltar el valor (`Drop`). Un clon (`try_clone`)
/// obtiene un handle nuevo, nunca un alias.
pub struct ChemObject<E: NativeEngine> {
    session: Session<E>,
    handle: Handle,
    disposed: bool,
}

impl<E: NativeEngine> std::fmt::Debug for ChemObject<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChemObject")
         .field("session", &self.session.id())
         .field("handle", &self.handle)
         .field("disposed", &self.disposed)
         .finish()
    }
}

impl<E: NativeEngine> ChemObject<E> {
    /// `handle` nunca es el centinela (lo garantiza `Session::wrap`).
    pub(crate) fn from_handle(session: Session<E>, handle: Handle) -> Self {
        debug_assert!(!handle.is_sentinel());
        Self { session,
               handle,
               disposed: false }
    }

    pub fn session(&self) -> &Session<E> { &self.session }

    /// Handle nativo, o `None` si ya fue liberado.
    pub fn handle(&self) -> Option<Handle> { (!self.disposed).then_some(self.handle) }

    pub fn is_disposed(&self) -> bool { self.disposed }

    pub(crate) fn live_handle(&self) -> Result<Handle, CoreError> {
        if self.disposed {
            Err(CoreError::InvalidHandle(self.handle))
        } else {
            Ok(self.handle)
        }
    }

    /// Libera el handle. Idempotente: sólo la primera llamada llega al motor.
    /// Un fallo del motor al liberar se registra y se ignora.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        let handle = self.handle;
        match self.session.with_engine(|e, sid| e.free(sid, handle)) {
            Ok(()) => debug!("handle {} released ({})", handle, self.session.id()),
            Err(e) => warn!("ignoring failure while releasing handle {}: {}", handle, e),
        }
    }

    /// Copia independiente en el motor. Si el motor no sabe clonar este tipo
    /// de objeto, el error se propaga.
    pub fn try_clone(&self) -> Result<ChemObject<E>, CoreError> {
        let handle = self.live_handle()?;
        let copy = self.session.with_engine(|e, sid| e.clone_object(sid, handle))?;
        self.session
            .wrap(copy)
            .ok_or_else(|| CoreError::Clone(format!("{handle}: engine returned the sentinel handle")))
    }

    pub fn gross_formula(&self) -> Result<String, CoreError> {
        let handle = self.live_handle()?;
        self.session.with_engine(|e, sid| e.gross_formula(sid, handle))
    }

    pub fn smiles(&self) -> Result<String, CoreError> {
        let handle = self.live_handle()?;
        self.session.with_engine(|e, sid| e.smiles(sid, handle))
    }

    pub fn count(&self) -> Result<usize, CoreError> {
        let handle = self.live_handle()?;
        self.session.with_engine(|e, sid| e.count(sid, handle))
    }

    /// Agrega (una copia de) `item` a este arreglo.
    pub fn array_add(&self, item: &ChemObject<E>) -> Result<(), CoreError> {
        let array = self.live_handle()?;
        let item = item.live_handle()?;
        self.session.with_engine(|e, sid| e.array_add(sid, array, item))
    }

    /// Itera los elementos de este arreglo.
    pub fn iter(&self) -> Result<Option<ObjectIter<E>>, CoreError> { self.session.iterate_array(self) }
}

impl<E: NativeEngine> Drop for ChemObject<E> {
    fn drop(&mut self) { self.dispose(); }
}
