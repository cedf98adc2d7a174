//! Sesión: contexto de capacidades sobre un motor nativo.
//!
//! Una `Session` reserva un `SessionId` en el motor y lo libera cuando se
//! suelta el último clon. Todas las llamadas al motor pasan por una compuerta
//! reentrante, de modo que dentro de una sesión las llamadas quedan
//! serializadas aunque varios hilos compartan la sesión. `lock()` permite
//! agrupar varias llamadas (p.ej. fijar opciones, cargar, restaurar) sin que
//! otro hilo se intercale.

use std::marker::PhantomData;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, ThreadId};

use chemengine::{EngineError, Handle, NativeEngine, OptionValue, SessionId};
use log::{debug, warn};

use crate::errors::CoreError;
use crate::iter::ObjectIter;
use crate::object::ChemObject;

#[derive(Default)]
struct GateState {
    owner: Option<ThreadId>,
    depth: usize,
}

/// Mutex reentrante por hilo: el dueño puede volver a entrar sin bloquearse
/// (necesario porque soltar un `ChemObject` dentro de un bloque `lock()`
/// vuelve a llamar al motor).
#[derive(Default)]
struct Gate {
    state: Mutex<GateState>,
    released: Condvar,
}

impl Gate {
    fn enter(&self) -> GateGuard<'_> {
        let me = thread::current().id();
        let mut st = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            match st.owner {
                None => {
                    st.owner = Some(me);
                    st.depth = 1;
                    break;
                }
                Some(owner) if owner == me => {
                    st.depth += 1;
                    break;
                }
                Some(_) => st = self.released.wait(st).unwrap_or_else(PoisonError::into_inner),
            }
        }
        GateGuard { gate: self, _not_send: PhantomData }
    }
}

struct GateGuard<'a> {
    gate: &'a Gate,
    // El guard pertenece al hilo que entró.
    _not_send: PhantomData<*const ()>,
}

impl Drop for GateGuard<'_> {
    fn drop(&mut self) {
        let mut st = self.gate.state.lock().unwrap_or_else(PoisonError::into_inner);
        st.depth -= 1;
        if st.depth == 0 {
            st.owner = None;
            self.gate.released.notify_one();
        }
    }
}

/// Bloqueo exclusivo de la sesión mientras esté vivo.
pub struct SessionLock<'a> {
    _guard: GateGuard<'a>,
}

struct SessionInner<E: NativeEngine> {
    engine: Arc<E>,
    sid: SessionId,
    gate: Gate,
}

impl<E: NativeEngine> Drop for SessionInner<E> {
    fn drop(&mut self) {
        let _guard = self.gate.enter();
        match self.engine.release_session(self.sid) {
            Ok(()) => debug!("session {} released", self.sid),
            Err(e) => warn!("failed to release session {}: {}", self.sid, e),
        }
    }
}

/// Contexto compartido (barato de clonar) sobre un motor y una sesión nativa.
pub struct Session<E: NativeEngine> {
    inner: Arc<SessionInner<E>>,
}

impl<E: NativeEngine> Clone for Session<E> {
    fn clone(&self) -> Self { Self { inner: Arc::clone(&self.inner) } }
}

impl<E: NativeEngine> std::fmt::Debug for Session<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session").field("sid", &self.inner.sid).finish()
    }
}

impl<E: NativeEngine> Session<E> {
    /// Reserva una sesión nueva en el motor.
    pub fn open(engine: Arc<E>) -> Result<Self, CoreError> {
        let sid = engine.alloc_session()?;
        debug!("session {sid} opened on {}", engine.version());
        Ok(Self { inner: Arc::new(SessionInner { engine,
                                                 sid,
                                                 gate: Gate::default() }) })
    }

    pub fn id(&self) -> SessionId { self.inner.sid }

    pub fn engine(&self) -> &Arc<E> { &self.inner.engine }

    /// Ambas sesiones son la misma sesión nativa.
    pub fn same_as(&self, other: &Session<E>) -> bool { Arc::ptr_eq(&self.inner, &other.inner) }

    pub fn lock(&self) -> SessionLock<'_> { SessionLock { _guard: self.inner.gate.enter() } }

    /// Ejecuta una llamada al motor con la sesión bloqueada.
    pub fn with_engine<T>(&self, f: impl FnOnce(&E, SessionId) -> Result<T, EngineError>) -> Result<T, CoreError> {
        let _guard = self.inner.gate.enter();
        f(&self.inner.engine, self.inner.sid).map_err(CoreError::from)
    }

    /// Envuelve un handle recién creado. El centinela nunca se envuelve:
    /// devuelve `None` ("sin resultado").
    pub fn wrap(&self, handle: Handle) -> Option<ChemObject<E>> {
        if handle.is_sentinel() {
            None
        } else {
            Some(ChemObject::from_handle(self.clone(), handle))
        }
    }

    /// Para creaciones que nunca deberían devolver "sin objeto".
    fn wrap_required(&self, handle: Handle, op: &str) -> Result<ChemObject<E>, CoreError> {
        self.wrap(handle)
            .ok_or_else(|| CoreError::Engine(EngineError::Failure(format!("{op} returned the sentinel handle"))))
    }

    pub fn version(&self) -> String { self.inner.engine.version() }

    /// Handles vivos en esta sesión (diagnóstico de fugas).
    pub fn count_references(&self) -> Result<usize, CoreError> { self.with_engine(|e, sid| e.count_references(sid)) }

    pub fn set_option(&self, name: &str, value: impl Into<OptionValue>) -> Result<(), CoreError> {
        let value = value.into();
        self.with_engine(|e, sid| e.set_option(sid, name, &value))
    }

    pub fn reset_options(&self) -> Result<(), CoreError> { self.with_engine(|e, sid| e.reset_options(sid)) }

    /// Fija `options`, ejecuta `f` y restaura las opciones siempre, con la
    /// sesión bloqueada durante todo el bloque.
    pub fn with_options<T>(&self,
                           options: &[(&str, OptionValue)],
                           f: impl FnOnce(&Self) -> Result<T, CoreError>)
                           -> Result<T, CoreError> {
        let _lock = self.lock();
        let result = options.iter()
                            .try_for_each(|(name, value)| self.with_engine(|e, sid| e.set_option(sid, name, value)))
                            .and_then(|()| f(self));
        let reset = self.reset_options();
        let value = result?;
        reset?;
        Ok(value)
    }

    pub fn load_molecule(&self, data: &str) -> Result<ChemObject<E>, CoreError> {
        let h = self.with_engine(|e, sid| e.load_molecule(sid, data))?;
        self.wrap_required(h, "load_molecule")
    }

    pub fn load_reaction(&self, data: &str) -> Result<ChemObject<E>, CoreError> {
        let h = self.with_engine(|e, sid| e.load_reaction(sid, data))?;
        self.wrap_required(h, "load_reaction")
    }

    pub fn create_array(&self) -> Result<ChemObject<E>, CoreError> {
        let h = self.with_engine(|e, sid| e.create_array(sid))?;
        self.wrap_required(h, "create_array")
    }

    /// Cursor sobre los elementos de `array`; `None` si el motor no tiene nada
    /// que iterar.
    pub fn iterate_array(&self, array: &ChemObject<E>) -> Result<Option<ObjectIter<E>>, CoreError> {
        let target = array.live_handle()?;
        let h = self.with_engine(|e, sid| e.iterate_array(sid, target))?;
        Ok(self.wrap(h).map(ObjectIter::new))
    }

    /// Arreglo de productos, o `None` si no se pudo enumerar ninguno.
    pub fn reaction_product_enumerate(&self,
                                      reaction: &ChemObject<E>,
                                      monomers: &ChemObject<E>)
                                      -> Result<Option<ChemObject<E>>, CoreError> {
        let rxn = reaction.live_handle()?;
        let table = monomers.live_handle()?;
        let h = self.with_engine(|e, sid| e.reaction_product_enumerate(sid, rxn, table))?;
        Ok(self.wrap(h))
    }
}
