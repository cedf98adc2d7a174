//! Backend real: RDKit vía Python embebido (pyo3).
//!
//! El módulo `python/rdkit_wrapper.py` mantiene una tabla id -> objeto RDKit
//! por sesión; aquí sólo traducimos llamadas y errores.
use pyo3::exceptions::{PyKeyError, PyLookupError, PyTypeError};
use pyo3::call::PyCallArgs;
use pyo3::ffi::c_str;
use pyo3::prelude::*;
use pyo3::types::PyModule;
use std::ffi::CString;
use std::sync::OnceLock;

use crate::{EngineConfig, EngineError, Handle, NativeEngine, OptionValue, SessionId};

static RDKIT_MODULE: OnceLock<Py<PyModule>> = OnceLock::new();

fn init_python(config: &EngineConfig) -> PyResult<()> {
    if let Some(path) = &config.python_path {
        std::env::set_var("PYTHON_SYS_EXECUTABLE", path);
    }
    Python::attach(|py| {
        if RDKIT_MODULE.get().is_some() {
            return Ok(());
        }
        let code = CString::new(include_str!("../python/rdkit_wrapper.py"))?;
        let module = PyModule::from_code(py, code.as_c_str(), c_str!("rdkit_wrapper.py"), c_str!("rdkit_wrapper"))?;
        // Guardamos el módulo en el OnceLock como Py<PyModule>
        RDKIT_MODULE.set(module.unbind()).ok();
        Ok(())
    })
}

fn get_module(py: Python<'_>) -> PyResult<Py<PyModule>> {
    RDKIT_MODULE.get().map(|module| module.clone_ref(py)).ok_or_else(|| {
                                                             PyErr::new::<pyo3::exceptions::PyRuntimeError, _>(
            "RdkitEngine::init() debe llamarse antes de usar el motor"
        )
                                                         })
}

fn failure(err: PyErr) -> EngineError { EngineError::Failure(err.to_string()) }

/// Handle a un objeto RDKit: `KeyError` en Python significa handle desconocido.
fn handle_error(py: Python<'_>, handle: Handle, err: PyErr) -> EngineError {
    if err.is_instance_of::<PyKeyError>(py) {
        EngineError::InvalidHandle(handle)
    } else {
        failure(err)
    }
}

pub struct RdkitEngine {
    _private: (),
}

impl RdkitEngine {
    pub fn init(config: &EngineConfig) -> Result<Self, EngineError> {
        init_python(config).map_err(|e| EngineError::Init(e.to_string()))?;
        Ok(Self { _private: () })
    }

    fn invoke<R, A>(&self,
                    name: &str,
                    args: A,
                    read: impl for<'py> FnOnce(Bound<'py, PyAny>) -> PyResult<R>,
                    on_err: impl FnOnce(Python<'_>, PyErr) -> EngineError)
                    -> Result<R, EngineError>
        where A: for<'py> PyCallArgs<'py>
    {
        Python::attach(|py| {
            let run = || -> PyResult<R> {
                let rdkit_py = get_module(py)?;
                let rdkit = rdkit_py.bind(py);
                read(rdkit.getattr(name)?.call1(args)?)
            };
            run().map_err(|e| on_err(py, e))
        })
    }

    fn call<T, A>(&self, name: &str, args: A, on_err: impl FnOnce(Python<'_>, PyErr) -> EngineError) -> Result<T, EngineError>
        where T: for<'py> FromPyObject<'py>,
              A: for<'py> PyCallArgs<'py>
    {
        self.invoke(name, args, |v| v.extract::<T>(), on_err)
    }

    /// Igual que `call`, descartando el valor de retorno (None en Python).
    fn call_unit<A>(&self, name: &str, args: A, on_err: impl FnOnce(Python<'_>, PyErr) -> EngineError) -> Result<(), EngineError>
        where A: for<'py> PyCallArgs<'py>
    {
        self.invoke(name, args, |_| Ok(()), on_err)
    }

    fn raw(&self, value: i32) -> Handle { Handle::new(value) }
}

impl NativeEngine for RdkitEngine {
    fn version(&self) -> String {
        self.call::<String, _>("version", (), |_, e| failure(e)).unwrap_or_else(|e| format!("rdkit (desconocida: {e})"))
    }

    fn alloc_session(&self) -> Result<SessionId, EngineError> {
        self.call::<u64, _>("alloc_session", (), |_, e| failure(e)).map(SessionId)
    }

    fn release_session(&self, sid: SessionId) -> Result<(), EngineError> {
        self.call_unit("release_session", (sid.0,), |_, e| failure(e))
    }

    fn free(&self, sid: SessionId, handle: Handle) -> Result<(), EngineError> {
        self.call_unit("free", (sid.0, handle.raw()), |py, e| handle_error(py, handle, e))
    }

    fn clone_object(&self, sid: SessionId, handle: Handle) -> Result<Handle, EngineError> {
        self.call::<i32, _>("clone_object", (sid.0, handle.raw()), |py, e| {
                if e.is_instance_of::<PyTypeError>(py) {
                    EngineError::CloneFailed { handle, reason: e.to_string() }
                } else {
                    handle_error(py, handle, e)
                }
            })
            .map(|h| self.raw(h))
    }

    fn next(&self, sid: SessionId, cursor: Handle) -> Result<Handle, EngineError> {
        self.call::<i32, _>("next_item", (sid.0, cursor.raw()), |py, e| handle_error(py, cursor, e)).map(|h| self.raw(h))
    }

    fn has_next(&self, sid: SessionId, cursor: Handle) -> Result<bool, EngineError> {
        self.call::<bool, _>("has_next", (sid.0, cursor.raw()), |py, e| handle_error(py, cursor, e))
    }

    fn count_references(&self, sid: SessionId) -> Result<usize, EngineError> {
        self.call::<usize, _>("count_references", (sid.0,), |_, e| failure(e))
    }

    fn set_option(&self, sid: SessionId, name: &str, value: &OptionValue) -> Result<(), EngineError> {
        let on_err = |py: Python<'_>, e: PyErr| {
            if e.is_instance_of::<PyLookupError>(py) {
                EngineError::UnknownOption(name.to_string())
            } else {
                failure(e)
            }
        };
        match value {
            OptionValue::Bool(b) => self.call_unit("set_option", (sid.0, name, *b), on_err),
            OptionValue::Int(i) => self.call_unit("set_option", (sid.0, name, *i), on_err),
            OptionValue::Float(x) => self.call_unit("set_option", (sid.0, name, *x), on_err),
            OptionValue::Str(s) => self.call_unit("set_option", (sid.0, name, s.as_str()), on_err),
        }
    }

    fn reset_options(&self, sid: SessionId) -> Result<(), EngineError> {
        self.call_unit("reset_options", (sid.0,), |_, e| failure(e))
    }

    fn load_molecule(&self, sid: SessionId, data: &str) -> Result<Handle, EngineError> {
        self.call::<i32, _>("load_molecule", (sid.0, data), |_, e| failure(e)).map(|h| self.raw(h))
    }

    fn load_reaction(&self, sid: SessionId, data: &str) -> Result<Handle, EngineError> {
        self.call::<i32, _>("load_reaction", (sid.0, data), |_, e| failure(e)).map(|h| self.raw(h))
    }

    fn gross_formula(&self, sid: SessionId, handle: Handle) -> Result<String, EngineError> {
        self.call::<String, _>("gross_formula", (sid.0, handle.raw()), |py, e| handle_error(py, handle, e))
    }

    fn smiles(&self, sid: SessionId, handle: Handle) -> Result<String, EngineError> {
        self.call::<String, _>("smiles", (sid.0, handle.raw()), |py, e| handle_error(py, handle, e))
    }

    fn create_array(&self, sid: SessionId) -> Result<Handle, EngineError> {
        self.call::<i32, _>("create_array", (sid.0,), |_, e| failure(e)).map(|h| self.raw(h))
    }

    fn array_add(&self, sid: SessionId, array: Handle, item: Handle) -> Result<(), EngineError> {
        self.call_unit("array_add", (sid.0, array.raw(), item.raw()), |_, e| failure(e))
    }

    fn count(&self, sid: SessionId, handle: Handle) -> Result<usize, EngineError> {
        self.call::<usize, _>("count", (sid.0, handle.raw()), |py, e| handle_error(py, handle, e))
    }

    fn iterate_array(&self, sid: SessionId, array: Handle) -> Result<Handle, EngineError> {
        self.call::<i32, _>("iterate_array", (sid.0, array.raw()), |py, e| handle_error(py, array, e))
            .map(|h| self.raw(h))
    }

    fn reaction_product_enumerate(&self,
                                  sid: SessionId,
                                  reaction: Handle,
                                  monomers: Handle)
                                  -> Result<Handle, EngineError> {
        self.call::<i32, _>("reaction_product_enumerate",
                            (sid.0, reaction.raw(), monomers.raw()),
                            |_, e| failure(e))
            .map(|h| self.raw(h))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gross_formula_ethanol() {
        let engine = RdkitEngine::init(&EngineConfig::from_env()).expect("Fallo al inicializar Python/RDKit");
        let sid = engine.alloc_session().unwrap();
        let h = engine.load_molecule(sid, "CCO").expect("Fallo al cargar la molécula"); // Etanol
        assert_eq!(engine.gross_formula(sid, h).unwrap(), "C2H6O");
        engine.free(sid, h).unwrap();
        assert_eq!(engine.free(sid, h), Err(EngineError::InvalidHandle(h)));
        assert_eq!(engine.count_references(sid).unwrap(), 0);
        engine.release_session(sid).unwrap();
    }
}
