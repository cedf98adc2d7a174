//! chem-core: ciclo de vida de handles nativos.
//!
//! - `Session`: contexto de capacidades (motor + sesión nativa), serializa las
//!   llamadas de la sesión.
//! - `ChemObject`: dueño exclusivo de un handle; liberación determinista (RAII).
//! - `ObjectIter`: protocolo de iteración "pull" con estados
//!   Fresh/Active/Exhausted.
pub mod errors;
pub mod iter;
pub mod object;
pub mod session;

pub use chemengine::{Handle, NativeEngine, OptionValue, SessionId};
pub use errors::CoreError;
pub use iter::{CursorState, ObjectIter};
pub use object::ChemObject;
pub use session::{Session, SessionLock};
