//! Error types and the swappable handlers every failure passes through.
//!
//! Three families of failures exist:
//!
//! - argument errors: a bad dimension, index, size or step, tagged with the 1-based
//!   position of the offending parameter. Returned to the caller by default.
//! - resource errors: allocation, mapping and stream failures. Fatal by default.
//! - backend errors: a linear-algebra routine requested without a backend. Fatal by default.
//!
//! An embedding layer can install its own handler per family to turn fatal errors into
//! ordinary `Err` values, or to log them on the way out.
//!
//! ```rust
//! use thtensor::error::{self, Disposition};
//!
//! error::set_resource_error_handler(|_| Disposition::Propagate);
//! error::reset_error_handlers();
//! ```

use core::fmt;
use std::sync::Arc;

use parking_lot::{const_rwlock, RwLock};
use thiserror::Error;

use crate::scalars::Kind;

pub type Result<T, E = TensorError> = core::result::Result<T, E>;

// region: ShapeDescriptor

/// Shape captured for error messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapeDescriptor {
    dims: Vec<usize>,
}

impl ShapeDescriptor {
    pub fn from_slice(shape: &[usize]) -> Self {
        Self {
            dims: shape.to_vec(),
        }
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.dims
    }
}

impl fmt::Display for ShapeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, &d) in self.dims.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", d)?;
        }
        write!(f, "]")
    }
}

// endregion: ShapeDescriptor

// region: TensorError

/// Error type for storage, tensor and kernel operations.
#[derive(Debug, Error)]
pub enum TensorError {
    /// Invalid argument at a 1-based parameter position (0 when not attributable).
    #[error("bad argument #{arg}: {reason}")]
    Argument { arg: usize, reason: String },

    /// Operands with incompatible shapes.
    #[error("shape mismatch: expected {expected}, got {got}")]
    ShapeMismatch {
        expected: ShapeDescriptor,
        got: ShapeDescriptor,
    },

    /// Index out of bounds.
    #[error("index {index} out of bounds for size {size}")]
    IndexOutOfBounds { index: usize, size: usize },

    /// Memory allocation failed.
    #[error("memory allocation failed for {elements} elements")]
    AllocationFailed { elements: usize },

    /// File open, seek, read or write failure.
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// A linear-algebra routine was requested but no backend is linked in.
    #[error("{routine} : Lapack library not found in compile time")]
    BackendUnavailable { routine: &'static str },

    /// The operation exists but not for this element kind.
    #[error("{operation} is not supported for {kind} tensors")]
    NotSupported { operation: &'static str, kind: Kind },
}

/// Family a [`TensorError`] belongs to, deciding which handler sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Argument,
    Resource,
    Backend,
}

impl TensorError {
    pub fn argument(arg: usize, reason: impl Into<String>) -> Self {
        TensorError::Argument {
            arg,
            reason: reason.into(),
        }
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        TensorError::Io {
            context: context.into(),
            source,
        }
    }

    pub fn shape_mismatch(expected: &[usize], got: &[usize]) -> Self {
        TensorError::ShapeMismatch {
            expected: ShapeDescriptor::from_slice(expected),
            got: ShapeDescriptor::from_slice(got),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            TensorError::Argument { .. }
            | TensorError::ShapeMismatch { .. }
            | TensorError::IndexOutOfBounds { .. }
            | TensorError::NotSupported { .. } => ErrorKind::Argument,
            TensorError::AllocationFailed { .. } | TensorError::Io { .. } => ErrorKind::Resource,
            TensorError::BackendUnavailable { .. } => ErrorKind::Backend,
        }
    }

    /// The 1-based argument position, for argument errors that carry one.
    pub fn arg(&self) -> Option<usize> {
        match self {
            TensorError::Argument { arg, .. } => Some(*arg),
            _ => None,
        }
    }
}

// endregion: TensorError

// region: Handlers

/// What happens to an error after its handler has seen it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Return the error to the caller as `Err`.
    Propagate,
    /// Abort the current operation by panicking with the error message.
    Fatal,
}

type Handler = Arc<dyn Fn(&TensorError) -> Disposition + Send + Sync>;

struct Handlers {
    argument: Option<Handler>,
    resource: Option<Handler>,
    backend: Option<Handler>,
}

static HANDLERS: RwLock<Handlers> = const_rwlock(Handlers {
    argument: None,
    resource: None,
    backend: None,
});

/// Installs the handler for argument errors. The default propagates.
pub fn set_argument_error_handler<F>(handler: F)
where
    F: Fn(&TensorError) -> Disposition + Send + Sync + 'static,
{
    HANDLERS.write().argument = Some(Arc::new(handler));
}

/// Installs the handler for allocation and I/O errors. The default is fatal.
pub fn set_resource_error_handler<F>(handler: F)
where
    F: Fn(&TensorError) -> Disposition + Send + Sync + 'static,
{
    HANDLERS.write().resource = Some(Arc::new(handler));
}

/// Installs the handler for missing linear-algebra backends. The default is fatal.
pub fn set_backend_error_handler<F>(handler: F)
where
    F: Fn(&TensorError) -> Disposition + Send + Sync + 'static,
{
    HANDLERS.write().backend = Some(Arc::new(handler));
}

/// Restores the default handlers.
pub fn reset_error_handlers() {
    let mut handlers = HANDLERS.write();
    handlers.argument = None;
    handlers.resource = None;
    handlers.backend = None;
}

/// Routes `err` through the handler for its family.
///
/// Returns the error for propagation, or panics if the handler (or the family's default)
/// deems it fatal.
pub fn raise(err: TensorError) -> TensorError {
    let kind = err.kind();
    // The handler runs unlocked so it may install or reset handlers itself.
    let handler = {
        let handlers = HANDLERS.read();
        match kind {
            ErrorKind::Argument => handlers.argument.clone(),
            ErrorKind::Resource => handlers.resource.clone(),
            ErrorKind::Backend => handlers.backend.clone(),
        }
    };
    let disposition = match handler {
        Some(handler) => handler(&err),
        None if kind == ErrorKind::Argument => Disposition::Propagate,
        None => Disposition::Fatal,
    };
    match disposition {
        Disposition::Propagate => {
            if kind != ErrorKind::Argument {
                tracing::warn!(error = %err, "non-argument error returned to caller");
            }
            err
        }
        Disposition::Fatal => {
            tracing::error!(error = %err, "fatal tensor error");
            panic!("{}", err)
        }
    }
}

/// Shorthand for an argument error routed through the handlers.
pub(crate) fn argument_error<T>(arg: usize, reason: impl Into<String>) -> Result<T> {
    Err(raise(TensorError::argument(arg, reason)))
}

/// Returns an argument error from the enclosing function unless `$cond` holds.
macro_rules! arg_check {
    ($cond:expr, $arg:expr, $($fmt:tt)+) => {
        if !($cond) {
            return $crate::error::argument_error($arg, format!($($fmt)+));
        }
    };
}

pub(crate) use arg_check;

// endregion: Handlers

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use parking_lot::Mutex;

    /// Serializes tests that install process-wide handlers.
    pub(crate) static HANDLER_LOCK: Mutex<()> = parking_lot::const_mutex(());

    fn checked(value: i64) -> Result<i64> {
        arg_check!(value > 0, 2, "value must be positive, got {}", value);
        Ok(value)
    }

    #[test]
    fn tensor_error_display() {
        let err = TensorError::argument(3, "out of range");
        assert_eq!(format!("{}", err), "bad argument #3: out of range");

        let err = TensorError::shape_mismatch(&[2, 3], &[3, 2]);
        assert_eq!(
            format!("{}", err),
            "shape mismatch: expected [2, 3], got [3, 2]"
        );

        let err = TensorError::BackendUnavailable { routine: "gesv" };
        assert_eq!(
            format!("{}", err),
            "gesv : Lapack library not found in compile time"
        );
    }

    #[test]
    fn error_kinds() {
        assert_eq!(
            TensorError::argument(1, "x").kind(),
            ErrorKind::Argument
        );
        assert_eq!(
            TensorError::AllocationFailed { elements: 4 }.kind(),
            ErrorKind::Resource
        );
        assert_eq!(
            TensorError::BackendUnavailable { routine: "geev" }.kind(),
            ErrorKind::Backend
        );
        assert_eq!(TensorError::argument(4, "x").arg(), Some(4));
    }

    #[test]
    fn arg_check_reports_position() {
        let _guard = HANDLER_LOCK.lock();
        assert_eq!(checked(5).unwrap(), 5);
        let err = checked(-1).unwrap_err();
        assert_eq!(err.arg(), Some(2));
        assert!(err.to_string().contains("got -1"));
    }

    #[test]
    #[should_panic(expected = "memory allocation failed")]
    fn resource_errors_are_fatal_by_default() {
        let _guard = HANDLER_LOCK.lock();
        reset_error_handlers();
        let _ = raise(TensorError::AllocationFailed { elements: 1 });
    }

    #[test]
    fn custom_handlers_observe_and_downgrade() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        static SEEN: AtomicUsize = AtomicUsize::new(0);

        let _guard = HANDLER_LOCK.lock();
        set_resource_error_handler(|_| Disposition::Propagate);
        let err = raise(TensorError::AllocationFailed { elements: 1 });
        assert_eq!(err.kind(), ErrorKind::Resource);

        set_argument_error_handler(|err| {
            if err.arg() == Some(2) {
                SEEN.fetch_add(1, Ordering::SeqCst);
            }
            Disposition::Propagate
        });
        assert!(checked(0).is_err());
        assert!(SEEN.load(Ordering::SeqCst) >= 1);
        reset_error_handlers();
    }

    #[test]
    fn handlers_may_replace_themselves() {
        use std::sync::mpsc;
        use std::time::Duration;

        let _guard = HANDLER_LOCK.lock();
        set_argument_error_handler(|_| {
            reset_error_handlers();
            Disposition::Propagate
        });

        let (done, finished) = mpsc::channel();
        std::thread::spawn(move || {
            let err = raise(TensorError::argument(1, "x"));
            let _ = done.send(err.arg());
        });
        assert_eq!(finished.recv_timeout(Duration::from_secs(5)), Ok(Some(1)));
        assert!(HANDLERS.read().argument.is_none());
    }
}
