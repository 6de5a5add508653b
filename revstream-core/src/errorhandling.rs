//! Classification of collaborator failures into transient and fatal errors.
//!
//! Sources and emitters wrap foreign errors (network clients, file systems) into the crate's
//! error taxonomy. The [Classify] extension tags a `Result` with the right class at the call site.
use crate::emitters::EmitError;
use crate::sources::SourceError;

/// Boxed error type used as the source of collaborator failures
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Tag the error of a `Result` as a transient or fatal failure.
pub trait Classify<T>: Sized + sealed::Sealed {
    /// The failure may go away on retry, e.g. a timeout
    fn transient(self) -> Result<T, SourceError>;

    /// The failure will not go away, e.g. the partition was deleted
    fn fatal(self) -> Result<T, SourceError>;

    /// The emitter failed in a way which may succeed on retry
    fn emit_transient(self) -> Result<T, EmitError>;

    /// The emitter failed permanently for this snapshot
    fn emit_failed(self) -> Result<T, EmitError>;
}

impl<T, E> Classify<T> for Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn transient(self) -> Result<T, SourceError> {
        self.map_err(|e| SourceError::Transient(Box::new(e)))
    }

    fn fatal(self) -> Result<T, SourceError> {
        self.map_err(|e| SourceError::Fatal(Box::new(e)))
    }

    fn emit_transient(self) -> Result<T, EmitError> {
        self.map_err(|e| EmitError::Transient(Box::new(e)))
    }

    fn emit_failed(self) -> Result<T, EmitError> {
        self.map_err(|e| EmitError::Failed(Box::new(e)))
    }
}

mod sealed {
    pub trait Sealed {}

    impl<T, E> Sealed for Result<T, E> {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_errors_with_class() {
        let res: Result<(), std::io::Error> = Err(std::io::Error::other("timeout"));
        assert!(res.transient().unwrap_err().is_transient());

        let res: Result<(), std::io::Error> = Err(std::io::Error::other("gone"));
        assert!(!res.fatal().unwrap_err().is_transient());

        let res: Result<(), std::io::Error> = Err(std::io::Error::other("busy"));
        assert!(res.emit_transient().unwrap_err().is_transient());

        let res: Result<u8, std::io::Error> = Ok(1);
        assert_eq!(res.emit_failed().unwrap(), 1);
    }
}
