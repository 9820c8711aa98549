//! Error returned when a retried operation does not succeed

use crate::error::Error;
use std::fmt;
use std::time::Duration;

/// Why a retried operation gave up
#[derive(Debug)]
pub enum RetryError<E> {
    /// Every allowed attempt failed
    Exhausted {
        attempts: u32,
        source: E,
        total_duration: Duration,
    },

    /// The predicate rejected the error; no further attempts were made
    NonRetryable { attempts: u32, source: E },
}

impl<E> RetryError<E> {
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Exhausted { attempts, .. } | RetryError::NonRetryable { attempts, .. } => {
                *attempts
            }
        }
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, RetryError::Exhausted { .. })
    }

    /// The error from the last attempt
    pub fn into_source(self) -> E {
        match self {
            RetryError::Exhausted { source, .. } | RetryError::NonRetryable { source, .. } => source,
        }
    }
}

impl RetryError<Error> {
    /// Fold back into the domain error
    ///
    /// Exhausted transport failures are re-wrapped with `context` and the
    /// attempt count; any other error is returned unchanged so its kind survives.
    pub fn into_error(self, context: impl Into<String>) -> Error {
        match self {
            RetryError::Exhausted {
                attempts,
                source: Error::Transport { message, .. },
                ..
            } => Error::transport(
                context,
                format!("gave up after {} attempts: {}", attempts, message),
            ),
            other => other.into_source(),
        }
    }
}

impl<E: fmt::Display> fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryError::Exhausted {
                attempts,
                source,
                total_duration,
            } => write!(
                f,
                "retry exhausted after {} attempts over {:.2}s: {}",
                attempts,
                total_duration.as_secs_f64(),
                source
            ),
            RetryError::NonRetryable { source, .. } => write!(f, "non-retryable error: {}", source),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for RetryError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RetryError::Exhausted { source, .. } | RetryError::NonRetryable { source, .. } => {
                Some(source)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_exhausted_transport_rewrapped() {
        let err = RetryError::Exhausted {
            attempts: 3,
            source: Error::transport("put", "503 Slow Down"),
            total_duration: Duration::from_millis(40),
        };
        let folded = err.into_error("upload rac.1.tar");
        assert_eq!(folded.kind(), ErrorKind::Transport);
        let msg = folded.to_string();
        assert!(msg.contains("upload rac.1.tar"));
        assert!(msg.contains("3 attempts"));
        assert!(msg.contains("503 Slow Down"));
    }

    #[test]
    fn test_non_retryable_keeps_kind() {
        let err = RetryError::NonRetryable {
            attempts: 1,
            source: Error::not_found("s3://bucket/missing"),
        };
        assert_eq!(err.attempts(), 1);
        assert_eq!(err.into_error("download").kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_display() {
        let err: RetryError<String> = RetryError::Exhausted {
            attempts: 2,
            source: "connection reset".to_string(),
            total_duration: Duration::from_secs(1),
        };
        let msg = err.to_string();
        assert!(msg.contains("2 attempts"));
        assert!(msg.contains("connection reset"));
        assert!(err.is_exhausted());
    }
}
