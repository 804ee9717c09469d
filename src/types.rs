//! Shared types returned across module boundaries.

use std::fmt;
use std::time::Duration;

/// A non-fatal condition encountered while producing a value.
///
/// The value is still valid and usable; the warning tells the caller that it
/// is degraded (a placeholder image, a partially rendered page).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// The remote image could not be fetched; the placeholder was used.
    ImageNotFound { url: String, reason: String },
    /// The page did not finish loading before the deadline; the snapshot
    /// shows whatever had rendered by then.
    CaptureTimedOut { url: String, after: Duration },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::ImageNotFound { .. } => f.write_str("Image was not found"),
            Warning::CaptureTimedOut { after, .. } => write!(
                f,
                "Page did not finish loading within {}s",
                after.as_secs()
            ),
        }
    }
}

/// A successful value with an optional warning alongside it.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome<T> {
    pub value: T,
    pub warning: Option<Warning>,
}

impl<T> Outcome<T> {
    pub fn clean(value: T) -> Self {
        Self {
            value,
            warning: None,
        }
    }

    pub fn warned(value: T, warning: Warning) -> Self {
        Self {
            value,
            warning: Some(warning),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        Outcome {
            value: f(self.value),
            warning: self.warning,
        }
    }
}
