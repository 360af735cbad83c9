//! Closed status set reported to callers

use std::fmt;

/// Outcome of a dispatch
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Status {
    /// The kernel was enqueued
    Success,
    /// No kernel handles this problem on this device
    NotImplemented,
    /// Anything else went wrong
    InternalError,
}

impl Status {
    /// True for [`Status::Success`]
    pub fn is_success(self) -> bool {
        self == Self::Success
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Success => "success",
            Self::NotImplemented => "not implemented",
            Self::InternalError => "internal error",
        })
    }
}
