//! OSEK status codes.
//!
//! Task-level failures are ordinary outcomes of a service call, so they
//! are returned as values and never abort the model.

use thiserror::Error;

/// A non-`E_OK` status returned by a scheduler service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum OsError {
    /// The resource is already held.
    #[error("E_OS_ACCESS: resource is busy")]
    Access,
    #[error("E_OS_CALLEVEL: call not allowed at this level")]
    CallLevel,
    /// Unknown task or resource id.
    #[error("E_OS_ID: unknown task or resource")]
    Id,
    /// The task is already activated.
    #[error("E_OS_LIMIT: too many activations")]
    Limit,
    /// The caller does not hold the resource it releases.
    #[error("E_OS_NOFUNC: resource not held by caller")]
    NoFunc,
    /// The task still holds resources.
    #[error("E_OS_RESOURCE: task still holds resources")]
    Resource,
    #[error("E_OS_STATE: task is in the wrong state")]
    State,
    #[error("E_OS_VALUE: value out of range")]
    Value,
}

impl OsError {
    /// The OSEK name of the status, e.g. `"E_OS_ID"`.
    pub fn code(self) -> &'static str {
        match self {
            OsError::Access => "E_OS_ACCESS",
            OsError::CallLevel => "E_OS_CALLEVEL",
            OsError::Id => "E_OS_ID",
            OsError::Limit => "E_OS_LIMIT",
            OsError::NoFunc => "E_OS_NOFUNC",
            OsError::Resource => "E_OS_RESOURCE",
            OsError::State => "E_OS_STATE",
            OsError::Value => "E_OS_VALUE",
        }
    }
}

/// Result of a scheduler service: `Ok(())` is `E_OK`.
pub type OsResult = Result<(), OsError>;

/// The OSEK name of a service result, `"E_OK"` on success.
pub fn status_code(result: &OsResult) -> &'static str {
    match result {
        Ok(()) => "E_OK",
        Err(e) => e.code(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(status_code(&Ok(())), "E_OK");
        assert_eq!(status_code(&Err(OsError::Access)), "E_OS_ACCESS");
        assert_eq!(OsError::NoFunc.code(), "E_OS_NOFUNC");
        assert!(OsError::Id.to_string().starts_with("E_OS_ID"));
    }
}
