//! SAI error types and status handling.

use std::fmt;
use thiserror::Error;

/// SAI status codes matching the SAI C API.
///
/// These values correspond to `sai_status_t` in the SAI header files.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SaiStatus {
    Success = 0,
    Failure = -1,
    NotSupported = -2,
    InvalidParameter = -5,
    ItemAlreadyExists = -6,
    ItemNotFound = -7,
    TableFull = -13,
    ObjectInUse = -17,
    InvalidObjectId = -19,
}

impl SaiStatus {
    /// Creates a SaiStatus from a raw i32 value.
    pub fn from_raw(status: i32) -> Self {
        match status {
            0 => SaiStatus::Success,
            -2 => SaiStatus::NotSupported,
            -5 => SaiStatus::InvalidParameter,
            -6 => SaiStatus::ItemAlreadyExists,
            -7 => SaiStatus::ItemNotFound,
            -13 => SaiStatus::TableFull,
            -17 => SaiStatus::ObjectInUse,
            -19 => SaiStatus::InvalidObjectId,
            _ => SaiStatus::Failure,
        }
    }

    pub fn is_success(&self) -> bool {
        *self == SaiStatus::Success
    }
}

impl fmt::Display for SaiStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SaiStatus::Success => "SAI_STATUS_SUCCESS",
            SaiStatus::Failure => "SAI_STATUS_FAILURE",
            SaiStatus::NotSupported => "SAI_STATUS_NOT_SUPPORTED",
            SaiStatus::InvalidParameter => "SAI_STATUS_INVALID_PARAMETER",
            SaiStatus::ItemAlreadyExists => "SAI_STATUS_ITEM_ALREADY_EXISTS",
            SaiStatus::ItemNotFound => "SAI_STATUS_ITEM_NOT_FOUND",
            SaiStatus::TableFull => "SAI_STATUS_TABLE_FULL",
            SaiStatus::ObjectInUse => "SAI_STATUS_OBJECT_IN_USE",
            SaiStatus::InvalidObjectId => "SAI_STATUS_INVALID_OBJECT_ID",
        };
        write!(f, "{}", s)
    }
}

/// Error type for SAI operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SaiError {
    /// The switch refused the call with a status code.
    #[error("{operation} failed: {status} ({object})")]
    Status {
        operation: &'static str,
        status: SaiStatus,
        object: String,
    },

    /// Internal error.
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl SaiError {
    pub fn status(operation: &'static str, status: SaiStatus, object: impl Into<String>) -> Self {
        SaiError::Status {
            operation,
            status,
            object: object.into(),
        }
    }

    pub fn already_exists(operation: &'static str, object: impl Into<String>) -> Self {
        Self::status(operation, SaiStatus::ItemAlreadyExists, object)
    }

    pub fn not_found(operation: &'static str, object: impl Into<String>) -> Self {
        Self::status(operation, SaiStatus::ItemNotFound, object)
    }

    pub fn object_in_use(operation: &'static str, object: impl Into<String>) -> Self {
        Self::status(operation, SaiStatus::ObjectInUse, object)
    }

    pub fn invalid_object(operation: &'static str, object: impl Into<String>) -> Self {
        Self::status(operation, SaiStatus::InvalidObjectId, object)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        SaiError::Internal {
            message: message.into(),
        }
    }

    /// Returns the SAI status behind this error.
    pub fn sai_status(&self) -> SaiStatus {
        match self {
            SaiError::Status { status, .. } => *status,
            SaiError::Internal { .. } => SaiStatus::Failure,
        }
    }

    /// Returns true if the object the call tried to create is already there.
    pub fn is_already_exists(&self) -> bool {
        self.sai_status() == SaiStatus::ItemAlreadyExists
    }

    /// Returns true if the object the call targeted is gone.
    pub fn is_not_found(&self) -> bool {
        self.sai_status() == SaiStatus::ItemNotFound
    }
}

/// Result type for SAI operations.
pub type SaiResult<T> = Result<T, SaiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_status_from_raw() {
        assert_eq!(SaiStatus::from_raw(0), SaiStatus::Success);
        assert_eq!(SaiStatus::from_raw(-17), SaiStatus::ObjectInUse);
        assert_eq!(SaiStatus::from_raw(-999), SaiStatus::Failure);
        assert!(SaiStatus::Success.is_success());
    }

    #[test]
    fn test_error_display_names_status() {
        let err = SaiError::object_in_use("remove_vlan", "oid:0x26000000000002");
        assert_eq!(
            err.to_string(),
            "remove_vlan failed: SAI_STATUS_OBJECT_IN_USE (oid:0x26000000000002)"
        );
        assert_eq!(err.sai_status(), SaiStatus::ObjectInUse);
        assert!(!err.is_already_exists());
    }

    #[test]
    fn test_internal_maps_to_failure() {
        assert_eq!(SaiError::internal("lost").sai_status(), SaiStatus::Failure);
        assert!(SaiError::not_found("remove_fdb_entry", "x").is_not_found());
    }
}
