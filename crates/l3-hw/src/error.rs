//! Driver status codes and the hardware error type.

use std::fmt;
use thiserror::Error;

/// Status codes returned by the forwarding driver.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HwStatus {
    Success = 0,
    Failure = -1,
    NotSupported = -2,
    NoMemory = -3,
    InsufficientResources = -4,
    InvalidParameter = -5,
    ItemAlreadyExists = -6,
    ItemNotFound = -7,
    TableFull = -13,
    InvalidIndex = -19,
    NotInitialized = -12,
}

impl HwStatus {
    /// Creates a status from a raw driver value; unknown values map to `Failure`.
    pub fn from_raw(status: i32) -> Self {
        match status {
            0 => HwStatus::Success,
            -2 => HwStatus::NotSupported,
            -3 => HwStatus::NoMemory,
            -4 => HwStatus::InsufficientResources,
            -5 => HwStatus::InvalidParameter,
            -6 => HwStatus::ItemAlreadyExists,
            -7 => HwStatus::ItemNotFound,
            -12 => HwStatus::NotInitialized,
            -13 => HwStatus::TableFull,
            -19 => HwStatus::InvalidIndex,
            _ => HwStatus::Failure,
        }
    }

    pub fn is_success(&self) -> bool {
        *self == HwStatus::Success
    }

    /// Converts to a Result, attributing a failure to `op`.
    pub fn into_result(self, op: &'static str) -> HwResult<()> {
        if self.is_success() {
            Ok(())
        } else {
            Err(HwError::new(op, self))
        }
    }
}

impl fmt::Display for HwStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HwStatus::Success => "HW_STATUS_SUCCESS",
            HwStatus::Failure => "HW_STATUS_FAILURE",
            HwStatus::NotSupported => "HW_STATUS_NOT_SUPPORTED",
            HwStatus::NoMemory => "HW_STATUS_NO_MEMORY",
            HwStatus::InsufficientResources => "HW_STATUS_INSUFFICIENT_RESOURCES",
            HwStatus::InvalidParameter => "HW_STATUS_INVALID_PARAMETER",
            HwStatus::ItemAlreadyExists => "HW_STATUS_ITEM_ALREADY_EXISTS",
            HwStatus::ItemNotFound => "HW_STATUS_ITEM_NOT_FOUND",
            HwStatus::TableFull => "HW_STATUS_TABLE_FULL",
            HwStatus::InvalidIndex => "HW_STATUS_INVALID_INDEX",
            HwStatus::NotInitialized => "HW_STATUS_NOT_INITIALIZED",
        };
        write!(f, "{}", s)
    }
}

/// A failed backend call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{op} failed: {status}{}", fmt_detail(.detail))]
pub struct HwError {
    /// Backend primitive that failed, e.g. `"nh_group_create"`.
    pub op: &'static str,
    pub status: HwStatus,
    pub detail: Option<String>,
}

impl HwError {
    pub fn new(op: &'static str, status: HwStatus) -> Self {
        Self {
            op,
            status,
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn not_found(op: &'static str, item: impl Into<String>) -> Self {
        Self::new(op, HwStatus::ItemNotFound).with_detail(item)
    }

    pub fn table_full(op: &'static str, table: impl Into<String>) -> Self {
        Self::new(op, HwStatus::TableFull).with_detail(table)
    }

    pub fn invalid_parameter(op: &'static str, message: impl Into<String>) -> Self {
        Self::new(op, HwStatus::InvalidParameter).with_detail(message)
    }

    /// Returns true if the driver ran out of table space or memory.
    pub fn is_resource_exhausted(&self) -> bool {
        matches!(
            self.status,
            HwStatus::TableFull | HwStatus::NoMemory | HwStatus::InsufficientResources
        )
    }
}

fn fmt_detail(detail: &Option<String>) -> String {
    detail.as_deref().map(|d| format!(" ({d})")).unwrap_or_default()
}

/// Result type for backend calls.
pub type HwResult<T> = Result<T, HwError>;
