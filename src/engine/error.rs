use chrono::NaiveDate;
use ulid::Ulid;

use crate::model::BookingStatus;
use crate::money::{format_cents, Cents};

/// Which side of the failure taxonomy an error falls on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Rejected before any transaction started.
    Validation,
    /// Raised inside a transaction; everything rolled back.
    BusinessRule,
    /// Lock or storage failure; nothing persisted, safe to resubmit.
    Infra,
}

#[derive(Debug)]
pub enum EngineError {
    InvalidInput(String),
    InvalidDateRange {
        check_in: NaiveDate,
        check_out: NaiveDate,
    },
    LimitExceeded(&'static str),
    BranchNotFound(String),
    RoomNotFound(Ulid),
    BookingNotFound(Ulid),
    AlreadyExists(String),
    InvalidRoomType(String),
    RoomTypeInUse(String),
    InsufficientCapacity {
        requested: u32,
        capacity: u32,
    },
    NoRoomsAvailable(String),
    InvalidTransition {
        from: BookingStatus,
        to: BookingStatus,
    },
    BillNotFound(Ulid),
    AlreadyPaid(Ulid),
    BillCancelled(Ulid),
    OverpaymentRejected {
        amount: Cents,
        due: Cents,
    },
    LockTimeout(&'static str),
    WalError(String),
}

impl EngineError {
    pub fn class(&self) -> ErrorClass {
        match self {
            EngineError::InvalidInput(_)
            | EngineError::InvalidDateRange { .. }
            | EngineError::LimitExceeded(_) => ErrorClass::Validation,
            EngineError::LockTimeout(_) | EngineError::WalError(_) => ErrorClass::Infra,
            _ => ErrorClass::BusinessRule,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::Infra
    }

    /// Short stable label for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::InvalidInput(_) => "invalid_input",
            EngineError::InvalidDateRange { .. } => "invalid_date_range",
            EngineError::LimitExceeded(_) => "limit_exceeded",
            EngineError::BranchNotFound(_) => "branch_not_found",
            EngineError::RoomNotFound(_) => "room_not_found",
            EngineError::BookingNotFound(_) => "booking_not_found",
            EngineError::AlreadyExists(_) => "already_exists",
            EngineError::InvalidRoomType(_) => "invalid_room_type",
            EngineError::RoomTypeInUse(_) => "room_type_in_use",
            EngineError::InsufficientCapacity { .. } => "insufficient_capacity",
            EngineError::NoRoomsAvailable(_) => "no_rooms_available",
            EngineError::InvalidTransition { .. } => "invalid_transition",
            EngineError::BillNotFound(_) => "bill_not_found",
            EngineError::AlreadyPaid(_) => "already_paid",
            EngineError::BillCancelled(_) => "bill_cancelled",
            EngineError::OverpaymentRejected { .. } => "overpayment_rejected",
            EngineError::LockTimeout(_) => "lock_timeout",
            EngineError::WalError(_) => "wal_error",
        }
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            EngineError::InvalidDateRange { check_in, check_out } => {
                write!(f, "invalid date range: check-in {check_in} must be before check-out {check_out}")
            }
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::BranchNotFound(name) => write!(f, "branch not found: {name}"),
            EngineError::RoomNotFound(id) => write!(f, "room not found: {id}"),
            EngineError::BookingNotFound(id) => write!(f, "booking not found: {id}"),
            EngineError::AlreadyExists(what) => write!(f, "already exists: {what}"),
            EngineError::InvalidRoomType(name) => write!(f, "invalid room type: {name}"),
            EngineError::RoomTypeInUse(name) => {
                write!(f, "room type {name} is still assigned to rooms")
            }
            EngineError::InsufficientCapacity { requested, capacity } => write!(
                f,
                "insufficient capacity: {requested} guest(s) requested, selected rooms hold {capacity}"
            ),
            EngineError::NoRoomsAvailable(room_type) => {
                write!(f, "no rooms available of type {room_type} for the requested dates")
            }
            EngineError::InvalidTransition { from, to } => write!(
                f,
                "cannot move booking from {} to {}",
                from.as_str(),
                to.as_str()
            ),
            EngineError::BillNotFound(booking_id) => {
                write!(f, "no bill found for booking {booking_id}")
            }
            EngineError::AlreadyPaid(booking_id) => {
                write!(f, "bill for booking {booking_id} is already paid")
            }
            EngineError::BillCancelled(booking_id) => {
                write!(f, "bill for booking {booking_id} is cancelled")
            }
            EngineError::OverpaymentRejected { amount, due } => write!(
                f,
                "payment of {} exceeds due amount {}",
                format_cents(*amount),
                format_cents(*due)
            ),
            EngineError::LockTimeout(what) => {
                write!(f, "timed out waiting for {what} lock; retry the request")
            }
            EngineError::WalError(e) => write!(f, "WAL error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}
