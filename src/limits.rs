//! Hard caps enforced by the engine and the SQL front-end.

use crate::money::Cents;

pub const MAX_NAME_LEN: usize = 128;
pub const MAX_AMENITIES_LEN: usize = 1024;
pub const MAX_ROOM_NUMBER_LEN: usize = 16;

pub const MAX_BRANCHES: usize = 1_000;
pub const MAX_ROOM_TYPES: usize = 256;
pub const MAX_ROOMS_PER_BRANCH: usize = 10_000;

/// Distinct room-type lines in one booking request.
pub const MAX_ROOM_REQUESTS: usize = 16;
/// Physical rooms allocated by one booking.
pub const MAX_ROOMS_PER_BOOKING: u32 = 50;
pub const MAX_PAX: u32 = 500;
pub const MAX_ROOM_CAPACITY: u32 = 64;
pub const MAX_STAY_NIGHTS: i64 = 365;

/// Live occupancies held by one room.
pub const MAX_OCCUPANCIES_PER_ROOM: usize = 100_000;
pub const MAX_PAYMENTS_PER_BILL: usize = 1_000;

/// 10,000,000.00 in any currency.
pub const MAX_AMOUNT_CENTS: Cents = 1_000_000_000;
/// 100% in basis points.
pub const MAX_TAX_RATE_BPS: u32 = 10_000;

/// Calendar window accepted for stays, as (year, month, day).
pub const MIN_VALID_DATE: (i32, u32, u32) = (2000, 1, 1);
pub const MAX_VALID_DATE: (i32, u32, u32) = (2100, 12, 31);
