use chrono::{NaiveDate, Utc};
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::EngineError;

pub(crate) fn today() -> NaiveDate {
    Utc::now().date_naive()
}

fn limit_date((y, m, d): (i32, u32, u32)) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap_or(NaiveDate::MIN)
}

/// Build a stay, rejecting reversed or empty ranges before any lock is taken.
pub(crate) fn validate_stay(check_in: NaiveDate, check_out: NaiveDate) -> Result<Stay, EngineError> {
    if check_in >= check_out {
        return Err(EngineError::InvalidDateRange { check_in, check_out });
    }
    if check_in < limit_date(MIN_VALID_DATE) || check_out > limit_date(MAX_VALID_DATE) {
        return Err(EngineError::LimitExceeded("date out of range"));
    }
    let stay = Stay::new(check_in, check_out);
    if stay.nights() > MAX_STAY_NIGHTS {
        return Err(EngineError::LimitExceeded("stay too long"));
    }
    Ok(stay)
}

pub(crate) fn validate_name(kind: &'static str, name: &str, max: usize) -> Result<(), EngineError> {
    if name.trim().is_empty() {
        return Err(EngineError::InvalidInput(format!("{kind} must not be empty")));
    }
    if name.len() > max {
        return Err(EngineError::LimitExceeded(kind));
    }
    Ok(())
}

/// Order rooms by number the way a front desk reads them: "9" before "10".
fn room_number_key(rs: &RoomState) -> (usize, &str) {
    (rs.number.len(), rs.number.as_str())
}

/// Pick `quantity` free rooms per request from `rooms`.
///
/// `rooms` must already be locked by the caller. A room is free when it has
/// no live occupancy overlapping `stay`. The first request that cannot be
/// filled fails the whole allocation.
pub(crate) fn allocate_rooms(
    rooms: &[&RoomState],
    requests: &[RoomRequest],
    stay: &Stay,
) -> Result<Vec<Ulid>, EngineError> {
    let mut chosen = Vec::new();
    for request in requests {
        let mut free: Vec<&RoomState> = rooms
            .iter()
            .copied()
            .filter(|rs| rs.room_type == request.room_type && rs.live_conflict(stay).is_none())
            .collect();
        if free.len() < request.quantity as usize {
            return Err(EngineError::NoRoomsAvailable(request.room_type.clone()));
        }
        free.sort_by(|a, b| room_number_key(a).cmp(&room_number_key(b)));
        chosen.extend(free.iter().take(request.quantity as usize).map(|rs| rs.id));
    }
    Ok(chosen)
}
