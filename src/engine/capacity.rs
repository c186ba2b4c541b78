use crate::limits::*;
use crate::model::RoomRequest;

use super::{Catalog, EngineError};

/// Reject malformed request lists and fold repeated room types into one line.
/// First-seen order is kept so allocation and error reporting are stable.
pub(crate) fn normalize_requests(requests: &[RoomRequest]) -> Result<Vec<RoomRequest>, EngineError> {
    if requests.is_empty() {
        return Err(EngineError::InvalidInput("at least one room must be requested".into()));
    }
    let mut merged: Vec<RoomRequest> = Vec::with_capacity(requests.len());
    for request in requests {
        if request.quantity == 0 {
            return Err(EngineError::InvalidInput(format!(
                "quantity for room type {} must be at least 1",
                request.room_type
            )));
        }
        match merged.iter_mut().find(|r| r.room_type == request.room_type) {
            Some(existing) => {
                existing.quantity = existing.quantity.saturating_add(request.quantity);
            }
            None => merged.push(request.clone()),
        }
    }
    if merged.len() > MAX_ROOM_REQUESTS {
        return Err(EngineError::LimitExceeded("too many room types in one booking"));
    }
    let total_rooms: u64 = merged.iter().map(|r| u64::from(r.quantity)).sum();
    if total_rooms > u64::from(MAX_ROOMS_PER_BOOKING) {
        return Err(EngineError::LimitExceeded("too many rooms in one booking"));
    }
    Ok(merged)
}

/// Check that every requested room type exists and that, together, the
/// requested rooms sleep at least `party_size` guests.
///
/// Returns the combined capacity.
pub fn validate_capacity(
    catalog: &Catalog,
    requests: &[RoomRequest],
    party_size: u32,
) -> Result<u32, EngineError> {
    if party_size == 0 {
        return Err(EngineError::InvalidInput("number of guests must be at least 1".into()));
    }
    if party_size > MAX_PAX {
        return Err(EngineError::LimitExceeded("too many guests in one booking"));
    }

    let mut total: u64 = 0;
    for request in requests {
        let room_type = catalog
            .get(&request.room_type)
            .ok_or_else(|| EngineError::InvalidRoomType(request.room_type.clone()))?;
        total += u64::from(room_type.capacity) * u64::from(request.quantity);
    }
    let capacity = u32::try_from(total).unwrap_or(u32::MAX);

    if capacity < party_size {
        return Err(EngineError::InsufficientCapacity {
            requested: party_size,
            capacity,
        });
    }
    Ok(capacity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RoomType;

    fn catalog() -> Catalog {
        let mut c = Catalog::new();
        for (name, capacity) in [("Single", 1), ("Double", 2), ("Family", 4)] {
            c.insert(
                name.to_string(),
                RoomType {
                    name: name.to_string(),
                    capacity,
                    base_price: 10_000,
                    amenities: None,
                },
            );
        }
        c
    }

    fn req(room_type: &str, quantity: u32) -> RoomRequest {
        RoomRequest {
            room_type: room_type.into(),
            quantity,
        }
    }

    #[test]
    fn exact_fit_passes() {
        let cap = validate_capacity(&catalog(), &[req("Single", 1), req("Double", 1)], 3).unwrap();
        assert_eq!(cap, 3);
    }

    #[test]
    fn one_double_for_three_fails() {
        let err = validate_capacity(&catalog(), &[req("Double", 1)], 3).unwrap_err();
        assert!(matches!(
            err,
            EngineError::InsufficientCapacity { requested: 3, capacity: 2 }
        ));
    }

    #[test]
    fn quantity_multiplies_capacity() {
        assert_eq!(validate_capacity(&catalog(), &[req("Double", 3)], 6).unwrap(), 6);
    }

    #[test]
    fn unknown_type_rejected_even_if_capacity_would_suffice() {
        let err = validate_capacity(&catalog(), &[req("Family", 2), req("Penthouse", 1)], 1).unwrap_err();
        assert!(matches!(err, EngineError::InvalidRoomType(ref t) if t == "Penthouse"));
    }

    #[test]
    fn zero_guests_rejected() {
        let err = validate_capacity(&catalog(), &[req("Single", 1)], 0).unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));
    }

    #[test]
    fn normalize_merges_duplicates_in_order() {
        let merged =
            normalize_requests(&[req("Double", 1), req("Single", 2), req("Double", 2)]).unwrap();
        assert_eq!(merged, vec![req("Double", 3), req("Single", 2)]);
    }

    #[test]
    fn normalize_rejects_empty_and_zero_quantity() {
        assert!(matches!(normalize_requests(&[]), Err(EngineError::InvalidInput(_))));
        assert!(matches!(
            normalize_requests(&[req("Single", 0)]),
            Err(EngineError::InvalidInput(_))
        ));
    }

    #[test]
    fn normalize_caps_total_rooms() {
        let err = normalize_requests(&[req("Single", MAX_ROOMS_PER_BOOKING + 1)]).unwrap_err();
        assert!(matches!(err, EngineError::LimitExceeded(_)));
    }
}
