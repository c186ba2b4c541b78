use chrono::NaiveDate;
use ulid::Ulid;

use crate::model::*;

use super::conflict::validate_stay;
use super::{Engine, EngineError};

fn by_room_number(a: &str, b: &str) -> std::cmp::Ordering {
    (a.len(), a).cmp(&(b.len(), b))
}

impl Engine {
    pub fn list_branches(&self) -> Vec<Branch> {
        let mut branches: Vec<Branch> = self.branches.iter().map(|e| e.value().clone()).collect();
        branches.sort_by(|a, b| a.name.cmp(&b.name));
        branches
    }

    pub async fn list_room_types(&self) -> Vec<RoomType> {
        self.catalog.read().await.values().cloned().collect()
    }

    pub fn list_rooms(&self, branch_id: Option<Ulid>) -> Vec<RoomInfo> {
        let mut rooms: Vec<RoomInfo> = self
            .room_info
            .iter()
            .filter(|info| branch_id.is_none_or(|b| info.branch_id == b))
            .map(|info| info.value().clone())
            .collect();
        rooms.sort_by(|a, b| {
            a.branch_id
                .cmp(&b.branch_id)
                .then_with(|| by_room_number(&a.number, &b.number))
        });
        rooms
    }

    pub fn room(&self, room_id: &Ulid) -> Option<RoomInfo> {
        self.room_info.get(room_id).map(|info| info.value().clone())
    }

    /// A single booking, if `scope` may see it.
    pub async fn booking(&self, booking_id: Ulid, scope: BookingScope) -> Option<Booking> {
        let shared = self.get_booking(&booking_id)?;
        let booking = shared.read().await;
        scope.allows(&booking).then(|| booking.clone())
    }

    /// Bookings visible to `scope`, oldest first.
    pub async fn list_bookings(&self, scope: BookingScope) -> Vec<Booking> {
        let handles: Vec<_> = self.bookings.iter().map(|e| e.value().clone()).collect();
        let mut out = Vec::new();
        for shared in handles {
            let booking = shared.read().await;
            if scope.allows(&booking) {
                out.push(booking.clone());
            }
        }
        // ULIDs sort by creation time.
        out.sort_by_key(|b| b.id);
        out
    }

    /// Live assignments in a branch overlapping `[check_in, check_out)`.
    pub async fn occupied_rooms(
        &self,
        branch_name: &str,
        check_in: NaiveDate,
        check_out: NaiveDate,
    ) -> Result<Vec<OccupiedRoom>, EngineError> {
        let stay = validate_stay(check_in, check_out)?;
        let branch_id = self
            .branch_id_by_name(branch_name)
            .ok_or_else(|| EngineError::BranchNotFound(branch_name.to_string()))?;

        let mut out = Vec::new();
        for room_id in self.rooms_in_branch(&branch_id) {
            let Some(rs) = self.get_room(&room_id) else { continue };
            let guard = rs.read().await;
            for occupancy in guard.overlapping(&stay).filter(|o| o.status.is_live()) {
                out.push(OccupiedRoom {
                    room_id: guard.id,
                    number: guard.number.clone(),
                    room_type: guard.room_type.clone(),
                    booking_id: occupancy.booking_id,
                    stay: occupancy.stay,
                    status: occupancy.status,
                });
            }
        }
        out.sort_by(|a, b| {
            by_room_number(&a.number, &b.number).then(a.stay.check_in.cmp(&b.stay.check_in))
        });
        Ok(out)
    }

    /// Free room count per room type in a branch for a prospective stay.
    ///
    /// A snapshot: a booking placed right after may still find nothing free.
    pub async fn availability_by_type(
        &self,
        branch_name: &str,
        check_in: NaiveDate,
        check_out: NaiveDate,
    ) -> Result<Vec<TypeAvailability>, EngineError> {
        let stay = validate_stay(check_in, check_out)?;
        let branch_id = self
            .branch_id_by_name(branch_name)
            .ok_or_else(|| EngineError::BranchNotFound(branch_name.to_string()))?;

        let mut out: Vec<TypeAvailability> = self
            .list_room_types()
            .await
            .into_iter()
            .map(|t| TypeAvailability {
                room_type: t.name,
                capacity: t.capacity,
                base_price: t.base_price,
                total_rooms: 0,
                free_rooms: 0,
            })
            .collect();

        for room_id in self.rooms_in_branch(&branch_id) {
            let Some(rs) = self.get_room(&room_id) else { continue };
            let guard = rs.read().await;
            let Some(entry) = out.iter_mut().find(|a| a.room_type == guard.room_type) else {
                continue;
            };
            entry.total_rooms += 1;
            if guard.live_conflict(&stay).is_none() {
                entry.free_rooms += 1;
            }
        }
        out.retain(|a| a.total_rooms > 0);
        Ok(out)
    }
}
