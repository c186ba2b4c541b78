use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info};
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;
use crate::observability;

use super::capacity::{normalize_requests, validate_capacity};
use super::conflict::{allocate_rooms, validate_name, validate_stay};
use super::{cancel_unpaid_bill, occupancy_of, set_status, Engine, EngineError};

impl Engine {
    /// Allocate rooms and record a confirmed booking in one transaction.
    ///
    /// Either every requested room is assigned or nothing is written. All
    /// candidate rooms in the branch are write-locked in id order for the
    /// duration, so two requests racing for the same last room serialize and
    /// the loser sees `NoRoomsAvailable`.
    pub async fn create_booking(&self, request: BookingRequest) -> Result<BookingReceipt, EngineError> {
        let branch = request.branch_name.clone();
        let result = self.create_booking_tx(request).await;
        let outcome = match &result {
            Ok(_) => "confirmed",
            Err(e) => e.kind(),
        };
        metrics::counter!(observability::BOOKINGS_TOTAL, "outcome" => outcome).increment(1);
        if let Err(ref e) = result {
            debug!(branch = %branch, error = %e, "booking rejected");
        }
        result
    }

    async fn create_booking_tx(&self, request: BookingRequest) -> Result<BookingReceipt, EngineError> {
        // Validation: nothing locked yet.
        let stay = validate_stay(request.check_in, request.check_out)?;
        validate_name("branch name", &request.branch_name, MAX_NAME_LEN)?;
        let wanted = normalize_requests(&request.rooms)?;
        {
            let catalog = self.acquire("catalog", self.catalog.read()).await?;
            validate_capacity(&catalog, &wanted, request.number_of_pax)?;
        }

        let _gate = self.acquire("commit gate", self.commit_gate.read()).await?;
        // Held until commit: a room type cannot vanish under us.
        let catalog = self.acquire("catalog", self.catalog.read()).await?;
        validate_capacity(&catalog, &wanted, request.number_of_pax)?;

        let branch_id = self
            .branch_id_by_name(&request.branch_name)
            .ok_or_else(|| EngineError::BranchNotFound(request.branch_name.clone()))?;

        let mut candidate_ids: Vec<Ulid> = self
            .rooms_in_branch(&branch_id)
            .into_iter()
            .filter(|id| {
                self.room_info
                    .get(id)
                    .is_some_and(|info| wanted.iter().any(|r| r.room_type == info.room_type))
            })
            .collect();
        candidate_ids.sort();
        candidate_ids.dedup();

        // Acquire write locks in sorted order to prevent deadlocks.
        let mut guards = Vec::with_capacity(candidate_ids.len());
        let mut guard_index = HashMap::with_capacity(candidate_ids.len());
        for id in &candidate_ids {
            let rs = self.get_room(id).ok_or(EngineError::RoomNotFound(*id))?;
            let guard = self.acquire("room", rs.write_owned()).await?;
            guard_index.insert(*id, guards.len());
            guards.push(guard);
        }

        let chosen = {
            let views: Vec<&RoomState> = guards.iter().map(|g| &**g).collect();
            allocate_rooms(&views, &wanted, &stay)?
        };
        for room_id in &chosen {
            if guards[guard_index[room_id]].occupancies.len() >= MAX_OCCUPANCIES_PER_ROOM {
                return Err(EngineError::LimitExceeded("too many bookings on room"));
            }
        }

        let booking_id = Ulid::new();
        let booked_rooms: Vec<BookedRoom> = chosen
            .iter()
            .map(|room_id| BookedRoom {
                id: Ulid::new(),
                booking_id,
                room_id: *room_id,
                stay,
                status: BookedRoomStatus::Confirmed,
            })
            .collect();
        let booking = Booking {
            id: booking_id,
            guest_id: request.guest_id,
            branch_id,
            booking_date: request.booking_date,
            number_of_rooms: booked_rooms.len() as u32,
            number_of_pax: request.number_of_pax,
            stay,
            status: BookingStatus::Confirmed,
            booked_rooms,
        };

        let event = Event::BookingCreated { booking: booking.clone() };
        self.wal_append(&event).await?;

        for booked in &booking.booked_rooms {
            guards[guard_index[&booked.room_id]].insert_occupancy(occupancy_of(booked));
        }
        let booked_rooms = booking.booked_rooms.clone();
        self.bookings.insert(booking_id, Arc::new(RwLock::new(booking)));
        drop(guards);
        drop(catalog);

        info!(
            booking_id = %booking_id,
            guest_id = %request.guest_id,
            branch = %request.branch_name,
            rooms = booked_rooms.len(),
            pax = request.number_of_pax,
            check_in = %stay.check_in,
            check_out = %stay.check_out,
            "booking confirmed"
        );
        Ok(BookingReceipt {
            booking_id,
            message: format!(
                "Booking confirmed: {} room(s) at {} from {} to {}",
                booked_rooms.len(),
                request.branch_name,
                stay.check_in,
                stay.check_out
            ),
            booked_rooms,
        })
    }

    /// Move a booking along its lifecycle. `branch_scope` restricts the
    /// lookup to one branch; a booking elsewhere reads as not found.
    ///
    /// Booked rooms follow the booking, so checking out or cancelling frees
    /// the rooms for overlapping stays. Cancelling also voids a bill that has
    /// not collected anything yet.
    pub async fn set_booking_status(
        &self,
        booking_id: Ulid,
        branch_scope: Option<Ulid>,
        status: BookingStatus,
    ) -> Result<Booking, EngineError> {
        let _gate = self.acquire("commit gate", self.commit_gate.read()).await?;
        let shared = self
            .get_booking(&booking_id)
            .ok_or(EngineError::BookingNotFound(booking_id))?;
        let mut booking = self.acquire("booking", shared.write_owned()).await?;
        if branch_scope.is_some_and(|b| b != booking.branch_id) {
            return Err(EngineError::BookingNotFound(booking_id));
        }
        if !booking.status.can_transition_to(status) {
            return Err(EngineError::InvalidTransition {
                from: booking.status,
                to: status,
            });
        }

        let mut room_ids: Vec<Ulid> = booking.booked_rooms.iter().map(|b| b.room_id).collect();
        room_ids.sort();
        room_ids.dedup();
        let mut room_guards = Vec::with_capacity(room_ids.len());
        for id in &room_ids {
            let rs = self.get_room(id).ok_or(EngineError::RoomNotFound(*id))?;
            room_guards.push(self.acquire("room", rs.write_owned()).await?);
        }
        let mut bill_guard = match self.get_bill(&booking_id) {
            Some(bill) if status == BookingStatus::Cancelled => {
                Some(self.acquire("bill", bill.lock_owned()).await?)
            }
            _ => None,
        };

        let event = Event::BookingStatusChanged { booking_id, status };
        self.wal_append(&event).await?;

        let from = booking.status;
        set_status(&mut booking, status);
        for guard in room_guards.iter_mut() {
            guard.set_booking_status(booking_id, status.into());
        }
        let bill_voided = bill_guard.as_mut().is_some_and(|ledger| cancel_unpaid_bill(ledger));

        info!(
            booking_id = %booking_id,
            from = from.as_str(),
            to = status.as_str(),
            bill_voided,
            "booking status changed"
        );
        Ok(booking.clone())
    }
}
