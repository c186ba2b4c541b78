use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::money::Cents;

/// Half-open stay `[check_in, check_out)` in calendar nights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stay {
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
}

impl Stay {
    pub fn new(check_in: NaiveDate, check_out: NaiveDate) -> Self {
        debug_assert!(check_in < check_out, "Stay check_in must be before check_out");
        Self { check_in, check_out }
    }

    pub fn nights(&self) -> i64 {
        (self.check_out - self.check_in).num_days()
    }

    /// The guest leaving on day D does not collide with one arriving on D.
    pub fn overlaps(&self, other: &Stay) -> bool {
        self.check_in < other.check_out && other.check_in < self.check_out
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomType {
    pub name: String,
    /// Max occupants of one room of this type.
    pub capacity: u32,
    /// Price per night.
    pub base_price: Cents,
    pub amenities: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub id: Ulid,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BookingStatus {
    Confirmed,
    CheckedIn,
    CheckedOut,
    Cancelled,
}

impl BookingStatus {
    /// Confirmed → CheckedIn → CheckedOut, or Confirmed/CheckedIn → Cancelled.
    pub fn can_transition_to(self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, next),
            (Confirmed, CheckedIn) | (CheckedIn, CheckedOut) | (Confirmed, Cancelled) | (CheckedIn, Cancelled)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BookingStatus::Confirmed => "Confirmed",
            BookingStatus::CheckedIn => "CheckedIn",
            BookingStatus::CheckedOut => "CheckedOut",
            BookingStatus::Cancelled => "Cancelled",
        }
    }
}

/// Status of one room assignment. Mirrors the owning booking's status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookedRoomStatus {
    Confirmed,
    CheckedIn,
    CheckedOut,
    Cancelled,
}

impl BookedRoomStatus {
    /// A live assignment still occupies the room for overlap purposes.
    pub fn is_live(self) -> bool {
        matches!(self, BookedRoomStatus::Confirmed | BookedRoomStatus::CheckedIn)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BookedRoomStatus::Confirmed => "Confirmed",
            BookedRoomStatus::CheckedIn => "CheckedIn",
            BookedRoomStatus::CheckedOut => "CheckedOut",
            BookedRoomStatus::Cancelled => "Cancelled",
        }
    }
}

impl From<BookingStatus> for BookedRoomStatus {
    fn from(status: BookingStatus) -> Self {
        match status {
            BookingStatus::Confirmed => BookedRoomStatus::Confirmed,
            BookingStatus::CheckedIn => BookedRoomStatus::CheckedIn,
            BookingStatus::CheckedOut => BookedRoomStatus::CheckedOut,
            BookingStatus::Cancelled => BookedRoomStatus::Cancelled,
        }
    }
}

/// One physical room assigned to one booking for a stay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookedRoom {
    pub id: Ulid,
    pub booking_id: Ulid,
    pub room_id: Ulid,
    pub stay: Stay,
    pub status: BookedRoomStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Ulid,
    pub guest_id: Ulid,
    pub branch_id: Ulid,
    pub booking_date: NaiveDate,
    pub number_of_rooms: u32,
    pub number_of_pax: u32,
    pub stay: Stay,
    pub status: BookingStatus,
    pub booked_rooms: Vec<BookedRoom>,
}

/// Per-room view of a booked room: what the allocator scans for conflicts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Occupancy {
    pub booked_room_id: Ulid,
    pub booking_id: Ulid,
    pub stay: Stay,
    pub status: BookedRoomStatus,
}

#[derive(Debug, Clone)]
pub struct RoomState {
    pub id: Ulid,
    pub branch_id: Ulid,
    pub room_type: String,
    pub number: String,
    /// Live assignments to this room, sorted by `stay.check_in`. Checked-out
    /// and cancelled ones are dropped; the booking keeps their history.
    pub occupancies: Vec<Occupancy>,
}

impl RoomState {
    pub fn new(id: Ulid, branch_id: Ulid, room_type: String, number: String) -> Self {
        Self {
            id,
            branch_id,
            room_type,
            number,
            occupancies: Vec::new(),
        }
    }

    /// Insert maintaining sort order by check-in.
    pub fn insert_occupancy(&mut self, occupancy: Occupancy) {
        let pos = self
            .occupancies
            .binary_search_by_key(&occupancy.stay.check_in, |o| o.stay.check_in)
            .unwrap_or_else(|e| e);
        self.occupancies.insert(pos, occupancy);
    }

    /// Occupancies whose stay overlaps the query, live or not.
    /// Binary search skips everything checking in at or after `query.check_out`.
    pub fn overlapping(&self, query: &Stay) -> impl Iterator<Item = &Occupancy> {
        let right_bound = self
            .occupancies
            .partition_point(|o| o.stay.check_in < query.check_out);
        self.occupancies[..right_bound]
            .iter()
            .filter(move |o| o.stay.check_out > query.check_in)
    }

    /// First live occupancy colliding with `stay`, if any.
    pub fn live_conflict(&self, stay: &Stay) -> Option<&Occupancy> {
        self.overlapping(stay).find(|o| o.status.is_live())
    }

    /// Set the status of every assignment belonging to `booking_id`, or
    /// release them when the new status no longer holds the room.
    pub fn set_booking_status(&mut self, booking_id: Ulid, status: BookedRoomStatus) {
        if !status.is_live() {
            self.occupancies.retain(|o| o.booking_id != booking_id);
            return;
        }
        for occupancy in self.occupancies.iter_mut().filter(|o| o.booking_id == booking_id) {
            occupancy.status = status;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BillStatus {
    Pending,
    Paid,
    Cancelled,
}

impl BillStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            BillStatus::Pending => "Pending",
            BillStatus::Paid => "Paid",
            BillStatus::Cancelled => "Cancelled",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bill {
    pub id: Ulid,
    pub booking_id: Ulid,
    pub branch_id: Ulid,
    pub room_total: Cents,
    pub service_total: Cents,
    pub sub_total: Cents,
    pub tax_amount: Cents,
    pub grand_total: Cents,
    pub due_amount: Cents,
    pub status: BillStatus,
    pub issued_on: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentMethod {
    Cash,
    Card,
    BankTransfer,
    Online,
}

impl PaymentMethod {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace(['_', ' ', '-'], "").as_str() {
            "cash" => Some(PaymentMethod::Cash),
            "card" | "creditcard" | "debitcard" => Some(PaymentMethod::Card),
            "banktransfer" | "transfer" => Some(PaymentMethod::BankTransfer),
            "online" => Some(PaymentMethod::Online),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PaymentMethod::Cash => "Cash",
            PaymentMethod::Card => "Card",
            PaymentMethod::BankTransfer => "BankTransfer",
            PaymentMethod::Online => "Online",
        }
    }
}

/// Append-only ledger line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: Ulid,
    pub bill_id: Ulid,
    pub method: PaymentMethod,
    pub paid_amount: Cents,
    pub payment_date: DateTime<Utc>,
    pub reference: String,
}

/// A bill together with its payment history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillLedger {
    pub bill: Bill,
    pub payments: Vec<Payment>,
}

/// The WAL record format. One record per committed transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    BranchCreated {
        id: Ulid,
        name: String,
    },
    RoomTypeCreated {
        room_type: RoomType,
    },
    RoomTypeDeleted {
        name: String,
    },
    RoomCreated {
        id: Ulid,
        branch_id: Ulid,
        room_type: String,
        number: String,
    },
    /// The booking header and all of its booked rooms, committed together.
    BookingCreated {
        booking: Booking,
    },
    BookingStatusChanged {
        booking_id: Ulid,
        status: BookingStatus,
    },
    /// Live issuance carries no payments; compaction snapshots carry the history.
    BillIssued {
        ledger: BillLedger,
    },
    PaymentRecorded {
        booking_id: Ulid,
        payment: Payment,
        due_amount: Cents,
        status: BillStatus,
    },
}

// ── Request / result types ───────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomRequest {
    pub room_type: String,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingRequest {
    pub guest_id: Ulid,
    pub branch_name: String,
    pub number_of_pax: u32,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub booking_date: NaiveDate,
    pub rooms: Vec<RoomRequest>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingReceipt {
    pub booking_id: Ulid,
    pub message: String,
    pub booked_rooms: Vec<BookedRoom>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentReceipt {
    pub bill: Bill,
    pub payment: Payment,
}

/// Which bookings a caller may list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingScope {
    All,
    Branch(Ulid),
    Guest(Ulid),
}

impl BookingScope {
    pub fn allows(self, booking: &Booking) -> bool {
        match self {
            BookingScope::All => true,
            BookingScope::Branch(id) => booking.branch_id == id,
            BookingScope::Guest(id) => booking.guest_id == id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomInfo {
    pub id: Ulid,
    pub branch_id: Ulid,
    pub room_type: String,
    pub number: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OccupiedRoom {
    pub room_id: Ulid,
    pub number: String,
    pub room_type: String,
    pub booking_id: Ulid,
    pub stay: Stay,
    pub status: BookedRoomStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeAvailability {
    pub room_type: String,
    pub capacity: u32,
    pub base_price: Cents,
    pub total_rooms: u32,
    pub free_rooms: u32,
}
