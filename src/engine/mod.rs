mod billing;
mod booking;
mod capacity;
mod catalog;
mod conflict;
mod error;
mod queries;

pub use capacity::validate_capacity;
pub use error::{EngineError, ErrorClass};

use std::collections::BTreeMap;
use std::future::Future;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot, Mutex, RwLock};
use tracing::warn;
use ulid::Ulid;

use crate::model::*;
use crate::money::Cents;
use crate::observability;
use crate::wal::Wal;

pub type SharedRoomState = Arc<RwLock<RoomState>>;
pub type SharedBooking = Arc<RwLock<Booking>>;
pub type SharedBill = Arc<Mutex<BillLedger>>;

/// Room types keyed by name.
pub type Catalog = BTreeMap<String, RoomType>;

// ── Group-commit WAL channel ─────────────────────────────

pub(super) enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

type PendingAppend = (Event, oneshot::Sender<io::Result<()>>);

/// Background task that owns the WAL and batches appends for group commit.
/// Waits for one append, drains whatever else is already queued, then pays
/// for a single fsync and answers every sender in the batch.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        let (event, response) = match cmd {
            WalCommand::Append { event, response } => (event, response),
            other => {
                handle_command(&mut wal, other);
                continue;
            }
        };

        let mut batch = vec![(event, response)];
        let mut deferred = None;
        loop {
            match rx.try_recv() {
                Ok(WalCommand::Append { event, response }) => batch.push((event, response)),
                Ok(other) => {
                    // Compaction must see every append queued ahead of it.
                    deferred = Some(other);
                    break;
                }
                Err(_) => break,
            }
        }

        commit_batch(&mut wal, &mut batch);
        if let Some(cmd) = deferred {
            handle_command(&mut wal, cmd);
        }
    }
}

fn commit_batch(wal: &mut Wal, batch: &mut Vec<PendingAppend>) {
    metrics::histogram!(observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let flush_start = std::time::Instant::now();

    let mut failure: Option<io::Error> = None;
    for (event, _) in batch.iter() {
        if let Err(e) = wal.append_buffered(event) {
            failure = Some(e);
            break;
        }
    }
    if failure.is_none() {
        failure = wal.flush_sync().err();
    }
    // A failed batch is rejected as a whole; none of it may stay in the file.
    if failure.is_some()
        && let Err(e) = wal.rollback()
    {
        tracing::error!(error = %e, "WAL rollback after failed batch did not complete");
    }
    metrics::histogram!(observability::WAL_FLUSH_DURATION_SECONDS)
        .record(flush_start.elapsed().as_secs_f64());

    for (_, tx) in batch.drain(..) {
        let r = match &failure {
            None => Ok(()),
            Some(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn handle_command(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Append { event, response } => commit_batch(wal, &mut vec![(event, response)]),
        WalCommand::Compact { events, response } => {
            let result = Wal::write_compact_file(wal.path(), &events)
                .and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
    }
}

/// The hotel store: reference data, room occupancy, bookings, bills.
///
/// Every row that a transaction mutates sits behind its own async lock, so
/// unrelated bookings and payments proceed in parallel. Mutations are made
/// durable in the WAL before they are applied to memory.
pub struct Engine {
    pub(super) catalog: RwLock<Catalog>,
    pub(super) branches: DashMap<Ulid, Branch>,
    pub(super) branch_names: DashMap<String, Ulid>,
    pub(super) rooms: DashMap<Ulid, SharedRoomState>,
    /// Immutable room attributes, readable without taking the room lock.
    pub(super) room_info: DashMap<Ulid, RoomInfo>,
    /// Branch → rooms index.
    pub(super) branch_rooms: DashMap<Ulid, Vec<Ulid>>,
    pub(super) bookings: DashMap<Ulid, SharedBooking>,
    /// Keyed by booking id (one bill per booking).
    pub(super) bills: DashMap<Ulid, SharedBill>,
    /// Held shared by every mutation, exclusively by compaction.
    pub(super) commit_gate: RwLock<()>,
    pub(super) wal_tx: mpsc::Sender<WalCommand>,
    pub(super) lock_timeout: Duration,
}

fn occupancy_of(booked: &BookedRoom) -> Occupancy {
    Occupancy {
        booked_room_id: booked.id,
        booking_id: booked.booking_id,
        stay: booked.stay,
        status: booked.status,
    }
}

/// Move a booking and its booked rooms to `status`.
fn set_status(booking: &mut Booking, status: BookingStatus) {
    booking.status = status;
    for booked in &mut booking.booked_rooms {
        booked.status = status.into();
    }
}

/// A cancelled stay voids its bill only while nothing has been collected.
fn cancel_unpaid_bill(ledger: &mut BillLedger) -> bool {
    if ledger.bill.status == BillStatus::Pending && ledger.payments.is_empty() {
        ledger.bill.status = BillStatus::Cancelled;
        ledger.bill.due_amount = 0;
        true
    } else {
        false
    }
}

fn apply_payment(ledger: &mut BillLedger, payment: &Payment, due_amount: Cents, status: BillStatus) {
    ledger.payments.push(payment.clone());
    ledger.bill.due_amount = due_amount;
    ledger.bill.status = status;
}

fn replay_conflict(what: &str) -> io::Error {
    io::Error::other(format!("replay: {what} lock unexpectedly held"))
}

impl Engine {
    pub fn new(wal_path: PathBuf, lock_timeout: Duration) -> io::Result<Self> {
        let events = Wal::recover(&wal_path)?;
        let wal = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let engine = Self {
            catalog: RwLock::new(Catalog::new()),
            branches: DashMap::new(),
            branch_names: DashMap::new(),
            rooms: DashMap::new(),
            room_info: DashMap::new(),
            branch_rooms: DashMap::new(),
            bookings: DashMap::new(),
            bills: DashMap::new(),
            commit_gate: RwLock::new(()),
            wal_tx,
            lock_timeout,
        };

        // We are the sole owner of every lock here, so try_* always succeeds.
        // Never block: this may run inside an async context.
        for event in &events {
            engine.replay_event(event)?;
        }
        tracing::info!(
            events = events.len(),
            bookings = engine.bookings.len(),
            bills = engine.bills.len(),
            "engine state restored"
        );
        Ok(engine)
    }

    fn replay_event(&self, event: &Event) -> io::Result<()> {
        match event {
            Event::BranchCreated { id, name } => self.insert_branch(*id, name.clone()),
            Event::RoomTypeCreated { room_type } => {
                let mut catalog = self.catalog.try_write().map_err(|_| replay_conflict("catalog"))?;
                catalog.insert(room_type.name.clone(), room_type.clone());
            }
            Event::RoomTypeDeleted { name } => {
                let mut catalog = self.catalog.try_write().map_err(|_| replay_conflict("catalog"))?;
                catalog.remove(name);
            }
            Event::RoomCreated { id, branch_id, room_type, number } => {
                self.insert_room(RoomState::new(*id, *branch_id, room_type.clone(), number.clone()));
            }
            Event::BookingCreated { booking } => {
                for booked in booking.booked_rooms.iter().filter(|b| b.status.is_live()) {
                    if let Some(rs) = self.get_room(&booked.room_id) {
                        let mut guard = rs.try_write().map_err(|_| replay_conflict("room"))?;
                        guard.insert_occupancy(occupancy_of(booked));
                    }
                }
                self.bookings.insert(booking.id, Arc::new(RwLock::new(booking.clone())));
            }
            Event::BookingStatusChanged { booking_id, status } => {
                let Some(shared) = self.get_booking(booking_id) else {
                    return Ok(());
                };
                let mut booking = shared.try_write().map_err(|_| replay_conflict("booking"))?;
                set_status(&mut booking, *status);
                for booked in &booking.booked_rooms {
                    if let Some(rs) = self.get_room(&booked.room_id) {
                        let mut guard = rs.try_write().map_err(|_| replay_conflict("room"))?;
                        guard.set_booking_status(*booking_id, (*status).into());
                    }
                }
                if *status == BookingStatus::Cancelled
                    && let Some(bill) = self.get_bill(booking_id)
                {
                    let mut ledger = bill.try_lock().map_err(|_| replay_conflict("bill"))?;
                    cancel_unpaid_bill(&mut ledger);
                }
            }
            Event::BillIssued { ledger } => {
                self.bills
                    .insert(ledger.bill.booking_id, Arc::new(Mutex::new(ledger.clone())));
            }
            Event::PaymentRecorded { booking_id, payment, due_amount, status } => {
                if let Some(bill) = self.get_bill(booking_id) {
                    let mut ledger = bill.try_lock().map_err(|_| replay_conflict("bill"))?;
                    apply_payment(&mut ledger, payment, *due_amount, *status);
                }
            }
        }
        Ok(())
    }

    pub(super) fn insert_branch(&self, id: Ulid, name: String) {
        self.branch_names.insert(name.clone(), id);
        self.branches.insert(id, Branch { id, name });
    }

    pub(super) fn insert_room(&self, room: RoomState) {
        self.branch_rooms.entry(room.branch_id).or_default().push(room.id);
        self.room_info.insert(
            room.id,
            RoomInfo {
                id: room.id,
                branch_id: room.branch_id,
                room_type: room.room_type.clone(),
                number: room.number.clone(),
            },
        );
        self.rooms.insert(room.id, Arc::new(RwLock::new(room)));
    }

    /// Write event to WAL via the background group-commit writer.
    pub(super) async fn wal_append(&self, event: &Event) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    /// Bound a lock acquisition by the configured timeout.
    pub(super) async fn acquire<T>(
        &self,
        what: &'static str,
        lock: impl Future<Output = T>,
    ) -> Result<T, EngineError> {
        match tokio::time::timeout(self.lock_timeout, lock).await {
            Ok(guard) => Ok(guard),
            Err(_) => {
                metrics::counter!(observability::LOCK_TIMEOUTS_TOTAL, "lock" => what).increment(1);
                warn!(lock = what, timeout_ms = self.lock_timeout.as_millis() as u64, "lock wait timed out");
                Err(EngineError::LockTimeout(what))
            }
        }
    }

    pub fn get_room(&self, id: &Ulid) -> Option<SharedRoomState> {
        self.rooms.get(id).map(|e| e.value().clone())
    }

    pub fn get_booking(&self, id: &Ulid) -> Option<SharedBooking> {
        self.bookings.get(id).map(|e| e.value().clone())
    }

    pub fn get_bill(&self, booking_id: &Ulid) -> Option<SharedBill> {
        self.bills.get(booking_id).map(|e| e.value().clone())
    }

    pub fn branch_id_by_name(&self, name: &str) -> Option<Ulid> {
        self.branch_names.get(name).map(|e| *e.value())
    }

    pub fn rooms_in_branch(&self, branch_id: &Ulid) -> Vec<Ulid> {
        self.branch_rooms
            .get(branch_id)
            .map(|e| e.value().clone())
            .unwrap_or_default()
    }

    /// Rewrite the WAL as the minimal set of events that recreates the current state.
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        let _gate = self.commit_gate.write().await;
        let mut events = Vec::new();

        for entry in self.branches.iter() {
            events.push(Event::BranchCreated {
                id: entry.id,
                name: entry.name.clone(),
            });
        }
        for room_type in self.catalog.read().await.values() {
            events.push(Event::RoomTypeCreated { room_type: room_type.clone() });
        }

        for info in self.room_info.iter() {
            events.push(Event::RoomCreated {
                id: info.id,
                branch_id: info.branch_id,
                room_type: info.room_type.clone(),
                number: info.number.clone(),
            });
        }

        let booking_handles: Vec<SharedBooking> =
            self.bookings.iter().map(|e| e.value().clone()).collect();
        for booking in booking_handles {
            events.push(Event::BookingCreated {
                booking: booking.read().await.clone(),
            });
        }

        let bill_handles: Vec<SharedBill> = self.bills.iter().map(|e| e.value().clone()).collect();
        for bill in bill_handles {
            events.push(Event::BillIssued {
                ledger: bill.lock().await.clone(),
            });
        }

        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}
