use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info};
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;
use crate::money::{apply_rate_bps, format_cents, Cents};
use crate::observability;

use super::conflict::today;
use super::{apply_payment, Engine, EngineError};

fn total_too_large() -> EngineError {
    EngineError::LimitExceeded("bill total too large")
}

impl Engine {
    /// Price a booking and open its bill.
    ///
    /// `room_total` is every booked room's nightly base price times the
    /// number of nights. Tax is charged on room and service totals together
    /// and rounded half away from zero to the cent.
    pub async fn issue_bill(
        &self,
        booking_id: Ulid,
        branch_scope: Option<Ulid>,
        service_total: Cents,
        tax_rate_bps: u32,
    ) -> Result<Bill, EngineError> {
        if service_total < 0 {
            return Err(EngineError::InvalidInput("service total must not be negative".into()));
        }
        if service_total > MAX_AMOUNT_CENTS {
            return Err(EngineError::LimitExceeded("service total too large"));
        }
        if tax_rate_bps > MAX_TAX_RATE_BPS {
            return Err(EngineError::InvalidInput("tax rate must not exceed 100%".into()));
        }

        let _gate = self.acquire("commit gate", self.commit_gate.read()).await?;
        let catalog = self.acquire("catalog", self.catalog.read()).await?;
        let shared = self
            .get_booking(&booking_id)
            .ok_or(EngineError::BookingNotFound(booking_id))?;
        let booking = self.acquire("booking", shared.write_owned()).await?;
        if branch_scope.is_some_and(|b| b != booking.branch_id) {
            return Err(EngineError::BookingNotFound(booking_id));
        }
        if booking.status == BookingStatus::Cancelled {
            return Err(EngineError::InvalidTransition {
                from: booking.status,
                to: BookingStatus::CheckedOut,
            });
        }
        if self.bills.contains_key(&booking_id) {
            return Err(EngineError::AlreadyExists(format!("bill for booking {booking_id}")));
        }

        let mut room_total: Cents = 0;
        for booked in &booking.booked_rooms {
            let room_type = self
                .room_info
                .get(&booked.room_id)
                .map(|info| info.room_type.clone())
                .ok_or(EngineError::RoomNotFound(booked.room_id))?;
            let price = catalog
                .get(&room_type)
                .map(|t| t.base_price)
                .ok_or(EngineError::InvalidRoomType(room_type))?;
            let line = price.checked_mul(booked.stay.nights()).ok_or_else(total_too_large)?;
            room_total = room_total.checked_add(line).ok_or_else(total_too_large)?;
        }
        drop(catalog);

        let sub_total = room_total.checked_add(service_total).ok_or_else(total_too_large)?;
        let tax_amount = apply_rate_bps(sub_total, tax_rate_bps).ok_or_else(total_too_large)?;
        let grand_total = sub_total.checked_add(tax_amount).ok_or_else(total_too_large)?;

        let bill = Bill {
            id: Ulid::new(),
            booking_id,
            branch_id: booking.branch_id,
            room_total,
            service_total,
            sub_total,
            tax_amount,
            grand_total,
            due_amount: grand_total,
            status: BillStatus::Pending,
            issued_on: today(),
        };
        let ledger = BillLedger {
            bill: bill.clone(),
            payments: Vec::new(),
        };
        let event = Event::BillIssued { ledger: ledger.clone() };
        self.wal_append(&event).await?;
        self.bills.insert(booking_id, Arc::new(Mutex::new(ledger)));

        info!(
            booking_id = %booking_id,
            bill_id = %bill.id,
            grand_total = %format_cents(grand_total),
            "bill issued"
        );
        Ok(bill)
    }

    /// Current bill and payment history for a booking.
    pub async fn get_bill_by_booking(
        &self,
        booking_id: Ulid,
        branch_scope: Option<Ulid>,
    ) -> Result<BillLedger, EngineError> {
        let shared = self
            .get_bill(&booking_id)
            .ok_or(EngineError::BillNotFound(booking_id))?;
        let ledger = self.acquire("bill", shared.lock_owned()).await?;
        if branch_scope.is_some_and(|b| b != ledger.bill.branch_id) {
            return Err(EngineError::BillNotFound(booking_id));
        }
        Ok(ledger.clone())
    }

    /// Record a payment against a booking's bill.
    ///
    /// The bill row is locked for the whole check-and-write, so concurrent
    /// payments on one bill serialize and can never push the due amount
    /// below zero.
    pub async fn pay_bill(
        &self,
        booking_id: Ulid,
        branch_scope: Option<Ulid>,
        method: PaymentMethod,
        amount: Cents,
    ) -> Result<PaymentReceipt, EngineError> {
        let result = self.pay_bill_tx(booking_id, branch_scope, method, amount).await;
        let outcome = match &result {
            Ok(receipt) => match receipt.bill.status {
                BillStatus::Paid => "paid",
                _ => "partial",
            },
            Err(e) => e.kind(),
        };
        metrics::counter!(observability::PAYMENTS_TOTAL, "outcome" => outcome).increment(1);
        if let Err(ref e) = result {
            debug!(booking_id = %booking_id, error = %e, "payment rejected");
        }
        result
    }

    async fn pay_bill_tx(
        &self,
        booking_id: Ulid,
        branch_scope: Option<Ulid>,
        method: PaymentMethod,
        amount: Cents,
    ) -> Result<PaymentReceipt, EngineError> {
        if amount <= 0 {
            return Err(EngineError::InvalidInput("payment amount must be positive".into()));
        }
        if amount > MAX_AMOUNT_CENTS {
            return Err(EngineError::LimitExceeded("payment amount too large"));
        }

        let _gate = self.acquire("commit gate", self.commit_gate.read()).await?;
        let shared = self
            .get_bill(&booking_id)
            .ok_or(EngineError::BillNotFound(booking_id))?;
        let mut ledger = self.acquire("bill", shared.lock_owned()).await?;
        if branch_scope.is_some_and(|b| b != ledger.bill.branch_id) {
            return Err(EngineError::BillNotFound(booking_id));
        }
        match ledger.bill.status {
            BillStatus::Paid => return Err(EngineError::AlreadyPaid(booking_id)),
            BillStatus::Cancelled => return Err(EngineError::BillCancelled(booking_id)),
            BillStatus::Pending => {}
        }
        let due = ledger.bill.due_amount;
        if amount > due {
            return Err(EngineError::OverpaymentRejected { amount, due });
        }
        if ledger.payments.len() >= MAX_PAYMENTS_PER_BILL {
            return Err(EngineError::LimitExceeded("too many payments on bill"));
        }

        let payment_id = Ulid::new();
        let payment = Payment {
            id: payment_id,
            bill_id: ledger.bill.id,
            method,
            paid_amount: amount,
            payment_date: Utc::now(),
            reference: format!("PAY-{payment_id}"),
        };
        let due_amount = due - amount;
        let status = if due_amount <= 0 {
            BillStatus::Paid
        } else {
            BillStatus::Pending
        };

        let event = Event::PaymentRecorded {
            booking_id,
            payment: payment.clone(),
            due_amount,
            status,
        };
        self.wal_append(&event).await?;
        apply_payment(&mut ledger, &payment, due_amount, status);

        info!(
            booking_id = %booking_id,
            reference = %payment.reference,
            method = method.as_str(),
            amount = %format_cents(amount),
            due = %format_cents(due_amount),
            status = status.as_str(),
            "payment recorded"
        );
        Ok(PaymentReceipt {
            bill: ledger.bill.clone(),
            payment,
        })
    }
}
