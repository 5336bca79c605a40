//! Payment tracking - partial settlements registered against an order.
//!
//! The paid amount, remaining amount and payment status of an order are never stored.
//! They are recomputed from the order's full payment set every time, inside the same
//! database transaction as the write that changes that set.

use crate::{
    config::ReversalPolicy,
    core::{
        credit, installment,
        ledger::{self, NewEntry},
    },
    entities::{
        Order, Payment, Transaction,
        enums::{OrderStatus, PaymentMethod, ReferenceType},
        order, payment,
    },
    errors::{Error, Result},
};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{QueryOrder, QuerySelect, Set, TransactionTrait, prelude::*};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Derived settlement state of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    /// Nothing paid yet
    Unpaid,
    /// Something paid, something left
    Partial,
    /// Fully paid
    Paid,
}

/// Derives the payment status from the order total and the amount paid so far.
#[must_use]
pub fn payment_status(total: Decimal, paid_amount: Decimal) -> PaymentStatus {
    if paid_amount.is_zero() {
        PaymentStatus::Unpaid
    } else if paid_amount >= total {
        PaymentStatus::Paid
    } else {
        PaymentStatus::Partial
    }
}

/// Paid/remaining figures of one order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentSummary {
    pub order_id: i64,
    pub total: Decimal,
    pub paid_amount: Decimal,
    pub remaining_amount: Decimal,
    pub payment_status: PaymentStatus,
}

impl PaymentSummary {
    /// Builds the summary from the order and its complete payment set.
    #[must_use]
    pub fn from_payments(order: &order::Model, payments: &[payment::Model]) -> Self {
        let paid_amount: Decimal = payments.iter().map(|p| p.amount).sum();
        Self {
            order_id: order.id,
            total: order.total,
            paid_amount,
            remaining_amount: order.total - paid_amount,
            payment_status: payment_status(order.total, paid_amount),
        }
    }
}

/// A payment to register.
#[derive(Debug, Clone, Deserialize)]
pub struct NewPayment {
    /// Amount received, must be positive and not above the remaining balance
    pub amount: Decimal,
    /// How the money was received
    pub payment_method: PaymentMethod,
    /// Date received, defaults to today
    #[serde(default)]
    pub payment_date: Option<NaiveDate>,
    /// Free-form notes
    #[serde(default)]
    pub notes: Option<String>,
    /// Deposit the money into this bank account
    #[serde(default)]
    pub bank_account_id: Option<i64>,
}

/// A registered payment with the order's updated figures.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentReceipt {
    pub payment: payment::Model,
    pub summary: PaymentSummary,
}

async fn find_order<C>(conn: &C, order_id: i64) -> Result<order::Model>
where
    C: ConnectionTrait,
{
    Order::find_by_id(order_id)
        .lock_exclusive()
        .one(conn)
        .await?
        .ok_or_else(|| Error::not_found("Order", order_id))
}

async fn payments_for_order<C>(conn: &C, order_id: i64) -> Result<Vec<payment::Model>>
where
    C: ConnectionTrait,
{
    Payment::find()
        .filter(payment::Column::OrderId.eq(order_id))
        .order_by_asc(payment::Column::Id)
        .all(conn)
        .await
        .map_err(Into::into)
}

/// Moves store credit according to how the paid amount changed. Payments settle the
/// store-credit slot first, so only the part of the change that falls inside that slot
/// touches the customer's available credit.
async fn sync_store_credit<C>(
    conn: &C,
    order: &order::Model,
    paid_before: Decimal,
    paid_after: Decimal,
) -> Result<()>
where
    C: ConnectionTrait,
{
    let store_credit = order.amount_for(PaymentMethod::StoreCredit);
    let Some(customer_id) = order.customer_id else {
        return Ok(());
    };
    if store_credit.is_zero() || order.status == OrderStatus::Cancelled {
        return Ok(());
    }

    let before = credit::store_credit_outstanding(store_credit, paid_before);
    let after = credit::store_credit_outstanding(store_credit, paid_after);
    if after < before {
        credit::release_credit(conn, customer_id, before - after).await?;
    } else if after > before {
        credit::reclaim_credit(conn, customer_id, after - before).await?;
    }
    Ok(())
}

/// Registers a payment against an order.
///
/// The order row is locked and the remaining balance is computed from the live payment
/// set in the same transaction that inserts the payment, so two concurrent payments
/// cannot together exceed the order total. Amounts still held by PENDING or OVERDUE
/// installments cannot be paid here; once an installment is marked paid its amount
/// can be recorded.
pub async fn register_payment(
    db: &DatabaseConnection,
    order_id: i64,
    new_payment: NewPayment,
) -> Result<PaymentReceipt> {
    let amount = new_payment.amount;
    if amount <= Decimal::ZERO {
        return Err(Error::InvalidAmount { amount });
    }

    let txn = db.begin().await?;

    let order = find_order(&txn, order_id).await?;
    if order.status == OrderStatus::Cancelled {
        return Err(Error::InvalidOrderState {
            order_id,
            reason: "order is cancelled".to_string(),
        });
    }

    let existing = payments_for_order(&txn, order_id).await?;
    let before = PaymentSummary::from_payments(&order, &existing);
    if amount > before.remaining_amount {
        return Err(Error::PaymentExceedsRemaining {
            amount,
            remaining: before.remaining_amount,
        });
    }

    // Boleto money arrives through the installments themselves
    let held: Decimal = installment::installments_for_order(&txn, order_id)
        .await?
        .iter()
        .filter(|i| i.status.is_outstanding())
        .map(|i| i.amount)
        .sum();
    if amount > before.remaining_amount - held {
        return Err(Error::InvalidOrderState {
            order_id,
            reason: format!("{held} of the remaining balance is held by open installments"),
        });
    }

    let payment_date = new_payment
        .payment_date
        .unwrap_or_else(|| Utc::now().date_naive());
    let created = payment::ActiveModel {
        order_id: Set(order_id),
        amount: Set(amount),
        payment_method: Set(new_payment.payment_method),
        payment_date: Set(payment_date),
        notes: Set(new_payment.notes),
        bank_account_id: Set(new_payment.bank_account_id),
        ledger_transaction_id: Set(None),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    let created = if let Some(account_id) = new_payment.bank_account_id {
        let entry = ledger::apply_entry(
            &txn,
            account_id,
            NewEntry::credit(amount, format!("Payment for order {}", order.order_number))
                .with_reference(ReferenceType::Payment, created.id.to_string()),
        )
        .await?;
        let mut active: payment::ActiveModel = created.into();
        active.ledger_transaction_id = Set(Some(entry.id));
        active.update(&txn).await?
    } else {
        created
    };

    sync_store_credit(&txn, &order, before.paid_amount, before.paid_amount + amount).await?;

    let mut payments = existing;
    payments.push(created.clone());
    let summary = PaymentSummary::from_payments(&order, &payments);

    txn.commit().await?;

    info!(
        order_id,
        payment_id = created.id,
        %amount,
        remaining = %summary.remaining_amount,
        status = ?summary.payment_status,
        "Payment registered"
    );

    Ok(PaymentReceipt {
        payment: created,
        summary,
    })
}

/// Deletes a payment, reversing its bank deposit if it had one, and returns the order's
/// figures recomputed from the payments that remain.
///
/// The deposit reversal follows `policy` like any other ledger reversal.
pub async fn delete_payment(
    db: &DatabaseConnection,
    policy: ReversalPolicy,
    payment_id: i64,
) -> Result<PaymentSummary> {
    let txn = db.begin().await?;

    let target = Payment::find_by_id(payment_id)
        .one(&txn)
        .await?
        .ok_or_else(|| Error::not_found("Payment", payment_id))?;
    let order = find_order(&txn, target.order_id).await?;

    let paid_before: Decimal = payments_for_order(&txn, order.id)
        .await?
        .iter()
        .map(|p| p.amount)
        .sum();

    if let Some(entry_id) = target.ledger_transaction_id {
        match Transaction::find_by_id(entry_id).one(&txn).await? {
            Some(entry) => {
                ledger::ensure_reversible(&txn, policy, &entry).await?;
                ledger::reverse_entry(&txn, entry).await?;
            }
            None => warn!(payment_id, entry_id, "Ledger entry of payment already gone"),
        }
    }

    target.delete(&txn).await?;

    let remaining = payments_for_order(&txn, order.id).await?;
    let summary = PaymentSummary::from_payments(&order, &remaining);
    sync_store_credit(&txn, &order, paid_before, summary.paid_amount).await?;

    txn.commit().await?;

    info!(
        order_id = order.id,
        payment_id,
        remaining = %summary.remaining_amount,
        status = ?summary.payment_status,
        "Payment deleted"
    );
    Ok(summary)
}

/// Retrieves an order's payments and derived figures.
pub async fn get_payment_summary(
    db: &DatabaseConnection,
    order_id: i64,
) -> Result<(PaymentSummary, Vec<payment::Model>)> {
    let order = Order::find_by_id(order_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Order", order_id))?;
    let payments = payments_for_order(db, order_id).await?;
    Ok((PaymentSummary::from_payments(&order, &payments), payments))
}
