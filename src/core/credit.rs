//! Customer credit bookkeeping.
//!
//! `available_credit` is adjusted incrementally, never recomputed. Every function here
//! takes the customer row with `SELECT ... FOR UPDATE` first, so a check and the write
//! that depends on it happen against the same locked row inside the caller's
//! transaction.

use crate::{
    entities::{Customer, customer},
    errors::{EligibilityError, Error, Result},
};
use rust_decimal::Decimal;
use sea_orm::{QuerySelect, Set, prelude::*};
use tracing::debug;

/// Reads a customer and locks the row for the rest of the surrounding transaction.
pub async fn lock_customer<C>(conn: &C, customer_id: i64) -> Result<customer::Model>
where
    C: ConnectionTrait,
{
    Customer::find_by_id(customer_id)
        .lock_exclusive()
        .one(conn)
        .await?
        .ok_or_else(|| Error::not_found("Customer", customer_id))
}

async fn adjust_available_credit<C>(
    conn: &C,
    customer: customer::Model,
    delta: Decimal,
) -> Result<customer::Model>
where
    C: ConnectionTrait,
{
    let customer_id = customer.id;
    let new_available = customer.available_credit + delta;
    let mut active: customer::ActiveModel = customer.into();
    active.available_credit = Set(new_available);
    let updated = active.update(conn).await?;
    debug!(
        customer_id,
        %delta,
        available_credit = %updated.available_credit,
        "Adjusted available credit"
    );
    Ok(updated)
}

/// Draws `amount` from the customer's available credit.
///
/// Fails with [`EligibilityError::InsufficientCredit`] when the locked row does not
/// have enough credit left, which is what stops two concurrent settlements from
/// spending the same credit.
pub async fn consume_credit<C>(
    conn: &C,
    customer_id: i64,
    amount: Decimal,
) -> Result<customer::Model>
where
    C: ConnectionTrait,
{
    if amount <= Decimal::ZERO {
        return Err(Error::InvalidAmount { amount });
    }

    let customer = lock_customer(conn, customer_id).await?;
    if amount > customer.available_credit {
        return Err(EligibilityError::InsufficientCredit {
            requested: amount,
            available: customer.available_credit,
            shortfall: amount - customer.available_credit,
        }
        .into());
    }

    adjust_available_credit(conn, customer, -amount).await
}

/// Gives `amount` back to the customer's available credit.
pub async fn release_credit<C>(
    conn: &C,
    customer_id: i64,
    amount: Decimal,
) -> Result<customer::Model>
where
    C: ConnectionTrait,
{
    if amount < Decimal::ZERO {
        return Err(Error::InvalidAmount { amount });
    }
    let customer = lock_customer(conn, customer_id).await?;
    if amount.is_zero() {
        return Ok(customer);
    }
    adjust_available_credit(conn, customer, amount).await
}

/// Takes back credit that an earlier release returned, without a sufficiency check.
///
/// Used when the event that released the credit is undone (a deleted payment), so the
/// obligation is outstanding again whether or not credit has been spent elsewhere since.
pub async fn reclaim_credit<C>(
    conn: &C,
    customer_id: i64,
    amount: Decimal,
) -> Result<customer::Model>
where
    C: ConnectionTrait,
{
    if amount < Decimal::ZERO {
        return Err(Error::InvalidAmount { amount });
    }
    let customer = lock_customer(conn, customer_id).await?;
    if amount.is_zero() {
        return Ok(customer);
    }
    adjust_available_credit(conn, customer, -amount).await
}

/// Outstanding part of a store-credit slot once `paid` has been received on the order.
///
/// Payments settle the store-credit portion first.
#[must_use]
pub fn store_credit_outstanding(store_credit: Decimal, paid: Decimal) -> Decimal {
    store_credit - paid.min(store_credit).max(Decimal::ZERO)
}
