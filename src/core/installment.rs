//! Installment (boleto) generation and lifecycle.
//!
//! Every installment that is PENDING or OVERDUE holds its amount out of the customer's
//! `available_credit`. Paying or voiding one gives that amount back; nothing else here
//! touches credit.

use crate::{
    core::{credit, round_money},
    entities::{
        Customer, Installment, Order, customer,
        enums::InstallmentStatus,
        installment, order,
    },
    errors::{Error, Result},
    gateway::{BoletoRequest, Payer, PaymentGateway},
};
use chrono::{Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{QueryOrder, QuerySelect, Set, TransactionTrait, prelude::*};
use serde::Serialize;
use tracing::{info, warn};

/// One installment of a schedule before it is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedInstallment {
    pub number: i32,
    pub total: i32,
    pub amount: Decimal,
    pub due_date: NaiveDate,
}

/// Parses `<count>x-<d1>-...-<dN>` into day offsets. `None` when the count is missing,
/// zero, does not match the number of offsets, or any offset is not a non-negative
/// integer.
#[must_use]
pub fn parse_schedule(schedule: &str) -> Option<Vec<i64>> {
    let mut parts = schedule.trim().split('-');
    let count: usize = parts.next()?.strip_suffix(['x', 'X'])?.parse().ok()?;
    let offsets = parts
        .map(|part| part.trim().parse::<i64>().ok().filter(|days| *days >= 0))
        .collect::<Option<Vec<_>>>()?;

    (count > 0 && offsets.len() == count).then_some(offsets)
}

/// Date `days` after `today`, or `None` when it falls outside the calendar range.
#[must_use]
pub fn due_in(today: NaiveDate, days: i64) -> Option<NaiveDate> {
    Duration::try_days(days).and_then(|offset| today.checked_add_signed(offset))
}

/// Due-date offset for a customer, falling back to the configured default when the
/// customer has no usable term of their own.
///
/// # Errors
/// `Validation` when neither term yields a representable due date.
pub fn effective_terms(customer_terms: i32, default_terms: i32, today: NaiveDate) -> Result<i64> {
    let customer_terms = i64::from(customer_terms);
    if customer_terms > 0 && due_in(today, customer_terms).is_some() {
        return Ok(customer_terms);
    }
    if customer_terms > 0 {
        warn!(customer_terms, default_terms, "Customer payment terms out of range, using default");
    }

    let default_terms = i64::from(default_terms.max(0));
    match due_in(today, default_terms) {
        Some(_) => Ok(default_terms),
        None => Err(Error::validation(format!(
            "Payment terms of {default_terms} days are out of range"
        ))),
    }
}

/// Splits `amount` into the dated installments described by `schedule`.
///
/// Every installment but the last is `round(amount / count)`; the last takes the
/// remainder so the schedule sums to `amount` exactly. A missing schedule is a single
/// installment due in `terms_days`. A malformed one, or one whose offsets run past the
/// calendar, degrades to the same with a warning.
///
/// # Errors
/// `Validation` when `terms_days` itself does not yield a due date.
pub fn plan_installments(
    amount: Decimal,
    schedule: Option<&str>,
    terms_days: i64,
    today: NaiveDate,
) -> Result<Vec<PlannedInstallment>> {
    let single = || {
        due_in(today, terms_days)
            .map(|due_date| vec![due_date])
            .ok_or_else(|| Error::validation(format!("Payment terms of {terms_days} days are out of range")))
    };

    let due_dates = match schedule.map(str::trim).filter(|s| !s.is_empty()) {
        None => single()?,
        Some(raw) => {
            let dated = parse_schedule(raw).and_then(|offsets| {
                offsets
                    .iter()
                    .map(|days| due_in(today, *days))
                    .collect::<Option<Vec<_>>>()
            });
            match dated {
                Some(due_dates) => due_dates,
                None => {
                    warn!(schedule = raw, terms_days, "Malformed installment schedule, using a single installment");
                    single()?
                }
            }
        }
    };

    let count = due_dates.len();
    let share = round_money(amount / Decimal::from(count));
    let mut allocated = Decimal::ZERO;

    Ok(due_dates
        .into_iter()
        .enumerate()
        .map(|(index, due_date)| {
            let installment_amount = if index + 1 == count {
                amount - allocated
            } else {
                share
            };
            allocated += installment_amount;
            PlannedInstallment {
                number: i32::try_from(index + 1).unwrap_or(i32::MAX),
                total: i32::try_from(count).unwrap_or(i32::MAX),
                amount: installment_amount,
                due_date,
            }
        })
        .collect())
}

/// Stores the schedule for an order inside the caller's transaction.
pub async fn generate_installments<C>(
    conn: &C,
    order: &order::Model,
    customer: &customer::Model,
    plan: &[PlannedInstallment],
) -> Result<Vec<installment::Model>>
where
    C: ConnectionTrait,
{
    let mut created = Vec::with_capacity(plan.len());
    for planned in plan {
        let model = installment::ActiveModel {
            order_id: Set(order.id),
            customer_id: Set(customer.id),
            amount: Set(planned.amount),
            due_date: Set(planned.due_date),
            status: Set(InstallmentStatus::Pending),
            is_installment: Set(planned.total > 1),
            installment_number: Set(planned.number),
            total_installments: Set(planned.total),
            gateway_id: Set(None),
            payment_code: Set(None),
            payment_url: Set(None),
            paid_at: Set(None),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(conn)
        .await?;
        created.push(model);
    }

    info!(
        order_id = order.id,
        customer_id = customer.id,
        count = created.len(),
        "Installments generated"
    );
    Ok(created)
}

/// Installments of an order in schedule order.
pub async fn installments_for_order<C>(conn: &C, order_id: i64) -> Result<Vec<installment::Model>>
where
    C: ConnectionTrait,
{
    Installment::find()
        .filter(installment::Column::OrderId.eq(order_id))
        .order_by_asc(installment::Column::InstallmentNumber)
        .all(conn)
        .await
        .map_err(Into::into)
}

async fn lock_installment<C>(conn: &C, installment_id: i64) -> Result<installment::Model>
where
    C: ConnectionTrait,
{
    Installment::find_by_id(installment_id)
        .lock_exclusive()
        .one(conn)
        .await?
        .ok_or_else(|| Error::not_found("Installment", installment_id))
}

/// Builds the gateway request for an installment.
pub fn boleto_request(
    installment: &installment::Model,
    customer: &customer::Model,
    order_number: &str,
) -> Result<BoletoRequest> {
    let tax_id: String = customer
        .tax_id
        .as_deref()
        .unwrap_or_default()
        .chars()
        .filter(char::is_ascii_digit)
        .collect();
    if tax_id.is_empty() {
        return Err(Error::validation(format!(
            "Customer {} has no tax id to issue a boleto",
            customer.id
        )));
    }

    Ok(BoletoRequest {
        reference: installment.id.to_string(),
        amount: installment.amount,
        due_date: installment.due_date,
        payer: Payer {
            name: customer.name.clone(),
            tax_id,
            email: customer.email.clone(),
        },
        description: format!(
            "Order {} - installment {}/{}",
            order_number, installment.installment_number, installment.total_installments
        ),
    })
}

/// Asks the gateway for a payment code and stores it on the installment.
pub async fn issue_payment_code<C>(
    conn: &C,
    gateway: &dyn PaymentGateway,
    installment: installment::Model,
    customer: &customer::Model,
    order_number: &str,
) -> Result<installment::Model>
where
    C: ConnectionTrait,
{
    let request = boleto_request(&installment, customer, order_number)?;
    let issued = gateway.issue_boleto(&request).await?;

    let mut active: installment::ActiveModel = installment.into();
    active.gateway_id = Set(Some(issued.gateway_id));
    active.payment_code = Set(Some(issued.payment_code));
    active.payment_url = Set(issued.payment_url);
    let updated = active.update(conn).await?;

    info!(installment_id = updated.id, "Payment code stored");
    Ok(updated)
}

/// Returns the stored payment code of an installment, asking the gateway for one only
/// when none has been stored yet. Calling it again after success is a no-op.
pub async fn regenerate_payment_code(
    db: &DatabaseConnection,
    gateway: &dyn PaymentGateway,
    installment_id: i64,
) -> Result<installment::Model> {
    let target = Installment::find_by_id(installment_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Installment", installment_id))?;

    if target.payment_code.is_some() {
        return Ok(target);
    }
    if target.status == InstallmentStatus::Paid {
        return Err(Error::InvalidOrderState {
            order_id: target.order_id,
            reason: format!("installment {installment_id} is already paid"),
        });
    }

    let customer = Customer::find_by_id(target.customer_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Customer", target.customer_id))?;
    let order = Order::find_by_id(target.order_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Order", target.order_id))?;

    issue_payment_code(db, gateway, target, &customer, &order.order_number).await
}

/// Marks an installment paid and gives its amount back to the customer's credit.
/// Already-paid installments are returned unchanged.
pub async fn mark_paid(db: &DatabaseConnection, installment_id: i64) -> Result<installment::Model> {
    let txn = db.begin().await?;

    let target = lock_installment(&txn, installment_id).await?;
    if target.status == InstallmentStatus::Paid {
        return Ok(target);
    }

    credit::release_credit(&txn, target.customer_id, target.amount).await?;

    let mut active: installment::ActiveModel = target.into();
    active.status = Set(InstallmentStatus::Paid);
    active.paid_at = Set(Some(Utc::now()));
    let updated = active.update(&txn).await?;

    txn.commit().await?;

    info!(
        installment_id,
        customer_id = updated.customer_id,
        amount = %updated.amount,
        "Installment paid"
    );
    Ok(updated)
}

/// Releases an unpaid installment's credit inside the caller's transaction and deletes
/// it.
pub(crate) async fn void_in_txn<C>(conn: &C, target: installment::Model) -> Result<()>
where
    C: ConnectionTrait,
{
    if target.status.is_outstanding() {
        credit::release_credit(conn, target.customer_id, target.amount).await?;
    }
    let installment_id = target.id;
    target.delete(conn).await?;
    info!(installment_id, "Installment voided");
    Ok(())
}

/// Deletes an installment. Unless it was already paid, its amount goes back to the
/// customer's available credit.
pub async fn void_installment(db: &DatabaseConnection, installment_id: i64) -> Result<()> {
    let txn = db.begin().await?;
    let target = lock_installment(&txn, installment_id).await?;
    void_in_txn(&txn, target).await?;
    txn.commit().await?;
    Ok(())
}

/// Flags PENDING installments whose due date is before `today` as OVERDUE and returns
/// how many changed.
pub async fn refresh_overdue(db: &DatabaseConnection, today: NaiveDate) -> Result<u64> {
    let result = Installment::update_many()
        .set(installment::ActiveModel {
            status: Set(InstallmentStatus::Overdue),
            ..Default::default()
        })
        .filter(installment::Column::Status.eq(InstallmentStatus::Pending))
        .filter(installment::Column::DueDate.lt(today))
        .exec(db)
        .await?;

    if result.rows_affected > 0 {
        info!(count = result.rows_affected, %today, "Installments flagged overdue");
    }
    Ok(result.rows_affected)
}
