//! Eligibility guard - decides whether a customer may settle an order with a given
//! payment configuration.
//!
//! [`evaluate`] is pure over a loaded snapshot; [`check_eligibility`] loads that snapshot
//! from any connection, so the orchestrator can run it once before the transaction and
//! again against the locked customer row inside it.

use crate::{
    config::settings::SettlementConfig,
    entities::{
        Installment, customer,
        enums::{InstallmentStatus, PaymentMethod},
        installment, seller,
    },
    errors::{EligibilityError, Result},
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::prelude::*;
use tracing::debug;

/// One payment slot of an order: a method and the part of the total it covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaymentSlot {
    pub method: PaymentMethod,
    pub amount: Decimal,
}

/// Overdue installments of a customer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OverdueSummary {
    pub count: usize,
    pub total: Decimal,
}

/// Sum of the slot amounts that draw on the customer's credit.
#[must_use]
pub fn credit_amount(slots: &[PaymentSlot]) -> Decimal {
    slots
        .iter()
        .filter(|slot| slot.method.consumes_credit())
        .map(|slot| slot.amount)
        .sum()
}

/// Whether a tax id is a well-formed CPF (11 digits) or CNPJ (14 digits) once
/// punctuation is stripped.
#[must_use]
pub fn is_valid_tax_id(tax_id: &str) -> bool {
    let digits = tax_id.chars().filter(char::is_ascii_digit).count();
    digits == 11 || digits == 14
}

/// Runs the eligibility checks in order and returns the first rejection.
///
/// # Errors
/// Returns the [`EligibilityError`] naming the blocking condition.
pub fn evaluate(
    config: &SettlementConfig,
    customer: Option<&customer::Model>,
    overdue: OverdueSummary,
    slots: &[PaymentSlot],
    discount_percent: Decimal,
    seller_max_discount: Option<Decimal>,
) -> std::result::Result<(), EligibilityError> {
    let deferred = slots.iter().any(|slot| slot.method.is_deferred());
    let credit = credit_amount(slots);

    if let Some(customer) = customer {
        if deferred
            && config
                .boleto_blocked_customer_types
                .iter()
                .any(|blocked| blocked.eq_ignore_ascii_case(&customer.customer_type))
        {
            return Err(EligibilityError::PaymentMethodNotAllowed {
                customer_type: customer.customer_type.clone(),
            });
        }

        if deferred && !customer.tax_id.as_deref().is_some_and(is_valid_tax_id) {
            return Err(EligibilityError::InvalidTaxId {
                tax_id: customer.tax_id.clone(),
            });
        }

        if overdue.count > 0 {
            return Err(EligibilityError::OverdueInstallments {
                count: overdue.count,
                total: overdue.total,
            });
        }

        if credit > customer.available_credit {
            return Err(EligibilityError::InsufficientCredit {
                requested: credit,
                available: customer.available_credit,
                shortfall: credit - customer.available_credit,
            });
        }
    } else if let Some(slot) = slots.iter().find(|slot| slot.method.consumes_credit()) {
        return Err(EligibilityError::CustomerRequired {
            method: format!("{:?}", slot.method),
        });
    }

    match seller_max_discount {
        Some(max) if discount_percent > max => Err(EligibilityError::DiscountTooHigh {
            requested: discount_percent,
            max,
        }),
        _ => Ok(()),
    }
}

/// Counts a customer's installments that are past due and still unpaid.
pub async fn load_overdue<C>(conn: &C, customer_id: i64, today: NaiveDate) -> Result<OverdueSummary>
where
    C: ConnectionTrait,
{
    let overdue = Installment::find()
        .filter(installment::Column::CustomerId.eq(customer_id))
        .filter(installment::Column::DueDate.lt(today))
        .filter(
            installment::Column::Status
                .is_in([InstallmentStatus::Pending, InstallmentStatus::Overdue]),
        )
        .all(conn)
        .await?;

    Ok(OverdueSummary {
        count: overdue.len(),
        total: overdue.iter().map(|i| i.amount).sum(),
    })
}

/// Loads the overdue snapshot for `customer` and evaluates the checks against it.
pub async fn check_eligibility<C>(
    conn: &C,
    config: &SettlementConfig,
    customer: Option<&customer::Model>,
    seller: Option<&seller::Model>,
    slots: &[PaymentSlot],
    discount_percent: Decimal,
    today: NaiveDate,
) -> Result<()>
where
    C: ConnectionTrait,
{
    let overdue = match customer {
        Some(customer) => load_overdue(conn, customer.id, today).await?,
        None => OverdueSummary::default(),
    };

    evaluate(
        config,
        customer,
        overdue,
        slots,
        discount_percent,
        seller.and_then(|s| s.max_discount_percent),
    )?;

    debug!(
        customer_id = customer.map(|c| c.id),
        credit = %credit_amount(slots),
        "Eligibility approved"
    );
    Ok(())
}
