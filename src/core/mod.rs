//! Core business logic - framework-agnostic settlement and ledger operations.
//!
//! Dependency order, leaves first: `ledger` → `transfer` → `payment` →
//! `installment` → `eligibility` → `settlement`. `credit` is shared by every
//! path that moves a customer's available credit.

/// Customer credit consumption and release under a row lock
pub mod credit;
/// Eligibility guard run before any settlement write
pub mod eligibility;
/// Installment generator and boleto lifecycle
pub mod installment;
/// Bank ledger: balance-preserving entries and reversals
pub mod ledger;
/// Partial payments registered against orders
pub mod payment;
/// Order settlement orchestrator
pub mod settlement;
/// Atomic transfers between bank accounts
pub mod transfer;

use rust_decimal::{Decimal, RoundingStrategy};

/// Rounds a monetary amount to cents, halves away from zero.
#[must_use]
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}
