//! Order settlement orchestrator - turns a cart into a confirmed order and its
//! financial side effects.
//!
//! Everything that moves money or credit happens in one database transaction:
//! the order, its items, the commission, the credit draw and the installments. The
//! eligibility guard runs once on a plain read to fail fast, then again against the
//! locked customer row inside the transaction, so two concurrent settlements for the
//! same customer cannot both spend the same credit.
//!
//! Payment codes and the confirmation notice are produced after commit. Their failures
//! are returned as warnings and never undo the order.

use crate::{
    config::settings::SettlementConfig,
    core::{
        credit,
        eligibility::{self, PaymentSlot},
        installment, payment, round_money,
    },
    entities::{
        Commission, Customer, Order, OrderItem, Payment, Product, Seller, commission, customer,
        enums::{CommissionStatus, OrderStatus, OrderType, PaymentMethod},
        order, order_item, payment as payment_entity, product, seller,
    },
    errors::{Error, Result},
    gateway::{Notifier, PaymentGateway},
};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{QueryOrder, QuerySelect, Set, TransactionTrait, prelude::*};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, sync::Arc};
use tracing::{error, info, warn};

/// One cart line.
#[derive(Debug, Clone, Deserialize)]
pub struct CartLine {
    pub product_id: i64,
    pub quantity: i32,
    /// Gift lines are recorded but cost nothing
    #[serde(default)]
    pub is_gift: bool,
}

/// How the order total is paid. A secondary method splits the total in two slots whose
/// amounts must add up to it.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfig {
    pub method: PaymentMethod,
    #[serde(default)]
    pub secondary_method: Option<PaymentMethod>,
    #[serde(default)]
    pub primary_amount: Option<Decimal>,
    #[serde(default)]
    pub secondary_amount: Option<Decimal>,
}

impl PaymentConfig {
    /// A single-method payment.
    #[must_use]
    pub const fn single(method: PaymentMethod) -> Self {
        Self {
            method,
            secondary_method: None,
            primary_amount: None,
            secondary_amount: None,
        }
    }

    /// A payment split between two methods.
    #[must_use]
    pub const fn split(
        method: PaymentMethod,
        primary_amount: Decimal,
        secondary_method: PaymentMethod,
        secondary_amount: Decimal,
    ) -> Self {
        Self {
            method,
            secondary_method: Some(secondary_method),
            primary_amount: Some(primary_amount),
            secondary_amount: Some(secondary_amount),
        }
    }

    fn uses(&self, method: PaymentMethod) -> bool {
        self.method == method || self.secondary_method == Some(method)
    }
}

/// A request to settle a cart.
#[derive(Debug, Clone, Deserialize)]
pub struct SettlementRequest {
    /// Buyer; may be absent for own orders paid on the spot
    #[serde(default)]
    pub customer_id: Option<i64>,
    /// Seller credited with the sale
    #[serde(default)]
    pub seller_id: Option<i64>,
    /// Which price list to use
    pub order_type: OrderType,
    /// Placed by the business for itself; never earns commission
    #[serde(default)]
    pub is_own_order: bool,
    /// Cart lines
    pub items: Vec<CartLine>,
    /// How the total is paid
    pub payment: PaymentConfig,
    /// Percentage taken off the subtotal, 0 to 100
    #[serde(default)]
    pub discount_percent: Decimal,
    /// Added to the total after the discount
    #[serde(default)]
    pub delivery_fee: Decimal,
    #[serde(default)]
    pub delivery_date: Option<NaiveDate>,
    #[serde(default)]
    pub delivery_address: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    /// `<count>x-<d1>-...-<dN>`; only meaningful with boleto
    #[serde(default)]
    pub installment_spec: Option<String>,
    /// Replays the earlier outcome when an order with this key already exists
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

/// A priced cart line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedLine {
    pub product_id: i64,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
    pub is_gift: bool,
}

/// Order totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Totals {
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
}

/// A settled order with everything created alongside it.
#[derive(Debug, Clone, Serialize)]
pub struct SettlementOutcome {
    pub order: order::Model,
    pub items: Vec<order_item::Model>,
    pub installments: Vec<crate::entities::installment::Model>,
    pub commission: Option<commission::Model>,
    /// Post-commit problems (payment codes that could not be issued)
    pub warnings: Vec<String>,
    /// True when an existing order was returned for a repeated idempotency key
    pub replayed: bool,
}

/// An order with its related records and payment figures.
#[derive(Debug, Clone, Serialize)]
pub struct OrderDetails {
    pub order: order::Model,
    pub items: Vec<order_item::Model>,
    pub installments: Vec<crate::entities::installment::Model>,
    pub commission: Option<commission::Model>,
    pub payments: Vec<payment_entity::Model>,
    pub summary: payment::PaymentSummary,
}

/// Collaborators a settlement needs.
pub struct SettlementContext<'a> {
    pub db: &'a DatabaseConnection,
    pub config: &'a SettlementConfig,
    pub gateway: &'a dyn PaymentGateway,
    pub notifier: Arc<dyn Notifier>,
}

/// Sums the cart: `discount = round(subtotal × pct / 100)` and
/// `total = subtotal − discount + delivery_fee`.
#[must_use]
pub fn compute_totals(lines: &[PricedLine], discount_percent: Decimal, delivery_fee: Decimal) -> Totals {
    let subtotal: Decimal = lines.iter().map(|line| line.line_total).sum();
    let discount = round_money(subtotal * discount_percent / Decimal::ONE_HUNDRED);
    Totals {
        subtotal,
        discount,
        total: subtotal - discount + delivery_fee,
    }
}

fn validate_request(request: &SettlementRequest) -> Result<()> {
    if request.items.is_empty() {
        return Err(Error::validation("Cart cannot be empty"));
    }
    if let Some(line) = request.items.iter().find(|line| line.quantity <= 0) {
        return Err(Error::validation(format!(
            "Quantity for product {} must be positive, got {}",
            line.product_id, line.quantity
        )));
    }
    if request.discount_percent < Decimal::ZERO || request.discount_percent > Decimal::ONE_HUNDRED {
        return Err(Error::validation(format!(
            "Discount percent must be between 0 and 100, got {}",
            request.discount_percent
        )));
    }
    if request.delivery_fee < Decimal::ZERO {
        return Err(Error::validation("Delivery fee cannot be negative"));
    }
    if request.payment.secondary_method == Some(request.payment.method) {
        return Err(Error::validation("Split payment methods must differ"));
    }
    if request.installment_spec.as_deref().is_some_and(|s| !s.trim().is_empty())
        && !request.payment.uses(PaymentMethod::Boleto)
    {
        return Err(Error::validation("An installment schedule requires boleto payment"));
    }
    Ok(())
}

/// Splits the total into payment slots.
pub fn resolve_slots(payment: &PaymentConfig, total: Decimal) -> Result<Vec<PaymentSlot>> {
    let slots = match payment.secondary_method {
        None => vec![PaymentSlot {
            method: payment.method,
            amount: total,
        }],
        Some(secondary) => {
            let (Some(primary_amount), Some(secondary_amount)) =
                (payment.primary_amount, payment.secondary_amount)
            else {
                return Err(Error::validation(
                    "Split payment needs both primary_amount and secondary_amount",
                ));
            };
            if primary_amount <= Decimal::ZERO || secondary_amount <= Decimal::ZERO {
                return Err(Error::validation("Split payment amounts must be positive"));
            }
            if primary_amount + secondary_amount != total {
                return Err(Error::validation(format!(
                    "Split payment amounts {primary_amount} + {secondary_amount} do not add up to the total {total}"
                )));
            }
            vec![
                PaymentSlot {
                    method: payment.method,
                    amount: primary_amount,
                },
                PaymentSlot {
                    method: secondary,
                    amount: secondary_amount,
                },
            ]
        }
    };

    if let Some(slot) = slots
        .iter()
        .find(|slot| slot.method.is_deferred() && slot.amount <= Decimal::ZERO)
    {
        return Err(Error::InvalidAmount {
            amount: slot.amount,
        });
    }
    Ok(slots)
}

/// Resolves each line's unit price from the active catalog.
pub async fn price_cart<C>(conn: &C, order_type: OrderType, lines: &[CartLine]) -> Result<Vec<PricedLine>>
where
    C: ConnectionTrait,
{
    let ids: Vec<i64> = lines.iter().map(|line| line.product_id).collect();
    let products: HashMap<i64, product::Model> = Product::find()
        .filter(product::Column::Id.is_in(ids))
        .all(conn)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();

    lines
        .iter()
        .map(|line| {
            let product = products
                .get(&line.product_id)
                .filter(|p| p.is_active)
                .ok_or_else(|| {
                    Error::validation(format!(
                        "Product {} is unknown or inactive",
                        line.product_id
                    ))
                })?;
            let unit_price = match order_type {
                OrderType::Wholesale => product.wholesale_price,
                OrderType::Retail => product.retail_price,
            };
            let line_total = if line.is_gift {
                Decimal::ZERO
            } else {
                unit_price * Decimal::from(line.quantity)
            };
            Ok(PricedLine {
                product_id: line.product_id,
                quantity: line.quantity,
                unit_price,
                line_total,
                is_gift: line.is_gift,
            })
        })
        .collect()
}

/// `YYYYMMDD-NNNNN`, numbered after the highest order id.
async fn next_order_number<C>(conn: &C, today: NaiveDate) -> Result<String>
where
    C: ConnectionTrait,
{
    let last_id = Order::find()
        .order_by_desc(order::Column::Id)
        .one(conn)
        .await?
        .map_or(0, |o| o.id);
    Ok(format!("{}-{:05}", today.format("%Y%m%d"), last_id + 1))
}

async fn find_seller<C>(conn: &C, seller_id: Option<i64>) -> Result<Option<seller::Model>>
where
    C: ConnectionTrait,
{
    let Some(seller_id) = seller_id else {
        return Ok(None);
    };
    let seller = Seller::find_by_id(seller_id)
        .one(conn)
        .await?
        .ok_or_else(|| Error::not_found("Seller", seller_id))?;
    if !seller.is_active {
        return Err(Error::validation(format!("Seller {seller_id} is inactive")));
    }
    Ok(Some(seller))
}

async fn find_by_idempotency_key<C>(conn: &C, key: &str) -> Result<Option<order::Model>>
where
    C: ConnectionTrait,
{
    Order::find()
        .filter(order::Column::IdempotencyKey.eq(key))
        .one(conn)
        .await
        .map_err(Into::into)
}

async fn load_outcome<C>(conn: &C, order: order::Model, warnings: Vec<String>, replayed: bool) -> Result<SettlementOutcome>
where
    C: ConnectionTrait,
{
    let items = OrderItem::find()
        .filter(order_item::Column::OrderId.eq(order.id))
        .order_by_asc(order_item::Column::Id)
        .all(conn)
        .await?;
    let installments = installment::installments_for_order(conn, order.id).await?;
    let commission = Commission::find()
        .filter(commission::Column::OrderId.eq(order.id))
        .one(conn)
        .await?;
    Ok(SettlementOutcome {
        order,
        items,
        installments,
        commission,
        warnings,
        replayed,
    })
}

/// Everything validated and priced before the transaction opens.
struct Prepared {
    lines: Vec<PricedLine>,
    totals: Totals,
    slots: Vec<PaymentSlot>,
    seller: Option<seller::Model>,
}

async fn persist(
    ctx: &SettlementContext<'_>,
    request: &SettlementRequest,
    prepared: &Prepared,
    today: NaiveDate,
) -> Result<(SettlementOutcome, Option<customer::Model>)> {
    let txn = ctx.db.begin().await?;

    // Re-read the customer under lock and repeat the guard against live data.
    let customer = match request.customer_id {
        Some(id) => Some(credit::lock_customer(&txn, id).await?),
        None => None,
    };
    eligibility::check_eligibility(
        &txn,
        ctx.config,
        customer.as_ref(),
        prepared.seller.as_ref(),
        &prepared.slots,
        request.discount_percent,
        today,
    )
    .await?;

    let primary = prepared.slots[0];
    let secondary = prepared.slots.get(1).copied();
    let order = order::ActiveModel {
        order_number: Set(next_order_number(&txn, today).await?),
        customer_id: Set(request.customer_id),
        seller_id: Set(prepared.seller.as_ref().map(|s| s.id)),
        order_type: Set(request.order_type),
        is_own_order: Set(request.is_own_order),
        subtotal: Set(prepared.totals.subtotal),
        discount_percent: Set(request.discount_percent),
        discount: Set(prepared.totals.discount),
        delivery_fee: Set(request.delivery_fee),
        total: Set(prepared.totals.total),
        payment_method: Set(primary.method),
        secondary_payment_method: Set(secondary.map(|s| s.method)),
        primary_amount: Set(primary.amount),
        secondary_amount: Set(secondary.map(|s| s.amount)),
        installment_spec: Set(request.installment_spec.clone()),
        status: Set(OrderStatus::Confirmed),
        delivery_date: Set(request.delivery_date),
        delivery_address: Set(request.delivery_address.clone()),
        notes: Set(request.notes.clone()),
        idempotency_key: Set(request.idempotency_key.clone()),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    let mut items = Vec::with_capacity(prepared.lines.len());
    for line in &prepared.lines {
        let item = order_item::ActiveModel {
            order_id: Set(order.id),
            product_id: Set(line.product_id),
            quantity: Set(line.quantity),
            unit_price: Set(line.unit_price),
            line_total: Set(line.line_total),
            is_gift: Set(line.is_gift),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
        items.push(item);
    }

    let commission = match prepared.seller.as_ref() {
        Some(seller) if !request.is_own_order => Some(
            commission::ActiveModel {
                order_id: Set(order.id),
                seller_id: Set(seller.id),
                rate: Set(seller.commission_rate),
                amount: Set(round_money(order.total * seller.commission_rate)),
                status: Set(CommissionStatus::Pending),
                created_at: Set(Utc::now()),
                ..Default::default()
            }
            .insert(&txn)
            .await?,
        ),
        _ => None,
    };

    let credit_amount = eligibility::credit_amount(&prepared.slots);
    let mut installments = Vec::new();
    if let Some(customer) = customer.as_ref() {
        if credit_amount > Decimal::ZERO {
            credit::consume_credit(&txn, customer.id, credit_amount).await?;
        }

        let deferred = order.amount_for(PaymentMethod::Boleto);
        if deferred > Decimal::ZERO {
            let terms = installment::effective_terms(
                customer.payment_terms,
                ctx.config.default_payment_terms,
                today,
            )?;
            let plan = installment::plan_installments(
                deferred,
                request.installment_spec.as_deref(),
                terms,
                today,
            )?;
            installments = installment::generate_installments(&txn, &order, customer, &plan).await?;
        }
    }

    txn.commit().await?;

    info!(
        order_id = order.id,
        order_number = %order.order_number,
        customer_id = ?order.customer_id,
        total = %order.total,
        credit = %credit_amount,
        installments = installments.len(),
        "Order settled"
    );

    Ok((
        SettlementOutcome {
            order,
            items,
            installments,
            commission,
            warnings: Vec::new(),
            replayed: false,
        },
        customer,
    ))
}

/// Settles a cart into a confirmed order.
///
/// # Errors
/// Validation and eligibility failures are returned before anything is written. A
/// failure inside the transaction rolls every write back.
pub async fn create_order(ctx: &SettlementContext<'_>, request: SettlementRequest) -> Result<SettlementOutcome> {
    validate_request(&request)?;

    if let Some(key) = request.idempotency_key.as_deref() {
        if let Some(existing) = find_by_idempotency_key(ctx.db, key).await? {
            info!(order_id = existing.id, idempotency_key = key, "Replaying settled order");
            return load_outcome(ctx.db, existing, Vec::new(), true).await;
        }
    }

    let today = Utc::now().date_naive();
    let lines = price_cart(ctx.db, request.order_type, &request.items).await?;
    let totals = compute_totals(&lines, request.discount_percent, request.delivery_fee);
    let slots = resolve_slots(&request.payment, totals.total)?;
    let seller = find_seller(ctx.db, request.seller_id).await?;

    let snapshot = match request.customer_id {
        Some(id) => Some(
            Customer::find_by_id(id)
                .one(ctx.db)
                .await?
                .ok_or_else(|| Error::not_found("Customer", id))?,
        ),
        None => None,
    };
    if let Err(err) = eligibility::check_eligibility(
        ctx.db,
        ctx.config,
        snapshot.as_ref(),
        seller.as_ref(),
        &slots,
        request.discount_percent,
        today,
    )
    .await
    {
        warn!(customer_id = ?request.customer_id, error = %err, "Settlement rejected");
        return Err(err);
    }

    let prepared = Prepared {
        lines,
        totals,
        slots,
        seller,
    };

    let (mut outcome, customer) = match persist(ctx, &request, &prepared, today).await {
        Ok(persisted) => persisted,
        Err(Error::Database(db_err)) => {
            // A concurrent retry with the same key may have won the unique index.
            if let Some(key) = request.idempotency_key.as_deref() {
                if let Some(existing) = find_by_idempotency_key(ctx.db, key).await? {
                    return load_outcome(ctx.db, existing, Vec::new(), true).await;
                }
            }
            error!(error = %db_err, "Settlement transaction failed");
            return Err(Error::Database(db_err));
        }
        Err(err) => return Err(err),
    };

    if let Some(customer) = customer.as_ref() {
        let mut issued = Vec::with_capacity(outcome.installments.len());
        for pending in std::mem::take(&mut outcome.installments) {
            let installment_id = pending.id;
            match installment::issue_payment_code(
                ctx.db,
                ctx.gateway,
                pending.clone(),
                customer,
                &outcome.order.order_number,
            )
            .await
            {
                Ok(updated) => issued.push(updated),
                Err(err) => {
                    warn!(
                        order_id = outcome.order.id,
                        installment_id,
                        error = %err,
                        "Payment code not issued; order kept"
                    );
                    outcome
                        .warnings
                        .push(format!("Payment code for installment {installment_id} was not issued: {err}"));
                    issued.push(pending);
                }
            }
        }
        outcome.installments = issued;
    }

    let notifier = Arc::clone(&ctx.notifier);
    let confirmed = outcome.order.clone();
    let recipient = customer.and_then(|c| c.email);
    tokio::spawn(async move {
        if let Err(err) = notifier.order_confirmed(&confirmed, recipient.as_deref()).await {
            warn!(order_id = confirmed.id, error = %err, "Order confirmation not sent");
        }
    });

    Ok(outcome)
}

/// Loads an order with its items, installments, commission and payment figures.
pub async fn get_order(db: &DatabaseConnection, order_id: i64) -> Result<OrderDetails> {
    let order = Order::find_by_id(order_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Order", order_id))?;
    let (summary, payments) = payment::get_payment_summary(db, order_id).await?;
    let outcome = load_outcome(db, order, Vec::new(), false).await?;

    Ok(OrderDetails {
        order: outcome.order,
        items: outcome.items,
        installments: outcome.installments,
        commission: outcome.commission,
        payments,
        summary,
    })
}

/// Cancels an order that has no payments: voids its unpaid installments, gives back
/// the credit it still holds and cancels a pending commission.
pub async fn cancel_order(db: &DatabaseConnection, order_id: i64) -> Result<order::Model> {
    let txn = db.begin().await?;

    let order = Order::find_by_id(order_id)
        .lock_exclusive()
        .one(&txn)
        .await?
        .ok_or_else(|| Error::not_found("Order", order_id))?;
    if order.status == OrderStatus::Cancelled {
        return Err(Error::InvalidOrderState {
            order_id,
            reason: "order is already cancelled".to_string(),
        });
    }
    let payment_count = Payment::find()
        .filter(payment_entity::Column::OrderId.eq(order_id))
        .count(&txn)
        .await?;
    if payment_count > 0 {
        return Err(Error::InvalidOrderState {
            order_id,
            reason: format!("order has {payment_count} payment(s); delete them first"),
        });
    }

    for held in installment::installments_for_order(&txn, order_id).await? {
        if held.status.is_outstanding() {
            installment::void_in_txn(&txn, held).await?;
        }
    }

    let store_credit = order.amount_for(PaymentMethod::StoreCredit);
    if let Some(customer_id) = order.customer_id {
        let outstanding = credit::store_credit_outstanding(store_credit, Decimal::ZERO);
        credit::release_credit(&txn, customer_id, outstanding).await?;
    }

    if let Some(pending) = Commission::find()
        .filter(commission::Column::OrderId.eq(order_id))
        .filter(commission::Column::Status.eq(CommissionStatus::Pending))
        .one(&txn)
        .await?
    {
        let mut active: commission::ActiveModel = pending.into();
        active.status = Set(CommissionStatus::Cancelled);
        active.update(&txn).await?;
    }

    let mut active: order::ActiveModel = order.into();
    active.status = Set(OrderStatus::Cancelled);
    let cancelled = active.update(&txn).await?;

    txn.commit().await?;

    info!(order_id, order_number = %cancelled.order_number, "Order cancelled");
    Ok(cancelled)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::{
        config::ReversalPolicy,
        core::payment::{NewPayment, register_payment},
        entities::{Installment, enums::InstallmentStatus, installment as installment_entity},
        errors::EligibilityError,
        test_utils::*,
    };
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn boleto_request(customer_id: i64, product_id: i64, quantity: i32) -> SettlementRequest {
        SettlementRequest {
            customer_id: Some(customer_id),
            seller_id: None,
            order_type: OrderType::Wholesale,
            is_own_order: false,
            items: vec![CartLine {
                product_id,
                quantity,
                is_gift: false,
            }],
            payment: PaymentConfig::single(PaymentMethod::Boleto),
            discount_percent: Decimal::ZERO,
            delivery_fee: Decimal::ZERO,
            delivery_date: None,
            delivery_address: None,
            notes: None,
            installment_spec: None,
            idempotency_key: None,
        }
    }

    async fn available_credit(db: &DatabaseConnection, customer_id: i64) -> Decimal {
        Customer::find_by_id(customer_id)
            .one(db)
            .await
            .unwrap()
            .unwrap()
            .available_credit
    }

    /// Outstanding obligations recomputed from stored rows.
    async fn outstanding_obligations(db: &DatabaseConnection, customer_id: i64) -> Decimal {
        let installments: Decimal = Installment::find()
            .filter(installment_entity::Column::CustomerId.eq(customer_id))
            .all(db)
            .await
            .unwrap()
            .iter()
            .filter(|i| i.status.is_outstanding())
            .map(|i| i.amount)
            .sum();

        let mut store_credit = Decimal::ZERO;
        let orders = Order::find()
            .filter(order::Column::CustomerId.eq(customer_id))
            .filter(order::Column::Status.eq(OrderStatus::Confirmed))
            .all(db)
            .await
            .unwrap();
        for order in orders {
            let (summary, _) = payment::get_payment_summary(db, order.id).await.unwrap();
            store_credit += credit::store_credit_outstanding(
                order.amount_for(PaymentMethod::StoreCredit),
                summary.paid_amount,
            );
        }
        installments + store_credit
    }

    #[test]
    fn test_totals() {
        let lines = vec![
            PricedLine {
                product_id: 1,
                quantity: 3,
                unit_price: dec!(10.50),
                line_total: dec!(31.50),
                is_gift: false,
            },
            PricedLine {
                product_id: 2,
                quantity: 1,
                unit_price: dec!(8),
                line_total: dec!(0),
                is_gift: true,
            },
        ];
        let totals = compute_totals(&lines, dec!(10), dec!(0));
        assert_eq!(totals.subtotal, dec!(31.50));
        assert_eq!(totals.discount, dec!(3.15));
        assert_eq!(totals.total, totals.subtotal - totals.discount);

        let delivered = compute_totals(&lines, dec!(0), dec!(12));
        assert_eq!(delivered.total, dec!(43.50));
    }

    #[test]
    fn test_resolve_slots() {
        let single = resolve_slots(&PaymentConfig::single(PaymentMethod::Pix), dec!(90)).unwrap();
        assert_eq!(single.len(), 1);
        assert_eq!(single[0].amount, dec!(90));

        let split = PaymentConfig::split(PaymentMethod::Cash, dec!(40), PaymentMethod::Boleto, dec!(50));
        let slots = resolve_slots(&split, dec!(90)).unwrap();
        assert_eq!(slots[1].method, PaymentMethod::Boleto);
        assert_eq!(slots[1].amount, dec!(50));

        assert!(matches!(resolve_slots(&split, dec!(100)), Err(Error::Validation { .. })));

        let zero = PaymentConfig::split(PaymentMethod::Cash, dec!(90), PaymentMethod::Boleto, dec!(0));
        assert!(matches!(resolve_slots(&zero, dec!(90)), Err(Error::Validation { .. })));

        assert!(matches!(
            resolve_slots(&PaymentConfig::single(PaymentMethod::Boleto), dec!(0)),
            Err(Error::InvalidAmount { .. })
        ));
    }

    #[tokio::test]
    async fn test_boleto_order_consumes_credit_and_schedules_installment() -> Result<()> {
        let db = setup_test_db().await?;
        let config = SettlementConfig::default();
        let gateway = RecordingGateway::default();
        let ctx = test_context(&db, &config, &gateway);
        let customer = create_test_customer(&db, "Padaria Central", dec!(1000)).await?;
        let flour = create_test_product(&db, "Farinha 25kg", dec!(100), dec!(120)).await?;

        let outcome = create_order(&ctx, boleto_request(customer.id, flour.id, 4)).await?;

        assert_eq!(outcome.order.total, dec!(400));
        assert_eq!(outcome.order.status, OrderStatus::Confirmed);
        assert_eq!(outcome.installments.len(), 1);
        let only = &outcome.installments[0];
        assert_eq!(only.amount, dec!(400));
        assert_eq!(only.due_date, Utc::now().date_naive() + Duration::days(30));
        assert!(!only.is_installment);
        assert!(only.payment_code.is_some());
        assert!(outcome.warnings.is_empty());
        assert_eq!(available_credit(&db, customer.id).await, dec!(600));

        // A second order that needs more than what is left is refused without writes.
        let refused = create_order(&ctx, boleto_request(customer.id, flour.id, 7)).await;
        assert!(matches!(
            refused,
            Err(Error::Eligibility(EligibilityError::InsufficientCredit { requested, available, .. }))
                if requested == dec!(700) && available == dec!(600)
        ));
        assert_eq!(Order::find().count(&db).await?, 1);
        assert_eq!(Installment::find().count(&db).await?, 1);
        assert_eq!(available_credit(&db, customer.id).await, dec!(600));
        Ok(())
    }

    #[tokio::test]
    async fn test_installment_schedule_splits_deferred_amount() -> Result<()> {
        let db = setup_test_db().await?;
        let config = SettlementConfig::default();
        let gateway = RecordingGateway::default();
        let ctx = test_context(&db, &config, &gateway);
        let customer = create_test_customer(&db, "Mercado Sol", dec!(1000)).await?;
        let oil = create_test_product(&db, "Óleo 20L", dec!(100), dec!(110)).await?;

        let mut request = boleto_request(customer.id, oil.id, 3);
        request.installment_spec = Some("3x-10-20-30".to_string());
        let outcome = create_order(&ctx, request).await?;

        let amounts: Vec<_> = outcome.installments.iter().map(|i| i.amount).collect();
        assert_eq!(amounts, vec![dec!(100), dec!(100), dec!(100)]);
        assert!(outcome.installments.iter().all(|i| i.is_installment && i.total_installments == 3));
        assert_eq!(gateway.calls(), 3);
        Ok(())
    }

    #[tokio::test]
    async fn test_out_of_range_schedule_still_collects() -> Result<()> {
        let db = setup_test_db().await?;
        let config = SettlementConfig::default();
        let gateway = RecordingGateway::default();
        let ctx = test_context(&db, &config, &gateway);
        let customer = create_test_customer(&db, "Mercado Sol", dec!(1000)).await?;
        let oil = create_test_product(&db, "Óleo 20L", dec!(100), dec!(110)).await?;
        let today = Utc::now().date_naive();

        let mut request = boleto_request(customer.id, oil.id, 3);
        request.installment_spec = Some("1x-999999999".to_string());
        let outcome = create_order(&ctx, request).await?;

        assert_eq!(outcome.installments.len(), 1);
        assert_eq!(outcome.installments[0].amount, dec!(300));
        assert_eq!(outcome.installments[0].due_date, today + Duration::days(30));
        assert_eq!(available_credit(&db, customer.id).await, dec!(700));

        // Customer terms past the calendar use the configured default instead
        let distant = create_custom_customer(
            &db,
            "Armazém Longe",
            "company",
            Some("11.222.333/0001-81"),
            dec!(500),
            i32::MAX,
        )
        .await?;
        let outcome = create_order(&ctx, boleto_request(distant.id, oil.id, 1)).await?;
        assert_eq!(
            outcome.installments[0].due_date,
            today + Duration::days(i64::from(config.default_payment_terms))
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_commission_and_own_orders() -> Result<()> {
        let db = setup_test_db().await?;
        let config = SettlementConfig::default();
        let gateway = RecordingGateway::default();
        let ctx = test_context(&db, &config, &gateway);
        let seller = create_test_seller(&db, "Ana", dec!(0.05), None).await?;
        let sugar = create_test_product(&db, "Açúcar", dec!(50), dec!(60)).await?;

        let mut request = SettlementRequest {
            customer_id: None,
            seller_id: Some(seller.id),
            payment: PaymentConfig::single(PaymentMethod::Pix),
            ..boleto_request(0, sugar.id, 2)
        };
        let sold = create_order(&ctx, request.clone()).await?;
        let commission = sold.commission.unwrap();
        assert_eq!(commission.amount, dec!(5));
        assert_eq!(commission.status, CommissionStatus::Pending);

        request.is_own_order = true;
        let own = create_order(&ctx, request).await?;
        assert!(own.commission.is_none());
        assert_eq!(Commission::find().count(&db).await?, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_discount_and_gift_lines() -> Result<()> {
        let db = setup_test_db().await?;
        let config = SettlementConfig::default();
        let gateway = RecordingGateway::default();
        let ctx = test_context(&db, &config, &gateway);
        let coffee = create_test_product(&db, "Café", dec!(20), dec!(25)).await?;
        let mug = create_test_product(&db, "Caneca", dec!(15), dec!(18)).await?;

        let request = SettlementRequest {
            customer_id: None,
            order_type: OrderType::Retail,
            items: vec![
                CartLine {
                    product_id: coffee.id,
                    quantity: 4,
                    is_gift: false,
                },
                CartLine {
                    product_id: mug.id,
                    quantity: 1,
                    is_gift: true,
                },
            ],
            payment: PaymentConfig::single(PaymentMethod::Cash),
            discount_percent: dec!(10),
            ..boleto_request(0, coffee.id, 1)
        };
        let outcome = create_order(&ctx, request).await?;

        assert_eq!(outcome.order.subtotal, dec!(100));
        assert_eq!(outcome.order.discount, dec!(10));
        assert_eq!(outcome.order.total, outcome.order.subtotal - outcome.order.discount);
        assert_eq!(outcome.items.len(), 2);
        assert_eq!(outcome.items[1].line_total, dec!(0));
        assert_eq!(outcome.items[1].unit_price, dec!(18));
        assert!(outcome.installments.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_gateway_failure_keeps_order() -> Result<()> {
        let db = setup_test_db().await?;
        let config = SettlementConfig::default();
        let ctx = test_context(&db, &config, &FailingGateway);
        let customer = create_test_customer(&db, "Empório", dec!(1000)).await?;
        let rice = create_test_product(&db, "Arroz", dec!(25), dec!(30)).await?;

        let outcome = create_order(&ctx, boleto_request(customer.id, rice.id, 4)).await?;

        assert_eq!(outcome.warnings.len(), 1);
        assert!(outcome.installments[0].payment_code.is_none());
        assert!(Order::find_by_id(outcome.order.id).one(&db).await?.is_some());
        assert_eq!(available_credit(&db, customer.id).await, dec!(900));

        let gateway = RecordingGateway::default();
        let fixed =
            installment::regenerate_payment_code(&db, &gateway, outcome.installments[0].id).await?;
        assert!(fixed.payment_code.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn test_validation_rejects_before_writes() -> Result<()> {
        let db = setup_test_db().await?;
        let config = SettlementConfig::default();
        let gateway = RecordingGateway::default();
        let ctx = test_context(&db, &config, &gateway);
        let customer = create_test_customer(&db, "Padaria Central", dec!(1000)).await?;
        let flour = create_test_product(&db, "Farinha", dec!(100), dec!(120)).await?;

        let mut empty = boleto_request(customer.id, flour.id, 1);
        empty.items.clear();
        assert!(matches!(create_order(&ctx, empty).await, Err(Error::Validation { .. })));

        let mut schedule_with_cash = boleto_request(customer.id, flour.id, 1);
        schedule_with_cash.payment = PaymentConfig::single(PaymentMethod::Cash);
        schedule_with_cash.installment_spec = Some("2x-10-20".to_string());
        assert!(matches!(create_order(&ctx, schedule_with_cash).await, Err(Error::Validation { .. })));

        let mut too_much_discount = boleto_request(customer.id, flour.id, 1);
        too_much_discount.discount_percent = dec!(101);
        assert!(matches!(create_order(&ctx, too_much_discount).await, Err(Error::Validation { .. })));

        assert!(matches!(
            create_order(&ctx, boleto_request(customer.id, 999, 1)).await,
            Err(Error::Validation { .. })
        ));

        assert_eq!(Order::find().count(&db).await?, 0);
        assert_eq!(available_credit(&db, customer.id).await, dec!(1000));
        Ok(())
    }

    #[tokio::test]
    async fn test_idempotency_key_replays_order() -> Result<()> {
        let db = setup_test_db().await?;
        let config = SettlementConfig::default();
        let gateway = RecordingGateway::default();
        let ctx = test_context(&db, &config, &gateway);
        let customer = create_test_customer(&db, "Padaria Central", dec!(1000)).await?;
        let flour = create_test_product(&db, "Farinha", dec!(100), dec!(120)).await?;

        let mut request = boleto_request(customer.id, flour.id, 2);
        request.idempotency_key = Some("checkout-7f3a".to_string());

        let first = create_order(&ctx, request.clone()).await?;
        let second = create_order(&ctx, request).await?;

        assert!(!first.replayed);
        assert!(second.replayed);
        assert_eq!(first.order.id, second.order.id);
        assert_eq!(second.installments.len(), 1);
        assert_eq!(Order::find().count(&db).await?, 1);
        assert_eq!(available_credit(&db, customer.id).await, dec!(800));
        Ok(())
    }

    #[tokio::test]
    async fn test_cancel_order_releases_everything() -> Result<()> {
        let db = setup_test_db().await?;
        let config = SettlementConfig::default();
        let gateway = RecordingGateway::default();
        let ctx = test_context(&db, &config, &gateway);
        let customer = create_test_customer(&db, "Mercado Sol", dec!(1000)).await?;
        let seller = create_test_seller(&db, "Bruno", dec!(0.03), None).await?;
        let flour = create_test_product(&db, "Farinha", dec!(100), dec!(120)).await?;

        let mut request = boleto_request(customer.id, flour.id, 3);
        request.seller_id = Some(seller.id);
        request.installment_spec = Some("3x-30-60-90".to_string());
        let outcome = create_order(&ctx, request).await?;
        assert_eq!(available_credit(&db, customer.id).await, dec!(700));

        let cancelled = cancel_order(&db, outcome.order.id).await?;
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert_eq!(available_credit(&db, customer.id).await, dec!(1000));
        assert_eq!(Installment::find().count(&db).await?, 0);
        let commission = Commission::find().one(&db).await?.unwrap();
        assert_eq!(commission.status, CommissionStatus::Cancelled);

        assert!(matches!(
            cancel_order(&db, outcome.order.id).await,
            Err(Error::InvalidOrderState { .. })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_cancel_refused_when_paid() -> Result<()> {
        let db = setup_test_db().await?;
        let order = create_test_cash_order(&db, dec!(90)).await?;
        register_payment(
            &db,
            order.id,
            NewPayment {
                amount: dec!(10),
                payment_method: PaymentMethod::Cash,
                payment_date: None,
                notes: None,
                bank_account_id: None,
            },
        )
        .await?;

        assert!(matches!(
            cancel_order(&db, order.id).await,
            Err(Error::InvalidOrderState { .. })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_available_credit_tracks_outstanding_obligations() -> Result<()> {
        let db = setup_test_db().await?;
        let config = SettlementConfig::default();
        let gateway = RecordingGateway::default();
        let ctx = test_context(&db, &config, &gateway);
        let customer = create_test_customer(&db, "Padaria Central", dec!(2000)).await?;
        let flour = create_test_product(&db, "Farinha", dec!(100), dec!(120)).await?;
        let (customer_id, limit) = (customer.id, customer.credit_limit);
        let check = |label: &'static str| {
            let db = &db;
            async move {
                let expected = limit - outstanding_obligations(db, customer_id).await;
                assert_eq!(available_credit(db, customer_id).await, expected, "after {label}");
            }
        };

        let mut split = boleto_request(customer.id, flour.id, 3);
        split.installment_spec = Some("3x-10-20-30".to_string());
        let boleto_order = create_order(&ctx, split).await?;
        check("boleto order").await;

        let mut on_account = boleto_request(customer.id, flour.id, 5);
        on_account.payment =
            PaymentConfig::split(PaymentMethod::Cash, dec!(300), PaymentMethod::StoreCredit, dec!(200));
        let store_order = create_order(&ctx, on_account).await?;
        check("store credit order").await;

        let receipt = register_payment(
            &db,
            store_order.order.id,
            NewPayment {
                amount: dec!(150),
                payment_method: PaymentMethod::Pix,
                payment_date: None,
                notes: None,
                bank_account_id: None,
            },
        )
        .await?;
        check("first payment").await;

        installment::mark_paid(&db, boleto_order.installments[0].id).await?;
        check("installment paid").await;

        installment::void_installment(&db, boleto_order.installments[1].id).await?;
        check("installment voided").await;

        payment::delete_payment(&db, ReversalPolicy::Arithmetic, receipt.payment.id).await?;
        check("payment deleted").await;

        cancel_order(&db, boleto_order.order.id).await?;
        check("order cancelled").await;

        let remaining = Installment::find()
            .filter(installment_entity::Column::Status.eq(InstallmentStatus::Paid))
            .count(&db)
            .await?;
        assert_eq!(remaining, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_blocked_customer_type_rejected() -> Result<()> {
        let db = setup_test_db().await?;
        let config = SettlementConfig::default();
        let gateway = RecordingGateway::default();
        let ctx = test_context(&db, &config, &gateway);
        let walk_in = create_custom_customer(&db, "Balcão", "walk_in", Some("123.456.789-09"), dec!(500), 30).await?;
        let bread = create_test_product(&db, "Pão", dec!(1), dec!(1.5)).await?;

        let result = create_order(&ctx, boleto_request(walk_in.id, bread.id, 10)).await;
        assert!(matches!(
            result,
            Err(Error::Eligibility(EligibilityError::PaymentMethodNotAllowed { .. }))
        ));
        assert_eq!(Order::find().count(&db).await?, 0);
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_settlements_cannot_overdraw_credit() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let db = setup_file_test_db(dir.path()).await?;
        let customer = create_test_customer(&db, "Padaria Central", dec!(1000)).await?;
        let flour = create_test_product(&db, "Farinha 25kg", dec!(600), dec!(650)).await?;

        // Every request passes the pre-check on its own; any two together exceed the limit
        let handles: Vec<_> = (0..6)
            .map(|_| {
                let db = db.clone();
                let request = boleto_request(customer.id, flour.id, 1);
                tokio::spawn(async move {
                    let config = SettlementConfig::default();
                    let gateway = RecordingGateway::default();
                    let ctx = test_context(&db, &config, &gateway);
                    create_order(&ctx, request).await
                })
            })
            .collect();

        let mut settled = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => settled += 1,
                Err(Error::Eligibility(EligibilityError::InsufficientCredit { .. }) | Error::Database(_)) => {}
                Err(other) => panic!("unexpected settlement error: {other}"),
            }
        }

        assert_eq!(settled, 1);
        assert_eq!(available_credit(&db, customer.id).await, dec!(400));
        assert_eq!(Order::find().count(&db).await?, 1);
        assert_eq!(Installment::find().count(&db).await?, 1);
        Ok(())
    }
}
