//! Shared test utilities for the settlement engine.
//!
//! This module provides common helper functions for setting up test databases
//! and creating test entities with sensible defaults.

use crate::{
    config::settings::SettlementConfig,
    core::{
        credit,
        ledger::{self, NewBankAccount},
        settlement::SettlementContext,
    },
    entities::{
        self,
        enums::{InstallmentStatus, OrderStatus, OrderType, PaymentMethod},
    },
    errors::Result,
    gateway::{BoletoRequest, GatewayError, IssuedBoleto, LogNotifier, PaymentGateway},
};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, PaginatorTrait, Set};
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Sets up a database file under `dir`. Unlike the in-memory database it is served by
/// a pool of connections, so concurrent transactions really contend.
pub async fn setup_file_test_db(dir: &std::path::Path) -> Result<DatabaseConnection> {
    let url = format!("sqlite://{}?mode=rwc", dir.join("ledger.sqlite").display());
    let db = sea_orm::Database::connect(url).await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Creates a test customer with sensible defaults.
///
/// # Defaults
/// * `customer_type`: "company"
/// * `tax_id`: a well-formed CPF
/// * `available_credit`: equal to `credit_limit`
/// * `payment_terms`: 30 days
pub async fn create_test_customer(
    db: &DatabaseConnection,
    name: &str,
    credit_limit: Decimal,
) -> Result<entities::customer::Model> {
    create_custom_customer(db, name, "company", Some("123.456.789-09"), credit_limit, 30).await
}

/// Creates a test customer with custom parameters.
/// Use this when you need to test specific customer configurations.
pub async fn create_custom_customer(
    db: &DatabaseConnection,
    name: &str,
    customer_type: &str,
    tax_id: Option<&str>,
    credit_limit: Decimal,
    payment_terms: i32,
) -> Result<entities::customer::Model> {
    Ok(entities::customer::ActiveModel {
        name: Set(name.to_string()),
        tax_id: Set(tax_id.map(str::to_string)),
        email: Set(Some(format!("{}@example.com", name.to_lowercase().replace(' ', ".")))),
        phone: Set(None),
        customer_type: Set(customer_type.to_string()),
        credit_limit: Set(credit_limit),
        available_credit: Set(credit_limit),
        payment_terms: Set(payment_terms),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await?)
}

/// Creates an active catalog product.
pub async fn create_test_product(
    db: &DatabaseConnection,
    name: &str,
    wholesale_price: Decimal,
    retail_price: Decimal,
) -> Result<entities::product::Model> {
    Ok(entities::product::ActiveModel {
        name: Set(name.to_string()),
        wholesale_price: Set(wholesale_price),
        retail_price: Set(retail_price),
        is_active: Set(true),
        ..Default::default()
    }
    .insert(db)
    .await?)
}

/// Creates an active seller. `commission_rate` is a fraction (0.05 = 5%).
pub async fn create_test_seller(
    db: &DatabaseConnection,
    name: &str,
    commission_rate: Decimal,
    max_discount_percent: Option<Decimal>,
) -> Result<entities::seller::Model> {
    Ok(entities::seller::ActiveModel {
        name: Set(name.to_string()),
        commission_rate: Set(commission_rate),
        max_discount_percent: Set(max_discount_percent),
        is_active: Set(true),
        ..Default::default()
    }
    .insert(db)
    .await?)
}

/// Opens a bank account with the given opening balance.
pub async fn create_test_account(
    db: &DatabaseConnection,
    name: &str,
    opening_balance: Decimal,
) -> Result<entities::bank_account::Model> {
    ledger::create_bank_account(
        db,
        NewBankAccount {
            name: name.to_string(),
            opening_balance,
            ..Default::default()
        },
    )
    .await
}

/// Inserts a confirmed order directly, bypassing settlement. No credit is touched.
async fn insert_order(
    db: &DatabaseConnection,
    customer_id: Option<i64>,
    total: Decimal,
    method: PaymentMethod,
) -> Result<entities::order::Model> {
    let sequence = entities::Order::find().count(db).await? + 1;
    Ok(entities::order::ActiveModel {
        order_number: Set(format!("{}-{sequence:05}", Utc::now().format("%Y%m%d"))),
        customer_id: Set(customer_id),
        seller_id: Set(None),
        order_type: Set(OrderType::Retail),
        is_own_order: Set(false),
        subtotal: Set(total),
        discount_percent: Set(Decimal::ZERO),
        discount: Set(Decimal::ZERO),
        delivery_fee: Set(Decimal::ZERO),
        total: Set(total),
        payment_method: Set(method),
        secondary_payment_method: Set(None),
        primary_amount: Set(total),
        secondary_amount: Set(None),
        installment_spec: Set(None),
        status: Set(OrderStatus::Confirmed),
        delivery_date: Set(None),
        delivery_address: Set(None),
        notes: Set(None),
        idempotency_key: Set(None),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await?)
}

/// Creates a cash order without a customer.
pub async fn create_test_cash_order(
    db: &DatabaseConnection,
    total: Decimal,
) -> Result<entities::order::Model> {
    insert_order(db, None, total, PaymentMethod::Cash).await
}

/// Creates a customer and an order paid entirely on store credit, drawing that
/// credit the way settlement does.
pub async fn create_test_store_credit_order(
    db: &DatabaseConnection,
    credit_limit: Decimal,
    total: Decimal,
) -> Result<(entities::customer::Model, entities::order::Model)> {
    let customer = create_test_customer(db, "Cliente Fiado", credit_limit).await?;
    let order = insert_order(db, Some(customer.id), total, PaymentMethod::StoreCredit).await?;
    credit::consume_credit(db, customer.id, total).await?;
    Ok((customer, order))
}

/// Creates a PENDING installment for `customer`, backed by a boleto order of the same
/// amount. No credit is touched.
pub async fn create_test_installment(
    db: &DatabaseConnection,
    customer: &entities::customer::Model,
    amount: Decimal,
    due_date: NaiveDate,
) -> Result<entities::installment::Model> {
    let order = insert_order(db, Some(customer.id), amount, PaymentMethod::Boleto).await?;
    Ok(entities::installment::ActiveModel {
        order_id: Set(order.id),
        customer_id: Set(customer.id),
        amount: Set(amount),
        due_date: Set(due_date),
        status: Set(InstallmentStatus::Pending),
        is_installment: Set(false),
        installment_number: Set(1),
        total_installments: Set(1),
        gateway_id: Set(None),
        payment_code: Set(None),
        payment_url: Set(None),
        paid_at: Set(None),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await?)
}

/// Gateway that issues a deterministic code per installment and counts calls.
#[derive(Debug, Default)]
pub struct RecordingGateway {
    calls: AtomicUsize,
}

impl RecordingGateway {
    /// Number of boletos issued so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentGateway for RecordingGateway {
    async fn issue_boleto(&self, request: &BoletoRequest) -> std::result::Result<IssuedBoleto, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(IssuedBoleto {
            gateway_id: format!("gw-{}", request.reference),
            payment_code: format!("34191.79001 01043.510047 {:0>8}", request.reference),
            payment_url: Some(format!("https://boletos.test/{}", request.reference)),
        })
    }
}

/// Gateway that rejects every request.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingGateway;

#[async_trait]
impl PaymentGateway for FailingGateway {
    async fn issue_boleto(&self, _request: &BoletoRequest) -> std::result::Result<IssuedBoleto, GatewayError> {
        Err(GatewayError::Rejected {
            status: 503,
            body: "provider unavailable".to_string(),
        })
    }
}

/// Settlement collaborators for tests, with a logging notifier.
pub fn test_context<'a>(
    db: &'a DatabaseConnection,
    config: &'a SettlementConfig,
    gateway: &'a dyn PaymentGateway,
) -> SettlementContext<'a> {
    SettlementContext {
        db,
        config,
        gateway,
        notifier: Arc::new(LogNotifier),
    }
}
