//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the settlement and ledger tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod bank_account;
pub mod commission;
pub mod customer;
pub mod enums;
pub mod installment;
pub mod order;
pub mod order_item;
pub mod payment;
pub mod product;
pub mod seller;
pub mod transaction;

// Re-export specific types to avoid conflicts
pub use bank_account::{
    Column as BankAccountColumn, Entity as BankAccount, Model as BankAccountModel,
};
pub use commission::{Column as CommissionColumn, Entity as Commission, Model as CommissionModel};
pub use customer::{Column as CustomerColumn, Entity as Customer, Model as CustomerModel};
pub use installment::{
    Column as InstallmentColumn, Entity as Installment, Model as InstallmentModel,
};
pub use order::{Column as OrderColumn, Entity as Order, Model as OrderModel};
pub use order_item::{Column as OrderItemColumn, Entity as OrderItem, Model as OrderItemModel};
pub use payment::{Column as PaymentColumn, Entity as Payment, Model as PaymentModel};
pub use product::{Column as ProductColumn, Entity as Product, Model as ProductModel};
pub use seller::{Column as SellerColumn, Entity as Seller, Model as SellerModel};
pub use transaction::{
    Column as TransactionColumn, Entity as Transaction, Model as TransactionModel,
};
