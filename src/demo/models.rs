//! Demo document schemas
//!
//! Common collections (`users`, `products`, `categories`) hold the same data in
//! every region. Tenant collections (`orders`, `transactions`, `logs`) carry
//! `country` and `region`, the shard key fields that zone ranges match on.

use crate::common::Result;
use chrono::{DateTime, Utc};
use mongodb::bson::{self, Document};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Anything stored as a BSON document
pub trait DemoDocument: Serialize {
    fn to_document(&self) -> Result<Document> {
        Ok(bson::to_document(self)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserPreferences {
    pub language: String,
    pub timezone: String,
    pub notifications: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub user_id: String,
    pub username: String,
    pub email: String,
    pub country: String,
    pub region: String,
    pub created_at: DateTime<Utc>,
    pub last_login: DateTime<Utc>,
    pub preferences: UserPreferences,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub product_id: String,
    pub name: String,
    pub description: String,
    pub category: String,
    pub price: f64,
    pub currency: String,
    pub available_regions: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub category_id: String,
    pub name: String,
    pub description: String,
    pub parent_category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: String,
    pub quantity: u32,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub street: String,
    pub city: String,
    pub country: String,
    pub postal_code: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: String,
    pub user_id: String,
    pub country: String,
    pub region: String,
    pub products: Vec<OrderLine>,
    pub total_amount: f64,
    pub currency: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub shipping_address: ShippingAddress,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub transaction_id: String,
    pub order_id: String,
    pub user_id: String,
    pub country: String,
    pub region: String,
    pub amount: f64,
    pub currency: String,
    pub payment_method: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Log {
    pub log_id: String,
    pub user_id: String,
    pub country: String,
    pub region: String,
    pub action: String,
    pub resource: String,
    pub details: BTreeMap<String, String>,
    pub ip_address: String,
    pub user_agent: String,
    pub created_at: DateTime<Utc>,
}

impl DemoDocument for User {}
impl DemoDocument for Product {}
impl DemoDocument for Category {}
impl DemoDocument for Order {}
impl DemoDocument for Transaction {}
impl DemoDocument for Log {}

/// Convert a batch of models into documents
pub fn to_documents<T: DemoDocument>(items: &[T]) -> Result<Vec<Document>> {
    items.iter().map(DemoDocument::to_document).collect()
}
