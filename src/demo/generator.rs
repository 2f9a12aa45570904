//! Synthetic demo data

use crate::common::{round_cents, timestamp_now};
use crate::demo::models::{
    Category, Log, Order, OrderLine, Product, ShippingAddress, Transaction, User, UserPreferences,
};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;

pub const PRODUCT_CATEGORIES: &[&str] = &["Electronics", "Clothing", "Books", "Home", "Sports"];

pub const CATEGORY_NAMES: &[&str] = &[
    "Electronics",
    "Clothing",
    "Books",
    "Home",
    "Sports",
    "Automotive",
    "Health",
];

pub const LOG_ACTIONS: &[&str] = &[
    "login",
    "logout",
    "view_product",
    "add_to_cart",
    "checkout",
    "payment",
];

/// Countries every product ships to
pub const PRODUCT_REGIONS: &[&str] = &["CN", "TR", "AE", "US", "EU", "GB"];

/// Country code of users that belong to no zone
pub const GLOBAL_COUNTRY: &str = "GLOBAL";
pub const GLOBAL_REGION: &str = "global";

pub const ORDER_TOTAL: f64 = 56.99;
pub const CURRENCY: &str = "USD";

/// Builds demo documents from a single RNG, so a seed reproduces a run
pub struct DataGenerator {
    rng: StdRng,
}

impl DataGenerator {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn from_seed(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self::seeded(seed),
            None => Self::new(),
        }
    }

    /// Random v4 UUID drawn from this generator's RNG
    pub fn uuid(&mut self) -> String {
        uuid::Builder::from_random_bytes(self.rng.gen())
            .into_uuid()
            .to_string()
    }

    fn pick(&mut self, options: &[&str]) -> String {
        options
            .choose(&mut self.rng)
            .copied()
            .unwrap_or_default()
            .to_string()
    }

    pub fn user(&mut self, country: &str, region: &str) -> User {
        let user_id = self.uuid();
        let username = format!("user_{}", &user_id[..8]);
        let now = timestamp_now();
        let language = if matches!(country, "US" | "GB") {
            "en"
        } else {
            "local"
        };

        User {
            email: format!("{}@example.com", username),
            username,
            user_id,
            country: country.to_string(),
            region: region.to_string(),
            created_at: now,
            last_login: now,
            preferences: UserPreferences {
                language: language.to_string(),
                timezone: "UTC".to_string(),
                notifications: true,
            },
        }
    }

    pub fn product(&mut self) -> Product {
        let product_id = self.uuid();
        let short = product_id[..8].to_string();
        let now = timestamp_now();
        let price = round_cents(10.0 + f64::from(self.rng.gen_range(0..1000u32)) / 10.0);

        Product {
            name: format!("Product {}", short),
            description: format!("Description for product {}", short),
            category: self.pick(PRODUCT_CATEGORIES),
            price,
            currency: CURRENCY.to_string(),
            available_regions: PRODUCT_REGIONS.iter().map(|r| r.to_string()).collect(),
            created_at: now,
            updated_at: now,
            product_id,
        }
    }

    pub fn category(&mut self) -> Category {
        let name = self.pick(CATEGORY_NAMES);
        Category {
            category_id: self.uuid(),
            description: format!("Category description for {}", name),
            name,
            parent_category: None,
            created_at: Some(timestamp_now()),
        }
    }

    pub fn order(&mut self, user_id: &str, country: &str, region: &str) -> Order {
        let now = timestamp_now();
        Order {
            order_id: self.uuid(),
            user_id: user_id.to_string(),
            country: country.to_string(),
            region: region.to_string(),
            products: vec![
                OrderLine {
                    product_id: self.uuid(),
                    quantity: 1,
                    price: 25.99,
                },
                OrderLine {
                    product_id: self.uuid(),
                    quantity: 2,
                    price: 15.50,
                },
            ],
            total_amount: ORDER_TOTAL,
            currency: CURRENCY.to_string(),
            status: "pending".to_string(),
            created_at: now,
            updated_at: now,
            shipping_address: ShippingAddress {
                street: "123 Main St".to_string(),
                city: "Sample City".to_string(),
                country: country.to_string(),
                postal_code: "12345".to_string(),
            },
        }
    }

    pub fn transaction(
        &mut self,
        order_id: &str,
        user_id: &str,
        country: &str,
        region: &str,
    ) -> Transaction {
        let now = timestamp_now();
        Transaction {
            transaction_id: self.uuid(),
            order_id: order_id.to_string(),
            user_id: user_id.to_string(),
            country: country.to_string(),
            region: region.to_string(),
            amount: ORDER_TOTAL,
            currency: CURRENCY.to_string(),
            payment_method: "credit_card".to_string(),
            status: "completed".to_string(),
            created_at: now,
            processed_at: Some(now),
        }
    }

    pub fn log(&mut self, user_id: &str, country: &str, region: &str) -> Log {
        let mut details = BTreeMap::new();
        details.insert("session_id".to_string(), self.uuid());

        Log {
            log_id: self.uuid(),
            user_id: user_id.to_string(),
            country: country.to_string(),
            region: region.to_string(),
            action: self.pick(LOG_ACTIONS),
            resource: format!("resource_{}", self.rng.gen_range(0..100u32)),
            details,
            ip_address: format!("192.168.1.{}", self.rng.gen_range(0..255u32)),
            user_agent: "Mozilla/5.0 (Demo Browser)".to_string(),
            created_at: timestamp_now(),
        }
    }

    /// Pick a user id from `users`, or mint one when there are none
    pub fn user_id_from(&mut self, users: &[User]) -> String {
        match users.choose(&mut self.rng) {
            Some(user) => user.user_id.clone(),
            None => self.uuid(),
        }
    }
}

impl Default for DataGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_user_generation() {
        let mut generator = DataGenerator::seeded(7);
        let user = generator.user("CN", "region1");
        assert_eq!(user.country, "CN");
        assert_eq!(user.region, "region1");
        assert_eq!(user.preferences.language, "local");
        assert!(user.username.starts_with("user_"));
        assert_eq!(user.email, format!("{}@example.com", user.username));

        assert_eq!(generator.user("GB", "region2").preferences.language, "en");
    }

    #[test]
    fn test_uuids_are_v4_and_unique() {
        let mut generator = DataGenerator::seeded(1);
        let a = Uuid::parse_str(&generator.uuid()).unwrap();
        let b = Uuid::parse_str(&generator.uuid()).unwrap();
        assert_ne!(a, b);
        assert_eq!(a.get_version_num(), 4);
    }

    #[test]
    fn test_seed_reproduces_ids() {
        let mut first = DataGenerator::seeded(42);
        let mut second = DataGenerator::seeded(42);
        assert_eq!(first.product().product_id, second.product().product_id);
        assert_eq!(first.log("u", "TR", "region1").action, second.log("u", "TR", "region1").action);
    }

    #[test]
    fn test_product_fields_in_range() {
        let mut generator = DataGenerator::seeded(3);
        for _ in 0..200 {
            let product = generator.product();
            assert!(product.price >= 10.0 && product.price < 110.0);
            assert!(PRODUCT_CATEGORIES.contains(&product.category.as_str()));
            assert_eq!(product.available_regions.len(), PRODUCT_REGIONS.len());
        }
    }

    #[test]
    fn test_order_and_transaction_carry_shard_key() {
        let mut generator = DataGenerator::seeded(5);
        let order = generator.order("user-1", "AE", "region2");
        assert_eq!(order.country, "AE");
        assert_eq!(order.region, "region2");
        assert_eq!(order.shipping_address.country, "AE");
        assert_eq!(order.products.len(), 2);
        assert_eq!(order.total_amount, ORDER_TOTAL);

        let txn = generator.transaction(&order.order_id, "user-1", "AE", "region2");
        assert_eq!(txn.order_id, order.order_id);
        assert!(txn.processed_at.is_some());
    }

    #[test]
    fn test_log_fields() {
        let mut generator = DataGenerator::seeded(9);
        let log = generator.log("user-1", "US", "region2");
        assert!(LOG_ACTIONS.contains(&log.action.as_str()));
        assert!(log.resource.starts_with("resource_"));
        assert!(log.ip_address.starts_with("192.168.1."));
        assert!(log.details.contains_key("session_id"));
    }

    #[test]
    fn test_category_description_matches_name() {
        let mut generator = DataGenerator::seeded(11);
        let category = generator.category();
        assert!(CATEGORY_NAMES.contains(&category.name.as_str()));
        assert_eq!(
            category.description,
            format!("Category description for {}", category.name)
        );
    }

    #[test]
    fn test_user_id_from_falls_back_to_uuid() {
        let mut generator = DataGenerator::seeded(2);
        let users = vec![generator.user("GLOBAL", "global")];
        assert_eq!(generator.user_id_from(&users), users[0].user_id);
        assert!(Uuid::parse_str(&generator.user_id_from(&[])).is_ok());
    }
}
