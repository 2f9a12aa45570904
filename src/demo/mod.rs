//! Demo data: document schemas and a seedable generator

pub mod generator;
pub mod models;

pub use generator::DataGenerator;
pub use models::{to_documents, Category, DemoDocument, Log, Order, Product, Transaction, User};
