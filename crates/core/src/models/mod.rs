pub mod analytics;
pub mod asset;
pub mod holding;
pub mod message;
pub mod quote;
pub mod reference;
