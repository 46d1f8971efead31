pub mod config;
pub mod error;

pub use config::AppConfig;
pub use error::{OfferError, OfferResult};
