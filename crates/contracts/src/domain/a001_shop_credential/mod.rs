pub mod aggregate;

pub use aggregate::{BearerToken, ShopCredential};
