pub mod aggregate;

pub use aggregate::{
    IndexStrategyKind, KeyFieldPair, ManagedField, ProcessConfig, ShippingPolicy,
};
