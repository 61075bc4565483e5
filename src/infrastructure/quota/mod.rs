//! Quota enforcement infrastructure

mod enforcer;

pub use enforcer::{QuotaConfig, QuotaEnforcer};
