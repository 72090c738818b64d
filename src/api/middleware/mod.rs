//! API middleware.

pub mod audit;
pub mod rate;
