//! Config composition: defaults, then sources in precedence order.

pub mod policy;
pub mod service;
