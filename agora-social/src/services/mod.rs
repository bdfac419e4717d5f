pub mod accounts;
pub mod aggregation;
pub mod credentials;
pub mod policy;
