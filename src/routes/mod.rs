pub mod accounts;
pub mod cargo;
pub mod contacts;
pub mod reports;
pub mod statistics;
pub mod volunteers;
