pub mod alert;
pub mod integration;
pub mod snapshot;
