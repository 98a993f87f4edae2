pub mod error;
pub mod fetchers;
pub mod normalizer;
pub mod persister;
pub mod registry;
pub mod types;
pub mod worker;
