pub mod alerts;
pub mod health;
pub mod integrations;
pub mod series;
pub mod sync;
pub mod workspaces;
