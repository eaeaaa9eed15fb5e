pub mod api;
pub mod audit;
pub mod core;
pub mod models;
pub mod notifications;
pub mod pdf;
pub mod routes;
pub mod schema;
pub mod verification;
pub mod workflow;
