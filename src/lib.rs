pub mod api;
pub mod authz;
pub mod config;
pub mod db;
pub mod error;
pub mod gate;
pub mod identity;
pub mod mem;
pub mod model;
pub mod ratelimit;
pub mod store;
pub mod telemetry;
