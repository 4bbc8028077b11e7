pub mod admission;
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod ipc;
pub mod ledger;
pub mod logging;
pub mod model;
pub mod predictor;
pub mod risk;
pub mod session;
pub mod store;
