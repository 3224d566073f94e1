pub mod config;
pub mod coordinator;
pub mod error;
pub mod fetch;
pub mod infra;
pub mod omf;
pub mod parser;
pub mod scheduler;
pub mod services;
pub mod sink;
pub mod station;
