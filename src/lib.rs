// src/lib.rs

// Client-side load balancing core
pub mod error;
pub mod load_balancer;
pub mod service_registry;

// HTTP glue: the greeting api and the three ways of calling it
pub mod api;
pub mod balanced_client;
pub mod fetch;
pub mod middleware;

pub mod config;
pub mod discovery;
pub mod runner;
