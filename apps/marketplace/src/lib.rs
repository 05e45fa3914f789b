// apps/marketplace/src/lib.rs

//! HTTP service for the marketplace: actix-web handlers over `bazaar` pipelines,
//! with Postgres persistence and a Paystack-compatible gateway.

pub mod config;
pub mod errors;
pub mod models;
pub mod pipelines;
pub mod state;
pub mod store;
pub mod web;
