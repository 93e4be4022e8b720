//! Dealflow - off-market wholesale real-estate marketplace
//!
//! This library provides the core functionality for the Dealflow marketplace
//! service: a thin orchestration layer over a hosted data/auth platform.
//! It exposes all modules for testing purposes.

pub mod admin;
pub mod approvals;
pub mod catalog;
pub mod deals;
pub mod errors;
pub mod events;
pub mod guard;
pub mod mailer;
pub mod models;
pub mod notify;
pub mod offers;
pub mod session;
pub mod settings;
pub mod store;
pub mod web;
