//! Domain services used by HTTP and websocket routes.
//!
//! ARCHITECTURE
//! ============
//! Service modules own business logic and persistence so route handlers
//! stay focused on protocol translation and auth plumbing. Pure helpers
//! (amounts, validation, filters, export) sit beside the database-backed
//! services that use them.

pub mod access;
pub mod amount;
pub mod audit;
pub mod cash;
pub mod client;
pub mod dashboard;
pub mod direct;
pub mod export;
pub mod filter;
pub mod operation;
pub mod profile;
pub mod session;
pub mod stats;
pub mod transfer;
pub mod validation;
