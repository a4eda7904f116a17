//! Data models for documents, register records and configuration.

pub mod config;
pub mod document;
pub mod record;
