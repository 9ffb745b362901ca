//! Profile ingestion, enrichment, and LLM scoring engine.
//!
//! Top-level modules map one-to-one onto the engine's components: canonical
//! data model ([`canonical`]), outbound clients ([`workflow_client`],
//! [`llm_client`]), inbound normalization ([`adapter`]), domain services
//! ([`organization`], [`orchestrator`], [`scoring`], [`template`],
//! [`health`]), the persistence gateway ([`persistence`]), the in-process
//! request/job tracker ([`tracker`]), and the HTTP surface ([`api`]).

pub mod adapter;
pub mod api;
pub mod canonical;
pub mod config;
pub mod error;
pub mod health;
pub mod llm_client;
pub mod organization;
pub mod orchestrator;
pub mod persistence;
pub mod retry;
pub mod scoring;
pub mod template;
pub mod tracker;
pub mod workflow_client;

pub use config::AppConfig;
pub use error::{AppError, Result};
