//! HTTP surface (spec §6): resource-oriented routes over the ingestion,
//! organization, scoring, and template services, authenticated by a
//! pre-shared `X-API-Key` and wrapped in the teacher's request-id / rate
//! limit / CORS middleware stack.

pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;
pub mod types;

pub use server::{build_router, serve};
pub use state::AppState;
