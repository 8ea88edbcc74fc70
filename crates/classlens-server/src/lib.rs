//! ClassLens server: HTTP API over the entity resolution core.

pub mod refresh;
pub mod routes;
pub mod state;

pub use routes::build_router;
pub use state::AppState;
