pub mod case_store;
pub mod extract;
pub mod models;
pub mod service;

pub use models::*;
pub use service::{AppState, build_router, create_app};
