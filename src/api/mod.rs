//! HTTP surface: routing, handlers and their request/response types

mod error;
pub mod models;
mod server;
pub mod services;
pub mod state;
pub(crate) mod utils;
mod validation;

pub use error::ApiError;
pub use server::{build_router, run};
