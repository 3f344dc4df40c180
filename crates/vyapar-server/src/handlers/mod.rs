//! Handlers for the `/api` routes, one module per area

pub mod analyses;
pub mod classify;
pub mod health;

// Re-export all handlers for use in router
pub use analyses::*;
pub use classify::*;
pub use health::*;
