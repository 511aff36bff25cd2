//! HTTP request handlers organized by domain

pub mod auth;
pub mod inquiry;
pub mod points;

// Re-export all handlers for use in router
pub use auth::*;
pub use inquiry::*;
pub use points::*;
