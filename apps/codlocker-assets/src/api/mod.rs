//! API endpoint handlers for the asset service.

pub mod assets;
pub mod system;
