//! Application services for the asset service.

pub mod assets;
pub mod flags;
pub mod storage;
