pub mod error;
pub mod stats;
pub mod topics;
