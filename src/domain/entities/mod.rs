pub mod position;
pub mod signal;
