pub mod address;
pub mod config;
pub mod math;
pub mod result;
