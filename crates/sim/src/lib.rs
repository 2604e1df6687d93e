pub mod curve_checks;
pub mod engine;
pub mod rate_process;
pub mod retail;
pub mod runner;
