pub mod classify;
pub mod file;
pub mod probe;
