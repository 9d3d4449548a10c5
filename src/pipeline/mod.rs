pub mod batch;
pub mod merge;
