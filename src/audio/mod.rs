pub mod decoder;
pub mod quality;
