pub mod identity;
pub mod record;
pub mod table;
