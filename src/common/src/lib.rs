pub mod constants;
pub mod ring;
pub mod types;
