pub mod export;
pub mod persistence;
