pub mod conversion;
pub mod converter;
pub mod staging;
pub mod sweeper;
