pub mod read;
pub mod rm;
pub mod write;
