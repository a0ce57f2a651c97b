pub mod case;
pub mod export;

pub use case::*;
