pub mod check;
mod error;
pub mod evaluate;

pub use error::Error;
