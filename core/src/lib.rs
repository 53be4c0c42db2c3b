pub mod error;

pub use error::{FatpackError, FatpackResult};
