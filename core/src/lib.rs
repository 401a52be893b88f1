pub mod error;
pub mod locator;

pub use error::CarbonError;
pub use locator::{BufferDataLocator, DataLocator, FileDataLocator};
