//! Scanner: handle grammar, region classification and mention location

pub mod handle;
pub mod region;
pub mod locator;

pub use handle::*;
pub use region::*;
pub use locator::*;
