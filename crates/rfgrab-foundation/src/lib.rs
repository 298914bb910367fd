pub mod error;
pub mod shutdown;
pub mod units;

pub use error::*;
pub use shutdown::*;
pub use units::*;
