pub mod aggregate;
pub mod conversion;
pub mod polygon;

pub use aggregate::*;
pub use conversion::*;
pub use polygon::*;
