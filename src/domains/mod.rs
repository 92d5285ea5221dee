pub mod dispatch;
pub mod fleet;
pub mod geodesy;
pub mod guidance;
pub mod logger;
pub mod mapping;
pub mod ports;
pub mod routing;
pub mod topics;

pub use logger::*;
pub use ports::*;
