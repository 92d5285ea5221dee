pub mod commands;
pub mod dispatcher;
pub mod sequence;

pub use commands::*;
pub use dispatcher::*;
pub use sequence::*;
