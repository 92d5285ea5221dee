pub mod navigation_loop;
pub mod navigation_service;
pub mod robot_locks;

pub use navigation_loop::*;
pub use navigation_service::*;
pub use robot_locks::*;
