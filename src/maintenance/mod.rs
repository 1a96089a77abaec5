pub mod connection;
pub mod doctor;
pub mod repair;

pub use connection::*;
pub use doctor::*;
pub use repair::*;
