pub mod catalog;
pub mod enums;
pub mod scan;

pub use catalog::*;
pub use enums::*;
pub use scan::*;
