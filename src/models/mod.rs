pub mod polygon;
pub mod records;
pub mod system;
