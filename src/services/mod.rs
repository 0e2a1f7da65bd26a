pub mod aggregation;
pub mod catalog;
pub mod electrical;
pub mod geometry;
pub mod irradiance;
pub mod pipeline;
pub mod solar_position;
pub mod weather;
