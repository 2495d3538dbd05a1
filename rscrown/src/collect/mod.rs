pub mod global_variables;
pub mod point_cloud;
pub mod reader;
