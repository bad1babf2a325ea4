pub mod hierarchy;
pub mod registry;
pub mod resolver;
