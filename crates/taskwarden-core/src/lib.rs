pub mod id;
pub mod identity;
pub mod loader;
pub mod model;
pub mod policy;
pub mod resource;
