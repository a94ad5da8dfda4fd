pub mod actor;
pub mod group;
pub mod request;
