pub mod config;
pub mod group;
pub mod observability;
pub mod protocol;
