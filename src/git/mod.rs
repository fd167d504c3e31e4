pub mod cache;
pub mod command;
pub mod executor;
pub mod registry;
pub mod working_directory;
