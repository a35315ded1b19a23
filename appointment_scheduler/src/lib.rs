pub mod availability;
pub mod configuration;
pub mod configuration_handler;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod local_repository;
pub mod repository;
pub mod slot_generator;
#[cfg(test)]
mod testutils;
pub mod types;
