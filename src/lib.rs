pub mod aggregate;
pub mod annotation;
pub mod batch;
pub mod config;
pub mod detection;
pub mod error;
pub mod extract;
pub mod output;
pub mod scoring;
