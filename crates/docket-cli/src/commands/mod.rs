pub mod batch;
pub mod config;
pub mod engines;
pub mod merge;
pub mod process;
pub mod recognize;
pub mod show;
