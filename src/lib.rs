pub mod cli;
pub mod config;
pub mod fetch;
pub mod job;
pub mod load;
pub mod notify;
pub mod process;
