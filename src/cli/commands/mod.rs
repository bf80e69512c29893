pub mod config;
pub mod history;
pub mod hook;
pub mod report;
pub mod serve;
pub mod suggest;
