pub mod config;
pub mod counters;
pub mod logging;
pub mod lxd;
pub mod s9s;
pub mod suite;
pub mod sys_comm;
pub mod utils;

pub use config::Settings;
