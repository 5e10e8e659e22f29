// src/cli/handlers/mod.rs

// One module per command, plus the session state they share.

pub mod browse;
pub mod commons;
pub mod rsync;
pub mod site_alias;
pub mod sql_conf;
pub mod ssh;
pub mod status;
pub mod version;
