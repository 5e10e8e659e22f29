// src/core/mod.rs

pub mod alias_loader;
pub mod alias_resolver;
pub mod cache;
pub mod dispatch;
pub mod hooks;
pub mod option_merger;
pub mod path_aliases;
pub mod paths;
pub mod settings;
pub mod token;
pub mod transfer;
