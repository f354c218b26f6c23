pub mod algos;
pub mod config;
pub mod processes;
pub mod services;
