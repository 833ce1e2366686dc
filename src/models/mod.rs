// src/models/mod.rs

pub mod history;
pub mod question;
pub mod test_config;
pub mod user;
