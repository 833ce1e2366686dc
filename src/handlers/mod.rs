// src/handlers/mod.rs

pub mod auth;
pub mod history;
pub mod leaderboard;
pub mod profile;
pub mod session;
