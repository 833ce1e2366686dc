// src/session/phase.rs

use std::fmt;

use serde::{Deserialize, Serialize};

/// The screen a user's workspace is on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Gate before any authenticated phase.
    #[default]
    Auth,
    Home,
    Setup,
    Confirmation,
    Generating,
    /// The only phase with a running countdown.
    InProgress,
    Completed,
    Review,
    History,
    ViewHistoryDetails,
    Profile,
    Leaderboard,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Auth => "auth",
            Phase::Home => "home",
            Phase::Setup => "setup",
            Phase::Confirmation => "confirmation",
            Phase::Generating => "generating",
            Phase::InProgress => "in_progress",
            Phase::Completed => "completed",
            Phase::Review => "review",
            Phase::History => "history",
            Phase::ViewHistoryDetails => "view_history_details",
            Phase::Profile => "profile",
            Phase::Leaderboard => "leaderboard",
        };
        f.write_str(name)
    }
}
