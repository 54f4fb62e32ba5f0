pub mod ai;
pub mod game;
pub mod input;
pub mod physics;
pub mod render;
mod session;

pub use session::{run_game, GameSession, HockeyGame, SpawnTriggers, AI_SPAWN_DEBOUNCE};

/// Session-level settings: rink dimensions and how many AI players to field
/// per side.
#[derive(Debug, Clone)]
pub struct GameConfiguration {
    pub rink_width: f32,
    pub rink_height: f32,
    pub ai_players_home: usize,
    pub ai_players_away: usize,
}

impl Default for GameConfiguration {
    fn default() -> Self {
        Self {
            rink_width: 61.0,
            rink_height: 30.0,
            ai_players_home: 0,
            ai_players_away: 0,
        }
    }
}
