//! Sandbox world for tests and the headless driver.
//!
//! [`GameBuilder`] lays out a hand-made position the same way every time:
//! players are registered in call order, so the first `with_player` is
//! `PlayerId(0)`. [`new_match`] sets up a whole match on a generated island
//! with AI players queued to spawn.

mod entities;
mod map;
mod scenario;
mod world;

pub use entities::{SandboxPlayer, SandboxUnit};
pub use map::SandboxMap;
pub use scenario::{new_match, MatchSettings};
pub use world::{BombLaunch, EmojiEvent, SandboxGame};

use crate::config::{Config, GameConfig};
use crate::game::{Game, GameMap, Gold, PlayerId, PlayerInfo, Tick, UnitType};

pub struct GameBuilder {
    map: SandboxMap,
    config: Config,
    game_id: String,
    ticks: Tick,
    players: Vec<PlayerInfo>,
    tiles: Vec<(PlayerId, i32, i32)>,
    troops: Vec<(PlayerId, f64)>,
    gold: Vec<(PlayerId, Gold)>,
    units: Vec<(PlayerId, UnitType, i32, i32)>,
}

impl GameBuilder {
    pub fn new() -> Self {
        Self {
            map: SandboxMap::land(64, 64),
            config: Config::default(),
            game_id: "sandbox".to_string(),
            ticks: 0,
            players: Vec::new(),
            tiles: Vec::new(),
            troops: Vec::new(),
            gold: Vec::new(),
            units: Vec::new(),
        }
    }

    pub fn with_map(mut self, map: SandboxMap) -> Self {
        self.map = map;
        self
    }

    pub fn with_config(mut self, game: GameConfig) -> Self {
        self.config = Config::new(game);
        self
    }

    pub fn with_full_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn game_id(mut self, id: &str) -> Self {
        self.game_id = id.to_string();
        self
    }

    pub fn with_player(mut self, info: PlayerInfo) -> Self {
        self.players.push(info);
        self
    }

    /// `size` x `size` block with its top-left corner at `(x, y)`.
    pub fn with_square(mut self, player: PlayerId, x: i32, y: i32, size: i32) -> Self {
        for dy in 0..size {
            for dx in 0..size {
                self.tiles.push((player, x + dx, y + dy));
            }
        }
        self
    }

    pub fn with_tile(mut self, player: PlayerId, x: i32, y: i32) -> Self {
        self.tiles.push((player, x, y));
        self
    }

    pub fn with_troops(mut self, player: PlayerId, troops: f64) -> Self {
        self.troops.push((player, troops));
        self
    }

    pub fn with_gold(mut self, player: PlayerId, gold: Gold) -> Self {
        self.gold.push((player, gold));
        self
    }

    /// A finished unit, free of charge.
    pub fn with_unit(mut self, player: PlayerId, kind: UnitType, x: i32, y: i32) -> Self {
        self.units.push((player, kind, x, y));
        self
    }

    pub fn at_tick(mut self, ticks: Tick) -> Self {
        self.ticks = ticks;
        self
    }

    pub fn build(self) -> SandboxGame {
        let mut game = SandboxGame::new(self.map, self.config, self.game_id);
        for info in self.players {
            game.add_player(info);
        }
        for (player, x, y) in self.tiles {
            if game.is_valid_coord(x, y) && game.is_land(game.ref_at(x, y)) {
                game.set_owner_at(Some(player), x, y);
            }
        }
        for (player, troops) in self.troops {
            game.set_troops(player, troops);
        }
        for (player, gold) in self.gold {
            game.set_gold(player, gold);
        }
        for (player, kind, x, y) in self.units {
            let tile = game.ref_at(x, y);
            game.place_unit(player, kind, tile);
        }
        game.set_ticks(self.ticks);
        game.refresh_neighbors();
        game
    }
}

impl Default for GameBuilder {
    fn default() -> Self {
        Self::new()
    }
}
