use crate::game::{Gold, Player, PlayerKind, UnitType};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// AI strength. Every tunable in the behavior modules is a total function of
/// this value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
    Impossible,
}

impl Difficulty {
    pub const ALL: [Difficulty; 4] = [
        Difficulty::Easy,
        Difficulty::Medium,
        Difficulty::Hard,
        Difficulty::Impossible,
    ];
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
            Difficulty::Impossible => "impossible",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown difficulty: {0}")]
pub struct ParseDifficultyError(String);

impl FromStr for Difficulty {
    type Err = ParseDifficultyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            "impossible" => Ok(Difficulty::Impossible),
            _ => Err(ParseDifficultyError(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameMode {
    FreeForAll,
    Team,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameType {
    Singleplayer,
    Public,
    Private,
}

/// Per-match settings chosen in the lobby.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub difficulty: Difficulty,
    pub game_mode: GameMode,
    pub game_type: GameType,
    /// Number of teams in team mode.
    pub player_teams: u32,
    pub bots: u32,
    pub infinite_gold: bool,
    pub infinite_troops: bool,
    pub instant_build: bool,
    pub donate_gold: bool,
    pub donate_troops: bool,
    pub disable_nations: bool,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            difficulty: Difficulty::Medium,
            game_mode: GameMode::FreeForAll,
            game_type: GameType::Singleplayer,
            player_teams: 2,
            bots: 0,
            infinite_gold: false,
            infinite_troops: false,
            instant_build: false,
            donate_gold: true,
            donate_troops: true,
            disable_nations: false,
        }
    }
}

/// Inner (full damage) and outer (partial damage) blast radii.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NukeMagnitude {
    pub inner: u32,
    pub outer: u32,
}

/// Game rules: the lobby settings plus the fixed tuning tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub game: GameConfig,
    /// Tiles advanced per tick by a nuke.
    pub nuke_speed: f64,
    /// Distance from launch and impact inside which a nuke can be shot down.
    pub nuke_targetable_range: u32,
    pub default_sam_range: u32,
    pub max_sam_range: u32,
    pub traitor_duration: u64,
    pub alliance_duration: u64,
    pub alliance_request_cooldown: u64,
    pub emoji_cooldown: u64,
    pub temporary_embargo_duration: u64,
    pub structure_min_dist: u32,
    /// Weighted tiles of an ally inside the blast zone that break the alliance.
    pub nuke_alliance_break_threshold: f64,
    pub city_troop_increase: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            game: GameConfig::default(),
            nuke_speed: 6.0,
            nuke_targetable_range: 150,
            default_sam_range: 70,
            max_sam_range: 150,
            traitor_duration: 300,
            alliance_duration: 3000,
            alliance_request_cooldown: 300,
            emoji_cooldown: 50,
            temporary_embargo_duration: 3000,
            structure_min_dist: 15,
            nuke_alliance_break_threshold: 100.0,
            city_troop_increase: 250_000.0,
        }
    }
}

impl Config {
    pub fn new(game: GameConfig) -> Self {
        Self {
            game,
            ..Self::default()
        }
    }

    /// Parse a config file. Missing fields fall back to defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn difficulty(&self) -> Difficulty {
        self.game.difficulty
    }

    pub fn is_team_game(&self) -> bool {
        self.game.game_mode == GameMode::Team
    }

    pub fn num_spawn_phase_turns(&self) -> u64 {
        match self.game.game_type {
            GameType::Singleplayer => 100,
            GameType::Public | GameType::Private => 300,
        }
    }

    pub fn percentage_tiles_owned_to_win(&self) -> f64 {
        match self.game.game_mode {
            GameMode::Team => 95.0,
            GameMode::FreeForAll => 80.0,
        }
    }

    /// Blast radii for a nuke type, `None` for anything that is not a nuke.
    pub fn nuke_magnitude(&self, kind: UnitType) -> Option<NukeMagnitude> {
        match kind {
            UnitType::MirvWarhead => Some(NukeMagnitude { inner: 12, outer: 18 }),
            UnitType::AtomBomb => Some(NukeMagnitude { inner: 12, outer: 30 }),
            UnitType::HydrogenBomb => Some(NukeMagnitude { inner: 80, outer: 100 }),
            _ => None,
        }
    }

    /// Interception range of a SAM launcher. Level 1 covers the default
    /// range and higher levels approach the maximum.
    pub fn sam_range(&self, level: u32) -> f64 {
        self.max_sam_range as f64 - 480.0 / (level as f64 + 5.0)
    }

    pub fn start_manpower(&self, kind: PlayerKind) -> f64 {
        match kind {
            PlayerKind::Bot => 10_000.0,
            PlayerKind::Nation => match self.game.difficulty {
                Difficulty::Easy => 18_750.0,
                Difficulty::Medium => 25_000.0,
                Difficulty::Hard => 31_250.0,
                Difficulty::Impossible => 37_500.0,
            },
            PlayerKind::Human if self.game.infinite_troops => 1_000_000.0,
            PlayerKind::Human => 25_000.0,
        }
    }

    /// Troop capacity from territory and city levels.
    pub fn max_troops(&self, player: &dyn Player) -> f64 {
        let kind = player.kind();
        let base = if kind == PlayerKind::Human && self.game.infinite_troops {
            1_000_000_000.0
        } else {
            2.0 * ((player.num_tiles_owned() as f64).powf(0.6) * 1000.0 + 50_000.0)
                + player.units_owned(UnitType::City) as f64 * self.city_troop_increase
        };
        match kind {
            PlayerKind::Bot => base / 3.0,
            PlayerKind::Human => base,
            PlayerKind::Nation => match self.game.difficulty {
                Difficulty::Easy => base * 0.75,
                Difficulty::Medium => base,
                Difficulty::Hard => base * 1.25,
                Difficulty::Impossible => base * 1.5,
            },
        }
    }

    /// Default troop donation: a third of the sender's troops.
    pub fn default_donation_amount(&self, sender: &dyn Player) -> f64 {
        (sender.troops() / 3.0).floor()
    }

    /// Price of the next unit of `kind` for `player`.
    pub fn unit_cost(&self, kind: UnitType, player: &dyn Player, mirvs_launched: u64) -> Gold {
        if player.kind() == PlayerKind::Human && self.game.infinite_gold {
            return 0;
        }
        // Structures sharing a price ladder count each other.
        let built = |types: &[UnitType]| -> u32 {
            types
                .iter()
                .map(|&t| player.units_owned(t).min(player.units_constructed(t)))
                .sum()
        };
        let doubling = |n: u32| -> Gold { (125_000u64 << n.min(16)).min(1_000_000) };
        match kind {
            UnitType::Warship => (built(&[UnitType::Warship]) as u64 + 1).saturating_mul(250_000).min(1_000_000),
            UnitType::Port => doubling(built(&[UnitType::Port, UnitType::Factory])),
            UnitType::Factory => doubling(built(&[UnitType::Factory, UnitType::Port])),
            UnitType::City => doubling(built(&[UnitType::City])),
            UnitType::AtomBomb => 750_000,
            UnitType::HydrogenBomb => 5_000_000,
            UnitType::Mirv => 25_000_000 + mirvs_launched.saturating_mul(15_000_000),
            UnitType::MissileSilo => 1_000_000,
            UnitType::DefensePost => {
                (built(&[UnitType::DefensePost]) as u64 + 1).saturating_mul(50_000).min(250_000)
            }
            UnitType::SamLauncher => {
                (built(&[UnitType::SamLauncher]) as u64 + 1).saturating_mul(1_500_000).min(3_000_000)
            }
            UnitType::TransportShip
            | UnitType::Shell
            | UnitType::SamMissile
            | UnitType::MirvWarhead
            | UnitType::TradeShip
            | UnitType::Train => 0,
        }
    }

    /// Ticks between paying for a structure and it appearing.
    pub fn construction_duration(&self, kind: UnitType) -> u64 {
        if self.game.instant_build {
            return 0;
        }
        match kind {
            UnitType::Port | UnitType::City | UnitType::Factory => 20,
            UnitType::MissileSilo => 100,
            UnitType::DefensePost => 50,
            UnitType::SamLauncher => 300,
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.difficulty(), Difficulty::Medium);
        assert_eq!(config.num_spawn_phase_turns(), 100);
        assert_eq!(config.percentage_tiles_owned_to_win(), 80.0);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = Config::from_json(r#"{ "game": { "difficulty": "impossible", "game_mode": "team" } }"#).unwrap();
        assert_eq!(config.difficulty(), Difficulty::Impossible);
        assert!(config.is_team_game());
        assert_eq!(config.percentage_tiles_owned_to_win(), 95.0);
        assert_eq!(config.nuke_targetable_range, 150);
    }

    #[test]
    fn test_difficulty_parses_and_prints() {
        for d in Difficulty::ALL {
            assert_eq!(d.to_string().parse::<Difficulty>(), Ok(d));
        }
        assert!("nightmare".parse::<Difficulty>().is_err());
    }

    #[test]
    fn test_sam_range_grows_towards_max() {
        let config = Config::default();
        assert_eq!(config.sam_range(1), 70.0);
        assert!(config.sam_range(5) > 100.0);
        assert!(config.sam_range(50) < 150.0);
    }

    #[test]
    fn test_start_manpower_every_difficulty() {
        let mut last = 0.0;
        for d in Difficulty::ALL {
            let config = Config::new(GameConfig {
                difficulty: d,
                ..Default::default()
            });
            let manpower = config.start_manpower(PlayerKind::Nation);
            assert!(manpower > last);
            last = manpower;
        }
    }

    #[test]
    fn test_only_nukes_have_magnitudes() {
        let config = Config::default();
        assert!(config.nuke_magnitude(UnitType::AtomBomb).is_some());
        assert!(config.nuke_magnitude(UnitType::City).is_none());
    }
}
