use super::{SandboxGame, SandboxMap};
use crate::config::Config;
use crate::execution::{BotExecution, NationExecution, SpawnExecution};
use crate::game::{Cell, Game, GameMap, PlayerInfo, PlayerKind};
use crate::random::PseudoRandom;

const NATION_NAMES: &[&str] = &[
    "Aurelia", "Borealis", "Calderon", "Drakmor", "Eloria", "Fenwick", "Galdor", "Halvard", "Istria", "Jorvik",
    "Kestrel", "Lumen",
];

/// A full match: generated island, Nations with home hints, tribes, and
/// optional human seats that spawn at random and never act.
#[derive(Debug, Clone)]
pub struct MatchSettings {
    pub seed: u64,
    pub size: u32,
    pub nations: u32,
    pub bots: u32,
    pub humans: u32,
    pub config: Config,
}

impl Default for MatchSettings {
    fn default() -> Self {
        Self {
            seed: 0,
            size: 128,
            nations: 4,
            bots: 4,
            humans: 0,
            config: Config::default(),
        }
    }
}

/// Lay out a match and queue every AI. Nothing runs until the first tick.
pub fn new_match(settings: &MatchSettings) -> SandboxGame {
    let map = SandboxMap::generate(settings.size, settings.size, settings.seed);
    let game_id = format!("match-{}", settings.seed);
    let mut game = SandboxGame::new(map, settings.config.clone(), game_id.clone());
    let mut random = PseudoRandom::new(settings.seed);

    let nations = if settings.config.game.disable_nations { 0 } else { settings.nations };
    for i in 0..nations as usize {
        let name = match NATION_NAMES.get(i) {
            Some(name) => name.to_string(),
            None => format!("Nation {}", i + 1),
        };
        let info = PlayerInfo::new(format!("nation-{i}"), name, PlayerKind::Nation);
        let hint = random_land_cell(&game, &mut random);
        game.add_execution(Box::new(NationExecution::new(&game_id, info, hint)));
    }
    for i in 0..settings.bots {
        let info = PlayerInfo::new(format!("bot-{i}"), format!("Tribe {}", i + 1), PlayerKind::Bot);
        game.add_execution(Box::new(SpawnExecution::new(info.clone(), None)));
        game.add_execution(Box::new(BotExecution::new(info)));
    }
    for i in 0..settings.humans {
        let info = PlayerInfo::new(format!("human-{i}"), format!("Human {}", i + 1), PlayerKind::Human);
        game.add_execution(Box::new(SpawnExecution::new(info, None)));
    }
    log::info!(
        "match {}: {}x{} map, {} nations, {} bots, {} humans",
        game.game_id(),
        settings.size,
        settings.size,
        nations,
        settings.bots,
        settings.humans
    );
    game
}

fn random_land_cell(game: &SandboxGame, random: &mut PseudoRandom) -> Option<Cell> {
    let (w, h) = (game.width() as i64, game.height() as i64);
    (0..100).find_map(|_| {
        let (x, y) = (random.next_int(0, w) as i32, random.next_int(0, h) as i32);
        game.is_land(game.ref_at(x, y)).then(|| Cell::new(x, y))
    })
}
