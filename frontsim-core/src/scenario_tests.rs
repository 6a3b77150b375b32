//! Whole matches on generated islands.

use super::*;
use crate::game::Winner;
use crate::testing::{new_match, MatchSettings};
use proptest::prelude::*;

fn small_match(seed: u64, config: GameConfig) -> MatchSettings {
    MatchSettings {
        seed,
        size: 64,
        nations: 3,
        bots: 2,
        humans: 1,
        config: Config::new(config),
    }
}

#[test]
fn everyone_spawns() {
    let mut game = new_match(&small_match(7, GameConfig::default()));
    game.run(game.config().num_spawn_phase_turns() + 1);
    assert_eq!(game.all_players().len(), 6);
    assert!(game.player_by_info_id("human-0").is_some());
    for id in game.all_players() {
        assert!(game.player(id).num_tiles_owned() > 0, "{} never spawned", game.player(id).name());
    }
}

#[test]
fn every_difficulty_plays_out() {
    for difficulty in Difficulty::ALL {
        let mut game = new_match(&small_match(
            3,
            GameConfig {
                difficulty,
                ..Default::default()
            },
        ));
        game.run(600);
        assert!(!game.players().is_empty(), "{difficulty:?}: nobody left");
    }
}

#[test]
fn disabled_nations_leave_only_bots() {
    let mut game = new_match(&small_match(
        5,
        GameConfig {
            disable_nations: true,
            ..Default::default()
        },
    ));
    game.run(1);
    assert!(game
        .all_players()
        .into_iter()
        .all(|id| game.player(id).kind() != PlayerKind::Nation));
}

#[test]
fn lone_nation_grows_and_only_it_can_win() {
    let mut game = new_match(&MatchSettings {
        seed: 11,
        size: 48,
        nations: 1,
        bots: 0,
        humans: 0,
        config: Config::default(),
    });
    game.run(200);
    let nation = game.player_by_info_id("nation-0").unwrap();
    let early = game.player(nation).num_tiles_owned();
    game.run(1_500);
    assert!(game.player(nation).num_tiles_owned() > early);
    if let Some(winner) = game.winner() {
        assert_eq!(winner, Winner::Player(nation));
    }
}

#[test]
fn team_games_split_players() {
    let mut game = new_match(&small_match(
        2,
        GameConfig {
            game_mode: GameMode::Team,
            player_teams: 2,
            ..Default::default()
        },
    ));
    game.run(1);
    let teams: Vec<_> = game.all_players().into_iter().map(|id| game.player(id).team()).collect();
    assert!(teams.iter().all(Option::is_some));
    assert!(teams.windows(2).any(|w| w[0] != w[1]));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(4))]

    #[test]
    fn prop_same_seed_same_world(seed in any::<u64>()) {
        let settings = small_match(seed, GameConfig::default());
        let mut a = new_match(&settings);
        let mut b = new_match(&settings);
        a.run(400);
        b.run(400);
        prop_assert_eq!(a.checksum(), b.checksum());
        prop_assert_eq!(a.emoji_log(), b.emoji_log());
        prop_assert_eq!(a.bomb_log(), b.bomb_log());
    }
}
