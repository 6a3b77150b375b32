//! MIRV trigger selection against hand-built positions.

use super::*;
use crate::game::{GameMap, PlayerInfo, UnitParams};
use crate::random::PseudoRandom;
use crate::testing::{GameBuilder, SandboxGame, SandboxMap};

const SEEDS: u64 = 30;

/// Nation on the right edge with a silo and a war chest. Each entry of
/// `others` is `(first column, last column exclusive, cities)`.
fn arena(others: &[(i32, i32, u32)]) -> SandboxGame {
    let mut builder = GameBuilder::new()
        .with_map(SandboxMap::land(100, 100))
        .with_player(PlayerInfo::new("n", "Nation", PlayerKind::Nation));
    for i in 0..others.len() {
        builder = builder.with_player(PlayerInfo::new(format!("h{i}"), format!("Human {i}"), PlayerKind::Human));
    }
    for x in 85..100 {
        for y in 0..100 {
            builder = builder.with_tile(PlayerId(0), x, y);
        }
    }
    for (i, &(from, to, cities)) in others.iter().enumerate() {
        let id = PlayerId(i as u16 + 1);
        for x in from..to {
            for y in 0..100 {
                builder = builder.with_tile(id, x, y);
            }
        }
        for c in 0..cities as i32 {
            builder = builder.with_unit(id, UnitType::City, from + 1 + c % 2, 4 + 8 * (c / 2));
        }
    }
    builder
        .with_unit(PlayerId(0), UnitType::MissileSilo, 92, 50)
        .with_gold(PlayerId(0), 30_000_000)
        .at_tick(5_000)
        .build()
}

fn fired(game: &mut SandboxGame, seed: u64) -> bool {
    let mut random = PseudoRandom::new(seed);
    let mut ctx = AiContext::new(game, &mut random, PlayerId(0));
    MirvBehavior::new().consider_mirv(&mut ctx, &mut EmojiBehavior::new())
}

fn count_fired(others: &[(i32, i32, u32)]) -> u64 {
    (0..SEEDS).filter(|&seed| fired(&mut arena(others), seed)).count() as u64
}

#[test]
fn every_difficulty_has_parameters() {
    for d in Difficulty::ALL {
        assert!(hesitation_odds(d) >= 2);
        assert!(victory_denial_team_threshold(d) > victory_denial_individual_threshold(d));
        assert!(steamroll_city_gap_multiplier(d) > 1.0);
        assert!(steamroll_min_leader_cities(d) >= 8);
    }
}

#[test]
fn harder_nations_react_earlier() {
    assert!(victory_denial_individual_threshold(Difficulty::Impossible)
        < victory_denial_individual_threshold(Difficulty::Easy));
    assert!(steamroll_min_leader_cities(Difficulty::Impossible) < steamroll_min_leader_cities(Difficulty::Easy));
}

#[test]
fn quiet_world_never_triggers() {
    assert_eq!(count_fired(&[(0, 20, 0)]), 0);
}

#[test]
fn denies_a_runaway_leader() {
    // 60% of the land against a 55% threshold on Medium.
    assert!(count_fired(&[(0, 60, 0)]) >= SEEDS / 2);
}

#[test]
fn half_the_map_is_not_yet_a_runaway() {
    assert_eq!(count_fired(&[(0, 50, 0)]), 0);
}

#[test]
fn stops_a_city_steamroll() {
    assert!(count_fired(&[(0, 20, 11)]) >= SEEDS / 2);
}

#[test]
fn steamroll_needs_strictly_more_than_the_minimum() {
    assert_eq!(count_fired(&[(0, 20, 10)]), 0);
}

#[test]
fn steamroll_needs_a_clear_gap_to_second_place() {
    // 11 cities against 9: 9 * 1.3 = 11.7 is not reached.
    assert_eq!(count_fired(&[(0, 20, 11), (30, 50, 9)]), 0);
}

#[test]
fn retaliates_against_an_inbound_mirv() {
    let mut hits = 0;
    for seed in 0..SEEDS {
        let mut game = arena(&[(0, 20, 0)]);
        game.set_gold(PlayerId(1), 30_000_000);
        let origin = game.ref_at(5, 5);
        let aim = game.ref_at(95, 50);
        let params = UnitParams {
            target_tile: Some(aim),
            under_construction: false,
        };
        game.build_unit(PlayerId(1), UnitType::Mirv, origin, params).unwrap();
        if fired(&mut game, seed) {
            hits += 1;
            game.run(2);
            let launch = game.bomb_log().last().copied().unwrap();
            assert_eq!(launch.player, PlayerId(0));
            assert_eq!(launch.target, Owner::Player(PlayerId(1)));
        }
    }
    assert!(hits >= SEEDS / 2);
}

#[test]
fn no_silo_no_mirv() {
    let mut game = arena(&[(0, 60, 0)]);
    let silo = game.player(PlayerId(0)).units(&[UnitType::MissileSilo])[0];
    game.delete_unit(silo, None);
    assert!((0..SEEDS).all(|seed| !fired(&mut game, seed)));
}

#[test]
fn too_poor_for_a_mirv() {
    let mut game = arena(&[(0, 60, 0)]);
    game.set_gold(PlayerId(0), 1_000_000);
    assert!((0..SEEDS).all(|seed| !fired(&mut game, seed)));
}
