//! MIRV targeting and the launch-to-separation state machine.

use super::*;
use crate::game::{Player, PlayerInfo, PlayerKind, Relation, Unit};
use crate::testing::{GameBuilder, SandboxGame, SandboxMap};
use proptest::prelude::*;

/// Attacker holds a strip on the left with a silo, defender a block on the right.
fn strike_range() -> SandboxGame {
    GameBuilder::new()
        .with_map(SandboxMap::land(300, 200))
        .with_player(PlayerInfo::new("atk", "Attacker", PlayerKind::Nation))
        .with_player(PlayerInfo::new("def", "Defender", PlayerKind::Human))
        .with_square(PlayerId(0), 0, 0, 40)
        .with_square(PlayerId(1), 150, 50, 140)
        .with_unit(PlayerId(0), UnitType::MissileSilo, 10, 10)
        .with_gold(PlayerId(0), 30_000_000)
        .at_tick(1_000)
        .build()
}

fn units_built(game: &SandboxGame, kind: UnitType) -> usize {
    (0..)
        .map(UnitId)
        .map_while(|id| game.unit(id).map(|u| u.kind()))
        .filter(|&k| k == kind)
        .count()
}

#[test]
fn destinations_are_spread_over_the_defender() {
    let game = strike_range();
    let dst = game.ref_at(220, 120);
    let mut random = PseudoRandom::new(9);
    let targets = select_destinations(&game, |t| game.owner(t), &mut random, dst, Owner::Player(PlayerId(1)));

    assert!(targets.len() > 1);
    assert!(targets.len() <= MIRV_WARHEADS);
    assert!(targets.contains(&dst));
    for (i, &a) in targets.iter().enumerate() {
        assert_eq!(game.owner(a), Owner::Player(PlayerId(1)));
        for &b in &targets[i + 1..] {
            assert!(game.manhattan_dist(a, b) >= MIRV_MIN_SPREAD);
        }
    }
    let dists: Vec<u32> = targets.iter().map(|&t| game.manhattan_dist(t, dst)).collect();
    assert!(dists.windows(2).all(|w| w[0] >= w[1]), "not outermost first: {dists:?}");
    assert_eq!(targets.last(), Some(&dst));
}

#[test]
fn a_sliver_of_land_gets_a_single_warhead() {
    let game = GameBuilder::new()
        .with_map(SandboxMap::land(100, 100))
        .with_player(PlayerInfo::new("def", "Defender", PlayerKind::Human))
        .with_square(PlayerId(0), 50, 50, 3)
        .build();
    let dst = game.ref_at(51, 51);
    let mut random = PseudoRandom::new(1);
    let targets = select_destinations(&game, |t| game.owner(t), &mut random, dst, Owner::Player(PlayerId(0)));
    assert_eq!(targets, vec![dst]);
}

#[test]
fn full_strike_scorches_the_defender() {
    let mut game = strike_range();
    let before = game.player(PlayerId(1)).num_tiles_owned();
    let dst = game.ref_at(220, 120);
    game.add_execution(Box::new(MirvExecution::new(PlayerId(0), dst)));
    game.run(300);

    assert_eq!(game.stats_mirvs_launched(), 1);
    assert_eq!(game.bomb_log().len(), 1);
    assert_eq!(game.bomb_log()[0].kind, UnitType::Mirv);
    assert_eq!(game.bomb_log()[0].target, Owner::Player(PlayerId(1)));
    assert_eq!(units_built(&game, UnitType::Mirv), 1);
    let warheads = units_built(&game, UnitType::MirvWarhead);
    assert!(warheads > 1 && warheads <= MIRV_WARHEADS);
    assert!(game.units(&[UnitType::MirvWarhead, UnitType::Mirv]).is_empty());
    assert!(game.player(PlayerId(1)).num_tiles_owned() < before);
    assert_eq!(game.player(PlayerId(1)).relation(PlayerId(0)), Relation::Hostile);
    // Attacker land is out of blast range.
    assert_eq!(game.player(PlayerId(0)).num_tiles_owned(), 40 * 40);
}

#[test]
fn launch_betrays_an_ally() {
    let mut game = strike_range();
    game.force_alliance(PlayerId(0), PlayerId(1));
    let dst = game.ref_at(220, 120);
    game.add_execution(Box::new(MirvExecution::new(PlayerId(0), dst)));
    game.run(2);

    assert!(!game.player(PlayerId(0)).is_allied_with(PlayerId(1)));
    assert!(game.player(PlayerId(0)).is_traitor());
    assert_eq!(game.player(PlayerId(1)).relation(PlayerId(0)), Relation::Hostile);
}

#[test]
fn striking_own_land_spares_relations() {
    let mut game = strike_range();
    let dst = game.ref_at(20, 20);
    game.add_execution(Box::new(MirvExecution::new(PlayerId(0), dst)));
    game.run(2);

    assert!(!game.player(PlayerId(0)).is_traitor());
    assert_eq!(game.player(PlayerId(1)).relation(PlayerId(0)), Relation::Neutral);
    assert_eq!(game.bomb_log()[0].target, Owner::Player(PlayerId(0)));
}

#[test]
fn no_silo_no_launch() {
    let mut game = GameBuilder::new()
        .with_map(SandboxMap::land(100, 100))
        .with_player(PlayerInfo::new("atk", "Attacker", PlayerKind::Nation))
        .with_player(PlayerInfo::new("def", "Defender", PlayerKind::Human))
        .with_square(PlayerId(0), 0, 0, 20)
        .with_square(PlayerId(1), 60, 60, 30)
        .with_gold(PlayerId(0), 30_000_000)
        .at_tick(1_000)
        .build();
    game.add_execution(Box::new(MirvExecution::new(PlayerId(0), game.ref_at(70, 70))));
    game.run(3);
    assert!(game.bomb_log().is_empty());
    assert!(game.player(PlayerId(0)).gold() >= 30_000_000);
    assert_eq!(game.num_executions(), 0);
}

#[test]
fn shot_down_mirv_releases_nothing() {
    let mut game = strike_range();
    let dst = game.ref_at(220, 120);
    game.add_execution(Box::new(MirvExecution::new(PlayerId(0), dst)));
    game.run(3);
    let mirv = game.units(&[UnitType::Mirv]);
    assert_eq!(mirv.len(), 1);
    game.delete_unit(mirv[0], Some(PlayerId(1)));
    game.run(300);
    assert_eq!(units_built(&game, UnitType::MirvWarhead), 0);
    assert_eq!(game.num_executions(), 0);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(8))]

    #[test]
    fn prop_destinations_respect_spacing(seed in any::<u64>(), x in 160i32..280, y in 60i32..180) {
        let game = strike_range();
        let dst = game.ref_at(x, y);
        let mut random = PseudoRandom::new(seed);
        let targets = select_destinations(&game, |t| game.owner(t), &mut random, dst, Owner::Player(PlayerId(1)));
        prop_assert!(targets.contains(&dst));
        prop_assert!(targets.len() <= MIRV_WARHEADS);
        for (i, &a) in targets.iter().enumerate() {
            prop_assert_eq!(game.owner(a), Owner::Player(PlayerId(1)));
            for &b in &targets[i + 1..] {
                prop_assert!(game.manhattan_dist(a, b) >= MIRV_MIN_SPREAD);
            }
        }
    }
}
