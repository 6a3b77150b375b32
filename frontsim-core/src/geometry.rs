//! Pure geometry and scoring helpers shared by behaviors and strike
//! executions. Nothing here mutates the world; helpers that need randomness
//! take the caller's [`PseudoRandom`].

use crate::config::NukeMagnitude;
use crate::game::{Cell, Game, GameMap, Owner, PlayerId, TileRef};
use crate::random::PseudoRandom;
use game_pathfinding::{ParabolaOptions, ParabolaPath};
use std::collections::BTreeMap;

/// Axis-aligned box, both corners inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub min: Cell,
    pub max: Cell,
}

impl BoundingBox {
    pub fn center(&self) -> Cell {
        Cell::new(
            (self.min.x + self.max.x).div_euclid(2),
            (self.min.y + self.max.y).div_euclid(2),
        )
    }
}

pub fn bounding_box<'a, M: GameMap + ?Sized>(map: &M, tiles: impl IntoIterator<Item = &'a TileRef>) -> Option<BoundingBox> {
    let mut iter = tiles.into_iter();
    let first = map.cell(*iter.next()?);
    let mut bb = BoundingBox { min: first, max: first };
    for &tile in iter {
        let c = map.cell(tile);
        bb.min.x = bb.min.x.min(c.x);
        bb.min.y = bb.min.y.min(c.y);
        bb.max.x = bb.max.x.max(c.x);
        bb.max.y = bb.max.y.max(c.y);
    }
    Some(bb)
}

/// Perimeter of the square of half-width `radius` around `center`, clipped
/// to the map.
pub fn bounding_box_tiles<M: GameMap + ?Sized>(map: &M, center: TileRef, radius: i32) -> Vec<TileRef> {
    let (cx, cy) = (map.x(center), map.y(center));
    let (min_x, max_x, min_y, max_y) = (cx - radius, cx + radius, cy - radius, cy + radius);
    let mut tiles = Vec::new();
    let mut push = |x: i32, y: i32| {
        if map.is_valid_coord(x, y) {
            tiles.push(map.ref_at(x, y));
        }
    };
    for x in min_x..=max_x {
        push(x, min_y);
        if max_y != min_y {
            push(x, max_y);
        }
    }
    for y in (min_y + 1)..max_y {
        push(min_x, y);
        if max_x != min_x {
            push(max_x, y);
        }
    }
    tiles
}

/// Every valid tile within euclidean `radius` of `center`, with its squared
/// distance, row by row.
pub fn circle_tiles<M: GameMap + ?Sized>(map: &M, center: TileRef, radius: u32) -> impl Iterator<Item = (TileRef, u64)> + '_ {
    let (cx, cy) = (map.x(center), map.y(center));
    let r = radius as i32;
    let r2 = (radius as u64) * (radius as u64);
    (-r..=r).flat_map(move |dy| {
        (-r..=r).filter_map(move |dx| {
            let d2 = (dx * dx + dy * dy) as u64;
            let (x, y) = (cx + dx, cy + dy);
            (d2 <= r2 && map.is_valid_coord(x, y)).then(|| (map.ref_at(x, y), d2))
        })
    })
}

/// Weighted tile count per player inside a blast: 1 inside the inner radius,
/// 0.5 in the outer ring.
pub fn compute_nuke_blast_counts(game: &dyn Game, target: TileRef, magnitude: NukeMagnitude) -> BTreeMap<PlayerId, f64> {
    let inner2 = (magnitude.inner as u64).pow(2);
    let mut counts = BTreeMap::new();
    for (tile, d2) in circle_tiles(game, target, magnitude.outer) {
        if let Owner::Player(owner) = game.owner(tile) {
            *counts.entry(owner).or_insert(0.0) += if d2 <= inner2 { 1.0 } else { 0.5 };
        }
    }
    counts
}

/// True once any ally's weighted count inside the blast exceeds `threshold`.
pub fn would_nuke_break_alliance(
    game: &dyn Game,
    target: TileRef,
    magnitude: NukeMagnitude,
    allies: &[PlayerId],
    threshold: f64,
) -> bool {
    if allies.is_empty() {
        return false;
    }
    let inner2 = (magnitude.inner as u64).pow(2);
    let mut counts: BTreeMap<PlayerId, f64> = BTreeMap::new();
    for (tile, d2) in circle_tiles(game, target, magnitude.outer) {
        let Owner::Player(owner) = game.owner(tile) else {
            continue;
        };
        if !allies.contains(&owner) {
            continue;
        }
        let count = counts.entry(owner).or_insert(0.0);
        *count += if d2 <= inner2 { 1.0 } else { 0.5 };
        if *count > threshold {
            return true;
        }
    }
    false
}

/// Unowned land within radius 4 of `tile`.
pub fn get_spawn_tiles(game: &dyn Game, tile: TileRef) -> Vec<TileRef> {
    circle_tiles(game, tile, 4)
        .map(|(t, _)| t)
        .filter(|&t| !game.has_owner(t) && game.is_land(t))
        .collect()
}

/// Nearest of `refs` to `tile` by Manhattan distance, first one wins ties.
pub fn closest_tile<'a, M: GameMap + ?Sized>(
    map: &M,
    refs: impl IntoIterator<Item = &'a TileRef>,
    tile: TileRef,
) -> Option<(TileRef, u32)> {
    let mut best: Option<(TileRef, u32)> = None;
    for &r in refs {
        let d = map.manhattan_dist(r, tile);
        if best.map_or(true, |(_, bd)| d < bd) {
            best = Some((r, d));
        }
    }
    best
}

/// Approximate closest pair between two tile sets.
///
/// Both sets are sorted by x and swept with two cursors, so the result is
/// cheap but not always the exact minimum. Returns `(from xs, from ys)`.
pub fn closest_two_tiles<M: GameMap + ?Sized>(map: &M, xs: &[TileRef], ys: &[TileRef]) -> Option<(TileRef, TileRef)> {
    if xs.is_empty() || ys.is_empty() {
        return None;
    }
    let mut a = xs.to_vec();
    let mut b = ys.to_vec();
    a.sort_by_key(|&t| map.x(t));
    b.sort_by_key(|&t| map.x(t));

    let (mut i, mut j) = (0, 0);
    let mut best = (a[0], b[0]);
    let mut best_dist = u32::MAX;
    while i < a.len() && j < b.len() {
        let d = map.manhattan_dist(a[i], b[j]);
        if d < best_dist {
            best_dist = d;
            best = (a[i], b[j]);
        }
        if i == a.len() - 1 {
            j += 1;
        } else if j == b.len() - 1 {
            i += 1;
        } else if map.x(a[i]) < map.x(b[j]) {
            i += 1;
        } else {
            j += 1;
        }
    }
    Some(best)
}

/// Center of the bounding box of `player`'s border, or the border tile
/// nearest to it when the center is not theirs.
pub fn calculate_territory_center(game: &dyn Game, player: PlayerId) -> Option<TileRef> {
    let border = game.player(player).border_tiles();
    let center = bounding_box(game, border)?.center();
    let center_tile = game.ref_at(center.x, center.y);
    if game.owner(center_tile) == Owner::Player(player) {
        return Some(center_tile);
    }
    border.iter().copied().min_by_key(|&t| {
        let dx = (game.x(t) - center.x) as i64;
        let dy = (game.y(t) - center.y) as i64;
        dx * dx + dy * dy
    })
}

/// Random owned tiles of `player`: up to `count` draws, each sampling the
/// border bounding box. Small territories fall back to any owned tile.
pub fn rand_territory_tiles(random: &mut PseudoRandom, game: &dyn Game, player: PlayerId, count: usize) -> Vec<TileRef> {
    let p = game.player(player);
    let Some(bb) = bounding_box(game, p.border_tiles()) else {
        return Vec::new();
    };
    (0..count)
        .filter_map(|_| rand_territory_tile(random, game, player, bb))
        .collect()
}

fn rand_territory_tile(random: &mut PseudoRandom, game: &dyn Game, player: PlayerId, bb: BoundingBox) -> Option<TileRef> {
    for _ in 0..100 {
        let x = random.next_int(bb.min.x as i64, bb.max.x as i64) as i32;
        let y = random.next_int(bb.min.y as i64, bb.max.y as i64) as i32;
        if !game.is_valid_coord(x, y) {
            continue;
        }
        let tile = game.ref_at(x, y);
        if game.owner(tile) == Owner::Player(player) {
            return Some(tile);
        }
    }
    let p = game.player(player);
    if p.num_tiles_owned() <= 100 {
        let tiles: Vec<TileRef> = p.tiles().iter().copied().collect();
        return random.rand_element(&tiles).copied();
    }
    None
}

/// Flight path of a missile, as map tiles.
pub fn trajectory<M: GameMap + ?Sized>(map: &M, from: TileRef, to: TileRef, distance_based_height: bool) -> ParabolaPath {
    let options = ParabolaOptions {
        distance_based_height,
        ..ParabolaOptions::new(map.height())
    };
    ParabolaPath::new((map.x(from), map.y(from)), (map.x(to), map.y(to)), options)
}

/// Every tile along `path` that lies on the map.
pub fn trajectory_tiles<M: GameMap + ?Sized>(map: &M, path: &ParabolaPath) -> Vec<TileRef> {
    path.grid_points()
        .filter(|&(x, y)| map.is_valid_coord(x, y))
        .map(|(x, y)| map.ref_at(x, y))
        .collect()
}
