use crate::game::{GameMap, TerrainType, TileRef};
use crate::random::PseudoRandom;

/// Lattice spacing of the value noise used by [`SandboxMap::generate`].
const NOISE_CELL: u32 = 16;

/// A width x height terrain grid.
#[derive(Debug, Clone)]
pub struct SandboxMap {
    width: u32,
    height: u32,
    terrain: Vec<TerrainType>,
    magnitude: Vec<u8>,
    num_land: usize,
}

impl SandboxMap {
    /// Flat plains everywhere.
    pub fn land(width: u32, height: u32) -> Self {
        Self::from_fn(width, height, |_, _| (TerrainType::Plains, 0))
    }

    /// Terrain and elevation from a function of the coordinate.
    pub fn from_fn(width: u32, height: u32, f: impl Fn(i32, i32) -> (TerrainType, u8)) -> Self {
        let mut terrain = Vec::with_capacity((width * height) as usize);
        let mut magnitude = Vec::with_capacity((width * height) as usize);
        for y in 0..height as i32 {
            for x in 0..width as i32 {
                let (t, m) = f(x, y);
                terrain.push(t);
                magnitude.push(m);
            }
        }
        let num_land = terrain.iter().filter(|t| t.is_land()).count();
        Self {
            width,
            height,
            terrain,
            magnitude,
            num_land,
        }
    }

    /// Land with ocean columns at `x >= ocean_from`.
    pub fn coast(width: u32, height: u32, ocean_from: i32) -> Self {
        Self::from_fn(width, height, |x, _| {
            if x >= ocean_from {
                (TerrainType::Ocean, 0)
            } else {
                (TerrainType::Plains, 0)
            }
        })
    }

    /// An island continent: value noise with a falloff towards the edges.
    pub fn generate(width: u32, height: u32, seed: u64) -> Self {
        let mut random = PseudoRandom::new(seed);
        let lattice_w = width / NOISE_CELL + 2;
        let lattice_h = height / NOISE_CELL + 2;
        let lattice: Vec<f64> = (0..lattice_w * lattice_h).map(|_| random.next_f64()).collect();
        let at = |lx: u32, ly: u32| lattice[(ly * lattice_w + lx) as usize];

        let (cx, cy) = (width as f64 / 2.0, height as f64 / 2.0);
        Self::from_fn(width, height, |x, y| {
            let (fx, fy) = (x as f64 / NOISE_CELL as f64, y as f64 / NOISE_CELL as f64);
            let (lx, ly) = (fx.floor() as u32, fy.floor() as u32);
            let (tx, ty) = (smooth(fx.fract()), smooth(fy.fract()));
            let top = lerp(at(lx, ly), at(lx + 1, ly), tx);
            let bottom = lerp(at(lx, ly + 1), at(lx + 1, ly + 1), tx);
            let noise = lerp(top, bottom, ty);

            let dx = (x as f64 - cx) / cx;
            let dy = (y as f64 - cy) / cy;
            let falloff = (dx * dx + dy * dy).sqrt();
            let elevation = noise * 0.6 + (1.0 - falloff) * 0.6;

            let terrain = match elevation {
                e if e < 0.45 => TerrainType::Ocean,
                e if e < 0.75 => TerrainType::Plains,
                e if e < 0.9 => TerrainType::Highland,
                _ => TerrainType::Mountain,
            };
            let magnitude = if terrain.is_land() {
                ((elevation - 0.45) * 60.0).clamp(0.0, 30.0) as u8
            } else {
                0
            };
            (terrain, magnitude)
        })
    }

    pub fn set_terrain(&mut self, x: i32, y: i32, terrain: TerrainType) {
        let i = (y as u32 * self.width + x as u32) as usize;
        let was_land = self.terrain[i].is_land();
        self.terrain[i] = terrain;
        match (was_land, terrain.is_land()) {
            (true, false) => self.num_land -= 1,
            (false, true) => self.num_land += 1,
            _ => {}
        }
    }
}

fn smooth(t: f64) -> f64 {
    t * t * (3.0 - 2.0 * t)
}

fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

impl GameMap for SandboxMap {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn terrain(&self, tile: TileRef) -> TerrainType {
        self.terrain[tile.0 as usize]
    }

    fn magnitude(&self, tile: TileRef) -> u8 {
        self.magnitude[tile.0 as usize]
    }

    fn num_land_tiles(&self) -> usize {
        self.num_land
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_map_is_an_island() {
        let map = SandboxMap::generate(128, 96, 7);
        assert!(map.num_land_tiles() > 0);
        assert!(map.num_land_tiles() < 128 * 96);
        // Corners are far from the centre and always sea.
        assert!(map.is_ocean(map.ref_at(0, 0)));
        assert!(map.is_ocean(map.ref_at(127, 95)));
    }

    #[test]
    fn same_seed_same_map() {
        let a = SandboxMap::generate(64, 64, 3);
        let b = SandboxMap::generate(64, 64, 3);
        assert_eq!(a.terrain, b.terrain);
        assert_eq!(a.magnitude, b.magnitude);
    }

    #[test]
    fn coast_has_a_shore_column() {
        let map = SandboxMap::coast(10, 4, 6);
        assert!(map.is_ocean_shore(map.ref_at(5, 2)));
        assert!(!map.is_ocean_shore(map.ref_at(4, 2)));
        assert_eq!(map.num_land_tiles(), 24);
    }
}
