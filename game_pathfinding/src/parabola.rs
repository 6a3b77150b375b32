/// Lowest apex offset for distance-based arcs, in tiles.
pub const PARABOLA_MIN_HEIGHT: f64 = 50.0;

/// Shape of a [`ParabolaPath`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParabolaOptions {
    /// Spacing between sampled points along the arc.
    pub increment: f64,
    /// Raise the arc by a third of the straight-line distance (at least
    /// [`PARABOLA_MIN_HEIGHT`]); otherwise fly straight.
    pub distance_based_height: bool,
    /// Bend towards row 0 instead of the bottom of the map.
    pub direction_up: bool,
    /// Map height, used to keep control points on the map.
    pub map_height: u32,
}

impl ParabolaOptions {
    pub fn new(map_height: u32) -> Self {
        Self {
            increment: 3.0,
            distance_based_height: true,
            direction_up: true,
            map_height,
        }
    }
}

/// Outcome of advancing along a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Moved { x: i32, y: i32 },
    Arrived,
}

/// A cubic Bezier arc sampled at (approximately) even arc length.
#[derive(Debug, Clone)]
pub struct ParabolaPath {
    points: Vec<(f64, f64)>,
    increment: f64,
    travelled: f64,
}

impl ParabolaPath {
    pub fn new(from: (i32, i32), to: (i32, i32), options: ParabolaOptions) -> Self {
        let p0 = (from.0 as f64, from.1 as f64);
        let p3 = (to.0 as f64, to.1 as f64);
        let (dx, dy) = (p3.0 - p0.0, p3.1 - p0.1);
        let distance = (dx * dx + dy * dy).sqrt();

        let height = if options.distance_based_height {
            (distance / 3.0).max(PARABOLA_MIN_HEIGHT)
        } else {
            0.0
        };
        let lift = if options.direction_up { -height } else { height };
        let max_y = options.map_height.saturating_sub(1) as f64;
        let clamp_y = |y: f64| y.clamp(0.0, max_y);

        let p1 = (p0.0 + dx / 4.0, clamp_y(p0.1 + dy / 4.0 + lift));
        let p2 = (p0.0 + dx * 3.0 / 4.0, clamp_y(p0.1 + dy * 3.0 / 4.0 + lift));

        let increment = if options.increment > 0.0 { options.increment } else { 1.0 };
        let points = resample([p0, p1, p2, p3], distance + 2.0 * height, increment);
        Self {
            points,
            increment,
            travelled: 0.0,
        }
    }

    /// Move `distance` along the arc.
    pub fn advance(&mut self, distance: f64) -> Step {
        self.travelled += distance;
        let index = (self.travelled / self.increment) as usize;
        match self.points.get(index) {
            Some(&(x, y)) => Step::Moved {
                x: x.floor() as i32,
                y: y.floor() as i32,
            },
            None => Step::Arrived,
        }
    }

    /// Index of the sample the last `advance` landed on.
    pub fn current_index(&self) -> usize {
        ((self.travelled / self.increment) as usize).min(self.points.len())
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Every sampled grid point from launch to impact.
    pub fn grid_points(&self) -> impl Iterator<Item = (i32, i32)> + '_ {
        self.points
            .iter()
            .map(|&(x, y)| (x.floor() as i32, y.floor() as i32))
    }
}

fn bezier(c: &[(f64, f64); 4], t: f64) -> (f64, f64) {
    let u = 1.0 - t;
    let (a, b, d, e) = (u * u * u, 3.0 * u * u * t, 3.0 * u * t * t, t * t * t);
    (
        a * c[0].0 + b * c[1].0 + d * c[2].0 + e * c[3].0,
        a * c[0].1 + b * c[1].1 + d * c[2].1 + e * c[3].1,
    )
}

/// Walk a dense polyline of the curve and emit a point every `increment`.
fn resample(control: [(f64, f64); 4], length_hint: f64, increment: f64) -> Vec<(f64, f64)> {
    let segments = (length_hint.ceil() as usize * 4).max(64);
    let mut points = vec![control[0]];
    let mut prev = control[0];
    let mut carried = 0.0;

    for i in 1..=segments {
        let next = bezier(&control, i as f64 / segments as f64);
        let (sx, sy) = (next.0 - prev.0, next.1 - prev.1);
        let seg = (sx * sx + sy * sy).sqrt();
        let mut along = increment - carried;
        while seg > 0.0 && along <= seg {
            let f = along / seg;
            points.push((prev.0 + sx * f, prev.1 + sy * f));
            along += increment;
        }
        carried = seg - (along - increment);
        prev = next;
    }

    if points.last() != Some(&control[3]) {
        points.push(control[3]);
    }
    points
}

#[cfg(test)]
mod tests {
    use super::*;

    fn walk(path: &mut ParabolaPath, speed: f64) -> Vec<(i32, i32)> {
        let mut seen = Vec::new();
        while let Step::Moved { x, y } = path.advance(speed) {
            seen.push((x, y));
        }
        seen
    }

    #[test]
    fn ends_on_the_target() {
        let path = ParabolaPath::new((10, 200), (300, 180), ParabolaOptions::new(400));
        assert_eq!(path.grid_points().next(), Some((10, 200)));
        assert_eq!(path.grid_points().last(), Some((300, 180)));
    }

    #[test]
    fn arc_rises_above_the_endpoints() {
        let path = ParabolaPath::new((0, 300), (200, 300), ParabolaOptions::new(400));
        let apex = path.grid_points().map(|(_, y)| y).min().unwrap();
        assert!(apex < 300 - 20, "apex {apex} should be well above row 300");
    }

    #[test]
    fn flat_path_stays_on_the_line() {
        let options = ParabolaOptions {
            distance_based_height: false,
            ..ParabolaOptions::new(400)
        };
        let path = ParabolaPath::new((0, 50), (100, 50), options);
        assert!(path.grid_points().all(|(_, y)| y == 50));
    }

    #[test]
    fn control_points_stay_on_the_map() {
        let path = ParabolaPath::new((0, 5), (500, 5), ParabolaOptions::new(100));
        assert!(path.grid_points().all(|(_, y)| (0..100).contains(&y)));
    }

    #[test]
    fn faster_flight_takes_fewer_steps() {
        let slow = walk(&mut ParabolaPath::new((0, 100), (200, 100), ParabolaOptions::new(300)), 3.0);
        let fast = walk(&mut ParabolaPath::new((0, 100), (200, 100), ParabolaOptions::new(300)), 12.0);
        assert!(fast.len() < slow.len());
        assert!(!fast.is_empty());
    }

    #[test]
    fn arrival_is_sticky() {
        let mut path = ParabolaPath::new((0, 0), (3, 0), ParabolaOptions::new(10));
        let _ = walk(&mut path, 5.0);
        assert_eq!(path.advance(1.0), Step::Arrived);
        assert_eq!(path.current_index(), path.len());
    }

    #[test]
    fn zero_length_path_arrives_immediately() {
        let mut path = ParabolaPath::new((7, 7), (7, 7), ParabolaOptions {
            distance_based_height: false,
            ..ParabolaOptions::new(10)
        });
        assert_eq!(path.len(), 1);
        assert_eq!(path.advance(6.0), Step::Arrived);
    }
}
