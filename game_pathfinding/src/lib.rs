//! Map-agnostic path and trajectory geometry.
//!
//! Two independent tools live here:
//!
//! - [`AStar`]: bounded best-first search over any [`Graph`], used for naval
//!   routing on water tiles.
//! - [`ParabolaPath`]: a cubic Bezier arc between two grid points, sampled at a
//!   fixed spacing, used for missile flight.
//!
//! Neither knows about tiles or owners; callers translate their own tile
//! identifiers to node ids or `(x, y)` pairs.

mod astar;
mod parabola;

pub use astar::{AStar, Graph, Path};
pub use parabola::{ParabolaOptions, ParabolaPath, Step, PARABOLA_MIN_HEIGHT};
