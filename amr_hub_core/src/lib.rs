use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

pub mod agent;
pub mod content;
pub mod door;
pub mod error;
pub mod floor;
pub mod geometry;
pub mod layout;
pub mod location;
pub mod map;
pub mod policy;
pub mod raster;
pub mod room;
pub mod simulation;
pub mod task;
pub mod trajectory;

pub use error::{AbmError, Result};

/// Unique identifier for agents.
pub type AgentId = usize;

/// Identifier of a room. Unique within a building after layout assembly.
pub type RoomId = usize;

/// Identifier handed out to doors during layout assembly.
pub type DoorId = usize;

/// Simulation time in ticks. Signed so that negative inputs can be rejected
/// instead of wrapping.
pub type Time = i64;

/// Represents a 2D coordinate in building space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Point { x, y }
    }

    /// Lexicographic order on `(x, y)`, total over all floats.
    pub fn lex_cmp(&self, other: &Point) -> Ordering {
        self.x
            .total_cmp(&other.x)
            .then_with(|| self.y.total_cmp(&other.y))
    }

    pub fn distance(&self, other: &Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn midpoint(&self, other: &Point) -> Point {
        Point::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Point { x, y }
    }
}

impl From<Point> for geo::Coord<f64> {
    fn from(p: Point) -> Self {
        geo::Coord { x: p.x, y: p.y }
    }
}

impl From<geo::Coord<f64>> for Point {
    fn from(c: geo::Coord<f64>) -> Self {
        Point { x: c.x, y: c.y }
    }
}
