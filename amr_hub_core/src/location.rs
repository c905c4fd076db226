use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    Point,
    error::{AbmError, DistanceScope, Result},
    room::Room,
};

/// A point scoped to a floor of a named building.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub x: f64,
    pub y: f64,
    pub floor: i32,
    pub building: String,
}

impl Location {
    pub fn new(x: f64, y: f64, floor: i32, building: impl Into<String>) -> Self {
        Location {
            x,
            y,
            floor,
            building: building.into(),
        }
    }

    pub fn point(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// A location on the same floor and building at another point.
    pub fn at(&self, point: Point) -> Location {
        Location {
            x: point.x,
            y: point.y,
            floor: self.floor,
            building: self.building.clone(),
        }
    }

    pub fn same_scope(&self, other: &Location) -> bool {
        self.building == other.building && self.floor == other.floor
    }

    /// Fails with [`AbmError::InvalidDistance`] unless both locations share a
    /// building and a floor.
    pub fn check_scope(&self, other: &Location) -> Result<()> {
        if self.building != other.building {
            return Err(AbmError::InvalidDistance {
                scope: DistanceScope::Buildings,
                from: self.building.clone(),
                to: other.building.clone(),
            });
        }
        if self.floor != other.floor {
            return Err(AbmError::InvalidDistance {
                scope: DistanceScope::Floors,
                from: self.floor.to_string(),
                to: other.floor.to_string(),
            });
        }
        Ok(())
    }

    /// Euclidean distance to another location in the same building and floor.
    pub fn distance_to(&self, other: &Location) -> Result<f64> {
        self.check_scope(other)?;
        Ok(self.point().distance(&other.point()))
    }

    pub fn move_to(&mut self, x: f64, y: f64, floor: i32) {
        self.x = x;
        self.y = y;
        self.floor = floor;
    }

    /// The first spatial room among `rooms` whose region contains this
    /// location.
    pub fn which_room<'a, I>(&self, rooms: I) -> Option<&'a Room>
    where
        I: IntoIterator<Item = &'a Room>,
    {
        rooms.into_iter().find(|room| {
            room.building() == self.building
                && room.floor() == self.floor
                && room.contains_point(self.point()).unwrap_or(false)
        })
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Location(x={:.2}, y={:.2}, {}, {})",
            self.x, self.y, self.floor, self.building
        )
    }
}
