//! Rasterization of a floor plan for plotting.

use geo::{BoundingRect, Coord, EuclideanDistance, Rect};
use serde::{Deserialize, Serialize};

use crate::{
    AgentId, Point, RoomId,
    agent::Agent,
    error::{AbmError, Result},
    floor::Floor,
    geometry::Wall,
    map::Grid,
};

/// What a raster cell shows. Later kinds are drawn over earlier ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Tile {
    #[default]
    Outside,
    Interior(RoomId),
    Wall,
    Door {
        open: bool,
    },
    Agent(AgentId),
}

/// Maps plan coordinates to raster cells.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Frame {
    min: Point,
    max: Point,
    cell: f64,
}

impl Frame {
    fn width(&self) -> usize {
        ((self.max.x - self.min.x) / self.cell).ceil().max(1.0) as usize
    }

    fn height(&self) -> usize {
        ((self.max.y - self.min.y) / self.cell).ceil().max(1.0) as usize
    }

    /// Centre of cell `(x, y)`; row 0 is the top of the plan.
    fn centre(&self, x: usize, y: usize) -> Point {
        Point::new(
            self.min.x + (x as f64 + 0.5) * self.cell,
            self.max.y - (y as f64 + 0.5) * self.cell,
        )
    }

    /// Cell holding `p`, or `None` when `p` lies outside the plan. Points on
    /// the right or bottom edge belong to the last column or row.
    fn cell_of(&self, p: Point) -> Option<(usize, usize)> {
        let inside = (self.min.x..=self.max.x).contains(&p.x)
            && (self.min.y..=self.max.y).contains(&p.y);
        if !inside {
            return None;
        }
        let x = ((p.x - self.min.x) / self.cell).floor() as usize;
        let y = ((self.max.y - p.y) / self.cell).floor() as usize;
        Some((x.min(self.width() - 1), y.min(self.height() - 1)))
    }
}

impl Floor {
    /// Draws the floor's spatial rooms at `resolution` cells per unit,
    /// with the agents standing on this floor on top.
    ///
    /// Row 0 is the highest `y`, so the grid prints the right way up.
    pub fn rasterize(&self, resolution: f64, agents: &[Agent]) -> Result<Grid<Tile>> {
        if !(resolution > 0.0) {
            return Err(AbmError::SimulationMode(format!(
                "Raster resolution must be positive. Got {resolution}."
            )));
        }

        let rooms: Vec<_> = self.rooms().iter().filter(|room| room.is_spatial()).collect();
        let bounds = rooms
            .iter()
            .filter_map(|room| room.region()?.bounding_rect())
            .reduce(|a, b| {
                Rect::new(
                    Coord {
                        x: a.min().x.min(b.min().x),
                        y: a.min().y.min(b.min().y),
                    },
                    Coord {
                        x: a.max().x.max(b.max().x),
                        y: a.max().y.max(b.max().y),
                    },
                )
            })
            .ok_or_else(|| {
                AbmError::SimulationMode(format!(
                    "Floor {} has no spatial rooms to rasterize.",
                    self.floor_number()
                ))
            })?;

        let frame = Frame {
            min: bounds.min().into(),
            max: bounds.max().into(),
            cell: 1.0 / resolution,
        };
        let half = frame.cell / 2.0;
        // Door openings are drawn as thick as the walls they sit in.
        let door_reach = half + Wall::DEFAULT_THICKNESS / 2.0;
        let walls: Vec<_> = rooms.iter().filter_map(|r| r.walls()).flatten().collect();
        let doors: Vec<_> = rooms.iter().flat_map(|r| r.doors()).collect();

        let mut grid = Grid::from_fn(frame.width(), frame.height(), |x, y| {
            let centre = frame.centre(x, y);
            let probe = geo::Point::from(Coord::from(centre));
            let door = doors.iter().find(|door| {
                door.line()
                    .map(|seg| probe.euclidean_distance(&seg.to_line()) <= door_reach)
                    .unwrap_or(false)
            });
            if let Some(door) = door {
                return Tile::Door { open: door.is_open };
            }
            if walls.iter().any(|wall| wall.distance_to(centre) <= half) {
                return Tile::Wall;
            }
            rooms
                .iter()
                .find(|room| room.contains_point(centre).unwrap_or(false))
                .map_or(Tile::Outside, |room| Tile::Interior(room.room_id()))
        });

        let building = rooms.first().map(|room| room.building());
        for agent in agents {
            let location = agent.location();
            if location.floor != self.floor_number() || Some(location.building.as_str()) != building {
                continue;
            }
            if let Some(cell) = frame.cell_of(location.point()) {
                grid[cell] = Tile::Agent(agent.id());
            }
        }

        Ok(grid)
    }
}
