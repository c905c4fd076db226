//! Rooms: closed planar regions (spatial mode) or named areas (topological
//! mode).

use std::hash::{Hash, Hasher};

use geo::{Area, BoundingRect, Contains, Coord, Polygon};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    Point, RoomId,
    content::Content,
    door::Door,
    error::{AbmError, Result},
    geometry::{Wall, polygon_bits, polygonize, stable_digest},
};

/// Default number of draws [`Room::random_point`] callers should allow.
pub const DEFAULT_MAX_ATTEMPTS: usize = 1000;

/// How a room's extent is given. Exactly one of walls or area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Boundary {
    Walls(Vec<Wall>),
    Area(f64),
}

/// Structural identity of a room.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RoomKey {
    /// Canonical boundary of a spatial room as raw coordinate bits.
    Polygon(Vec<u64>),
    /// Name of a topological room.
    Name(String),
}

#[derive(Debug, Clone)]
enum Shape {
    Spatial {
        walls: Vec<Wall>,
        region: Polygon<f64>,
    },
    Topological,
}

/// Represents a room on a floor of a building.
///
/// Two rooms compare equal when their [`RoomKey`]s match, whatever their
/// contents or ids.
#[derive(Debug, Clone)]
pub struct Room {
    room_id: RoomId,
    name: String,
    building: String,
    floor: i32,
    contents: Vec<Content>,
    doors: Vec<Door>,
    shape: Shape,
    area: f64,
    key: RoomKey,
}

impl Room {
    /// Builds and validates a room.
    ///
    /// A spatial room needs at least three walls, and its wall and door
    /// segments must close exactly one region of positive area. A
    /// topological room needs a positive area.
    ///
    /// # Arguments
    ///
    /// * `room_id`: Identifier, unique within the floor.
    /// * `name`: Human-readable name; the identity of a topological room.
    /// * `building`, `floor`: Where the room sits.
    /// * `contents`: Beds and workstations in the room.
    /// * `doors`: Doors in the room's boundary. Spatial rooms use their
    ///   segments to close the wall outline.
    /// * `boundary`: Walls for a spatial room, an area for a topological one.
    ///
    /// # Errors
    ///
    /// [`AbmError::InvalidRoom`] for too few walls, an outline that closes no
    /// region or several, or a non-positive area; [`AbmError::InvalidDoor`]
    /// for a door without coordinates in a spatial room.
    pub fn new(
        room_id: RoomId,
        name: impl Into<String>,
        building: impl Into<String>,
        floor: i32,
        contents: Vec<Content>,
        doors: Vec<Door>,
        boundary: Boundary,
    ) -> Result<Self> {
        let name = name.into();
        let building = building.into();

        let (shape, area, key) = match boundary {
            Boundary::Walls(walls) => {
                if walls.len() < 3 {
                    return Err(AbmError::InvalidRoom(
                        "A room must have at least 3 walls to form a closed region.".to_string(),
                    ));
                }
                let region = form_region(&walls, &doors)?;
                let area = region.unsigned_area();
                let key = RoomKey::Polygon(polygon_bits(&region));
                (Shape::Spatial { walls, region }, area, key)
            }
            Boundary::Area(area) => {
                warn!(room = %name, "room has no walls; no region is available");
                (Shape::Topological, area, RoomKey::Name(name.clone()))
            }
        };

        // Negated so that NaN is rejected too.
        if !(area > 0.0) {
            return Err(AbmError::InvalidRoom(format!(
                "Room area must be positive. Got {area}."
            )));
        }

        debug!(room_id, room = %name, %building, floor, area, "room created");

        Ok(Room {
            room_id,
            name,
            building,
            floor,
            contents,
            doors,
            shape,
            area,
            key,
        })
    }

    /// Returns the room's identifier.
    #[inline]
    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    /// Returns the room's name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the name of the building the room is in.
    #[inline]
    pub fn building(&self) -> &str {
        &self.building
    }

    /// Returns the floor number the room is on.
    #[inline]
    pub fn floor(&self) -> i32 {
        self.floor
    }

    #[inline]
    pub fn contents(&self) -> &[Content] {
        &self.contents
    }

    /// Returns the doors in the room's boundary.
    #[inline]
    pub fn doors(&self) -> &[Door] {
        &self.doors
    }

    /// Returns the area of the region, or the given area of a topological room.
    #[inline]
    pub fn area(&self) -> f64 {
        self.area
    }

    /// Checks whether the room has walls.
    #[inline]
    pub fn is_spatial(&self) -> bool {
        matches!(self.shape, Shape::Spatial { .. })
    }

    #[inline]
    pub fn walls(&self) -> Option<&[Wall]> {
        match &self.shape {
            Shape::Spatial { walls, .. } => Some(walls),
            Shape::Topological => None,
        }
    }

    /// Returns the closed region of a spatial room.
    #[inline]
    pub fn region(&self) -> Option<&Polygon<f64>> {
        match &self.shape {
            Shape::Spatial { region, .. } => Some(region),
            Shape::Topological => None,
        }
    }

    #[inline]
    pub fn key(&self) -> &RoomKey {
        &self.key
    }

    /// Platform-independent digest of the room's key, as lowercase hex.
    pub fn room_hash(&self) -> String {
        format!("{:016x}", stable_digest(&self.key))
    }

    fn spatial_region(&self, operation: &str) -> Result<&Polygon<f64>> {
        self.region().ok_or_else(|| {
            AbmError::SimulationMode(format!("Cannot {operation} without walls."))
        })
    }

    /// Whether `point` lies strictly inside the room's region.
    ///
    /// # Errors
    ///
    /// [`AbmError::SimulationMode`] for a topological room.
    pub fn contains_point(&self, point: Point) -> Result<bool> {
        let region = self.spatial_region("check point containment")?;
        Ok(region.contains(&Coord::from(point)))
    }

    /// Draws a uniformly distributed point inside the room by rejection
    /// sampling over its bounding box.
    ///
    /// # Arguments
    ///
    /// * `rng`: Source of the candidate coordinates.
    /// * `max_attempts`: Number of draws before giving up; see
    ///   [`DEFAULT_MAX_ATTEMPTS`].
    ///
    /// # Errors
    ///
    /// [`AbmError::SimulationMode`] for a topological room or after
    /// `max_attempts` rejected draws.
    pub fn random_point<R: Rng + ?Sized>(&self, rng: &mut R, max_attempts: usize) -> Result<Point> {
        let region = self.spatial_region("get random point")?;
        let bounds = region.bounding_rect().ok_or_else(|| {
            AbmError::SimulationMode(format!("Room {} has an empty region.", self.name))
        })?;
        let (min, max) = (bounds.min(), bounds.max());

        for _ in 0..max_attempts {
            let candidate = Coord {
                x: rng.random_range(min.x..max.x),
                y: rng.random_range(min.y..max.y),
            };
            if region.contains(&candidate) {
                return Ok(Point::from(candidate));
            }
        }

        Err(AbmError::SimulationMode(format!(
            "Failed to find a random point within room {} after {max_attempts} attempts. \
             Consider increasing max_attempts or checking room geometry.",
            self.name
        )))
    }

    /// Lays a topological room out as a rectangle of the same area with its
    /// doors side by side along the top edge.
    ///
    /// The rectangle is at least `2 * doors + 2` long so that every door gets
    /// a unit-wide opening separated by unit-wide wall pieces.
    pub fn to_pseudo_spatial(&self) -> Result<Room> {
        if self.is_spatial() {
            return Err(AbmError::SimulationMode(format!(
                "Room {} is already spatial.",
                self.name
            )));
        }

        let door_count = self.doors.len() as f64;
        let length = self.area.sqrt().max(2.0 * door_count + 2.0);
        let width = self.area / length;

        let mut walls = vec![
            Wall::new((0.0, width), (0.0, 0.0)),
            Wall::new((0.0, 0.0), (length, 0.0)),
            Wall::new((length, 0.0), (length, width)),
        ];
        let mut doors = Vec::with_capacity(self.doors.len());
        for (count, door) in self.doors.iter().enumerate() {
            let offset = 2.0 * count as f64;
            walls.push(Wall::new((offset, width), (offset + 1.0, width)));
            doors.push(door.placed_at((offset + 1.0, width), (offset + 2.0, width))?);
        }
        walls.push(Wall::new((2.0 * door_count, width), (length, width)));

        Room::new(
            self.room_id,
            self.name.clone(),
            self.building.clone(),
            self.floor,
            self.contents.clone(),
            doors,
            Boundary::Walls(walls),
        )
    }
}

/// Merges wall and door segments and extracts the single region they close.
fn form_region(walls: &[Wall], doors: &[Door]) -> Result<Polygon<f64>> {
    let mut segments: Vec<_> = walls.iter().map(Wall::line).collect();
    for door in doors {
        segments.push(door.line()?);
    }

    let mut faces = polygonize(&segments);
    match faces.len() {
        0 => Err(AbmError::InvalidRoom(
            "The walls do not form a valid closed region.".to_string(),
        )),
        1 => Ok(faces.remove(0)),
        n => Err(AbmError::InvalidRoom(format!(
            "The walls form {n} separate regions; a room must form exactly one."
        ))),
    }
}

impl PartialEq for Room {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for Room {}

impl Hash for Room {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use rand::{RngCore, SeedableRng, rngs::StdRng};

    use super::*;

    fn square_walls(size: f64) -> Vec<Wall> {
        vec![
            Wall::new((0.0, 0.0), (size, 0.0)),
            Wall::new((size, 0.0), (size, size)),
            Wall::new((size, size), (0.0, size)),
            Wall::new((0.0, size), (0.0, 0.0)),
        ]
    }

    fn spatial(walls: Vec<Wall>, doors: Vec<Door>) -> Result<Room> {
        Room::new(0, "Ward", "Hospital", 0, vec![], doors, Boundary::Walls(walls))
    }

    /// Always yields zero bits, so every uniform draw lands on the lower
    /// bound. Counts the words it hands out.
    struct ZeroRng {
        draws: usize,
    }

    impl RngCore for ZeroRng {
        fn next_u32(&mut self) -> u32 {
            self.draws += 1;
            0
        }

        fn next_u64(&mut self) -> u64 {
            self.draws += 1;
            0
        }

        fn fill_bytes(&mut self, dst: &mut [u8]) {
            self.draws += 1;
            dst.fill(0);
        }
    }

    #[test]
    fn square_room_has_area_sixteen() {
        let room = spatial(square_walls(4.0), vec![]).unwrap();
        assert_eq!(room.area(), 16.0);
        assert!(room.is_spatial());
    }

    #[test]
    fn room_with_door_gap_is_closed_by_the_door() {
        let walls = vec![
            Wall::new((0.0, 0.0), (0.0, 5.0)),
            Wall::new((0.0, 5.0), (5.0, 5.0)),
            Wall::new((5.0, 5.0), (5.0, 2.0)),
            Wall::new((5.0, 1.0), (5.0, 0.0)),
            Wall::new((5.0, 0.0), (0.0, 0.0)),
        ];
        let door = Door::spatial((5.0, 1.0), (5.0, 2.0)).unwrap();
        assert!(spatial(walls.clone(), vec![]).is_err());
        let room = spatial(walls, vec![door]).unwrap();
        assert_eq!(room.area(), 25.0);
    }

    #[test]
    fn contains_point_inside_and_outside() {
        let room = spatial(square_walls(4.0), vec![]).unwrap();
        assert!(room.contains_point(Point::new(2.0, 2.0)).unwrap());
        assert!(room.contains_point(Point::new(0.01, 3.99)).unwrap());
        assert!(!room.contains_point(Point::new(5.0, 2.0)).unwrap());
        assert!(!room.contains_point(Point::new(-1.0, -1.0)).unwrap());
    }

    #[test]
    fn too_few_walls_is_invalid() {
        let walls = vec![
            Wall::new((0.0, 0.0), (1.0, 0.0)),
            Wall::new((1.0, 0.0), (0.0, 1.0)),
        ];
        let err = spatial(walls, vec![]).unwrap_err();
        assert!(err.to_string().contains("at least 3 walls"));
    }

    #[test]
    fn open_walls_are_invalid() {
        let walls = vec![
            Wall::new((0.0, 0.0), (1.0, 0.0)),
            Wall::new((1.0, 0.0), (1.0, 1.0)),
            Wall::new((1.0, 1.0), (0.0, 1.0)),
        ];
        let err = spatial(walls, vec![]).unwrap_err();
        assert!(matches!(err, AbmError::InvalidRoom(_)));
    }

    #[test]
    fn two_regions_are_invalid() {
        let mut walls = square_walls(2.0);
        walls.push(Wall::new((1.0, 0.0), (1.0, 2.0)));
        let err = spatial(walls, vec![]).unwrap_err();
        assert!(err.to_string().contains("exactly one"));
    }

    #[test]
    fn non_positive_area_is_invalid() {
        for area in [0.0, -3.0, f64::NAN] {
            let result = Room::new(1, "Ghost", "H", 0, vec![], vec![], Boundary::Area(area));
            assert!(matches!(result, Err(AbmError::InvalidRoom(_))));
        }
    }

    #[test]
    fn identity_ignores_orientation_order_and_contents() {
        let ccw = spatial(square_walls(3.0), vec![]).unwrap();
        let mut reversed: Vec<Wall> = square_walls(3.0)
            .into_iter()
            .map(|w| Wall::new(w.end, w.start))
            .collect();
        reversed.rotate_left(2);
        let cw = Room::new(
            9,
            "Other name",
            "Hospital",
            0,
            vec![Content::Bed { bed_id: 1 }],
            vec![],
            Boundary::Walls(reversed),
        )
        .unwrap();
        assert_eq!(ccw, cw);
        assert_eq!(ccw.room_hash(), cw.room_hash());
    }

    #[test]
    fn topological_identity_is_the_name() {
        let a = Room::new(1, "Bay A", "H", 0, vec![], vec![], Boundary::Area(10.0)).unwrap();
        let b = Room::new(2, "Bay A", "H", 0, vec![], vec![], Boundary::Area(20.0)).unwrap();
        let c = Room::new(1, "Bay B", "H", 0, vec![], vec![], Boundary::Area(10.0)).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn topological_room_rejects_spatial_queries() {
        let room = Room::new(1, "Bay", "H", 0, vec![], vec![], Boundary::Area(10.0)).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        assert!(matches!(
            room.contains_point(Point::new(0.0, 0.0)),
            Err(AbmError::SimulationMode(_))
        ));
        assert!(matches!(
            room.random_point(&mut rng, 10),
            Err(AbmError::SimulationMode(_))
        ));
    }

    #[test]
    fn random_point_is_inside() {
        let room = spatial(square_walls(4.0), vec![]).unwrap();
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..50 {
            let p = room.random_point(&mut rng, DEFAULT_MAX_ATTEMPTS).unwrap();
            assert!(room.contains_point(p).unwrap());
        }
    }

    #[test]
    fn random_point_gives_up_after_max_attempts() {
        // Right triangle whose bounding-box minimum corner (0, 0) is outside.
        let walls = vec![
            Wall::new((4.0, 0.0), (4.0, 4.0)),
            Wall::new((4.0, 4.0), (0.0, 4.0)),
            Wall::new((0.0, 4.0), (4.0, 0.0)),
        ];
        let room = spatial(walls, vec![]).unwrap();
        let mut rng = ZeroRng { draws: 0 };
        let err = room.random_point(&mut rng, 7).unwrap_err();
        assert!(matches!(err, AbmError::SimulationMode(_)));
        assert!(err.to_string().contains("after 7 attempts"));
        // One draw per coordinate per attempt.
        assert_eq!(rng.draws, 14);
    }

    #[test]
    fn pseudo_spatial_room_keeps_area_and_doors() {
        let doors = vec![
            Door::named("d1").unwrap().connect(0, 1).unwrap(),
            Door::named("d2").unwrap().connect(0, 2).unwrap(),
        ];
        let room = Room::new(0, "Hub", "H", 0, vec![], doors, Boundary::Area(36.0)).unwrap();
        let pseudo = room.to_pseudo_spatial().unwrap();
        assert!(pseudo.is_spatial());
        assert!((pseudo.area() - 36.0).abs() < 1e-9);
        assert_eq!(pseudo.doors().len(), 2);
        assert!(pseudo.doors().iter().all(Door::is_spatial));
        assert_eq!(pseudo.doors()[1].connecting_rooms(), Some((0, 2)));
        assert!(pseudo.to_pseudo_spatial().is_err());
    }
}
