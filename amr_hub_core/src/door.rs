use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

use serde::Serialize;

use crate::{
    DoorId, Point, RoomId,
    error::{AbmError, Result},
    geometry::{Segment, canonical_bits, stable_digest},
};

/// Represents a door between two rooms.
///
/// A door is either *spatial* (two endpoint coordinates) or *named* (only a
/// name, used by topological layouts). When coordinates are present they are
/// stored in canonical order, `start <= end` lexicographically, so that two
/// rooms describing the same opening in opposite directions produce the same
/// door.
///
/// Equality and hashing go through [`DoorKey`]; `is_open`, `access_control`
/// and `door_id` are ignored.
#[derive(Debug, Clone, Serialize)]
pub struct Door {
    door_id: Option<DoorId>,
    start: Option<Point>,
    end: Option<Point>,
    name: Option<String>,
    pub is_open: bool,
    /// Whether access is controlled from the first and second connecting room.
    pub access_control: (bool, bool),
    connecting_rooms: Option<(RoomId, RoomId)>,
}

/// The shape part of a door's identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DoorShapeKey {
    /// Canonical endpoint coordinates as raw bits.
    Span([u64; 4]),
    Name(String),
}

/// Structural identity of a door.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DoorKey {
    pub shape: DoorShapeKey,
    pub connecting_rooms: Option<(RoomId, RoomId)>,
}

impl Door {
    /// Creates a door from optional coordinates and an optional name.
    ///
    /// Both coordinates must be given or both omitted; without coordinates
    /// a non-empty name is required; the two endpoints must differ.
    pub fn new(start: Option<Point>, end: Option<Point>, name: Option<String>) -> Result<Self> {
        let name = name.filter(|n| !n.trim().is_empty());
        let (start, end) = match (start, end) {
            (Some(s), Some(e)) => {
                if s.lex_cmp(&e) == Ordering::Equal {
                    return Err(AbmError::InvalidDoor(
                        "Door start and end points cannot be the same.".to_string(),
                    ));
                }
                if s.lex_cmp(&e) == Ordering::Greater {
                    (Some(e), Some(s))
                } else {
                    (Some(s), Some(e))
                }
            }
            (None, None) => {
                if name.is_none() {
                    return Err(AbmError::InvalidDoor(
                        "Door must have a name if start and end points are not defined."
                            .to_string(),
                    ));
                }
                (None, None)
            }
            _ => {
                return Err(AbmError::InvalidDoor(
                    "Both start and end points must be None or both must be defined.".to_string(),
                ));
            }
        };

        Ok(Door {
            door_id: None,
            start,
            end,
            name,
            is_open: false,
            access_control: (false, false),
            connecting_rooms: None,
        })
    }

    /// A door defined by its two endpoints.
    pub fn spatial(start: impl Into<Point>, end: impl Into<Point>) -> Result<Self> {
        Self::new(Some(start.into()), Some(end.into()), None)
    }

    /// A door identified only by name.
    pub fn named(name: impl Into<String>) -> Result<Self> {
        Self::new(None, None, Some(name.into()))
    }

    pub fn with_open(mut self, is_open: bool) -> Self {
        self.is_open = is_open;
        self
    }

    pub fn with_access_control(mut self, access_control: (bool, bool)) -> Self {
        self.access_control = access_control;
        self
    }

    pub fn with_id(mut self, door_id: DoorId) -> Self {
        self.door_id = Some(door_id);
        self
    }

    /// Records the two rooms this door joins. The pair is stored sorted.
    pub fn connect(mut self, a: RoomId, b: RoomId) -> Result<Self> {
        if a == b {
            return Err(AbmError::InvalidDoor(format!(
                "Door must connect two different rooms, got room {a} twice."
            )));
        }
        self.connecting_rooms = Some((a.min(b), a.max(b)));
        Ok(self)
    }

    /// A copy of this door moved to new endpoints, keeping its name, id,
    /// flags and connections.
    pub fn placed_at(&self, start: impl Into<Point>, end: impl Into<Point>) -> Result<Self> {
        let placed = Door::new(Some(start.into()), Some(end.into()), self.name.clone())?;
        Ok(Door {
            door_id: self.door_id,
            is_open: self.is_open,
            access_control: self.access_control,
            connecting_rooms: self.connecting_rooms,
            ..placed
        })
    }

    pub fn door_id(&self) -> Option<DoorId> {
        self.door_id
    }

    pub fn start(&self) -> Option<Point> {
        self.start
    }

    pub fn end(&self) -> Option<Point> {
        self.end
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn connecting_rooms(&self) -> Option<(RoomId, RoomId)> {
        self.connecting_rooms
    }

    pub fn is_spatial(&self) -> bool {
        self.start.is_some()
    }

    /// The room on the other side of the door from `room`, if the door
    /// touches `room` at all.
    pub fn other_side(&self, room: RoomId) -> Option<RoomId> {
        match self.connecting_rooms? {
            (a, b) if a == room => Some(b),
            (a, b) if b == room => Some(a),
            _ => None,
        }
    }

    /// The door's opening as a segment.
    pub fn line(&self) -> Result<Segment> {
        match (self.start, self.end) {
            (Some(s), Some(e)) => Ok(Segment::new(s, e)),
            _ => Err(AbmError::InvalidDoor(
                "Door start and end must be defined when not in topological mode.".to_string(),
            )),
        }
    }

    pub fn midpoint(&self) -> Option<Point> {
        Some(self.start?.midpoint(&self.end?))
    }

    /// Identity of the door's shape alone: coordinates win over the name.
    pub fn shape_key(&self) -> DoorShapeKey {
        match (self.start, self.end) {
            (Some(s), Some(e)) => DoorShapeKey::Span([
                canonical_bits(s.x),
                canonical_bits(s.y),
                canonical_bits(e.x),
                canonical_bits(e.y),
            ]),
            _ => DoorShapeKey::Name(self.name.clone().unwrap_or_default()),
        }
    }

    pub fn key(&self) -> DoorKey {
        DoorKey {
            shape: self.shape_key(),
            connecting_rooms: self.connecting_rooms,
        }
    }

    /// Platform-independent digest of [`Door::key`].
    pub fn digest(&self) -> u64 {
        stable_digest(&self.key())
    }

    /// Orders doors by coordinates (spatial first), then by name.
    pub fn shape_cmp(&self, other: &Door) -> Ordering {
        match ((self.start, self.end), (other.start, other.end)) {
            ((Some(s1), Some(e1)), (Some(s2), Some(e2))) => {
                s1.lex_cmp(&s2).then_with(|| e1.lex_cmp(&e2))
            }
            ((Some(_), _), _) => Ordering::Less,
            (_, (Some(_), _)) => Ordering::Greater,
            _ => self.name.cmp(&other.name),
        }
    }
}

impl PartialEq for Door {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Door {}

impl Hash for Door {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}
