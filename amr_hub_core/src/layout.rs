//! Assembly of rooms, doors, floors and buildings from raw room definitions.
//!
//! Raw definitions list each door once per room that uses it, without
//! knowing which other room is on the far side. Assembly matches those
//! mentions by door identity, numbers the rooms and doors deterministically
//! and builds the validated spatial model.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    Point, RoomId,
    content::Content,
    door::Door,
    error::{AbmError, Result},
    floor::{Building, Floor},
    room::{Boundary, Room},
};

/// A door as mentioned by one room, before it is connected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoorSpec {
    #[serde(default)]
    pub start: Option<Point>,
    #[serde(default)]
    pub end: Option<Point>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub is_open: bool,
    #[serde(default)]
    pub access_control: (bool, bool),
}

impl DoorSpec {
    pub fn spatial(start: impl Into<Point>, end: impl Into<Point>) -> Self {
        DoorSpec {
            start: Some(start.into()),
            end: Some(end.into()),
            name: None,
            is_open: false,
            access_control: (false, false),
        }
    }

    pub fn named(name: impl Into<String>) -> Self {
        DoorSpec {
            start: None,
            end: None,
            name: Some(name.into()),
            is_open: false,
            access_control: (false, false),
        }
    }

    fn to_door(&self) -> Result<Door> {
        Ok(Door::new(self.start, self.end, self.name.clone())?
            .with_open(self.is_open)
            .with_access_control(self.access_control))
    }
}

/// The raw definition of a room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomSpec {
    pub name: String,
    pub building: String,
    pub floor: i32,
    #[serde(default)]
    pub contents: Vec<Content>,
    #[serde(default)]
    pub doors: Vec<DoorSpec>,
    pub boundary: Boundary,
}

/// Builds the buildings described by `specs`.
///
/// Rooms are numbered in ascending name order. Every distinct door must be
/// mentioned by exactly two rooms; doors are numbered in coordinate (or
/// name) order. Buildings come out sorted by name and floors by level.
pub fn assemble_buildings(specs: &[RoomSpec]) -> Result<Vec<Building>> {
    let spatial = specs
        .iter()
        .filter(|s| matches!(s.boundary, Boundary::Walls(_)))
        .count();
    if spatial != 0 && spatial != specs.len() {
        return Err(AbmError::SimulationMode(
            "Cannot mix rooms defined by walls with rooms defined by area.".to_string(),
        ));
    }

    let mut ordered: Vec<&RoomSpec> = specs.iter().collect();
    ordered.sort_by(|a, b| a.name.cmp(&b.name));
    if let Some(pair) = ordered.windows(2).find(|w| w[0].name == w[1].name) {
        return Err(AbmError::InvalidRoom(format!(
            "Room name {} is defined more than once.",
            pair[0].name
        )));
    }

    // Door mentions per room, in room id order.
    let mentions: Vec<Vec<Door>> = ordered
        .iter()
        .map(|spec| spec.doors.iter().map(DoorSpec::to_door).collect::<Result<Vec<_>>>())
        .collect::<Result<_>>()?;

    let doors = connect_doors(&mentions)?;

    let mut grouped: BTreeMap<&str, BTreeMap<i32, Vec<Room>>> = BTreeMap::new();
    for (room_id, spec) in ordered.iter().enumerate() {
        let room_doors: Vec<Door> = doors
            .iter()
            .filter(|door| door.other_side(room_id).is_some())
            .cloned()
            .collect();
        let room = Room::new(
            room_id,
            spec.name.clone(),
            spec.building.clone(),
            spec.floor,
            spec.contents.clone(),
            room_doors,
            spec.boundary.clone(),
        )?;
        info!(room = %room.name(), room_id, "room assembled");
        grouped
            .entry(spec.building.as_str())
            .or_default()
            .entry(spec.floor)
            .or_default()
            .push(room);
    }

    grouped
        .into_iter()
        .map(|(name, floors)| {
            let floors = floors
                .into_iter()
                .map(|(level, rooms)| Floor::new(level, rooms))
                .collect::<Result<Vec<_>>>()?;
            Ok(Building::new(name, floors))
        })
        .collect()
}

/// Deduplicates door mentions and connects each door to the two rooms
/// (indices into `mentions`) that reference it.
fn connect_doors(mentions: &[Vec<Door>]) -> Result<Vec<Door>> {
    let mut seen = HashSet::new();
    let mut unique: Vec<&Door> = mentions
        .iter()
        .flatten()
        .filter(|door| seen.insert(door.shape_key()))
        .collect();
    unique.sort_by(|a, b| a.shape_cmp(b));

    unique
        .into_iter()
        .enumerate()
        .map(|(door_id, door)| {
            let rooms: Vec<RoomId> = mentions
                .iter()
                .enumerate()
                .filter(|(_, doors)| doors.iter().any(|d| d.shape_key() == door.shape_key()))
                .map(|(room_id, _)| room_id)
                .collect();
            match rooms.as_slice() {
                [a, b] => door.clone().with_id(door_id).connect(*a, *b),
                _ => Err(AbmError::InvalidDoor(format!(
                    "Door {} must connect exactly two rooms. Found {}.",
                    describe(door),
                    rooms.len()
                ))),
            }
        })
        .collect()
}

fn describe(door: &Door) -> String {
    match (door.start(), door.end(), door.name()) {
        (Some(s), Some(e), _) => format!("at ({}, {})-({}, {})", s.x, s.y, e.x, e.y),
        (_, _, Some(name)) => format!("'{name}'"),
        _ => "<unnamed>".to_string(),
    }
}
