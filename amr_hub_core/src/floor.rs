use std::collections::{BTreeSet, HashMap, HashSet};

use tracing::info;

use crate::{
    Point, RoomId,
    error::{AbmError, Result},
    room::Room,
};

/// Represents a floor: a set of rooms with unique ids.
///
/// Connectivity is derived from the rooms' doors on demand, never stored.
#[derive(Debug, Clone)]
pub struct Floor {
    floor_number: i32,
    rooms: Vec<Room>,
    pseudo_rooms: Vec<Room>,
}

impl Floor {
    /// Creates a floor, rejecting duplicate room ids.
    pub fn new(floor_number: i32, rooms: Vec<Room>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(rooms.len());
        if let Some(dup) = rooms.iter().find(|room| !seen.insert(room.room_id())) {
            return Err(AbmError::InvalidRoom(format!(
                "Duplicate room IDs found on floor {floor_number}: {}.",
                dup.room_id()
            )));
        }

        info!(floor = floor_number, rooms = rooms.len(), "floor created");

        Ok(Floor {
            floor_number,
            rooms,
            pseudo_rooms: Vec::new(),
        })
    }

    pub fn floor_number(&self) -> i32 {
        self.floor_number
    }

    pub fn rooms(&self) -> &[Room] {
        &self.rooms
    }

    /// Spatial stand-ins for this floor's topological rooms, filled by
    /// [`Floor::add_pseudo_rooms`].
    pub fn pseudo_rooms(&self) -> &[Room] {
        &self.pseudo_rooms
    }

    /// Room ids in ascending order. Rows and columns of
    /// [`Floor::adjacency_matrix`] follow this order.
    pub fn room_ids(&self) -> Vec<RoomId> {
        let mut ids: Vec<RoomId> = self.rooms.iter().map(Room::room_id).collect();
        ids.sort_unstable();
        ids
    }

    /// Room names in [`Floor::room_ids`] order.
    pub fn room_names(&self) -> Vec<String> {
        let by_id: HashMap<RoomId, &str> = self
            .rooms
            .iter()
            .map(|room| (room.room_id(), room.name()))
            .collect();
        self.room_ids()
            .iter()
            .map(|id| by_id[id].to_string())
            .collect()
    }

    pub fn room(&self, room_id: RoomId) -> Option<&Room> {
        self.rooms.iter().find(|room| room.room_id() == room_id)
    }

    pub fn room_name(&self, room_id: RoomId) -> Option<&str> {
        self.room(room_id).map(Room::name)
    }

    /// Every door connection on the floor, in both directions.
    pub fn edge_set(&self) -> BTreeSet<(RoomId, RoomId)> {
        let mut edges = BTreeSet::new();
        for room in &self.rooms {
            for (a, b) in room.doors().iter().filter_map(|d| d.connecting_rooms()) {
                edges.insert((a, b));
                edges.insert((b, a));
            }
        }
        edges
    }

    /// Symmetric 0/1 matrix over [`Floor::room_ids`]: 1 where a door joins
    /// two rooms.
    ///
    /// Doors leading to rooms on other floors are left out.
    pub fn adjacency_matrix(&self) -> Vec<Vec<u8>> {
        let ids = self.room_ids();
        let index: HashMap<RoomId, usize> =
            ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();
        let mut matrix = vec![vec![0u8; ids.len()]; ids.len()];
        for (a, b) in self.edge_set() {
            if let (Some(&i), Some(&j)) = (index.get(&a), index.get(&b)) {
                matrix[i][j] = 1;
            }
        }
        matrix
    }

    /// Rooms reachable from `room_id` through a single door.
    pub fn neighbours(&self, room_id: RoomId) -> Vec<RoomId> {
        self.edge_set()
            .into_iter()
            .filter(|(a, _)| *a == room_id)
            .map(|(_, b)| b)
            .collect()
    }

    /// The spatial room containing `point`, if any.
    pub fn find_room_by_location(&self, point: Point) -> Option<&Room> {
        self.rooms
            .iter()
            .filter(|room| room.is_spatial())
            .find(|room| room.contains_point(point).unwrap_or(false))
    }

    /// Builds a spatial stand-in for every topological room on the floor.
    pub fn add_pseudo_rooms(&mut self) -> Result<()> {
        let pseudo = self
            .rooms
            .iter()
            .filter(|room| !room.is_spatial())
            .map(Room::to_pseudo_spatial)
            .collect::<Result<Vec<_>>>()?;
        self.pseudo_rooms.extend(pseudo);
        Ok(())
    }
}

/// Represents a building: an ordered collection of floors.
#[derive(Debug, Clone)]
pub struct Building {
    pub name: String,
    pub floors: Vec<Floor>,
}

impl Building {
    pub fn new(name: impl Into<String>, floors: Vec<Floor>) -> Self {
        let name = name.into();
        info!(building = %name, floors = floors.len(), "building created");
        Building { name, floors }
    }

    pub fn floor(&self, floor_number: i32) -> Option<&Floor> {
        self.floors
            .iter()
            .find(|floor| floor.floor_number() == floor_number)
    }

    pub fn rooms(&self) -> impl Iterator<Item = &Room> {
        self.floors.iter().flat_map(|floor| floor.rooms().iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{door::Door, room::Boundary};

    fn room(id: RoomId, name: &str, doors: Vec<Door>) -> Room {
        Room::new(id, name, "B1", 1, vec![], doors, Boundary::Area(10.0)).unwrap()
    }

    fn door(a: RoomId, b: RoomId, x: f64) -> Door {
        Door::spatial((x, 0.0), (x + 1.0, 0.0))
            .unwrap()
            .connect(a, b)
            .unwrap()
    }

    fn three_room_floor() -> Floor {
        let d12 = door(1, 2, 0.0);
        let d23 = door(2, 3, 5.0);
        Floor::new(
            1,
            vec![
                room(3, "C", vec![d23.clone()]),
                room(1, "A", vec![d12.clone()]),
                room(2, "B", vec![d12, d23]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn three_room_round_trip() {
        let floor = three_room_floor();
        assert_eq!(floor.room_ids(), vec![1, 2, 3]);
        assert_eq!(floor.room_names(), vec!["A", "B", "C"]);
        assert_eq!(
            floor.adjacency_matrix(),
            vec![vec![0, 1, 0], vec![1, 0, 1], vec![0, 1, 0]]
        );
        assert_eq!(floor.neighbours(2), vec![1, 3]);
        assert_eq!(floor.room_name(3), Some("C"));
    }

    #[test]
    fn adjacency_matrix_is_symmetric() {
        let floor = three_room_floor();
        let matrix = floor.adjacency_matrix();
        for (i, row) in matrix.iter().enumerate() {
            for (j, cell) in row.iter().enumerate() {
                assert_eq!(*cell, matrix[j][i]);
            }
        }
    }

    #[test]
    fn edge_set_contains_both_directions() {
        let floor = three_room_floor();
        let edges = floor.edge_set();
        assert!(edges.contains(&(1, 2)) && edges.contains(&(2, 1)));
        assert!(edges.contains(&(2, 3)) && edges.contains(&(3, 2)));
        assert_eq!(edges.len(), 4);
    }

    #[test]
    fn duplicate_room_ids_are_rejected() {
        let err = Floor::new(0, vec![room(1, "A", vec![]), room(1, "B", vec![])]).unwrap_err();
        assert!(matches!(err, AbmError::InvalidRoom(_)));
        assert!(err.to_string().contains("Duplicate room IDs"));
    }

    #[test]
    fn pseudo_rooms_are_added_for_topological_rooms() {
        let mut floor = three_room_floor();
        floor.add_pseudo_rooms().unwrap();
        assert_eq!(floor.pseudo_rooms().len(), 3);
        assert!(floor.pseudo_rooms().iter().all(Room::is_spatial));
    }

    #[test]
    fn building_finds_floors() {
        let building = Building::new("B1", vec![three_room_floor()]);
        assert!(building.floor(1).is_some());
        assert!(building.floor(2).is_none());
        assert_eq!(building.rooms().count(), 3);
    }
}
