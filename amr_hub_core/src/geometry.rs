//! Line-segment primitives and the planar routines rooms are built from.
//!
//! A room's region is recovered from an unordered bag of wall and door
//! segments: endpoints are snapped together, T-junctions are noded, dangling
//! edges are pruned and the bounded faces of the remaining planar graph are
//! walked with a half-edge traversal.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use geo::orient::{Direction, Orient};
use geo::{Coord, EuclideanDistance, LineString, Polygon};
use serde::{Deserialize, Serialize};

use crate::Point;

/// Coordinates closer than this are treated as the same vertex.
pub const SNAP_TOLERANCE: f64 = 1e-9;

/// Faces with a smaller signed area are discarded as degenerate.
const MIN_FACE_AREA: f64 = 1e-12;

/// An oriented line segment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start: Point,
    pub end: Point,
}

impl Segment {
    /// Creates a segment running from `start` to `end`.
    #[inline]
    pub const fn new(start: Point, end: Point) -> Self {
        Segment { start, end }
    }

    /// Returns the Euclidean length of the segment.
    #[inline]
    pub fn length(&self) -> f64 {
        self.start.distance(&self.end)
    }

    /// Converts the segment into a `geo` line for distance queries.
    #[inline]
    pub fn to_line(&self) -> geo::Line<f64> {
        geo::Line::new(Coord::from(self.start), Coord::from(self.end))
    }

    /// Parameter of `p` along the segment if `p` lies on it within
    /// [`SNAP_TOLERANCE`], `None` otherwise.
    fn parameter_of(&self, p: &Point) -> Option<f64> {
        let dx = self.end.x - self.start.x;
        let dy = self.end.y - self.start.y;
        let len_sq = dx * dx + dy * dy;
        if len_sq == 0.0 {
            return None;
        }
        let t = ((p.x - self.start.x) * dx + (p.y - self.start.y) * dy) / len_sq;
        let proj = Point::new(self.start.x + t * dx, self.start.y + t * dy);
        (proj.distance(p) <= SNAP_TOLERANCE).then_some(t)
    }
}

/// Represents a wall: an oriented segment with a thickness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wall {
    pub start: Point,
    pub end: Point,
    #[serde(default = "default_thickness")]
    pub thickness: f64,
}

fn default_thickness() -> f64 {
    Wall::DEFAULT_THICKNESS
}

impl Wall {
    pub const DEFAULT_THICKNESS: f64 = 0.2;

    /// Creates a wall of [`Wall::DEFAULT_THICKNESS`].
    ///
    /// # Arguments
    ///
    /// * `start`: One end of the centre line.
    /// * `end`: The other end of the centre line.
    pub fn new(start: impl Into<Point>, end: impl Into<Point>) -> Self {
        Wall {
            start: start.into(),
            end: end.into(),
            thickness: Self::DEFAULT_THICKNESS,
        }
    }

    /// Replaces the wall's thickness.
    pub fn with_thickness(mut self, thickness: f64) -> Self {
        self.thickness = thickness;
        self
    }

    /// The wall's centre line.
    #[inline]
    pub fn line(&self) -> Segment {
        Segment::new(self.start, self.end)
    }

    /// The wall buffered by half its thickness on every side, with square
    /// end caps. Used for collision queries.
    pub fn polygon(&self) -> Polygon<f64> {
        let half = self.thickness / 2.0;
        let length = self.start.distance(&self.end);
        let (ux, uy) = if length > 0.0 {
            (
                (self.end.x - self.start.x) / length,
                (self.end.y - self.start.y) / length,
            )
        } else {
            (1.0, 0.0)
        };
        let (nx, ny) = (-uy, ux);

        let a = Point::new(self.start.x - ux * half, self.start.y - uy * half);
        let b = Point::new(self.end.x + ux * half, self.end.y + uy * half);
        let ring = vec![
            Coord { x: a.x + nx * half, y: a.y + ny * half },
            Coord { x: a.x - nx * half, y: a.y - ny * half },
            Coord { x: b.x - nx * half, y: b.y - ny * half },
            Coord { x: b.x + nx * half, y: b.y + ny * half },
        ];
        Polygon::new(LineString::from(ring), vec![])
    }

    /// Distance from `point` to the buffered wall. Zero inside the wall.
    pub fn distance_to(&self, point: Point) -> f64 {
        geo::Point::from(Coord::from(point)).euclidean_distance(&self.polygon())
    }
}

/// Snaps coordinates onto a tolerance lattice so that nearly equal endpoints
/// share a vertex.
fn snap_key(p: &Point) -> (i64, i64) {
    (
        (p.x / SNAP_TOLERANCE).round() as i64,
        (p.y / SNAP_TOLERANCE).round() as i64,
    )
}

/// Builds every bounded face formed by `segments`.
///
/// Segments that do not take part in a closed cycle are ignored, so an empty
/// result means the input has no closed region at all.
///
/// # Arguments
///
/// * `segments`: Wall and door centre lines in any order and orientation.
///   Endpoints within [`SNAP_TOLERANCE`] of each other are merged, and a
///   segment passing through another segment's endpoint is split there.
///
/// # Returns
///
/// The bounded faces as polygons with counter-clockwise exteriors.
pub fn polygonize(segments: &[Segment]) -> Vec<Polygon<f64>> {
    // Vertices, deduplicated by snapped position.
    let mut vertices: Vec<Point> = Vec::new();
    let mut index_of: HashMap<(i64, i64), usize> = HashMap::new();
    let mut vertex_id = |p: Point, vertices: &mut Vec<Point>| -> usize {
        *index_of.entry(snap_key(&p)).or_insert_with(|| {
            vertices.push(p);
            vertices.len() - 1
        })
    };

    let mut endpoints = Vec::with_capacity(segments.len());
    for seg in segments {
        let a = vertex_id(seg.start, &mut vertices);
        let b = vertex_id(seg.end, &mut vertices);
        endpoints.push((a, b));
    }

    // Node T-junctions: split segments at any vertex lying in their interior.
    let mut edges: Vec<(usize, usize)> = Vec::new();
    for (seg, &(a, b)) in segments.iter().zip(&endpoints) {
        let mut cuts: Vec<(f64, usize)> = vertices
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != a && *i != b)
            .filter_map(|(i, v)| {
                seg.parameter_of(v)
                    .filter(|t| *t > 0.0 && *t < 1.0)
                    .map(|t| (t, i))
            })
            .collect();
        cuts.sort_by(|x, y| x.0.total_cmp(&y.0));

        let mut previous = a;
        for (_, v) in cuts {
            edges.push((previous, v));
            previous = v;
        }
        edges.push((previous, b));
    }

    // Undirected, deduplicated, no self loops.
    let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); vertices.len()];
    for (u, v) in edges {
        if u != v && !adjacency[u].contains(&v) {
            adjacency[u].push(v);
            adjacency[v].push(u);
        }
    }

    prune_dangles(&mut adjacency);

    // Neighbours in counter-clockwise order of their bearing.
    for (u, neighbours) in adjacency.iter_mut().enumerate() {
        let origin = vertices[u];
        neighbours.sort_by(|&p, &q| {
            bearing(&origin, &vertices[p]).total_cmp(&bearing(&origin, &vertices[q]))
        });
    }

    trace_faces(&vertices, &adjacency)
}

fn bearing(from: &Point, to: &Point) -> f64 {
    (to.y - from.y).atan2(to.x - from.x)
}

/// Repeatedly removes edges hanging off degree-one vertices.
fn prune_dangles(adjacency: &mut [Vec<usize>]) {
    let mut stack: Vec<usize> = (0..adjacency.len())
        .filter(|&v| adjacency[v].len() == 1)
        .collect();
    while let Some(v) = stack.pop() {
        if adjacency[v].len() != 1 {
            continue;
        }
        let u = adjacency[v][0];
        adjacency[v].clear();
        adjacency[u].retain(|&w| w != v);
        if adjacency[u].len() == 1 {
            stack.push(u);
        }
    }
}

/// Walks every half-edge once. For a half-edge `u -> v` the next half-edge
/// of the face on its left leaves `v` towards the neighbour that precedes
/// `u` in `v`'s counter-clockwise ordering. Bounded faces come out
/// counter-clockwise, the unbounded one clockwise.
fn trace_faces(vertices: &[Point], adjacency: &[Vec<usize>]) -> Vec<Polygon<f64>> {
    let half_edge_count: usize = adjacency.iter().map(Vec::len).sum();
    let mut visited: HashMap<(usize, usize), bool> = HashMap::with_capacity(half_edge_count);
    let mut faces = Vec::new();

    for (u, neighbours) in adjacency.iter().enumerate() {
        for &v in neighbours {
            if visited.contains_key(&(u, v)) {
                continue;
            }

            let mut ring = Vec::new();
            let (mut from, mut to) = (u, v);
            for _ in 0..=half_edge_count {
                if visited.insert((from, to), true).is_some() {
                    break;
                }
                ring.push(vertices[from]);
                let around = &adjacency[to];
                let Some(pos) = around.iter().position(|&w| w == from) else {
                    break;
                };
                let next = around[(pos + around.len() - 1) % around.len()];
                from = to;
                to = next;
            }

            if ring.len() >= 3 && signed_area(&ring) > MIN_FACE_AREA {
                let coords: Vec<Coord<f64>> = ring.into_iter().map(Coord::from).collect();
                faces.push(Polygon::new(LineString::from(coords), vec![]));
            }
        }
    }

    faces
}

/// Shoelace area, positive for counter-clockwise rings.
pub fn signed_area(ring: &[Point]) -> f64 {
    let n = ring.len();
    let twice: f64 = (0..n)
        .map(|i| {
            let a = ring[i];
            let b = ring[(i + 1) % n];
            a.x * b.y - b.x * a.y
        })
        .sum();
    twice / 2.0
}

/// The exterior ring of `polygon` oriented counter-clockwise and rotated to
/// start at its lexicographically smallest vertex, without the closing
/// coordinate.
pub fn canonical_ring(polygon: &Polygon<f64>) -> Vec<Point> {
    let oriented = polygon.orient(Direction::Default);
    let mut ring: Vec<Point> = oriented
        .exterior()
        .coords()
        .copied()
        .map(Point::from)
        .collect();
    if ring.len() > 1 && ring.first() == ring.last() {
        ring.pop();
    }
    if let Some(start) = ring
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| a.lex_cmp(b))
        .map(|(i, _)| i)
    {
        ring.rotate_left(start);
    }
    ring
}

/// Bit pattern of a coordinate with negative zero folded into zero.
#[inline]
pub fn canonical_bits(value: f64) -> u64 {
    (value + 0.0).to_bits()
}

/// Canonical byte-level representation of a polygon's boundary.
///
/// Two polygons with the same vertices give the same bits whatever their
/// orientation or starting vertex.
pub fn polygon_bits(polygon: &Polygon<f64>) -> Vec<u64> {
    canonical_ring(polygon)
        .iter()
        .flat_map(|p| [canonical_bits(p.x), canonical_bits(p.y)])
        .collect()
}

/// 64-bit FNV-1a hasher with fixed-width little-endian integer encoding.
///
/// Unlike `std`'s default hasher this is unseeded and platform independent,
/// so digests can be compared across runs and machines.
#[derive(Debug, Clone)]
pub struct StableHasher(u64);

impl StableHasher {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    /// Creates a hasher seeded with the FNV offset basis.
    #[inline]
    pub fn new() -> Self {
        StableHasher(Self::OFFSET)
    }
}

impl Default for StableHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl Hasher for StableHasher {
    fn finish(&self) -> u64 {
        self.0
    }

    fn write(&mut self, bytes: &[u8]) {
        for byte in bytes {
            self.0 ^= u64::from(*byte);
            self.0 = self.0.wrapping_mul(Self::PRIME);
        }
    }

    fn write_u32(&mut self, i: u32) {
        self.write(&i.to_le_bytes());
    }

    fn write_u64(&mut self, i: u64) {
        self.write(&i.to_le_bytes());
    }

    fn write_usize(&mut self, i: usize) {
        self.write_u64(i as u64);
    }

    fn write_i32(&mut self, i: i32) {
        self.write(&i.to_le_bytes());
    }

    fn write_i64(&mut self, i: i64) {
        self.write(&i.to_le_bytes());
    }
}

/// Digest of `value` under [`StableHasher`].
pub fn stable_digest<T: Hash + ?Sized>(value: &T) -> u64 {
    let mut hasher = StableHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use geo::Area;

    use super::*;

    fn seg(x0: f64, y0: f64, x1: f64, y1: f64) -> Segment {
        Segment::new(Point::new(x0, y0), Point::new(x1, y1))
    }

    fn square(size: f64) -> Vec<Segment> {
        vec![
            seg(0.0, 0.0, size, 0.0),
            seg(size, 0.0, size, size),
            seg(size, size, 0.0, size),
            seg(0.0, size, 0.0, 0.0),
        ]
    }

    #[test]
    fn polygonize_square_in_any_order() {
        let mut segments = square(4.0);
        segments.reverse();
        segments.swap(0, 2);
        let faces = polygonize(&segments);
        assert_eq!(faces.len(), 1);
        assert_eq!(faces[0].unsigned_area(), 16.0);
    }

    #[test]
    fn polygonize_ignores_dangling_segment() {
        let mut segments = square(2.0);
        segments.push(seg(2.0, 2.0, 5.0, 5.0));
        let faces = polygonize(&segments);
        assert_eq!(faces.len(), 1);
        assert_eq!(faces[0].unsigned_area(), 4.0);
    }

    #[test]
    fn polygonize_open_chain_has_no_face() {
        let segments = vec![seg(0.0, 0.0, 1.0, 0.0), seg(1.0, 0.0, 1.0, 1.0)];
        assert!(polygonize(&segments).is_empty());
    }

    #[test]
    fn polygonize_nodes_t_junctions() {
        // Bottom edge given as one segment, divider meets it mid-way.
        let segments = vec![
            seg(0.0, 0.0, 2.0, 0.0),
            seg(2.0, 0.0, 2.0, 1.0),
            seg(2.0, 1.0, 0.0, 1.0),
            seg(0.0, 1.0, 0.0, 0.0),
            seg(1.0, 0.0, 1.0, 1.0),
        ];
        let faces = polygonize(&segments);
        assert_eq!(faces.len(), 2);
        for face in &faces {
            assert!((face.unsigned_area() - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn canonical_ring_ignores_orientation_and_start() {
        let ccw = Polygon::new(
            LineString::from(vec![(0.0, 0.0), (3.0, 0.0), (3.0, 2.0), (0.0, 2.0)]),
            vec![],
        );
        let cw = Polygon::new(
            LineString::from(vec![(3.0, 2.0), (3.0, 0.0), (0.0, 0.0), (0.0, 2.0)]),
            vec![],
        );
        assert_eq!(polygon_bits(&ccw), polygon_bits(&cw));
        assert_eq!(canonical_ring(&cw)[0], Point::new(0.0, 0.0));
    }

    #[test]
    fn wall_polygon_has_square_caps() {
        let wall = Wall::new((0.0, 0.0), (4.0, 0.0));
        let polygon = wall.polygon();
        // (4 + 0.2) * 0.2
        assert!((polygon.unsigned_area() - 0.84).abs() < 1e-12);
        assert_eq!(wall.distance_to(Point::new(2.0, 0.05)), 0.0);
        assert!((wall.distance_to(Point::new(2.0, 1.1)) - 1.0).abs() < 1e-12);
        assert!((wall.distance_to(Point::new(-1.1, 0.0)) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn stable_digest_is_fixed() {
        assert_eq!(stable_digest(&0u64), stable_digest(&0u64));
        assert_ne!(stable_digest("ward-a"), stable_digest("ward-b"));
        // FNV-1a of the empty input is the offset basis.
        assert_eq!(StableHasher::new().finish(), 0xcbf2_9ce4_8422_2325);
    }
}
