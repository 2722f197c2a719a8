//! Edge geometry: orientations, node ports and drawable paths
//!
//! An edge between two node boxes is classified by the angle between the box
//! centers into one of twenty orientations. The orientation decides which
//! port of each box the line uses and whether the path runs straight, with
//! one turn, or with two turns. Paths are emitted as SVG path strings with
//! rounded corners, with midpoints snapped to the layout cell grid.

use bitflags::bitflags;

/// Orientation of an edge between two node boxes.
///
/// The first four variants are the cardinal directions (angle is a multiple
/// of 90 degrees). The diagonal groups differ in which axis dominates and in
/// whether the boxes overlap on the minor axis, which forces a two-turn path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum EdgeKind {
    West = 0,
    South = 1,
    East = 2,
    North = 3,
    // dy >= dx
    SouthWest = 4,
    SouthEast = 5,
    NorthEast = 6,
    NorthWest = 7,
    // dx > dy
    WestSouth = 8,
    EastSouth = 9,
    EastNorth = 10,
    WestNorth = 11,
    // dy >= dx && dx < width
    SouthWestSouth = 12,
    SouthEastSouth = 13,
    NorthEastNorth = 14,
    NorthWestNorth = 15,
    // dx > dy && dy < height
    WestSouthWest = 16,
    EastSouthEast = 17,
    EastNorthEast = 18,
    WestNorthWest = 19,
}

impl EdgeKind {
    const VARIANTS: [EdgeKind; 20] = [
        EdgeKind::West,
        EdgeKind::South,
        EdgeKind::East,
        EdgeKind::North,
        EdgeKind::SouthWest,
        EdgeKind::SouthEast,
        EdgeKind::NorthEast,
        EdgeKind::NorthWest,
        EdgeKind::WestSouth,
        EdgeKind::EastSouth,
        EdgeKind::EastNorth,
        EdgeKind::WestNorth,
        EdgeKind::SouthWestSouth,
        EdgeKind::SouthEastSouth,
        EdgeKind::NorthEastNorth,
        EdgeKind::NorthWestNorth,
        EdgeKind::WestSouthWest,
        EdgeKind::EastSouthEast,
        EdgeKind::EastNorthEast,
        EdgeKind::WestNorthWest,
    ];

    fn from_index(index: u8) -> EdgeKind {
        Self::VARIANTS[index as usize]
    }

    /// The port the edge leaves the source box through
    pub fn from_port(self) -> NodePort {
        PORTS_FROM[self as usize]
    }

    /// The port the edge enters the target box through
    pub fn to_port(self) -> NodePort {
        PORTS_TO[self as usize]
    }
}

bitflags! {
    /// The four connection ports of a node box
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct NodePort: u8 {
        const NORTH = 0b0001;
        const EAST = 0b0010;
        const SOUTH = 0b0100;
        const WEST = 0b1000;
    }
}

const PORTS_FROM: [NodePort; 20] = [
    NodePort::WEST,
    NodePort::SOUTH,
    NodePort::EAST,
    NodePort::NORTH,
    NodePort::SOUTH,
    NodePort::SOUTH,
    NodePort::NORTH,
    NodePort::NORTH,
    NodePort::WEST,
    NodePort::EAST,
    NodePort::EAST,
    NodePort::WEST,
    NodePort::SOUTH,
    NodePort::SOUTH,
    NodePort::NORTH,
    NodePort::NORTH,
    NodePort::WEST,
    NodePort::EAST,
    NodePort::EAST,
    NodePort::WEST,
];

const PORTS_TO: [NodePort; 20] = [
    NodePort::EAST,
    NodePort::NORTH,
    NodePort::WEST,
    NodePort::SOUTH,
    NodePort::EAST,
    NodePort::WEST,
    NodePort::WEST,
    NodePort::EAST,
    NodePort::NORTH,
    NodePort::NORTH,
    NodePort::SOUTH,
    NodePort::SOUTH,
    NodePort::NORTH,
    NodePort::NORTH,
    NodePort::SOUTH,
    NodePort::SOUTH,
    NodePort::EAST,
    NodePort::WEST,
    NodePort::WEST,
    NodePort::EAST,
];

fn select_kind_from_angle(angle: f64) -> u8 {
    let sector = angle / 90.0; // [-2, 2]
    if sector == sector.floor() {
        (sector as i32 + 2) as u8 // [0, 4]
    } else {
        (sector.floor() as i32 + 2 + 4) as u8 // [4, 8)
    }
}

/// Classify the edge between two box centers
pub fn select_edge_kind(
    from_x: f64,
    from_y: f64,
    to_x: f64,
    to_y: f64,
    width: f64,
    height: f64,
) -> EdgeKind {
    let dx = to_x - from_x;
    let dy = to_y - from_y;
    let angle = dy.atan2(dx).to_degrees();
    let mut orientation = select_kind_from_angle(angle);
    let dx_box = dx.abs().max(width) - width;
    let dy_box = dy.abs().max(height) - height;
    if orientation >= 4 {
        if dx_box > dy_box {
            orientation += 4; // [8, 12)
            if dy.abs() < height / 2.0 {
                orientation += 8; // [16, 20)
            }
        } else if dx.abs() < width / 2.0 {
            orientation += 8; // [12, 16)
        }
    }
    EdgeKind::from_index(orientation)
}

/// Reusable accumulator for path waypoints
#[derive(Debug)]
pub struct EdgePathBuilder {
    path: [f64; 16],
    i: usize,
}

impl Default for EdgePathBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EdgePathBuilder {
    pub fn new() -> Self {
        Self {
            path: [0.0; 16],
            i: 0,
        }
    }

    fn begin(&mut self, x: f64, y: f64) {
        self.path = [0.0; 16];
        self.i = 0;
        self.path[0] = x;
        self.path[1] = y;
    }

    fn push(&mut self, x: f64, y: f64) {
        self.i += 2;
        self.path[self.i] = x;
        self.path[self.i + 1] = y;
    }

    fn build_direct(&self) -> String {
        let p = &self.path;
        format!("M {} {} L {} {}", p[0], p[1], p[2], p[3])
    }

    fn build_1_turn(&self) -> String {
        let p = &self.path;
        format!(
            "M {} {} L {} {} Q {} {}, {} {} L {} {}",
            p[0], p[1], p[2], p[3], p[4], p[5], p[6], p[7], p[8], p[9]
        )
    }

    fn build_2_turns(&self) -> String {
        let p = &self.path;
        format!(
            "M {} {} L {} {} Q {} {}, {} {} L {} {} Q {} {}, {} {} L {} {}",
            p[0], p[1], p[2], p[3], p[4], p[5], p[6], p[7], p[8], p[9], p[10], p[11], p[12], p[13],
            p[14], p[15]
        )
    }
}

/// Build the drawable path for an edge of the given kind between two box
/// centers. Midpoints snap to the cell grid; corners are rounded by at most
/// `corner_radius`, clamped to half the center distance on each axis.
#[allow(clippy::too_many_arguments)]
pub fn build_edge_path(
    builder: &mut EdgePathBuilder,
    kind: EdgeKind,
    from_x: f64,
    from_y: f64,
    to_x: f64,
    to_y: f64,
    width: f64,
    height: f64,
    cell_width: f64,
    cell_height: f64,
    corner_radius: f64,
) -> String {
    if to_x - from_x == 0.0 && to_y - from_y == 0.0 {
        return String::new();
    }

    let r = corner_radius;
    let diff_x = (to_x - from_x).abs();
    let diff_y = (to_y - from_y).abs();
    let mid_x = ((from_x + (to_x - from_x) / 2.0) / cell_width).round() * cell_width;
    let mid_y = ((from_y + (to_y - from_y) / 2.0) / cell_height).round() * cell_height;

    let mid_x_minus_r = mid_x - (diff_x / 2.0).min(r);
    let mid_x_plus_r = mid_x + (diff_x / 2.0).min(r);
    let mid_y_minus_r = mid_y - (diff_y / 2.0).min(r);
    let mid_y_plus_r = mid_y + (diff_y / 2.0).min(r);
    let from_x_plus_r = from_x + (diff_x / 2.0).min(r);
    let from_x_minus_r = from_x - (diff_x / 2.0).min(r);
    let from_y_plus_r = from_y + (diff_y / 2.0).min(r);
    let from_y_minus_r = from_y - (diff_y / 2.0).min(r);
    let to_x_plus_r = to_x + (diff_x / 2.0).min(r);
    let to_x_minus_r = to_x - (diff_x / 2.0).min(r);
    let to_y_plus_r = to_y + (diff_y / 2.0).min(r);
    let to_y_minus_r = to_y - (diff_y / 2.0).min(r);

    match kind {
        // Direct
        EdgeKind::North => {
            builder.begin(from_x, from_y + height / 2.0);
            builder.push(to_x, to_y - height / 2.0);
            builder.build_direct()
        }
        EdgeKind::South => {
            builder.begin(from_x, from_y - height / 2.0);
            builder.push(to_x, to_y + height / 2.0);
            builder.build_direct()
        }
        EdgeKind::East => {
            builder.begin(from_x + width / 2.0, from_y);
            builder.push(to_x - width / 2.0, to_y);
            builder.build_direct()
        }
        EdgeKind::West => {
            builder.begin(from_x - width / 2.0, from_y);
            builder.push(to_x + width / 2.0, to_y);
            builder.build_direct()
        }

        // One turn
        EdgeKind::NorthEast => {
            builder.begin(from_x, from_y + height / 2.0);
            builder.push(from_x, to_y_minus_r);
            builder.push(from_x, to_y);
            builder.push(from_x_plus_r, to_y);
            builder.push(to_x - width / 2.0, to_y);
            builder.build_1_turn()
        }
        EdgeKind::NorthWest => {
            builder.begin(from_x, from_y + height / 2.0);
            builder.push(from_x, to_y_minus_r);
            builder.push(from_x, to_y);
            builder.push(from_x_minus_r, to_y);
            builder.push(to_x + width / 2.0, to_y);
            builder.build_1_turn()
        }
        EdgeKind::SouthEast => {
            builder.begin(from_x, from_y - height / 2.0);
            builder.push(from_x, to_y_plus_r);
            builder.push(from_x, to_y);
            builder.push(from_x_plus_r, to_y);
            builder.push(to_x - width / 2.0, to_y);
            builder.build_1_turn()
        }
        EdgeKind::SouthWest => {
            builder.begin(from_x, from_y - height / 2.0);
            builder.push(from_x, to_y_plus_r);
            builder.push(from_x, to_y);
            builder.push(from_x_minus_r, to_y);
            builder.push(to_x + width / 2.0, to_y);
            builder.build_1_turn()
        }
        EdgeKind::EastNorth => {
            builder.begin(from_x + width / 2.0, from_y);
            builder.push(to_x_minus_r, from_y);
            builder.push(to_x, from_y);
            builder.push(to_x, from_y_plus_r);
            builder.push(to_x, to_y - height / 2.0);
            builder.build_1_turn()
        }
        EdgeKind::EastSouth => {
            builder.begin(from_x + width / 2.0, from_y);
            builder.push(to_x_minus_r, from_y);
            builder.push(to_x, from_y);
            builder.push(to_x, from_y_minus_r);
            builder.push(to_x, to_y + height / 2.0);
            builder.build_1_turn()
        }
        EdgeKind::WestNorth => {
            builder.begin(from_x - width / 2.0, from_y);
            builder.push(to_x_plus_r, from_y);
            builder.push(to_x, from_y);
            builder.push(to_x, from_y_plus_r);
            builder.push(to_x, to_y - height / 2.0);
            builder.build_1_turn()
        }
        EdgeKind::WestSouth => {
            builder.begin(from_x - width / 2.0, from_y);
            builder.push(to_x_plus_r, from_y);
            builder.push(to_x, from_y);
            builder.push(to_x, from_y_minus_r);
            builder.push(to_x, to_y + height / 2.0);
            builder.build_1_turn()
        }

        // Two turns
        EdgeKind::EastNorthEast => {
            builder.begin(from_x + width / 2.0, from_y);
            builder.push(mid_x_minus_r, from_y);
            builder.push(mid_x, from_y);
            builder.push(mid_x, from_y_plus_r);
            builder.push(mid_x, to_y_minus_r);
            builder.push(mid_x, to_y);
            builder.push(mid_x_plus_r, to_y);
            builder.push(to_x - width / 2.0, to_y);
            builder.build_2_turns()
        }
        EdgeKind::EastSouthEast => {
            builder.begin(from_x + width / 2.0, from_y);
            builder.push(mid_x_minus_r, from_y);
            builder.push(mid_x, from_y);
            builder.push(mid_x, from_y_minus_r);
            builder.push(mid_x, to_y_plus_r);
            builder.push(mid_x, to_y);
            builder.push(mid_x_plus_r, to_y);
            builder.push(to_x - width / 2.0, to_y);
            builder.build_2_turns()
        }
        EdgeKind::SouthEastSouth => {
            builder.begin(from_x, from_y - height / 2.0);
            builder.push(from_x, mid_y_plus_r);
            builder.push(from_x, mid_y);
            builder.push(from_x_plus_r, mid_y);
            builder.push(to_x_minus_r, mid_y);
            builder.push(to_x, mid_y);
            builder.push(to_x, mid_y_minus_r);
            builder.push(to_x, to_y + height / 2.0);
            builder.build_2_turns()
        }
        EdgeKind::SouthWestSouth => {
            builder.begin(from_x, from_y - height / 2.0);
            builder.push(from_x, mid_y_plus_r);
            builder.push(from_x, mid_y);
            builder.push(from_x_minus_r, mid_y);
            builder.push(to_x_plus_r, mid_y);
            builder.push(to_x, mid_y);
            builder.push(to_x, mid_y_minus_r);
            builder.push(to_x, to_y + height / 2.0);
            builder.build_2_turns()
        }
        EdgeKind::WestNorthWest => {
            builder.begin(from_x - width / 2.0, from_y);
            builder.push(mid_x_plus_r, from_y);
            builder.push(mid_x, from_y);
            builder.push(mid_x, from_y_plus_r);
            builder.push(mid_x, to_y_minus_r);
            builder.push(mid_x, to_y);
            builder.push(mid_x_minus_r, to_y);
            builder.push(to_x + width / 2.0, to_y);
            builder.build_2_turns()
        }
        EdgeKind::WestSouthWest => {
            builder.begin(from_x - width / 2.0, from_y);
            builder.push(mid_x_plus_r, from_y);
            builder.push(mid_x, from_y);
            builder.push(mid_x, from_y_minus_r);
            builder.push(mid_x, to_y_plus_r);
            builder.push(mid_x, to_y);
            builder.push(mid_x_minus_r, to_y);
            builder.push(to_x + width / 2.0, to_y);
            builder.build_2_turns()
        }
        EdgeKind::NorthEastNorth => {
            builder.begin(from_x, from_y + height / 2.0);
            builder.push(from_x, mid_y_minus_r);
            builder.push(from_x, mid_y);
            builder.push(from_x_plus_r, mid_y);
            builder.push(to_x_minus_r, mid_y);
            builder.push(to_x, mid_y);
            builder.push(to_x, mid_y_plus_r);
            builder.push(to_x, to_y - height / 2.0);
            builder.build_2_turns()
        }
        EdgeKind::NorthWestNorth => {
            builder.begin(from_x, from_y + height / 2.0);
            builder.push(from_x, mid_y_minus_r);
            builder.push(from_x, mid_y);
            builder.push(from_x_minus_r, mid_y);
            builder.push(to_x_plus_r, mid_y);
            builder.push(to_x, mid_y);
            builder.push(to_x, mid_y_plus_r);
            builder.push(to_x, to_y - height / 2.0);
            builder.build_2_turns()
        }
    }
}
