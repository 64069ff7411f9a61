//! Neighbor queries over one tick's frozen agent positions.
//!
//! Every index answers the same question: which agents lie within `radius` of
//! a point, optionally restricted to one role. The world rebuilds its index
//! exactly once per tick, before any agent moves, so all agents in a tick see
//! the same neighborhood. Implementations are interchangeable behind
//! [`NeighborIndex`]; callers must not rely on visit order.

use crate::agent::{Agent, Role};
use crate::config::{IndexKind, SimConfig};
use crate::constants::{MAX_GRID_CELLS, MIN_GRID_CELL};
use glam::DVec2;
use rstar::{RTree, RTreeObject, AABB};

/// Role restriction applied to a neighbor query.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoleFilter {
    Any,
    Only(Role),
}

impl RoleFilter {
    #[inline]
    pub fn accepts(self, role: Role) -> bool {
        match self {
            RoleFilter::Any => true,
            RoleFilter::Only(wanted) => wanted == role,
        }
    }
}

/// Common behaviour exposed by neighborhood indices.
pub trait NeighborIndex: Send + Sync {
    /// Replace the indexed snapshot with the current agent positions.
    fn rebuild(&mut self, agents: &[Agent]);

    /// Visit the slice index of every agent within `radius` of `center`
    /// (inclusive) whose role passes `filter`.
    fn for_each_within(
        &self,
        center: DVec2,
        radius: f64,
        filter: RoleFilter,
        visitor: &mut dyn FnMut(usize),
    );

    /// Number of agents in the current snapshot.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Collect matching indices in ascending order.
    fn query(&self, center: DVec2, radius: f64, filter: RoleFilter) -> Vec<usize> {
        let mut result = Vec::new();
        self.for_each_within(center, radius, filter, &mut |idx| result.push(idx));
        result.sort_unstable();
        result
    }
}

/// Build the index selected by `config.index`.
pub fn build(config: &SimConfig) -> Box<dyn NeighborIndex> {
    match config.index {
        IndexKind::Grid => Box::new(UniformGrid::new(
            config.world_width,
            config.world_height,
            config.max_interaction_radius(),
        )),
        IndexKind::RTree => Box::new(RTreeIndex::default()),
        IndexKind::BruteForce => Box::new(BruteForce::default()),
    }
}

/// Position + role captured at rebuild time.
#[derive(Clone, Copy, Debug)]
struct Entry {
    index: usize,
    role: Role,
    position: DVec2,
}

impl Entry {
    fn from_agent(index: usize, agent: &Agent) -> Self {
        Self {
            index,
            role: agent.role,
            position: agent.position,
        }
    }
}

#[inline]
fn within(position: DVec2, center: DVec2, r_sq: f64) -> bool {
    position.distance_squared(center) <= r_sq
}

#[inline]
fn valid_radius(radius: f64) -> bool {
    radius.is_finite() && radius >= 0.0
}

/// Linear scan; the reference the other indices are checked against.
#[derive(Debug, Default)]
pub struct BruteForce {
    entries: Vec<Entry>,
}

impl NeighborIndex for BruteForce {
    fn rebuild(&mut self, agents: &[Agent]) {
        self.entries.clear();
        self.entries.extend(
            agents
                .iter()
                .enumerate()
                .map(|(idx, agent)| Entry::from_agent(idx, agent)),
        );
    }

    fn for_each_within(
        &self,
        center: DVec2,
        radius: f64,
        filter: RoleFilter,
        visitor: &mut dyn FnMut(usize),
    ) {
        if !valid_radius(radius) {
            return;
        }
        let r_sq = radius * radius;
        for entry in &self.entries {
            if filter.accepts(entry.role) && within(entry.position, center, r_sq) {
                visitor(entry.index);
            }
        }
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Uniform bucket grid over the bounded world.
///
/// Cells are stored CSR-style: `cell_start[c]..cell_start[c + 1]` slices
/// `entries`, filled by a counting sort on rebuild.
#[derive(Debug)]
pub struct UniformGrid {
    cell_size: f64,
    cols: usize,
    rows: usize,
    cell_start: Vec<usize>,
    /// Fill positions reused across rebuilds.
    cursor: Vec<usize>,
    entries: Vec<Entry>,
}

impl UniformGrid {
    /// `cell_size` is usually the largest interaction radius. It is raised to
    /// [`MIN_GRID_CELL`], and further until the grid fits in
    /// [`MAX_GRID_CELLS`], so tiny radii over a large world stay cheap.
    pub fn new(width: f64, height: f64, cell_size: f64) -> Self {
        let width = if width.is_finite() { width.max(0.0) } else { 0.0 };
        let height = if height.is_finite() { height.max(0.0) } else { 0.0 };
        let area_floor = (width * height / MAX_GRID_CELLS as f64).sqrt();
        let mut cell_size = if cell_size.is_finite() {
            cell_size.max(MIN_GRID_CELL).max(area_floor)
        } else {
            MIN_GRID_CELL.max(area_floor)
        };
        let (mut cols, mut rows) = grid_dimensions(width, height, cell_size);
        // Rounding up per axis can overshoot the cap by a row or column.
        while cols * rows > MAX_GRID_CELLS {
            cell_size *= 1.05;
            (cols, rows) = grid_dimensions(width, height, cell_size);
        }
        Self {
            cell_size,
            cols,
            rows,
            cell_start: vec![0; cols * rows + 1],
            cursor: Vec::with_capacity(cols * rows),
            entries: Vec::new(),
        }
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    pub fn dimensions(&self) -> (usize, usize) {
        (self.cols, self.rows)
    }

    #[inline]
    fn col_of(&self, x: f64) -> usize {
        axis_cell(x, self.cell_size, self.cols)
    }

    #[inline]
    fn row_of(&self, y: f64) -> usize {
        axis_cell(y, self.cell_size, self.rows)
    }

    #[inline]
    fn cell_of(&self, position: DVec2) -> usize {
        self.row_of(position.y) * self.cols + self.col_of(position.x)
    }
}

fn grid_dimensions(width: f64, height: f64, cell_size: f64) -> (usize, usize) {
    let cols = ((width / cell_size).ceil() as usize).max(1);
    let rows = ((height / cell_size).ceil() as usize).max(1);
    (cols, rows)
}

/// Cell coordinate along one axis, clamped into the grid. Positions outside
/// the world land in the edge cells so no agent is ever dropped.
#[inline]
fn axis_cell(coord: f64, cell_size: f64, count: usize) -> usize {
    if coord.is_nan() || coord <= 0.0 {
        return 0;
    }
    ((coord / cell_size) as usize).min(count - 1)
}

impl NeighborIndex for UniformGrid {
    fn rebuild(&mut self, agents: &[Agent]) {
        let cell_count = self.cols * self.rows;
        self.cell_start.clear();
        self.cell_start.resize(cell_count + 1, 0);

        for agent in agents {
            let cell = self.cell_of(agent.position);
            self.cell_start[cell + 1] += 1;
        }
        for c in 0..cell_count {
            self.cell_start[c + 1] += self.cell_start[c];
        }

        self.cursor.clear();
        self.cursor.extend_from_slice(&self.cell_start[..cell_count]);
        let placeholder = Entry {
            index: usize::MAX,
            role: Role::Herd,
            position: DVec2::ZERO,
        };
        self.entries.clear();
        self.entries.resize(agents.len(), placeholder);
        for (idx, agent) in agents.iter().enumerate() {
            let cell = self.cell_of(agent.position);
            self.entries[self.cursor[cell]] = Entry::from_agent(idx, agent);
            self.cursor[cell] += 1;
        }
    }

    fn for_each_within(
        &self,
        center: DVec2,
        radius: f64,
        filter: RoleFilter,
        visitor: &mut dyn FnMut(usize),
    ) {
        if !valid_radius(radius) || !center.is_finite() || self.entries.is_empty() {
            return;
        }
        let r_sq = radius * radius;
        let col_lo = self.col_of(center.x - radius);
        let col_hi = self.col_of(center.x + radius);
        let row_lo = self.row_of(center.y - radius);
        let row_hi = self.row_of(center.y + radius);

        for row in row_lo..=row_hi {
            for col in col_lo..=col_hi {
                let cell = row * self.cols + col;
                let bucket = &self.entries[self.cell_start[cell]..self.cell_start[cell + 1]];
                for entry in bucket {
                    if filter.accepts(entry.role) && within(entry.position, center, r_sq) {
                        visitor(entry.index);
                    }
                }
            }
        }
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Lightweight position-only record so the tree never clones whole agents.
#[derive(Clone, Debug)]
pub struct AgentLocation {
    pub index: usize,
    pub role: Role,
    pub position: [f64; 2],
}

impl RTreeObject for AgentLocation {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.position)
    }
}

/// R*-tree bulk-loaded from agent positions each tick (O(n log n)).
#[derive(Default)]
pub struct RTreeIndex {
    tree: RTree<AgentLocation>,
}

impl NeighborIndex for RTreeIndex {
    fn rebuild(&mut self, agents: &[Agent]) {
        let locations: Vec<AgentLocation> = agents
            .iter()
            .enumerate()
            .map(|(index, a)| AgentLocation {
                index,
                role: a.role,
                position: a.position.to_array(),
            })
            .collect();
        self.tree = RTree::bulk_load(locations);
    }

    /// AABB envelope query, then an exact Euclidean filter.
    fn for_each_within(
        &self,
        center: DVec2,
        radius: f64,
        filter: RoleFilter,
        visitor: &mut dyn FnMut(usize),
    ) {
        if !valid_radius(radius) || !center.is_finite() {
            return;
        }
        let r_sq = radius * radius;
        let envelope = AABB::from_corners(
            [center.x - radius, center.y - radius],
            [center.x + radius, center.y + radius],
        );
        for loc in self.tree.locate_in_envelope(&envelope) {
            if filter.accepts(loc.role) && within(DVec2::from_array(loc.position), center, r_sq) {
                visitor(loc.index);
            }
        }
    }

    fn len(&self) -> usize {
        self.tree.size()
    }
}
