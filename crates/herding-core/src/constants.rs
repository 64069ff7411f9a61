/// Largest valid world dimension (meters). Bounds grid allocation in the spatial index.
pub const MAX_WORLD_SIZE: f64 = 4096.0;

/// Upper bound on herd + shepherd population.
pub const MAX_TOTAL_AGENTS: usize = 100_000;

/// Offset added to the base seed for the shepherd spawn stream.
/// Keeps herd and shepherd placement independent of each other's counts.
pub const RNG_ROLE_STREAM_OFFSET: u64 = 7919;

/// Lengths and force magnitudes below this are treated as zero.
pub const EPSILON: f64 = 1e-9;

/// Smallest grid cell edge; stops degenerate radii from exploding the cell count.
pub const MIN_GRID_CELL: f64 = 0.5;

/// Upper bound on uniform grid cells. Large worlds get coarser cells instead
/// of more of them, so rebuild cost stays bounded.
pub const MAX_GRID_CELLS: usize = 1 << 18;

/// Distance at which a waypoint-driven shepherd considers itself arrived.
pub const ARRIVE_DISTANCE: f64 = 0.5;
