//! Geometry, limits and search schedules shared across the codec.

/// Edge of one transform block in pixels.
pub const BLOCK_EDGE: usize = 8;
/// Coefficients per transform block.
pub const BLOCK_SIZE: usize = BLOCK_EDGE * BLOCK_EDGE;
/// Edge of one correlation tile, measured in blocks.
pub const TILE_TO_BLOCK_RATIO: usize = 8;
/// Edge of one correlation tile in pixels.
pub const TILE_EDGE: usize = BLOCK_EDGE * TILE_TO_BLOCK_RATIO;

/// Widest image the bitstream can describe.
pub const MAX_IMAGE_WIDTH: u32 = (1 << 25) - 1;

/// Default cap on decoded pixel count.
pub const DEFAULT_MAX_NUM_PIXELS: u64 = 1 << 32;

/// Hard upper bound for any quantization strength value.
pub const MAX_QUANT: f32 = 16.0;

// Starting quantization strengths for the quality search; both are divided
// by the target distance before use.
pub const INITIAL_QUANT_DC: f32 = 1.0625;
pub const INITIAL_QUANT_AC: f32 = 0.5625;

// Fixed strengths used by the fast (no search) mode.
pub const FAST_QUANT_DC: f32 = 0.769_531_64;
pub const FAST_QUANT_AC: f32 = 1.520_056_8;

/// Outer iteration budget of the quality search.
pub const MAX_OUTER_ITERS: usize = 3;
/// Per-outer-iteration damping of the inverse-step update.
pub const QUANT_ADJUST_SPEED: [f32; MAX_OUTER_ITERS] = [0.1, 0.05, 0.025];
/// Whole-field rescale applied when an outer iteration makes no progress.
/// Indexed by the already-incremented iteration count, so slot 0 is never
/// used.
pub const QUANT_RESCALE: [f32; MAX_OUTER_ITERS] = [0.0, 0.8, 0.9];
/// Running cap on quantization strength; starts here and relaxes.
pub const QUANT_MAX_START: f32 = 4.0;
/// Relaxation applied to the running cap when a pass changes nothing.
pub const QUANT_MAX_RELAX: f32 = 0.5;
/// The running cap never exceeds this.
pub const QUANT_MAX_LIMIT: f32 = 8.0;
/// Weight toward the local worst tile when locating peaks.
pub const PEAK_WEIGHT: f32 = 0.65;

/// Halving attempts of the coarse size-search phase.
pub const SIZE_SEARCH_COARSE_STEPS: usize = 10;
/// Bisection attempts of the fine size-search phase.
pub const SIZE_SEARCH_FINE_STEPS: usize = 16;

/// Seed for the Y-to-B correlation search, fixed point /128.
pub const YTOB_SEED: i32 = 120;

/// Fixed-point denominator for quantization strengths in the bitstream.
pub const QUANT_FIXED_POINT: f32 = 64.0;

/// Per-channel coefficient scaling applied on top of the quantization
/// strength. Opsin X needs the finest steps, B tolerates the coarsest.
pub const QUANT_WEIGHTS: [f32; 3] = [128.0, 64.0, 32.0];

/// Zigzag scan order for 8x8 blocks.
pub const ZIGZAG_ORDER: [usize; BLOCK_SIZE] = [
    0, 1, 8, 16, 9, 2, 3, 10,
    17, 24, 32, 25, 18, 11, 4, 5,
    12, 19, 26, 33, 40, 48, 41, 34,
    27, 20, 13, 6, 7, 14, 21, 28,
    35, 42, 49, 56, 57, 50, 43, 36,
    29, 22, 15, 23, 30, 37, 44, 51,
    58, 59, 52, 45, 38, 31, 39, 46,
    53, 60, 61, 54, 47, 55, 62, 63,
];
