//! Progress reporting for tile fetching.

/// Observer of a mosaic's tile fetches.
///
/// Callbacks are purely observational and may be invoked from any task.
/// All methods default to no-ops.
pub trait FetchProgress: Send + Sync {
    /// Called once before fetching with the number of tiles in the grid.
    fn on_start(&self, _total: usize) {}

    /// Called after each tile completes.
    fn on_tile(&self, _done: usize, _total: usize) {}

    /// Called once after the last tile, also when fetching failed.
    fn on_finish(&self) {}
}

/// Progress observer that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl FetchProgress for NoProgress {}
