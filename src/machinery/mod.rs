//! Internal machinery that wires the probe, planner, sink and pool into a single download.
pub(crate) mod orchestrator;
pub(crate) mod pool;
