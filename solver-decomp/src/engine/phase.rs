//! Column-generation phases.

use std::fmt;

/// Phase of the node loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Collecting starting columns.
    Init,

    /// Driving artificial columns out of the master.
    Feasibility,

    /// Pricing against the master duals.
    Pricing,

    /// Separating cuts from the fractional point.
    Cutting,

    /// Node finished.
    Done,
}

impl Phase {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Phase::Init => "init",
            Phase::Feasibility => "phase-1",
            Phase::Pricing => "pricing",
            Phase::Cutting => "cutting",
            Phase::Done => "done",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
