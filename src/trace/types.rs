//! Per-trajectory trace records.
//!
//! A [`Tracer`] is handed to a trajectory before it runs; the trajectory
//! records [`TraceFrame`]s (and hop events) into it as it propagates and
//! finally turns it into an owned [`Trace`] with [`Tracer::finish`].

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Frames and events
// ---------------------------------------------------------------------------

/// A snapshot of one trajectory at one time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceFrame {
    pub time: f64,
    pub position: Vec<f64>,
    pub momentum: Vec<f64>,
    /// Index of the electronic state driving the nuclear motion.
    pub active: usize,
    /// Electronic state populations (diagonal of the density matrix).
    pub populations: Vec<f64>,
    pub potential_energy: f64,
    pub kinetic_energy: f64,
}

/// A surface hop between electronic states.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HopEvent {
    pub time: f64,
    pub from: usize,
    pub to: usize,
}

// ---------------------------------------------------------------------------
// Trace
// ---------------------------------------------------------------------------

/// The recorded history of one completed trajectory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    /// Tracer id, assigned in spawn order by the trace manager.
    pub id: u64,
    /// Frames in recording order.
    pub frames: Vec<TraceFrame>,
    pub hops: Vec<HopEvent>,
}

impl Trace {
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// The last recorded frame, which determines the trajectory's outcome.
    pub fn last_frame(&self) -> Option<&TraceFrame> {
        self.frames.last()
    }
}

// ---------------------------------------------------------------------------
// Tracer
// ---------------------------------------------------------------------------

/// Recording handle for one trajectory.
#[derive(Debug)]
pub struct Tracer {
    id: u64,
    frames: Vec<TraceFrame>,
    hops: Vec<HopEvent>,
}

impl Tracer {
    /// Empty tracer with the given id.
    pub fn new(id: u64) -> Self {
        Self {
            id,
            frames: Vec::new(),
            hops: Vec::new(),
        }
    }

    /// Id handed out by the trace manager.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Append one frame.
    pub fn record(&mut self, frame: TraceFrame) {
        self.frames.push(frame);
    }

    /// Note a surface hop at `time`.
    pub fn record_hop(&mut self, time: f64, from: usize, to: usize) {
        self.hops.push(HopEvent { time, from, to });
    }

    /// Number of frames recorded so far.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Seal the recording into a [`Trace`].
    pub fn finish(self) -> Trace {
        Trace {
            id: self.id,
            frames: self.frames,
            hops: self.hops,
        }
    }
}
