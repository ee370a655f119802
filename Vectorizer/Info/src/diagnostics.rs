/// Progress of a divergent loop through its transformation.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum LoopState {
	Scalar,
	FlaggedDivergent,
	LatchPurified,
	ExitsLinearized,
	LiveOutsFinalized,
}

/// Something the divergence passes found or did.
#[derive(PartialEq, Eq, Clone, Debug)]
pub enum Event {
	DominanceClosure { block: u16, closure: Vec<u16> },
	PostDominanceClosure { block: u16, closure: Vec<u16> },
	BranchDependence { join: u16, branch: u16 },
	EffectedBlocks { branch: u16, joins: Vec<u16> },
	VaryingBranch { block: u16 },
	Mandatory { block: u16 },
	DivergentLoop { header: u16 },
	Transition { header: u16, state: LoopState },
	KillExit { header: u16, exiting: u16, exit: u16 },
	Tracker { header: u16, value: u32, exit: u16 },
}

/// A sink for [`Event`]s.
pub trait Diagnostics {
	fn record(&mut self, event: Event);
}

/// Drops every event.
pub struct Silent;

impl Diagnostics for Silent {
	fn record(&mut self, _event: Event) {}
}

/// Keeps every event in order.
#[derive(Default)]
pub struct Buffer {
	pub events: Vec<Event>,
}

impl Buffer {
	#[must_use]
	pub const fn new() -> Self {
		Self { events: Vec::new() }
	}
}

impl Diagnostics for Buffer {
	fn record(&mut self, event: Event) {
		self.events.push(event);
	}
}

/// Forwards every event to `tracing`.
pub struct Trace;

impl Diagnostics for Trace {
	fn record(&mut self, event: Event) {
		tracing::debug!(?event, "divergence event");
	}
}
