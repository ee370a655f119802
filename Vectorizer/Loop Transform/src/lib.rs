mod latch;
mod linearizer;
mod mask_expander;
mod session;

use control_flow_analysis::{DominatorTree, LoopInfo};
use control_flow_graph::ControlFlowGraph;
use vectorizer_info::{Diagnostics, Error, Result, ShapeStore};

pub use self::{
	mask_expander::{MaskExpander, PredicateMaskExpander},
	session::{LiveMask, TrackerDesc, TransformSession},
};

/// Counts of what a [`DivergentLoopTransform`] run changed.
#[derive(PartialEq, Eq, Clone, Copy, Debug, Default)]
pub struct Statistics {
	pub divergent_loops: usize,
	pub kill_exits: usize,
}

/// Turns every divergent loop of a function into a loop that all lanes
/// leave together, tracking per lane which exit was taken and with which
/// values.
pub struct DivergentLoopTransform {
	headers: Vec<u16>,
}

impl DivergentLoopTransform {
	#[must_use]
	pub const fn new() -> Self {
		Self {
			headers: Vec::new(),
		}
	}

	fn find_divergent_headers(&mut self, graph: &ControlFlowGraph, store: &ShapeStore) {
		let dominators = DominatorTree::dominators(graph, store.entry());
		let loops = LoopInfo::compute(graph, &dominators);

		// Inner loops come first, and headers survive the edits other loops go through.
		self.headers.clear();
		self.headers.extend(
			loops
				.post_order()
				.into_iter()
				.map(|index| loops.get(index).header)
				.filter(|&header| store.is_divergent_loop(header)),
		);
	}

	/// Transforms every loop flagged divergent in `store`.
	///
	/// # Errors
	///
	/// Returns the first error of a loop, which leaves the graph partially
	/// transformed.
	pub fn run(
		&mut self,
		graph: &mut ControlFlowGraph,
		store: &mut ShapeStore,
		mask_expander: &mut dyn MaskExpander,
		diagnostics: &mut dyn Diagnostics,
	) -> Result<Statistics> {
		let mut statistics = Statistics::default();

		self.find_divergent_headers(graph, store);

		for &header in &self.headers {
			let dominators = DominatorTree::dominators(graph, store.entry());
			let loops = LoopInfo::compute(graph, &dominators);
			let index = loops.find(header).ok_or(Error::Precondition {
				block: header,
				reason: "divergent loop is no longer a loop",
			})?;

			let session = TransformSession::new(
				graph,
				store,
				mask_expander,
				diagnostics,
				&loops,
				&dominators,
				index,
			)?;

			statistics.kill_exits += session.run()?;
			statistics.divergent_loops += 1;
		}

		tracing::debug!(
			divergent_loops = statistics.divergent_loops,
			kill_exits = statistics.kill_exits,
			"transformed divergent loops"
		);

		Ok(statistics)
	}
}

impl Default for DivergentLoopTransform {
	fn default() -> Self {
		Self::new()
	}
}
