use control_flow_analysis::LoopInfo;
use control_flow_graph::ControlFlowGraph;
use set::Set;
use vectorizer_info::{Diagnostics, Event, Result, ShapeStore, VectorShape};

use crate::BranchDependenceAnalysis;

/// Marks blocks, phis and loops that lanes may disagree on, given the branch
/// dependences and the shapes of the branch conditions.
pub struct DivergenceMarker {
	varying: Set,
}

impl DivergenceMarker {
	#[must_use]
	pub const fn new() -> Self {
		Self { varying: Set::new() }
	}

	fn find_varying_branches(
		&mut self,
		graph: &ControlFlowGraph,
		store: &ShapeStore,
		diagnostics: &mut dyn Diagnostics,
	) -> Result<()> {
		self.varying.clear();

		for block in graph.block_ids() {
			if !store.in_region(block) || !graph.has_multiple_successors(block) {
				continue;
			}

			let Some(condition) = graph.terminator(block).condition() else {
				continue;
			};

			if !store.query_shape(graph, condition)?.is_uniform() {
				self.varying.grow_insert(block.into());

				diagnostics.record(Event::VaryingBranch { block });
			}
		}

		Ok(())
	}

	fn mark_mandatory_blocks(
		&self,
		graph: &ControlFlowGraph,
		analysis: &BranchDependenceAnalysis,
		store: &mut ShapeStore,
		diagnostics: &mut dyn Diagnostics,
	) {
		for block in graph.block_ids() {
			let mut control_dependences = analysis.control_dependences(block).iter();

			if !store.in_region(block)
				|| control_dependences.any(|&id| self.varying.contains(id.into()))
			{
				continue;
			}

			store.mark_mandatory(block);

			diagnostics.record(Event::Mandatory { block });
		}
	}

	fn mark_varying_phis(
		&self,
		graph: &ControlFlowGraph,
		analysis: &BranchDependenceAnalysis,
		store: &mut ShapeStore,
	) {
		for branch in self.varying.ascending() {
			let branch = branch.try_into().unwrap();

			for &join in analysis.effected_blocks(branch) {
				for &phi in graph.phis(join) {
					store.set_shape(phi, VectorShape::Varying);
				}
			}
		}
	}

	fn is_divergent_loop(
		&self,
		graph: &ControlFlowGraph,
		analysis: &BranchDependenceAnalysis,
		loops: &LoopInfo,
		index: usize,
	) -> bool {
		let lp = loops.get(index);
		let exits = lp.exit_blocks(graph);

		let is_varying = |id: u16| self.varying.contains(id.into());

		lp.exiting_blocks(graph).into_iter().any(is_varying)
			|| lp.blocks().iter().copied().filter(|&id| is_varying(id)).any(|id| {
				analysis
					.effected_blocks(id)
					.iter()
					.any(|join| exits.binary_search(join).is_ok())
			})
	}

	fn mark_divergent_loops(
		&self,
		graph: &ControlFlowGraph,
		analysis: &BranchDependenceAnalysis,
		loops: &LoopInfo,
		store: &mut ShapeStore,
		diagnostics: &mut dyn Diagnostics,
	) {
		for index in 0..loops.loops().len() {
			let header = loops.get(index).header;

			if store.is_divergent_loop(header)
				|| !store.in_region(header)
				|| !self.is_divergent_loop(graph, analysis, loops, index)
			{
				continue;
			}

			store.set_divergent_loop(header);

			tracing::debug!(header, "loop is divergent");

			diagnostics.record(Event::DivergentLoop { header });
		}
	}

	/// Records mandatory blocks, varying join phis and divergent loops in
	/// `store`.
	///
	/// # Errors
	///
	/// Returns [`vectorizer_info::Error::MissingShape`] if a branch condition
	/// in the region has no shape.
	pub fn run(
		&mut self,
		graph: &ControlFlowGraph,
		analysis: &BranchDependenceAnalysis,
		loops: &LoopInfo,
		store: &mut ShapeStore,
		diagnostics: &mut dyn Diagnostics,
	) -> Result<()> {
		self.find_varying_branches(graph, store, diagnostics)?;
		self.mark_mandatory_blocks(graph, analysis, store, diagnostics);
		self.mark_varying_phis(graph, analysis, store);
		self.mark_divergent_loops(graph, analysis, loops, store, diagnostics);

		Ok(())
	}
}

impl Default for DivergenceMarker {
	fn default() -> Self {
		Self::new()
	}
}
