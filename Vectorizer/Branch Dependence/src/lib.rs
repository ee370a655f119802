mod closure_finder;
mod divergence;

use control_flow_analysis::{Frontiers, LoopInfo};
use control_flow_graph::ControlFlowGraph;
use vectorizer_info::{Diagnostics, Event};

use self::closure_finder::ClosureFinder;

pub use self::divergence::DivergenceMarker;

fn insert_sorted(list: &mut Vec<u16>, id: u16) -> bool {
	match list.binary_search(&id) {
		Ok(_) => false,
		Err(position) => {
			list.insert(position, id);

			true
		}
	}
}

fn contains_sorted(list: &[u16], id: u16) -> bool {
	list.binary_search(&id).is_ok()
}

fn intersect_sorted(lhs: &[u16], rhs: &[u16]) -> Vec<u16> {
	let mut result = Vec::new();
	let mut lhs = lhs.iter().peekable();
	let mut rhs = rhs.iter().peekable();

	while let (Some(&&left), Some(&&right)) = (lhs.peek(), rhs.peek()) {
		match left.cmp(&right) {
			core::cmp::Ordering::Less => {
				lhs.next();
			}
			core::cmp::Ordering::Greater => {
				rhs.next();
			}
			core::cmp::Ordering::Equal => {
				result.push(left);

				lhs.next();
				rhs.next();
			}
		}
	}

	result
}

/// For every branch, the joins whose incoming value may differ between
/// lanes when that branch diverges.
///
/// The graph must be reducible, have no critical edges and have single
/// predecessor loop exits. None of this is checked.
pub struct BranchDependenceAnalysis {
	dominance_closures: Vec<Vec<u16>>,
	post_dominance_closures: Vec<Vec<u16>>,
	control_dependences: Vec<Vec<u16>>,

	join_dependences: Vec<Vec<u16>>,
	effected_blocks: Vec<Vec<u16>>,
}

impl BranchDependenceAnalysis {
	fn find_closures(
		&mut self,
		graph: &ControlFlowGraph,
		dominance: &Frontiers,
		post_dominance: &Frontiers,
		diagnostics: &mut dyn Diagnostics,
	) {
		let mut finder = ClosureFinder::new();

		for block in graph.block_ids() {
			let mut dominance_closure = finder.run(dominance, block);
			let control_dependences = finder.run(post_dominance, block);
			let mut post_dominance_closure = control_dependences.clone();

			insert_sorted(&mut dominance_closure, block);
			insert_sorted(&mut post_dominance_closure, block);

			diagnostics.record(Event::DominanceClosure {
				block,
				closure: dominance_closure.clone(),
			});

			diagnostics.record(Event::PostDominanceClosure {
				block,
				closure: post_dominance_closure.clone(),
			});

			self.dominance_closures.push(dominance_closure);
			self.post_dominance_closures.push(post_dominance_closure);
			self.control_dependences.push(control_dependences);
		}
	}

	// Whether two distinct successors of `branch` both reach `join` through dominance frontiers.
	fn has_disjoint_paths(&self, graph: &ControlFlowGraph, branch: u16, join: u16) -> bool {
		let successors: Vec<_> = graph.successors(branch).collect();

		successors.iter().enumerate().any(|(index, &first)| {
			successors[..index].iter().any(|&second| {
				first != second
					&& contains_sorted(self.dominance_closure(first), join)
					&& contains_sorted(self.dominance_closure(second), join)
			})
		})
	}

	fn find_dependences_of(&self, graph: &ControlFlowGraph, join: u16) -> Vec<u16> {
		let predecessors: Vec<_> = graph.predecessors(join).collect();
		let mut dependences = Vec::new();

		for (index, &x) in predecessors.iter().enumerate() {
			let x_closure = self.post_dominance_closure(x);

			for &y in &predecessors[..index] {
				let y_closure = self.post_dominance_closure(y);

				if x == y {
					continue;
				} else if contains_sorted(y_closure, x) {
					insert_sorted(&mut dependences, x);
				} else if contains_sorted(x_closure, y) {
					insert_sorted(&mut dependences, y);
				} else {
					for branch in intersect_sorted(x_closure, y_closure) {
						if !contains_sorted(&dependences, branch)
							&& self.has_disjoint_paths(graph, branch, join)
						{
							insert_sorted(&mut dependences, branch);
						}
					}
				}
			}
		}

		dependences
	}

	fn find_join_dependences(&mut self, graph: &ControlFlowGraph, diagnostics: &mut dyn Diagnostics) {
		for join in graph.block_ids() {
			let dependences = if graph.has_multiple_predecessors(join) {
				self.find_dependences_of(graph, join)
			} else {
				Vec::new()
			};

			for &branch in &dependences {
				tracing::trace!(join, branch, "branch dependence");

				diagnostics.record(Event::BranchDependence { join, branch });
			}

			self.join_dependences.push(dependences);
		}
	}

	// Lanes leaving a loop at different exits or iterations meet again at the exit blocks.
	fn taint_loop_exits(&mut self, graph: &ControlFlowGraph, loops: &LoopInfo) {
		for lp in loops.loops() {
			let exiting = lp.exiting_blocks(graph);

			for (_, exit) in lp.exit_edges(graph) {
				let dependences = &mut self.join_dependences[usize::from(exit)];

				for &branch in &exiting {
					insert_sorted(dependences, branch);
				}
			}
		}
	}

	fn find_effected_blocks(&mut self, graph: &ControlFlowGraph, diagnostics: &mut dyn Diagnostics) {
		self.effected_blocks = graph.block_ids().map(|_| Vec::new()).collect();

		for (dependences, join) in self.join_dependences.iter().zip(0..) {
			for &branch in dependences {
				if graph.terminator(branch).is_conditional() {
					insert_sorted(&mut self.effected_blocks[usize::from(branch)], join);
				}
			}
		}

		for (joins, branch) in self.effected_blocks.iter().zip(0..) {
			if !joins.is_empty() {
				diagnostics.record(Event::EffectedBlocks {
					branch,
					joins: joins.clone(),
				});
			}
		}
	}

	/// Runs the analysis over `graph` using its dominance and post-dominance
	/// frontiers and its loop nest.
	#[must_use]
	pub fn compute(
		graph: &ControlFlowGraph,
		dominance: &Frontiers,
		post_dominance: &Frontiers,
		loops: &LoopInfo,
		diagnostics: &mut dyn Diagnostics,
	) -> Self {
		let mut analysis = Self {
			dominance_closures: Vec::new(),
			post_dominance_closures: Vec::new(),
			control_dependences: Vec::new(),

			join_dependences: Vec::new(),
			effected_blocks: Vec::new(),
		};

		analysis.find_closures(graph, dominance, post_dominance, diagnostics);
		analysis.find_join_dependences(graph, diagnostics);
		analysis.taint_loop_exits(graph, loops);
		analysis.find_effected_blocks(graph, diagnostics);

		tracing::debug!(
			blocks = graph.basic_blocks.len(),
			branches = analysis.effected_blocks.iter().filter(|joins| !joins.is_empty()).count(),
			"computed branch dependence"
		);

		analysis
	}

	/// The joins whose phis depend on the terminator of `branch`.
	#[must_use]
	pub fn effected_blocks(&self, branch: u16) -> &[u16] {
		&self.effected_blocks[usize::from(branch)]
	}

	/// The blocks whose terminators decide the incoming value of `join`,
	/// including unconditional ones.
	#[must_use]
	pub fn join_dependences(&self, join: u16) -> &[u16] {
		&self.join_dependences[usize::from(join)]
	}

	/// `block` and its iterated dominance frontier.
	#[must_use]
	pub fn dominance_closure(&self, block: u16) -> &[u16] {
		&self.dominance_closures[usize::from(block)]
	}

	/// `block` and its iterated post-dominance frontier.
	#[must_use]
	pub fn post_dominance_closure(&self, block: u16) -> &[u16] {
		&self.post_dominance_closures[usize::from(block)]
	}

	/// The iterated post-dominance frontier of `block`.
	#[must_use]
	pub fn control_dependences(&self, block: u16) -> &[u16] {
		&self.control_dependences[usize::from(block)]
	}
}

#[cfg(test)]
mod tests {
	use super::{insert_sorted, intersect_sorted};

	#[test]
	fn sorted_helpers() {
		let mut list = vec![1, 4];

		assert!(insert_sorted(&mut list, 3));
		assert!(!insert_sorted(&mut list, 4));
		assert_eq!(list, [1, 3, 4]);

		assert_eq!(intersect_sorted(&[1, 2, 5, 8], &[2, 3, 8]), [2, 8]);
		assert!(intersect_sorted(&[], &[2]).is_empty());
	}
}
