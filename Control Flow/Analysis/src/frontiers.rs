use alloc::vec::Vec;
use control_flow_graph::ControlFlowGraph;

use crate::dominator_tree::DominatorTree;

/// Dominance or post-dominance frontier of every block.
///
/// The post-dominance frontier of a block is the set of branches it is
/// control dependent on.
pub struct Frontiers {
	frontiers: Vec<Vec<u16>>,
}

impl Frontiers {
	fn with_len(len: usize) -> Self {
		Self {
			frontiers: (0..len).map(|_| Vec::new()).collect(),
		}
	}

	fn insert(&mut self, id: u16, member: u16) {
		let frontier = &mut self.frontiers[usize::from(id)];

		if let Err(position) = frontier.binary_search(&member) {
			frontier.insert(position, member);
		}
	}

	// Walks from every `source` of `id` up the tree until the tree parent of `id`.
	fn walk<I: IntoIterator<Item = u16>>(&mut self, tree: &DominatorTree, id: u16, sources: I) {
		let stop = tree.immediate(id);

		for source in sources {
			if !tree.is_reachable(source) {
				continue;
			}

			let mut runner = Some(source);

			while let Some(current) = runner {
				if Some(current) == stop {
					break;
				}

				self.insert(current, id);

				runner = tree.immediate(current);
			}
		}
	}

	#[must_use]
	pub fn dominance(graph: &ControlFlowGraph, dominators: &DominatorTree) -> Self {
		let mut frontiers = Self::with_len(graph.basic_blocks.len());

		for id in graph.block_ids() {
			if graph.has_multiple_predecessors(id) && dominators.is_reachable(id) {
				frontiers.walk(dominators, id, graph.predecessors(id));
			}
		}

		frontiers
	}

	#[must_use]
	pub fn post_dominance(graph: &ControlFlowGraph, post_dominators: &DominatorTree) -> Self {
		let mut frontiers = Self::with_len(graph.basic_blocks.len());

		for id in graph.block_ids() {
			if graph.has_multiple_successors(id) && post_dominators.is_reachable(id) {
				frontiers.walk(post_dominators, id, graph.successors(id));
			}
		}

		frontiers
	}

	#[must_use]
	pub fn get(&self, id: u16) -> &[u16] {
		&self.frontiers[usize::from(id)]
	}
}
