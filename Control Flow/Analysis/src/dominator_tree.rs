// Resources:
// "A Simple, Fast Dominance Algorithm",
//     by Keith D. Cooper, Timothy J. Harvey, and Ken Kennedy

use alloc::vec::Vec;
use control_flow_graph::ControlFlowGraph;

use crate::depth_first_searcher::DepthFirstSearcher;

const NONE: u16 = u16::MAX;

/// Immediate (post-)dominators of every reachable block.
///
/// Post-dominators are computed against a virtual exit that succeeds every
/// returning block, so blocks whose immediate post-dominator is that exit
/// report `None`.
pub struct DominatorTree {
	immediate: Vec<u16>,
	post_order: Vec<u16>,
	root: u16,
	is_virtual: bool,
}

impl DominatorTree {
	fn intersect(&self, mut lhs: u16, mut rhs: u16) -> u16 {
		while lhs != rhs {
			while self.post_order[usize::from(lhs)] < self.post_order[usize::from(rhs)] {
				lhs = self.immediate[usize::from(lhs)];
			}

			while self.post_order[usize::from(rhs)] < self.post_order[usize::from(lhs)] {
				rhs = self.immediate[usize::from(rhs)];
			}
		}

		lhs
	}

	fn find_immediate<I: IntoIterator<Item = u16>>(&self, predecessors: I) -> u16 {
		predecessors
			.into_iter()
			.filter(|&id| self.immediate[usize::from(id)] != NONE)
			.reduce(|lhs, rhs| self.intersect(lhs, rhs))
			.unwrap_or(NONE)
	}

	fn build<S, SI, P, PI>(len: usize, root: u16, successors: S, predecessors: P) -> Self
	where
		S: Fn(u16) -> SI,
		SI: IntoIterator<Item = u16>,
		P: Fn(u16) -> PI,
		PI: IntoIterator<Item = u16>,
	{
		let mut order = Vec::new();
		let mut tree = Self {
			immediate: alloc::vec![NONE; len],
			post_order: alloc::vec![NONE; len],
			root,
			is_virtual: false,
		};

		DepthFirstSearcher::new().run(&mut order, root, successors);

		for (&id, index) in order.iter().zip(0..) {
			tree.post_order[usize::from(id)] = index;
		}

		tree.immediate[usize::from(root)] = root;

		let mut changed = true;

		while changed {
			changed = false;

			for &id in order.iter().rev().filter(|&&id| id != root) {
				let immediate = tree.find_immediate(predecessors(id));

				if tree.immediate[usize::from(id)] != immediate {
					tree.immediate[usize::from(id)] = immediate;

					changed = true;
				}
			}
		}

		tree
	}

	#[must_use]
	pub fn dominators(graph: &ControlFlowGraph, entry: u16) -> Self {
		Self::build(
			graph.basic_blocks.len(),
			entry,
			|id| graph.successors(id),
			|id| graph.predecessors(id),
		)
	}

	#[must_use]
	pub fn post_dominators(graph: &ControlFlowGraph) -> Self {
		let exit: u16 = graph.basic_blocks.len().try_into().unwrap();
		let is_sink = move |id: u16| id != exit && graph.block(id).is_sink();

		let mut tree = Self::build(
			usize::from(exit) + 1,
			exit,
			move |id| {
				let sources = (id != exit).then(|| graph.predecessors(id));
				let sinks = (id == exit).then(|| graph.block_ids().filter(move |&id| is_sink(id)));

				sources.into_iter().flatten().chain(sinks.into_iter().flatten())
			},
			move |id| {
				let targets = (id != exit).then(|| graph.successors(id));

				targets
					.into_iter()
					.flatten()
					.chain(is_sink(id).then_some(exit))
			},
		);

		tree.is_virtual = true;

		tree
	}

	#[must_use]
	pub fn is_reachable(&self, id: u16) -> bool {
		self.immediate
			.get(usize::from(id))
			.is_some_and(|&immediate| immediate != NONE)
	}

	/// The immediate dominator of `id`, or `None` for the root, the blocks
	/// directly under the virtual exit, and unreachable blocks.
	#[must_use]
	pub fn immediate(&self, id: u16) -> Option<u16> {
		let immediate = *self.immediate.get(usize::from(id))?;

		if id == self.root || immediate == NONE || (self.is_virtual && immediate == self.root) {
			None
		} else {
			Some(immediate)
		}
	}

	/// Whether `lhs` dominates `rhs`, reflexively.
	#[must_use]
	pub fn dominates(&self, lhs: u16, rhs: u16) -> bool {
		if !self.is_reachable(rhs) {
			return false;
		}

		let mut id = rhs;

		loop {
			if id == lhs {
				return true;
			}

			match self.immediate(id) {
				Some(immediate) => id = immediate,
				None => return false,
			}
		}
	}
}
