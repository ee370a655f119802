use alloc::vec::Vec;
use control_flow_graph::ControlFlowGraph;
use set::Set;

use crate::dominator_tree::DominatorTree;

/// A natural loop, with links into the owning [`LoopInfo`] arena.
pub struct Loop {
	pub header: u16,
	pub parent: Option<usize>,
	pub children: Vec<usize>,

	blocks: Vec<u16>,
}

impl Loop {
	#[must_use]
	pub fn contains(&self, id: u16) -> bool {
		self.blocks.binary_search(&id).is_ok()
	}

	#[must_use]
	pub fn blocks(&self) -> &[u16] {
		&self.blocks
	}

	/// Every edge leaving the loop, ordered by exiting block and then by successor position.
	pub fn exit_edges<'graph>(
		&'graph self,
		graph: &'graph ControlFlowGraph,
	) -> impl Iterator<Item = (u16, u16)> + 'graph {
		self.blocks.iter().flat_map(move |&id| {
			graph
				.successors(id)
				.filter(|&successor| !self.contains(successor))
				.map(move |successor| (id, successor))
		})
	}

	#[must_use]
	pub fn exiting_blocks(&self, graph: &ControlFlowGraph) -> Vec<u16> {
		let mut exiting: Vec<_> = self.exit_edges(graph).map(|edge| edge.0).collect();

		exiting.dedup();

		exiting
	}

	#[must_use]
	pub fn exit_blocks(&self, graph: &ControlFlowGraph) -> Vec<u16> {
		let mut exits: Vec<_> = self.exit_edges(graph).map(|edge| edge.1).collect();

		exits.sort_unstable();
		exits.dedup();

		exits
	}

	/// The single outside predecessor of the header, if it only leads into the loop.
	#[must_use]
	pub fn preheader(&self, graph: &ControlFlowGraph) -> Option<u16> {
		let mut entries = graph
			.predecessors(self.header)
			.filter(|&id| !self.contains(id));

		let entry = entries.next()?;

		if entries.next().is_some() || graph.has_multiple_successors(entry) {
			return None;
		}

		Some(entry)
	}
}

/// The loop nest of a reducible graph.
pub struct LoopInfo {
	loops: Vec<Loop>,

	seen: Set,
	stack: Vec<u16>,
}

impl LoopInfo {
	fn find_body(&mut self, graph: &ControlFlowGraph, header: u16, latches: &[u16]) -> Vec<u16> {
		self.seen.clear();
		self.seen.grow_insert(header.into());

		self.stack.clear();
		self.stack.extend(latches);

		while let Some(id) = self.stack.pop() {
			if self.seen.grow_insert(id.into()) {
				continue;
			}

			self.stack.extend(graph.predecessors(id));
		}

		self.seen
			.ascending()
			.map(|id| u16::try_from(id).unwrap())
			.collect()
	}

	fn find_loops(&mut self, graph: &ControlFlowGraph, dominators: &DominatorTree) {
		for header in graph.block_ids() {
			let latches: Vec<_> = graph
				.predecessors(header)
				.filter(|&id| dominators.dominates(header, id))
				.collect();

			if latches.is_empty() {
				continue;
			}

			let blocks = self.find_body(graph, header, &latches);

			self.loops.push(Loop {
				header,
				parent: None,
				children: Vec::new(),

				blocks,
			});
		}

		// Outer loops come first, so a parent always precedes its children.
		self.loops
			.sort_by(|lhs, rhs| rhs.blocks.len().cmp(&lhs.blocks.len()));
	}

	fn find_nesting(&mut self) {
		for index in 0..self.loops.len() {
			let header = self.loops[index].header;
			let parent = (0..index)
				.rev()
				.find(|&parent| self.loops[parent].contains(header));

			self.loops[index].parent = parent;

			if let Some(parent) = parent {
				self.loops[parent].children.push(index);
			}
		}
	}

	#[must_use]
	pub fn compute(graph: &ControlFlowGraph, dominators: &DominatorTree) -> Self {
		let mut loop_info = Self {
			loops: Vec::new(),

			seen: Set::new(),
			stack: Vec::new(),
		};

		loop_info.find_loops(graph, dominators);
		loop_info.find_nesting();

		loop_info
	}

	#[must_use]
	pub fn loops(&self) -> &[Loop] {
		&self.loops
	}

	#[must_use]
	pub fn get(&self, index: usize) -> &Loop {
		&self.loops[index]
	}

	#[must_use]
	pub fn find(&self, header: u16) -> Option<usize> {
		self.loops.iter().position(|lp| lp.header == header)
	}

	pub fn top_level(&self) -> impl Iterator<Item = usize> + '_ {
		(0..self.loops.len()).filter(|&index| self.loops[index].parent.is_none())
	}

	/// Every loop, with children before their parent.
	#[must_use]
	pub fn post_order(&self) -> Vec<usize> {
		let mut result = Vec::with_capacity(self.loops.len());
		let mut stack: Vec<_> = self.top_level().map(|index| (index, false)).collect();

		while let Some((index, post)) = stack.pop() {
			if post {
				result.push(index);
			} else {
				stack.push((index, true));
				stack.extend(self.loops[index].children.iter().map(|&child| (child, false)));
			}
		}

		result
	}
}
