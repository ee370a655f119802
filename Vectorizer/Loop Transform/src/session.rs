use control_flow_analysis::{DominatorTree, LoopInfo};
use control_flow_graph::ControlFlowGraph;
use set::Set;
use vectorizer_info::{Diagnostics, Error, Event, LoopState, Result, ShapeStore, VectorShape};

use crate::mask_expander::MaskExpander;

/// The three phis tracking one exit or one live-out value of a loop.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub struct TrackerDesc {
	/// Header phi carrying the state into the next iteration.
	pub wrap: u32,
	/// Collect block phi recording what happened in this iteration.
	pub tracker: u32,
	/// Pure latch value holding the state after this iteration.
	pub update: u32,
}

/// The canonical live mask of a linearized loop.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub struct LiveMask {
	/// Header phi of the lanes still iterating.
	pub phi: u32,
	/// Pure latch value of the lanes iterating again.
	pub next: u32,
	/// Uniform pure latch test of whether any lane iterates again.
	pub any_live: u32,
}

pub(crate) struct LiveOut {
	pub value: u32,
	pub exits: Vec<usize>,
	pub trackers: Vec<TrackerDesc>,
}

/// The state of one divergent loop while it is made uniform.
pub struct TransformSession<'a> {
	pub(crate) graph: &'a mut ControlFlowGraph,
	pub(crate) store: &'a mut ShapeStore,
	pub(crate) mask_expander: &'a mut dyn MaskExpander,
	pub(crate) diagnostics: &'a mut dyn Diagnostics,

	pub(crate) state: LoopState,
	pub(crate) header: u16,
	pub(crate) blocks: Set,

	pub(crate) exits: Vec<(u16, u16)>,
	pub(crate) live_outs: Vec<LiveOut>,

	pub(crate) preheader: Option<u16>,
	pub(crate) offset_header: Option<u16>,
	pub(crate) old_latch: u16,
	pub(crate) pure_latch: u16,

	pub(crate) collect: u16,
	pub(crate) latch_exit: u16,
	pub(crate) kill_blocks: Vec<u16>,
	pub(crate) fresh: Vec<u32>,
	pub(crate) live_mask: Option<LiveMask>,
	pub(crate) exit_descs: Vec<TrackerDesc>,
}

impl<'a> TransformSession<'a> {
	fn find_exits(graph: &ControlFlowGraph, loops: &LoopInfo, index: usize) -> Result<Vec<(u16, u16)>> {
		let exits: Vec<_> = loops.get(index).exit_edges(graph).collect();

		for &(exiting, exit) in &exits {
			if graph.successors(exiting).filter(|&id| id == exit).count() > 1 {
				return Err(Error::UnimplementedTopology {
					block: exiting,
					reason: "several edges lead to the same loop exit",
				});
			}

			if graph.has_multiple_predecessors(exit) {
				return Err(Error::Precondition {
					block: exit,
					reason: "loop exit block has several predecessors",
				});
			}
		}

		Ok(exits)
	}

	fn find_live_outs(
		graph: &ControlFlowGraph,
		dominators: &DominatorTree,
		blocks: &Set,
		exits: &[(u16, u16)],
	) -> Vec<LiveOut> {
		let mut used = Set::new();
		let mut add_use = |value: u32| {
			used.grow_insert(value.try_into().unwrap());
		};

		for value in &graph.values {
			if value
				.block()
				.is_some_and(|block| !blocks.contains(block.into()))
			{
				value.for_each_operand(&mut add_use);
			}
		}

		for block in graph.block_ids() {
			if !blocks.contains(block.into()) {
				graph.terminator(block).for_each_operand(&mut add_use);
			}
		}

		used.ascending()
			.filter_map(|value| {
				let value = value.try_into().unwrap();
				let block = graph.value(value).block()?;

				blocks.contains(block.into()).then(|| LiveOut {
					value,
					exits: exits
						.iter()
						.enumerate()
						.filter(|&(_, &(exiting, _))| dominators.dominates(block, exiting))
						.map(|(index, _)| index)
						.collect(),
					trackers: Vec::new(),
				})
			})
			.collect()
	}

	/// Starts the transformation of the loop at `index` of `loops`.
	///
	/// # Errors
	///
	/// Returns [`Error::UnimplementedTopology`] if a block exits the loop
	/// twice to the same block, and [`Error::Precondition`] if an exit block
	/// has several predecessors.
	pub fn new(
		graph: &'a mut ControlFlowGraph,
		store: &'a mut ShapeStore,
		mask_expander: &'a mut dyn MaskExpander,
		diagnostics: &'a mut dyn Diagnostics,
		loops: &LoopInfo,
		dominators: &DominatorTree,
		index: usize,
	) -> Result<Self> {
		let lp = loops.get(index);
		let exits = Self::find_exits(graph, loops, index)?;

		let mut blocks = Set::new();

		blocks.extend(lp.blocks().iter().copied().map(usize::from));

		let live_outs = Self::find_live_outs(graph, dominators, &blocks, &exits);
		let preheader = lp.preheader(graph);
		let header = lp.header;

		diagnostics.record(Event::Transition {
			header,
			state: LoopState::FlaggedDivergent,
		});

		Ok(Self {
			graph,
			store,
			mask_expander,
			diagnostics,

			state: LoopState::FlaggedDivergent,
			header,
			blocks,

			exits,
			live_outs,

			preheader,
			offset_header: None,
			old_latch: header,
			pure_latch: header,

			collect: header,
			latch_exit: header,
			kill_blocks: Vec::new(),
			fresh: Vec::new(),
			live_mask: None,
			exit_descs: Vec::new(),
		})
	}

	pub(crate) fn set_state(&mut self, state: LoopState) {
		tracing::debug!(header = self.header, ?state, "loop transform step");

		self.state = state;
		self.diagnostics.record(Event::Transition {
			header: self.header,
			state,
		});
	}

	#[must_use]
	pub const fn state(&self) -> LoopState {
		self.state
	}

	#[must_use]
	pub const fn header(&self) -> u16 {
		self.header
	}

	#[must_use]
	pub const fn preheader(&self) -> Option<u16> {
		self.preheader
	}

	#[must_use]
	pub const fn offset_header(&self) -> Option<u16> {
		self.offset_header
	}

	#[must_use]
	pub const fn old_latch(&self) -> u16 {
		self.old_latch
	}

	/// Block every exit edge reaches through its kill block, or the header
	/// before the exits are linearized.
	#[must_use]
	pub const fn collect(&self) -> u16 {
		self.collect
	}

	/// Block the pure latch leaves to once no lane is live, or the header
	/// before the exits are linearized.
	#[must_use]
	pub const fn latch_exit(&self) -> u16 {
		self.latch_exit
	}

	/// Exit edges in enumeration order. An edge leaving the header starts
	/// at the offset header once the exits are linearized.
	#[must_use]
	pub fn exits(&self) -> &[(u16, u16)] {
		&self.exits
	}

	// Lanes may leave through the edge while others stay in the loop.
	fn is_kill_edge(&self, exiting: u16, exit: u16) -> bool {
		let varying = self
			.graph
			.terminator(exiting)
			.condition()
			.is_some_and(|condition| {
				!self
					.store
					.query_shape(self.graph, condition)
					.is_ok_and(VectorShape::is_uniform)
			});

		varying || self.store.is_kill_exit(exit)
	}

	/// Exits whose block some lanes skip or that lanes take at different
	/// iterations.
	#[must_use]
	pub fn kill_exits(&self) -> usize {
		self.exits
			.iter()
			.filter(|&&(exiting, exit)| self.is_kill_edge(exiting, exit))
			.count()
	}

	#[must_use]
	pub const fn live_mask(&self) -> Option<LiveMask> {
		self.live_mask
	}

	#[must_use]
	pub fn exit_desc(&self, exit: usize) -> Option<TrackerDesc> {
		self.exit_descs.get(exit).copied()
	}

	/// The tracker of `value` for the exit at position `exit`, if the value
	/// is available at that exit.
	#[must_use]
	pub fn live_out_desc(&self, value: u32, exit: usize) -> Option<TrackerDesc> {
		let live_out = self.live_outs.iter().find(|live_out| live_out.value == value)?;
		let position = live_out.exits.iter().position(|&id| id == exit)?;

		live_out.trackers.get(position).copied()
	}

	pub(crate) fn add_block(&mut self, inside: bool) -> u16 {
		let id = self.graph.add_basic_block();

		self.store.add_to_region(id);

		if inside {
			self.blocks.grow_insert(id.into());
		}

		id
	}

	/// Runs every remaining step and returns the number of kill exits. A
	/// loop without kill exits is only purified and stays divergent.
	///
	/// # Errors
	///
	/// Returns an error if a step fails, which leaves the graph partially
	/// transformed.
	pub fn run(mut self) -> Result<usize> {
		self.request_pure_latch()?;

		let kill_exits = self.kill_exits();

		if kill_exits != 0 {
			self.linearize_exits()?;
			self.finalize_live_outs()?;
			self.store.set_loop_divergence(self.header, false);
		}

		Ok(kill_exits)
	}
}
