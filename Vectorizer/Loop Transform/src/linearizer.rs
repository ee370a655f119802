use control_flow_graph::instruction::{BinaryOperator, Terminator, UnaryOperator};
use vectorizer_info::{Error, Event, LoopState, Result, VectorShape};

use crate::session::{LiveMask, TrackerDesc, TransformSession};

impl TransformSession<'_> {
	fn expect_state(&self, state: LoopState, reason: &'static str) -> Result<u16> {
		match self.preheader {
			Some(preheader) if self.state == state => Ok(preheader),
			_ => Err(Error::Precondition {
				block: self.header,
				reason,
			}),
		}
	}

	fn add_varying_binary(&mut self, block: u16, lhs: u32, rhs: u32, operator: BinaryOperator) -> u32 {
		let id = self.graph.add_binary_operation(block, lhs, rhs, operator);

		self.store.set_shape(id, VectorShape::Varying);

		id
	}

	fn add_varying_phi(&mut self, block: u16, incoming: Vec<(u16, u32)>) -> u32 {
		let id = self.graph.add_phi(block, incoming);

		self.store.set_shape(id, VectorShape::Varying);

		id
	}

	fn push_incoming(&mut self, phi: u32, block: u16, value: u32) {
		if let Some(phi) = self.graph.value_mut(phi).as_mut_phi() {
			phi.incoming.push((block, value));
		}
	}

	// Incoming list of a collect block phi, `old` from the old latch and `kill(k)` from kill block `k`.
	fn collect_incoming<K: Fn(usize) -> u32>(&self, old: u32, kill: K) -> Vec<(u16, u32)> {
		core::iter::once((self.old_latch, old))
			.chain(self.kill_blocks.iter().enumerate().map(|(index, &block)| (block, kill(index))))
			.collect()
	}

	fn split_offset_header(&mut self) {
		let header = self.header;

		if !self.exits.iter().any(|&(exiting, _)| exiting == header) {
			return;
		}

		let offset_header = self.graph.split_after_phis(header);

		self.store.add_to_region(offset_header);
		self.blocks.grow_insert(offset_header.into());

		match self.store.get_predicate(header) {
			Some(predicate) => self.store.set_predicate(offset_header, predicate),
			None if self.store.is_mandatory(header) => self.store.mark_mandatory(offset_header),
			None => {}
		}

		for (exiting, _) in &mut self.exits {
			if *exiting == header {
				*exiting = offset_header;
			}
		}

		if self.old_latch == header {
			self.old_latch = offset_header;
		}

		tracing::trace!(header, offset_header, "split header");

		self.offset_header = Some(offset_header);
	}

	// Makes the old latch fall through to the pure latch, so the collect block can follow it.
	fn isolate_old_latch(&mut self) -> Result<()> {
		let old_latch = self.old_latch;
		let pure_latch = self.pure_latch;

		if !self.graph.has_multiple_successors(old_latch) {
			return Ok(());
		}

		let isolated = self.add_block(true);

		self.merge_masks(isolated, &[old_latch], pure_latch)?;
		self.graph.replace_edge(old_latch, pure_latch, isolated);
		self.graph.set_jump(isolated, pure_latch);

		self.old_latch = isolated;

		Ok(())
	}

	// Lanes reaching a kill block are live and take its exit edge.
	fn kill_mask(&mut self, exiting: u16, exit: u16, live: u32) -> Result<u32> {
		let mask = self
			.mask_expander
			.request_edge_mask(self.graph, self.store, exiting, exit)?;

		if self.store.get_predicate(exiting) == Some(live) {
			Ok(mask)
		} else {
			Ok(self.add_varying_binary(exiting, live, mask, BinaryOperator::And))
		}
	}

	fn redirect_exits(&mut self, live: u32) -> Result<()> {
		let header = self.header;

		for index in 0..self.exits.len() {
			let (exiting, exit) = self.exits[index];
			let mask = self.kill_mask(exiting, exit, live)?;
			let kill = self.add_block(true);

			self.graph.replace_edge(exiting, exit, kill);
			self.graph.set_jump(kill, self.collect);
			self.store.set_predicate(kill, mask);
			self.kill_blocks.push(kill);

			self.diagnostics.record(Event::KillExit {
				header,
				exiting,
				exit,
			});
		}

		Ok(())
	}

	// Lanes that left keep the header values they left with.
	fn wrap_header_phis(&mut self, phis: &[u32]) -> Result<()> {
		let pure_latch = self.pure_latch;

		for &phi in phis {
			let Some(latch_value) = self
				.graph
				.value(phi)
				.as_phi()
				.and_then(|phi| phi.find_incoming(pure_latch))
			else {
				continue;
			};

			let shape = self.store.query_shape(self.graph, phi)?;
			let incoming = self.collect_incoming(latch_value, |_| phi);
			let tracker = self.graph.add_phi(self.collect, incoming);

			self.store.set_shape(tracker, shape);

			if let Some(phi) = self.graph.value_mut(phi).as_mut_phi() {
				for (block, value) in &mut phi.incoming {
					if *block == pure_latch {
						*value = tracker;
					}
				}
			}
		}

		Ok(())
	}

	// The header phi of the live lanes, completed once the pure latch
	// computes the next mask. Blocks sharing the header predicate use it.
	fn add_live_phi(&mut self, preheader: u16) -> Result<u32> {
		let header = self.header;
		let init = self
			.mask_expander
			.request_block_mask(self.graph, self.store, preheader)?;

		let live = self.add_varying_phi(header, vec![(preheader, init)]);

		if let Some(old) = self.store.get_predicate(header) {
			for block in self.blocks.ascending() {
				let block = block.try_into().unwrap();

				if self.store.get_predicate(block) == Some(old) {
					self.store.set_predicate(block, live);
				}
			}
		} else if !self.store.is_mandatory(header) {
			self.store.set_predicate(header, live);
		}

		Ok(live)
	}

	fn add_exit_trackers(&mut self, preheader: u16, live: u32) -> LiveMask {
		let header = self.header;
		let collect = self.collect;
		let pure_latch = self.pure_latch;

		let on = self.graph.add_bool(true);
		let off = self.graph.add_bool(false);
		let mut any_fresh = None;

		for index in 0..self.exits.len() {
			let incoming = self.collect_incoming(off, |id| if id == index { on } else { off });
			let tracker = self.add_varying_phi(collect, incoming);
			let wrap = self.add_varying_phi(header, vec![(preheader, off)]);

			let fresh = self.add_varying_binary(pure_latch, tracker, live, BinaryOperator::And);
			let update = self.add_varying_binary(pure_latch, wrap, fresh, BinaryOperator::Or);

			self.push_incoming(wrap, pure_latch, update);

			any_fresh = Some(match any_fresh {
				Some(any_fresh) => {
					self.add_varying_binary(pure_latch, any_fresh, fresh, BinaryOperator::Or)
				}
				None => fresh,
			});

			self.fresh.push(fresh);
			self.exit_descs.push(TrackerDesc {
				wrap,
				tracker,
				update,
			});
		}

		let stay = self
			.graph
			.add_unary_operation(pure_latch, any_fresh.unwrap_or(off), UnaryOperator::Not);
		let next = self.add_varying_binary(pure_latch, live, stay, BinaryOperator::And);
		let any_live = self.graph.add_any_lane(pure_latch, next);

		self.store.set_shape(stay, VectorShape::Varying);
		self.store.set_shape(any_live, VectorShape::Uniform);
		self.push_incoming(live, pure_latch, next);

		LiveMask {
			phi: live,
			next,
			any_live,
		}
	}

	fn set_latch_branch(&mut self, any_live: u32) {
		let pure_latch = self.pure_latch;
		let latch_exit = self.add_block(false);

		self.graph.add_edge(pure_latch, latch_exit);
		self.graph.block_mut(pure_latch).terminator = Terminator::Branch {
			condition: any_live,
		};

		self.store.mark_mandatory(pure_latch);
		self.store.mark_mandatory(latch_exit);

		self.latch_exit = latch_exit;
	}

	/// Sends every exit through a kill block into a collect block before the
	/// pure latch, which then leaves once no lane is live.
	///
	/// # Errors
	///
	/// Returns an error if the latch is not purified yet or if a mask
	/// cannot be built.
	pub fn linearize_exits(&mut self) -> Result<()> {
		let preheader = self.expect_state(
			LoopState::LatchPurified,
			"exits linearized before the latch was purified",
		)?;

		let phis = self.graph.phis(self.header).to_vec();
		let live = self.add_live_phi(preheader)?;

		self.split_offset_header();
		self.isolate_old_latch()?;

		let old_latch = self.old_latch;
		let pure_latch = self.pure_latch;
		let collect = self.add_block(true);

		self.graph.replace_edge(old_latch, pure_latch, collect);
		self.graph.set_jump(collect, pure_latch);
		self.store.mark_mandatory(collect);
		self.collect = collect;

		self.redirect_exits(live)?;
		self.wrap_header_phis(&phis)?;

		let live_mask = self.add_exit_trackers(preheader, live);

		self.set_latch_branch(live_mask.any_live);
		self.live_mask = Some(live_mask);
		self.set_state(LoopState::ExitsLinearized);

		Ok(())
	}

	// The first exit in enumeration order that a lane took decides which update it sees.
	fn blend(&mut self, exits: &[usize], trackers: &[TrackerDesc]) -> Option<u32> {
		let (last, rest) = trackers.split_last()?;
		let mut blended = last.update;

		for (tracker, &exit) in rest.iter().zip(exits).rev() {
			let condition = self.exit_descs[exit].update;

			blended = self
				.graph
				.add_select(self.latch_exit, condition, tracker.update, blended);

			self.store.set_shape(blended, VectorShape::Varying);
		}

		Some(blended)
	}

	fn add_live_out_trackers(&mut self, preheader: u16, undefined: u32, index: usize) -> Vec<TrackerDesc> {
		let header = self.header;
		let collect = self.collect;
		let pure_latch = self.pure_latch;

		let value = self.live_outs[index].value;
		let exits = self.live_outs[index].exits.clone();
		let mut trackers = Vec::with_capacity(exits.len());

		for exit in exits {
			let wrap = self.add_varying_phi(header, vec![(preheader, undefined)]);
			let incoming = self.collect_incoming(wrap, |id| if id == exit { value } else { wrap });
			let tracker = self.add_varying_phi(collect, incoming);
			let update = self
				.graph
				.add_select(pure_latch, self.fresh[exit], tracker, wrap);

			self.store.set_shape(update, VectorShape::Varying);
			self.push_incoming(wrap, pure_latch, update);

			self.diagnostics.record(Event::Tracker {
				header,
				value,
				exit: self.exits[exit].1,
			});

			trackers.push(TrackerDesc {
				wrap,
				tracker,
				update,
			});
		}

		trackers
	}

	fn dispatch_exits(&mut self) {
		let exits = self.exits.clone();
		let mut dispatch = self.latch_exit;

		for (index, &(exiting, exit)) in exits.iter().enumerate() {
			let update = self.exit_descs[index].update;

			self.graph.replace_incoming(exit, exiting, dispatch);

			if !self.store.is_mandatory(exit) {
				self.store.set_predicate(exit, update);
			}

			if index + 1 == exits.len() {
				if index == 0 {
					self.graph.set_jump(dispatch, exit);
				}
			} else if index + 2 == exits.len() {
				self.graph
					.set_branch(dispatch, update, exit, exits[index + 1].1);
			} else {
				let next = self.add_block(false);

				self.graph.set_branch(dispatch, update, exit, next);

				dispatch = next;
			}
		}
	}

	/// Tracks every value used after the loop per exit, blends the tracked
	/// values after the latch and dispatches lanes to the exits they took.
	///
	/// # Errors
	///
	/// Returns an error if the exits are not linearized yet.
	pub fn finalize_live_outs(&mut self) -> Result<()> {
		let preheader = self.expect_state(
			LoopState::ExitsLinearized,
			"live outs finalized before the exits were linearized",
		)?;

		let undefined = self.graph.add_undefined();

		for index in 0..self.live_outs.len() {
			let trackers = self.add_live_out_trackers(preheader, undefined, index);
			let live_out = &self.live_outs[index];
			let value = live_out.value;
			let exits = live_out.exits.clone();

			if let Some(blended) = self.blend(&exits, &trackers) {
				let blocks = &self.blocks;
				let latch_exit = self.latch_exit;

				self.graph.replace_uses_if(value, blended, |id| {
					id != latch_exit && !blocks.contains(id.into())
				});
			}

			self.live_outs[index].trackers = trackers;
		}

		self.dispatch_exits();
		self.set_state(LoopState::LiveOutsFinalized);

		Ok(())
	}
}
