use control_flow_graph::instruction::Terminator;
use vectorizer_info::{Error, LoopState, Result, VectorShape};

use crate::session::TransformSession;

impl TransformSession<'_> {
	// Gives `block` the activity of the lanes arriving from `sources` into `target`.
	pub(crate) fn merge_masks(&mut self, block: u16, sources: &[u16], target: u16) -> Result<()> {
		if sources.iter().all(|&id| self.store.is_mandatory(id)) {
			self.store.mark_mandatory(block);

			return Ok(());
		}

		let mut incoming = Vec::with_capacity(sources.len());

		for &source in sources {
			let mask = self
				.mask_expander
				.request_edge_mask(self.graph, self.store, source, target)?;

			incoming.push((source, mask));
		}

		let predicate = if let [(_, mask)] = incoming[..] {
			mask
		} else {
			let phi = self.graph.add_phi(block, incoming);

			self.store.set_shape(phi, VectorShape::Varying);

			phi
		};

		self.store.set_predicate(block, predicate);

		Ok(())
	}

	// Moves the incoming values of `target` phis from `sources` into phis of `block`.
	fn merge_phis(&mut self, target: u16, block: u16, sources: &[u16]) -> Result<()> {
		if let &[source] = sources {
			self.graph.replace_incoming(target, source, block);

			return Ok(());
		}

		for index in 0..self.graph.phis(target).len() {
			let phi = self.graph.phis(target)[index];
			let shape = self.store.query_shape(self.graph, phi)?;

			let Some(old) = self.graph.value_mut(phi).as_mut_phi() else {
				continue;
			};

			let (moved, kept): (Vec<_>, Vec<_>) = core::mem::take(&mut old.incoming)
				.into_iter()
				.partition(|(id, _)| sources.contains(id));

			old.incoming = kept;

			let merged = self.graph.add_phi(block, moved);

			self.store.set_shape(merged, shape);

			if let Some(old) = self.graph.value_mut(phi).as_mut_phi() {
				old.incoming.push((block, merged));
			}
		}

		Ok(())
	}

	fn ensure_preheader(&mut self) -> Result<u16> {
		let header = self.header;
		let entries: Vec<_> = self
			.graph
			.predecessors(header)
			.filter(|&id| !self.blocks.contains(id.into()))
			.collect();

		if entries.is_empty() {
			return Err(Error::Precondition {
				block: header,
				reason: "loop header is not entered from outside the loop",
			});
		}

		let preheader = self.add_block(false);

		self.merge_masks(preheader, &entries, header)?;

		for &entry in &entries {
			self.graph.replace_edge(entry, header, preheader);
		}

		self.merge_phis(header, preheader, &entries)?;
		self.graph.set_jump(preheader, header);

		tracing::trace!(header, preheader, "created preheader");

		Ok(preheader)
	}

	fn merge_latches(&mut self, latches: &[u16]) -> Result<u16> {
		let header = self.header;
		let latch = self.add_block(true);

		self.merge_masks(latch, latches, header)?;

		for &id in latches {
			self.graph.replace_edge(id, header, latch);
		}

		self.merge_phis(header, latch, latches)?;
		self.graph.set_jump(latch, header);

		Ok(latch)
	}

	// An empty block jumping to the header with a single predecessor.
	fn is_pure_latch(&self, latch: u16) -> bool {
		let basic_block = self.graph.block(latch);

		latch != self.header
			&& basic_block.phis.is_empty()
			&& basic_block.instructions.is_empty()
			&& basic_block.terminator == Terminator::Jump
			&& !self.graph.has_multiple_predecessors(latch)
			&& self.graph.predecessors(latch).next().is_some()
	}

	/// Makes the loop have a preheader and a single back edge, from a pure
	/// latch whose only predecessor is the old latch. Does nothing if the
	/// loop is already in this form or was purified before.
	///
	/// # Errors
	///
	/// Returns an error if the loop header has no entry edge or if a
	/// mask cannot be built.
	pub fn request_pure_latch(&mut self) -> Result<u16> {
		let header = self.header;

		if self.state != LoopState::FlaggedDivergent {
			return Ok(self.pure_latch);
		}

		if self.preheader.is_none() {
			self.preheader = Some(self.ensure_preheader()?);
		}

		let latches: Vec<_> = self
			.graph
			.predecessors(header)
			.filter(|&id| self.blocks.contains(id.into()))
			.collect();

		let latch = match latches[..] {
			[latch] => latch,
			_ => self.merge_latches(&latches)?,
		};

		if self.is_pure_latch(latch) {
			self.pure_latch = latch;
			self.old_latch = self.graph.predecessors(latch).next().unwrap_or(latch);
		} else {
			let pure_latch = self.add_block(true);

			self.graph.replace_edge(latch, header, pure_latch);
			self.graph.set_jump(pure_latch, header);
			self.graph.replace_incoming(header, latch, pure_latch);

			match self.store.get_predicate(latch) {
				Some(predicate) => self.store.set_predicate(pure_latch, predicate),
				None if self.store.is_mandatory(latch) => self.store.mark_mandatory(pure_latch),
				None => {}
			}

			self.pure_latch = pure_latch;
			self.old_latch = latch;
		}

		self.set_state(LoopState::LatchPurified);

		Ok(self.pure_latch)
	}
}
