use set::Set;

/// A restriction of the vectorized area to some of the blocks of a function.
pub trait Region {
	/// The block every lane enters the region through.
	fn entry(&self) -> u16;

	fn contains(&self, block: u16) -> bool;

	/// Extends the region with a block that a transformation created inside it.
	fn add(&mut self, block: u16);
}

/// A region given as an explicit block set.
pub struct BlockRegion {
	entry: u16,
	blocks: Set,
}

impl BlockRegion {
	#[must_use]
	pub fn new<I: IntoIterator<Item = u16>>(entry: u16, blocks: I) -> Self {
		let mut region = Self {
			entry,
			blocks: Set::new(),
		};

		region.blocks.grow_insert(entry.into());
		region.blocks.extend(blocks.into_iter().map(usize::from));

		region
	}
}

impl Region for BlockRegion {
	fn entry(&self) -> u16 {
		self.entry
	}

	fn contains(&self, block: u16) -> bool {
		self.blocks.contains(block.into())
	}

	fn add(&mut self, block: u16) {
		self.blocks.grow_insert(block.into());
	}
}
