#![no_std]
#![expect(clippy::missing_panics_doc)]

extern crate alloc;

mod depth_first_searcher;

pub mod dominator_tree;
pub mod frontiers;
pub mod loop_info;

pub use self::{
	dominator_tree::DominatorTree,
	frontiers::Frontiers,
	loop_info::{Loop, LoopInfo},
};
