use thiserror::Error;

/// Failures that abort the divergence handling of a function.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
	#[error("value %{value} is in the region but has no shape")]
	MissingShape { value: u32 },

	#[error("block {block} has an unhandled divergence topology: {reason}")]
	UnimplementedTopology { block: u16, reason: &'static str },

	#[error("block {block} breaks a precondition: {reason}")]
	Precondition { block: u16, reason: &'static str },
}

pub type Result<T> = core::result::Result<T, Error>;
