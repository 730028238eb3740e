use std::time::Duration;

/// Why a frame source produced no frame.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaptureError {
	#[error("no frame within {0:?}")]
	Timeout(Duration),
	#[error("capture source unavailable: {0}")]
	Unavailable(String),
	/// A finite source (frame replay) has nothing left.
	#[error("frame source exhausted")]
	Exhausted,
}

/// Fatal runtime and startup errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("frame capture failed {attempts} times in a row (last: {last})")]
	CaptureExhausted { attempts: u32, last: CaptureError },
	#[error("invalid configuration: {0}")]
	Config(String),
}
