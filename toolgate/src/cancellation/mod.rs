//! Cooperative cancellation for conversation turns.
//!
//! A turn owns one [`CancellationToken`]; every proposed call made during the
//! turn carries a shared handle to it, so cancelling the turn reaches both the
//! pending confirmation wait and the tool function itself.

mod token;

pub use token::CancellationToken;
