//! Application module: the session that owns library, queue and engine, and
//! the view model used by the TUI and runtime.

mod model;
mod session;

pub use model::*;
pub use session::{FetchDispatch, Session};

#[cfg(test)]
mod tests;
