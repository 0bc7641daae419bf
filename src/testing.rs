use std::cell::Cell;

/// How the most recent evaluation on this thread was served.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Outcome {
    /// A cached result was reused.
    Hit,
    /// The request's function ran.
    Miss,
}

thread_local! {
    /// The outcome of the last evaluation.
    static LAST_OUTCOME: Cell<Option<Outcome>> = const { Cell::new(None) };
}

/// The outcome of the last evaluation, if any happened on this thread.
pub fn last_outcome() -> Option<Outcome> {
    LAST_OUTCOME.with(Cell::get)
}

/// Whether the last evaluation was a cache hit.
pub fn last_was_hit() -> bool {
    last_outcome() == Some(Outcome::Hit)
}

/// Records the outcome of an evaluation.
pub(crate) fn register(outcome: Outcome) {
    LAST_OUTCOME.with(|cell| cell.set(Some(outcome)))
}
