//! Step outcome shared by every stage of a run.

/// Result of one orchestration step: keep going with a value, or stop the whole
/// run with an exit code. Errors travel separately through `Result`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    Continue(T),
    Exit(i32),
}

impl<T> Outcome<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Continue(value) => Outcome::Continue(f(value)),
            Outcome::Exit(code) => Outcome::Exit(code),
        }
    }

    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Outcome::Continue(_) => None,
            Outcome::Exit(code) => Some(*code),
        }
    }
}
