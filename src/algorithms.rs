use std::fmt;

pub(crate) mod coarsening;
pub(crate) mod fm;
pub(crate) mod guess;
pub(crate) mod matching;
pub(crate) mod napsack;
pub(crate) mod qp;
pub(crate) mod waterdance;

/// Common errors thrown by the partitioner.
#[derive(Clone, Copy, Debug)]
#[non_exhaustive]
pub enum Error {
    /// The input graph violates the CSR contract (asymmetry, self-loops,
    /// non-positive weights, disconnection, or malformed pointers).
    InvalidInput(&'static str),

    /// An option is out of range or the option set is contradictory.
    InvalidOption(&'static str),

    /// A work-buffer allocation failed.
    OutOfMemory,

    /// The projected-gradient line search or the knapsack projection left
    /// the feasible region.
    NumericFailure(&'static str),

    /// A heap or partition invariant was found inconsistent. This indicates
    /// a bug in the refinement bookkeeping, not a problem with the input.
    InternalInvariantBroken(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidInput(why) => write!(f, "invalid input graph: {why}"),
            Error::InvalidOption(why) => write!(f, "invalid option: {why}"),
            Error::OutOfMemory => write!(f, "work-buffer allocation failed"),
            Error::NumericFailure(why) => write!(f, "numeric failure: {why}"),
            Error::InternalInvariantBroken(why) => {
                write!(f, "internal invariant broken: {why}")
            }
        }
    }
}

impl std::error::Error for Error {}
