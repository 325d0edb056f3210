use thiserror::Error;

/// Every way a run can stop, expected or not.
///
/// Happy endings are regular termination, bad endings indicate a bookkeeping
/// or numerical failure, and the remaining variants cover resource limits and
/// malformed inputs. Each variant carries a free-form detail string.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Finished {
    #[error("Time is up -> {0}")]
    TimesUp(String),
    #[error("No more reactions can be processed -> {0}")]
    NoMore(String),
    #[error("No reaction could be found -> {0}")]
    NotFound(String),
    #[error("Rounding problem/negative probability detected -> {0}")]
    RoundError(String),
    #[error("Tried to decrement unpopulated species -> {0}")]
    DecrZero(String),
    #[error("Runtime limit exceeded -> {0}")]
    RuntimeLim(String),
    #[error("The provided file was not found -> {0}")]
    FileNotFound(String),
    #[error("The provided file is badly formed -> {0}")]
    BadFile(String),
    #[error("Run interrupted -> {0}")]
    Interrupted(String),
}

impl Finished {
    /// The numeric code written to the ending record.
    pub fn num(&self) -> u8 {
        match self {
            Finished::TimesUp(_) => 0,
            Finished::NoMore(_) => 1,
            Finished::NotFound(_) => 2,
            Finished::RoundError(_) => 3,
            Finished::DecrZero(_) => 4,
            Finished::RuntimeLim(_) => 5,
            Finished::FileNotFound(_) => 6,
            Finished::BadFile(_) => 7,
            Finished::Interrupted(_) => 8,
        }
    }

    /// Regular termination: the simulation ran to completion.
    pub fn is_happy(&self) -> bool {
        matches!(self, Finished::TimesUp(_) | Finished::NoMore(_))
    }

    /// Termination caused by inconsistent bookkeeping or numerical drift.
    pub fn is_bad(&self) -> bool {
        matches!(
            self,
            Finished::NotFound(_) | Finished::RoundError(_) | Finished::DecrZero(_)
        )
    }

    pub fn detail(&self) -> &str {
        match self {
            Finished::TimesUp(d)
            | Finished::NoMore(d)
            | Finished::NotFound(d)
            | Finished::RoundError(d)
            | Finished::DecrZero(d)
            | Finished::RuntimeLim(d)
            | Finished::FileNotFound(d)
            | Finished::BadFile(d)
            | Finished::Interrupted(d) => d,
        }
    }
}
