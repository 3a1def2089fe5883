/// Non-fatal diagnostics produced while preparing a solve.
///
/// Warnings travel in the result record so callers that don't install a
/// `tracing` subscriber still see them.
#[derive(Debug, Clone, Copy, PartialEq)]
#[non_exhaustive]
pub enum Warning {
    /// The requested tolerance was below 100·ε and was clamped.
    ToleranceClamped {
        /// What the caller asked for.
        requested: f64,
        /// What the solver actually used.
        used: f64,
    },
}

impl std::fmt::Display for Warning {
    #[mutants::skip]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Warning::ToleranceClamped { requested, used } => {
                write!(f, "tolerance {requested:.2e} is too low, using {used:.2e}")
            }
        }
    }
}
