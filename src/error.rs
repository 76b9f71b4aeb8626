use thiserror::Error;

/// Crate-wide result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy for the simulation core.
///
/// Stale events are *not* errors: the scheduler consumes and discards them
/// silently in the hot loop. Everything below is either a boundary failure
/// (config, I/O) or a genuine defect in the physical state.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed configuration: bad XML structure, missing required
    /// attribute, unknown type string. Fatal at initialise.
    #[error("configuration error: {0}")]
    Config(String),

    /// Broken physical state: negative event time beyond tolerance,
    /// overlap beyond the core, NaN velocity. The message carries the
    /// event count, system time and offending particle data.
    #[error("physical error: {0}")]
    Physical(String),

    /// Bucket arithmetic in the event sorter produced a non-finite index.
    /// The scheduler rebuilds the sorter with a widened window once; a
    /// recurrence is fatal.
    #[error("sorter overflow: {0}")]
    SorterOverflow(String),

    /// A popped event was predicted in the past beyond tolerance while its
    /// counters were still current.
    #[error("prediction miss: {0}")]
    PredictionMiss(String),

    /// Invalid user or API parameter.
    #[error("invalid parameter: {0}")]
    InvalidParam(String),

    /// Propagated I/O errors at the configuration boundary.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Propagated XML errors at the configuration boundary.
    #[error(transparent)]
    Xml(#[from] quick_xml::Error),
}
