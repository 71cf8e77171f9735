use thicket_tree::ModelError;

/// Errors from conformal calibration and prediction.
#[derive(Debug, thiserror::Error)]
pub enum ConformalError {
    /// Returned when prediction is attempted before calibration.
    #[error("classifier has not been calibrated")]
    NotCalibrated,

    /// Returned when a significance level falls outside `[0, 1]`.
    #[error("significance must be in [0, 1], got {significance}")]
    InvalidSignificance {
        /// The invalid significance level provided.
        significance: f64,
    },

    /// Returned when the calibration set is empty.
    #[error("calibration set has zero samples")]
    EmptyCalibrationSet,

    /// Returned when a calibration label exceeds the model's class domain.
    #[error(
        "calibration label {label} at sample {sample_index} exceeds class domain of size {n_classes}"
    )]
    CalibrationLabelOutOfRange {
        /// The offending label value.
        label: usize,
        /// The model's class domain size.
        n_classes: usize,
        /// The zero-based index of the offending calibration sample.
        sample_index: usize,
    },

    /// An error from the underlying model.
    #[error(transparent)]
    Model(#[from] ModelError),
}
