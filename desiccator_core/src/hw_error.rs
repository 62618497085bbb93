//! Maps `Box<dyn Error>` from trait boundaries to typed `CoreError`.
//!
//! The traits in `desiccator_traits` use `Box<dyn Error + Send + Sync>` so any
//! driver can plug in; this module converts those to our typed error enum, with
//! an optional feature-gated path for `desiccator_hardware::HwError` downcasting.

use crate::error::CoreError;

/// Map a raw-source error to a typed `CoreError`.
///
/// `wanted`/`got` describe the batch being collected when the error occurred.
/// Timeouts become `SourceUnavailable`; everything else is a hardware fault.
pub fn map_source_error(
    e: &(dyn std::error::Error + 'static),
    wanted: usize,
    got: usize,
) -> CoreError {
    #[cfg(feature = "hardware-errors")]
    {
        if let Some(hw) = e.downcast_ref::<desiccator_hardware::error::HwError>() {
            return match hw {
                desiccator_hardware::error::HwError::DataReadyTimeout => {
                    CoreError::SourceUnavailable { wanted, got }
                }
                other => CoreError::Hardware(other.to_string()),
            };
        }
    }

    // Fallback: string-based detection
    let s = e.to_string();
    if s.to_lowercase().contains("timeout") {
        CoreError::SourceUnavailable { wanted, got }
    } else {
        CoreError::Hardware(s)
    }
}
