//! Human-readable error descriptions and structured JSON error formatting.

use desiccator_core::error::CoreError;

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(ce) = err.downcast_ref::<CoreError>() {
        return match ce {
            CoreError::CalibrationMissing(id) => format!(
                "What happened: Load cell {id} is not calibrated.\nLikely causes: The calibration file is missing this cell or it was never calibrated.\nHow to fix: Run `desiccator calibrate --cell {id}` (or calibrate-csv), then start sampling again."
            ),
            CoreError::RetriesExhausted { attempts, last } => format!(
                "What happened: Sampling stopped after {attempts} consecutive failed reads (last: {last}).\nLikely causes: A load cell or the environmental sensors stopped responding.\nHow to fix: Check wiring and power, run `desiccator self-check`, or raise sampling.max_consecutive_failures."
            ),
            CoreError::SourceUnavailable { wanted, got } => format!(
                "What happened: A load cell delivered {got} of {wanted} samples.\nLikely causes: HX711 not wired correctly, no power/ground, or timeout too low.\nHow to fix: Verify DT/SCK pins and power, and consider increasing hardware.sensor_read_timeout_ms in the config."
            ),
            CoreError::CorruptPersistedState(msg) => format!(
                "What happened: The calibration file could not be parsed ({msg}).\nLikely causes: The file was edited by hand or truncated.\nHow to fix: Restore it from a backup or delete it and recalibrate the cells."
            ),
            CoreError::InvalidTopology(msg) => format!(
                "What happened: Invalid load cell placement ({msg}).\nLikely causes: A chamber outside 1..=4 or a side other than L/R.\nHow to fix: Fix the [[cells]] entries or the cell argument."
            ),
            CoreError::SlotOccupied(id) => format!(
                "What happened: Load cell {id} is defined twice.\nLikely causes: Duplicate [[cells]] entries.\nHow to fix: Keep one entry per chamber and side."
            ),
            CoreError::DegenerateCalibration(why) => format!(
                "What happened: The calibration points do not define a line ({why}).\nLikely causes: The mass was not placed on the cell, or every known mass was the same.\nHow to fix: Repeat the calibration with at least one non-zero known mass."
            ),
            CoreError::InsufficientCalibrationData { pairs } => format!(
                "What happened: Only {pairs} calibration point(s) were given.\nLikely causes: The CSV has fewer than two rows.\nHow to fix: Provide at least two (raw, mass) pairs."
            ),
            CoreError::OperatorInput(msg) => format!(
                "What happened: Calibration was aborted ({msg}).\nLikely causes: An answer other than y/yes/n/no, or a mass that is not a number.\nHow to fix: Run the calibration again; the previous coefficients were kept."
            ),
            // Fallback to generic for other domain errors
            other => format!(
                "What happened: {other}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    // String-based heuristics for errors coming from init or config
    let msg = err.to_string();
    let lower = format!("{err:#}").to_ascii_lowercase();

    if lower.contains("open hx711") || lower.contains("open gpio") {
        return "What happened: Failed to initialize hardware pins.\nLikely causes: Incorrect pin numbers or insufficient GPIO permissions.\nHow to fix: Fix the [[cells]] pin values in the config; ensure the process has permission to access GPIO.".to_string();
    }

    if lower.contains("read config") {
        return format!(
            "What happened: The config file could not be read ({msg}).\nLikely causes: Wrong --config path.\nHow to fix: Pass --config <FILE> or create etc/desiccator.toml."
        );
    }

    if lower.contains("invalid configuration") || lower.contains("parse config") {
        return format!(
            "What happened: Configuration is invalid or incomplete ({err:#}).\nLikely causes: Out-of-range values or a malformed [[cells]] entry.\nHow to fix: Edit the TOML config and try again."
        );
    }

    // Calibration CSV header special-case
    if lower.contains("calibration csv must have headers") {
        return "Invalid headers in calibration CSV. Expected 'raw,mass'.".to_string();
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable exit codes for the failures scripts care about; everything else is 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    match err.downcast_ref::<CoreError>() {
        Some(CoreError::RetriesExhausted { .. }) => 3,
        Some(CoreError::CalibrationMissing(_)) => 4,
        Some(CoreError::CorruptPersistedState(_)) => 5,
        Some(CoreError::OperatorInput(_)) => 6,
        _ => 1,
    }
}

fn reason_name(err: &eyre::Report) -> &'static str {
    match err.downcast_ref::<CoreError>() {
        Some(CoreError::RetriesExhausted { .. }) => "RetriesExhausted",
        Some(CoreError::CalibrationMissing(_)) => "CalibrationMissing",
        Some(CoreError::CorruptPersistedState(_)) => "CorruptPersistedState",
        Some(CoreError::OperatorInput(_)) => "OperatorInput",
        Some(_) => "SensorError",
        None => "Error",
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    let mut obj = json!({ "reason": reason_name(err), "message": humanize(err) });
    match err.downcast_ref::<CoreError>() {
        Some(CoreError::CalibrationMissing(id)) => {
            obj["details"] = json!({ "cell": id.to_string() });
        }
        Some(CoreError::RetriesExhausted { attempts, last }) => {
            obj["details"] = json!({ "attempts": attempts, "last": last });
        }
        _ => {}
    }
    obj.to_string()
}
