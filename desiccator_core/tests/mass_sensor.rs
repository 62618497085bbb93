use desiccator_core::mocks::{Answer, ScriptedOperator, ScriptedSource};
use desiccator_core::{CellId, CoreError, HardwareBinding, MassSensor, MeasureCfg, Side};
use rstest::rstest;
use std::sync::atomic::Ordering;

fn cell(source: ScriptedSource) -> MassSensor<ScriptedSource> {
    MassSensor::new(source, HardwareBinding::new(5, 6), CellId::new(1, Side::L))
}

#[test]
fn tare_is_plain_mean_of_requested_samples() {
    let src = ScriptedSource::batches([vec![990, 1_010, 1_000, 1_000]]);
    let mut s = cell(src);
    let offset = s.tare(4).unwrap();
    assert_eq!(offset, 1_000.0);
    assert_eq!(s.tare_offset(), 1_000.0);
}

#[test]
fn measure_raw_rejects_spike() {
    let batch = vec![100, 101, 99, 100, 102, 98, 100, 101, 99, 60_000];
    let mut s = cell(ScriptedSource::batches([batch]));
    let v = s.measure_raw().unwrap();
    assert!((v - 100.0).abs() < 1.0, "got {v}");
}

#[test]
fn short_batches_are_topped_up() {
    let src = ScriptedSource::batches([vec![7; 4], vec![7; 6]]);
    let reads = src.read_counter();
    let mut s = cell(src);
    assert_eq!(s.measure_raw().unwrap(), 7.0);
    assert_eq!(reads.load(Ordering::Relaxed), 2);
}

#[test]
fn starved_source_is_unavailable_after_retries() {
    let src = ScriptedSource::batches([vec![1; 3]]);
    let reads = src.read_counter();
    let mut s = cell(src);
    assert_eq!(
        s.measure_raw(),
        Err(CoreError::SourceUnavailable { wanted: 10, got: 3 })
    );
    assert_eq!(reads.load(Ordering::Relaxed), 3);
}

#[test]
fn failing_source_reports_hardware_fault() {
    let src = ScriptedSource::batches(Vec::<Vec<i32>>::new()).then_fail("bus fault");
    let mut s = cell(src);
    assert_eq!(s.measure_raw(), Err(CoreError::Hardware("bus fault".into())));
}

#[test]
fn custom_batch_size_is_honoured() {
    let src = ScriptedSource::constant(42);
    let mut s = cell(src).with_measure_cfg(MeasureCfg {
        batch_size: 3,
        ..MeasureCfg::default()
    });
    assert_eq!(s.measure_raw().unwrap(), 42.0);
}

#[test]
fn uncalibrated_mass_fails_without_reading() {
    let src = ScriptedSource::constant(1);
    let reads = src.read_counter();
    let mut s = cell(src);
    assert_eq!(
        s.measure_mass(),
        Err(CoreError::CalibrationMissing(CellId::new(1, Side::L)))
    );
    assert_eq!(reads.load(Ordering::Relaxed), 0);
}

#[test]
fn half_calibrated_cell_is_uncalibrated() {
    let s = cell(ScriptedSource::constant(1)).with_coefficients(Some(2.0), None);
    assert!(!s.is_calibrated());
    assert_eq!(s.slope(), Some(2.0));
}

#[test]
fn calibrate_fits_line_and_measures() {
    // grams = (raw - 1000) / 420
    let src = ScriptedSource::batches([
        vec![1_000; 10],
        vec![43_000; 10],
        vec![85_000; 10],
        vec![64_000; 10],
    ]);
    let mut s = cell(src);
    let mut op = ScriptedOperator::for_masses(&[100.0, 200.0]);
    let fit = s.calibrate(&mut op).unwrap();
    assert!((fit.slope - 1.0 / 420.0).abs() < 1e-12);
    assert!((fit.intercept + 1_000.0 / 420.0).abs() < 1e-9);
    assert_eq!(op.remaining(), 0);
    assert_eq!(op.samples.len(), 3);
    assert_eq!(op.samples[0].1.known_mass, 0.0);

    let grams = s.measure_mass().unwrap();
    assert!((grams - 150.0).abs() < 1e-9, "got {grams}");
}

#[test]
fn operator_abort_keeps_previous_coefficients() {
    let src = ScriptedSource::constant(500);
    let mut s = cell(src).with_coefficients(Some(1.0), Some(0.0));
    let mut op = ScriptedOperator::new([Answer::Ready, Answer::Fail("stdin closed".into())]);
    assert_eq!(
        s.calibrate(&mut op),
        Err(CoreError::OperatorInput("stdin closed".into()))
    );
    assert_eq!((s.slope(), s.intercept()), (Some(1.0), Some(0.0)));
}

#[rstest]
#[case(-5.0)]
#[case(f64::NAN)]
#[case(f64::INFINITY)]
fn invalid_known_mass_is_rejected(#[case] mass: f64) {
    let mut s = cell(ScriptedSource::constant(500));
    let mut op = ScriptedOperator::new([Answer::Ready, Answer::Mass(mass)]);
    assert!(matches!(s.calibrate(&mut op), Err(CoreError::OperatorInput(_))));
    assert!(!s.is_calibrated());
}

#[test]
fn unchanged_reading_is_degenerate() {
    let mut s = cell(ScriptedSource::constant(500));
    let mut op = ScriptedOperator::for_masses(&[100.0]);
    assert!(matches!(
        s.calibrate(&mut op),
        Err(CoreError::DegenerateCalibration(_))
    ));
    assert!(!s.is_calibrated());
}
