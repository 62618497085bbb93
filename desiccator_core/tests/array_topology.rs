use desiccator_core::mocks::{Answer, ScriptedOperator, ScriptedSource};
use desiccator_core::{
    CellId, CoreError, HardwareBinding, MassSensor, MassSensorArray, MeasureCfg, Side,
};
use std::sync::atomic::Ordering;

fn sensor(chamber: u8, side: Side, raw: i32) -> MassSensor<ScriptedSource> {
    MassSensor::new(
        ScriptedSource::constant(raw),
        HardwareBinding::new(chamber * 2, chamber * 2 + 1),
        CellId::new(chamber, side),
    )
}

fn unit(s: MassSensor<ScriptedSource>) -> MassSensor<ScriptedSource> {
    s.with_coefficients(Some(1.0), Some(0.0))
}

#[test]
fn occupied_slot_is_rejected() {
    let mut a = MassSensorArray::new();
    a.insert(sensor(2, Side::R, 0)).unwrap();
    assert_eq!(
        a.insert(sensor(2, Side::R, 0)),
        Err(CoreError::SlotOccupied(CellId::new(2, Side::R)))
    );
    assert_eq!(a.len(), 1);
}

#[test]
fn chamber_outside_rig_is_rejected() {
    let mut a = MassSensorArray::new();
    assert!(matches!(
        a.insert(sensor(5, Side::L, 0)),
        Err(CoreError::InvalidTopology(_))
    ));
    assert!(matches!(
        a.insert(sensor(0, Side::L, 0)),
        Err(CoreError::InvalidTopology(_))
    ));
    assert!(a.is_empty());
}

#[test]
fn measure_all_follows_array_order() {
    let a = MassSensorArray::from_sensors([
        unit(sensor(3, Side::R, 30)),
        unit(sensor(1, Side::R, 20)),
        unit(sensor(1, Side::L, 10)),
    ]);
    let mut a = a.unwrap();
    assert_eq!(
        a.ids(),
        vec![
            CellId::new(1, Side::L),
            CellId::new(1, Side::R),
            CellId::new(3, Side::R)
        ]
    );
    assert_eq!(a.measure_all().unwrap(), vec![10.0, 20.0, 30.0]);
}

#[test]
fn empty_array_measures_nothing() {
    let mut a: MassSensorArray<ScriptedSource> = MassSensorArray::new();
    assert_eq!(a.measure_all().unwrap(), Vec::<f64>::new());
}

#[test]
fn one_uncalibrated_cell_fails_whole_measurement() {
    let good = unit(sensor(1, Side::L, 10));
    let good_reads = good.source().read_counter();
    let bad = sensor(2, Side::L, 10);
    let mut a = MassSensorArray::from_sensors([good, bad]).unwrap();
    assert_eq!(
        a.measure_all(),
        Err(CoreError::CalibrationMissing(CellId::new(2, Side::L)))
    );
    assert_eq!(good_reads.load(Ordering::Relaxed), 0);
    assert_eq!(a.uncalibrated(), vec![CellId::new(2, Side::L)]);
}

#[test]
fn tare_all_tares_every_cell() {
    let mut a =
        MassSensorArray::from_sensors([sensor(1, Side::L, 100), sensor(4, Side::R, 400)]).unwrap();
    let offsets = a.tare_all(5).unwrap();
    assert_eq!(
        offsets,
        vec![
            (CellId::new(1, Side::L), 100.0),
            (CellId::new(4, Side::R), 400.0)
        ]
    );
    assert_eq!(a.get(CellId::new(4, Side::R)).unwrap().tare_offset(), 400.0);
}

#[test]
fn calibrate_all_skips_unconfirmed_cells() {
    let left = sensor(1, Side::L, 0);
    let right = MassSensor::new(
        ScriptedSource::batches([vec![1_000; 10], vec![2_000; 10]]),
        HardwareBinding::new(7, 8),
        CellId::new(1, Side::R),
    );
    let mut a = MassSensorArray::from_sensors([left, right]).unwrap();
    let mut op = ScriptedOperator::new([
        Answer::Confirm(false),
        Answer::Confirm(true),
        Answer::Ready,
        Answer::Mass(50.0),
        Answer::Another(false),
    ]);
    let fitted = a.calibrate_all(&mut op).unwrap();
    assert_eq!(fitted.len(), 1);
    assert_eq!(fitted[0].0, CellId::new(1, Side::R));
    assert!((fitted[0].1.slope - 0.05).abs() < 1e-12);
    assert_eq!(a.uncalibrated(), vec![CellId::new(1, Side::L)]);
}

#[test]
fn measure_cfg_applies_to_every_cell() {
    let mut a =
        MassSensorArray::from_sensors([sensor(1, Side::L, 1), sensor(2, Side::R, 2)]).unwrap();
    let cfg = MeasureCfg {
        batch_size: 4,
        ..MeasureCfg::default()
    };
    a.set_measure_cfg(&cfg);
    assert!(a.iter().all(|s| s.measure_cfg().batch_size == 4));
}
