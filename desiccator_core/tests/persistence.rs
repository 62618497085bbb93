use desiccator_core::mocks::ScriptedSource;
use desiccator_core::{
    CellId, Channel, CoreError, HardwareBinding, MassSensor, MassSensorArray, Result, Side,
};

fn scripted(_: CellId, _: &HardwareBinding) -> Result<ScriptedSource> {
    Ok(ScriptedSource::constant(0))
}

fn sample_array() -> MassSensorArray<ScriptedSource> {
    let a = MassSensor::new(
        ScriptedSource::constant(0),
        HardwareBinding::new(5, 6),
        CellId::new(1, Side::L),
    )
    .with_coefficients(Some(0.002_380_952_380_952_381), Some(-2_006.935_714_285_714_3));
    let b = MassSensor::new(
        ScriptedSource::constant(0),
        HardwareBinding {
            data_pin: 13,
            clock_pin: 19,
            gain: 32,
            channel: Channel::B,
        },
        CellId::new(1, Side::R),
    );
    let c = MassSensor::new(
        ScriptedSource::constant(0),
        HardwareBinding::new(20, 21),
        CellId::new(3, Side::R),
    )
    .with_coefficients(Some(0.1 + 0.2), Some(1e-300));
    MassSensorArray::from_sensors([c, b, a]).unwrap()
}

#[test]
fn round_trip_preserves_everything() {
    let original = sample_array();
    let text = original.serialize();
    let restored = MassSensorArray::deserialize(&text, scripted).unwrap();

    assert_eq!(restored.ids(), original.ids());
    for (x, y) in original.iter().zip(restored.iter()) {
        assert_eq!(x.binding(), y.binding());
        assert_eq!(x.slope().map(f64::to_bits), y.slope().map(f64::to_bits));
        assert_eq!(x.intercept().map(f64::to_bits), y.intercept().map(f64::to_bits));
    }
    assert!(!restored.get(CellId::new(1, Side::R)).unwrap().is_calibrated());
    assert_eq!(restored.serialize(), text);
}

#[test]
fn serialized_form_is_one_record_per_cell() {
    let text = sample_array().serialize();
    assert!(text.starts_with("5,6,128,A,1L,"));
    assert!(text.contains("|13,19,32,B,1R,None,None|"));
    assert!(text.ends_with('|'));
    assert_eq!(text.matches('|').count(), 3);
}

#[test]
fn factory_sees_each_binding() {
    let text = sample_array().serialize();
    let mut seen = Vec::new();
    MassSensorArray::deserialize(&text, |id, b| {
        seen.push((id, b.data_pin));
        Ok(ScriptedSource::constant(0))
    })
    .unwrap();
    assert_eq!(
        seen,
        vec![
            (CellId::new(1, Side::L), 5),
            (CellId::new(1, Side::R), 13),
            (CellId::new(3, Side::R), 20)
        ]
    );
}

#[test]
fn factory_error_aborts_load() {
    let text = sample_array().serialize();
    let err = MassSensorArray::deserialize(&text, |_, _| -> Result<ScriptedSource> {
        Err(CoreError::Hardware("gpio busy".into()))
    })
    .unwrap_err();
    assert_eq!(err, CoreError::Hardware("gpio busy".into()));
}

#[test]
fn save_and_load_through_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache").join("load_cells.txt");
    let original = sample_array();
    original.save(&path).unwrap();

    let on_disk = std::fs::read_to_string(&path).unwrap();
    assert_eq!(on_disk, original.serialize());
    assert!(!path.with_extension("new").exists());

    let loaded = MassSensorArray::load(&path, scripted).unwrap();
    assert_eq!(loaded.serialize(), on_disk);
}

#[test]
fn save_replaces_previous_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("load_cells.txt");
    std::fs::write(&path, "stale").unwrap();
    let empty: MassSensorArray<ScriptedSource> = MassSensorArray::new();
    empty.save(&path).unwrap();
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    assert!(MassSensorArray::load(&path, scripted).unwrap().is_empty());
}

#[test]
fn missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = MassSensorArray::load(&dir.path().join("absent.txt"), scripted).unwrap_err();
    assert!(matches!(err, CoreError::Io(_)));
}

#[test]
fn corrupt_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("load_cells.txt");
    std::fs::write(&path, "5,6,128,A,1L,None,None|5,6,128,A,9L,None,None|").unwrap();
    let err = MassSensorArray::load(&path, scripted).unwrap_err();
    assert!(matches!(err, CoreError::CorruptPersistedState(_)));
}
