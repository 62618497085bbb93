use std::fs::File;
use std::io::Write;

use desiccator_config::{CalibrationRow, load_calibration_csv};
use rstest::rstest;
use tempfile::tempdir;

fn write_csv(contents: &str) -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("calib.csv");
    let mut f = File::create(&path).unwrap();
    f.write_all(contents.as_bytes()).unwrap();
    (dir, path)
}

#[rstest]
fn loads_rows_in_file_order() {
    let (_dir, path) = write_csv("raw,mass\n842913.5,0\n852913.5,100\n862913.5, 200\n");
    let rows = load_calibration_csv(&path).unwrap();
    assert_eq!(
        rows,
        vec![
            CalibrationRow { raw: 842913.5, mass: 0.0 },
            CalibrationRow { raw: 852913.5, mass: 100.0 },
            CalibrationRow { raw: 862913.5, mass: 200.0 },
        ]
    );
}

#[rstest]
#[case("grams,raw\n1,2\n")]
#[case("raw,grams\n1,2\n")]
#[case("raw\n1\n")]
fn rejects_wrong_headers(#[case] contents: &str) {
    let (_dir, path) = write_csv(contents);
    let err = load_calibration_csv(&path).expect_err("headers should be rejected");
    assert!(format!("{err}").contains("must have headers 'raw,mass'"));
}

#[rstest]
fn reports_bad_row_with_line_number() {
    let (_dir, path) = write_csv("raw,mass\n100,0\nabc,10\n");
    let err = load_calibration_csv(&path).expect_err("non-numeric row");
    assert!(format!("{err}").contains("invalid CSV row 3"));
}

#[rstest]
fn missing_file_is_an_error() {
    let dir = tempdir().unwrap();
    let err = load_calibration_csv(&dir.path().join("nope.csv")).expect_err("missing");
    assert!(format!("{err}").contains("open calibration CSV"));
}
