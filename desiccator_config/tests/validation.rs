use desiccator_config::load_toml;
use rstest::rstest;

fn base() -> String {
    r#"
[sampling]
interval_ms = 1000
retry_delay_ms = 100
max_consecutive_failures = 5

[mass]
batch_size = 10
trim_low = 0.1
trim_high = 0.9
tare_samples = 25
read_retries = 3

[hardware]
sensor_read_timeout_ms = 150

[[cells]]
chamber = 1
side = "L"
data_pin = 5
clock_pin = 6

[[cells]]
chamber = 1
side = "R"
data_pin = 13
clock_pin = 19
gain = 64
"#
    .to_string()
}

#[test]
fn base_config_is_valid() {
    let cfg = load_toml(&base()).unwrap();
    cfg.validate().unwrap();
    assert_eq!(cfg.cells.len(), 2);
    assert_eq!(cfg.cells[1].gain, 64);
}

#[rstest]
#[case("interval_ms = 1000", "interval_ms = 0", "sampling.interval_ms")]
#[case("batch_size = 10", "batch_size = 0", "mass.batch_size")]
#[case("trim_low = 0.1", "trim_low = 0.95", "trim_low must be < mass.trim_high")]
#[case("trim_high = 0.9", "trim_high = 1.5", "mass.trim_high")]
#[case("tare_samples = 25", "tare_samples = 0", "mass.tare_samples")]
#[case("read_retries = 3", "read_retries = 0", "mass.read_retries")]
#[case("sensor_read_timeout_ms = 150", "sensor_read_timeout_ms = 0", "hardware.sensor_read_timeout_ms")]
#[case("chamber = 1\nside = \"L\"", "chamber = 5\nside = \"L\"", "chamber must be one of")]
#[case("side = \"L\"", "side = \"X\"", "side must be")]
#[case("gain = 64", "gain = 100", "gain must be one of")]
#[case("gain = 64", "gain = 32", "channel A supports gain")]
#[case("clock_pin = 6", "clock_pin = 5", "must differ")]
#[case("chamber = 1\nside = \"R\"", "chamber = 1\nside = \"l\"", "duplicate cell 1L")]
fn invalid_values_are_rejected(#[case] from: &str, #[case] to: &str, #[case] needle: &str) {
    let text = base().replacen(from, to, 1);
    assert_ne!(text, base(), "replacement {from:?} did not apply");
    let cfg = load_toml(&text).unwrap();
    let err = cfg.validate().expect_err("expected validation failure");
    let msg = format!("{err}");
    assert!(msg.contains(needle), "message {msg:?} lacks {needle:?}");
}

#[test]
fn unknown_rotation_is_rejected() {
    let text = format!("{}\n[logging]\nrotation = \"weekly\"\n", base());
    let cfg = load_toml(&text).unwrap();
    assert!(cfg.validate().is_err());
}

#[test]
fn channel_b_requires_gain_32() {
    let text = format!(
        "{}\n[[cells]]\nchamber = 3\nside = \"L\"\ndata_pin = 20\nclock_pin = 21\nchannel = \"B\"\n",
        base()
    );
    let cfg = load_toml(&text).unwrap();
    let err = cfg.validate().expect_err("gain 128 on channel B");
    assert!(format!("{err}").contains("channel B requires gain 32"));

    let text = text.replace("channel = \"B\"", "channel = \"B\"\ngain = 32");
    load_toml(&text).unwrap().validate().unwrap();
}
