// Integration tests for board configuration loading and derived counts.

use duino_rs::config::{BoardConfig, BoardConfigError, load_board_config};
use std::io::Write;

#[test]
fn default_config_is_an_uno() {
    let config = BoardConfig::default();
    assert_eq!(config.name, "Arduino Uno");
    assert_eq!(config.digital_pins, 14);
    assert_eq!(config.analog_pins, 6);
    assert_eq!(config.total_pins, 20);
    assert_eq!(config.analog_input_pins, vec![14, 15, 16, 17, 18, 19]);
    assert_eq!(config.pin_index("A0"), Some(14));
    assert_eq!(config.pin_index("LED_BUILTIN"), Some(13));
    assert!(config.is_pwm_pin(3));
    assert!(!config.is_pwm_pin(4));
}

#[test]
fn derived_counts_come_from_the_pin_mapping() {
    let mut config = BoardConfig::default();
    config.pin_mapping.insert("A6".to_string(), 20);
    config.pin_mapping.insert("A7".to_string(), 21);
    config.finalize();
    assert_eq!(config.digital_pins, 14);
    assert_eq!(config.analog_pins, 8);
    assert_eq!(config.total_pins, 22);
}

#[test]
fn mapping_without_analog_pins_falls_back_to_20_digital() {
    let mut config = BoardConfig::default();
    config.pin_mapping.clear();
    config.pin_mapping.insert("LED_BUILTIN".to_string(), 13);
    config.finalize();
    assert_eq!(config.digital_pins, 20);
    assert_eq!(config.analog_pins, 0);
    assert_eq!(config.total_pins, 20);
}

#[test]
fn loads_a_board_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
name = "Arduino Nano"
pwm_pins = [3, 5, 6, 9, 10, 11]
analog_only_pins = [20, 21]

[pin_mapping]
A0 = 14
A1 = 15
A6 = 20
A7 = 21
LED_BUILTIN = 13
"#
    )
    .unwrap();

    let config = load_board_config(file.path().to_str().unwrap()).unwrap();
    assert_eq!(config.name, "Arduino Nano");
    assert_eq!(config.digital_pins, 14);
    assert_eq!(config.analog_pins, 4);
    assert_eq!(config.total_pins, 22);
    assert!(config.is_analog_only(20));
    assert!(!config.is_analog_only(14));
}

#[test]
fn partial_board_file_uses_uno_defaults() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, r#"name = "Custom Board""#).unwrap();

    let config = load_board_config(file.path().to_str().unwrap()).unwrap();
    assert_eq!(config.name, "Custom Board");
    // The default pin mapping still derives Uno counts.
    assert_eq!(config.total_pins, 20);
    assert_eq!(config.pwm_pins, vec![3, 5, 6, 9, 10, 11]);
}

#[test]
fn missing_file_is_an_io_error() {
    let err = load_board_config("/nonexistent/board.toml").unwrap_err();
    assert!(matches!(err, BoardConfigError::Io(_)));
}

#[test]
fn malformed_toml_is_a_parse_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "name = [not toml").unwrap();

    let err = load_board_config(file.path().to_str().unwrap()).unwrap_err();
    assert!(matches!(err, BoardConfigError::Toml(_)));
}
