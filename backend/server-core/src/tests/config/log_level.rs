use crate::config::LogLevel;

use std::str::FromStr;

use log::LevelFilter;

/// **VALUE**: A typo in the logging level must not make the whole config unloadable.
///
/// **BUG THIS CATCHES**: Would catch `FromStr` returning an error or a different
/// default for unknown names.
#[test]
fn given_unknown_level_name_when_parsed_then_falls_back_to_info() {
    // GIVEN / WHEN: An unknown level name
    let Ok(level) = LogLevel::from_str("verbose");

    // THEN: Defaults to info
    assert_eq!(*level, LevelFilter::Info);
}

/// **VALUE**: Level names in hand-edited config files are not case-sensitive.
#[test]
fn given_mixed_case_names_when_parsed_then_maps_each_level() {
    let cases = [
        ("OFF", LevelFilter::Off),
        ("Error", LevelFilter::Error),
        ("warn", LevelFilter::Warn),
        (" debug ", LevelFilter::Debug),
        ("TRACE", LevelFilter::Trace),
    ];

    for (name, expected) in cases {
        let Ok(level) = LogLevel::from_str(name);
        assert_eq!(level.0, expected, "level name {name:?}");
    }
}

/// **VALUE**: Saved configs must load back to the same level.
///
/// **BUG THIS CATCHES**: Would catch serializing the uppercase `LevelFilter` name
/// in a form the deserializer does not map back.
#[test]
fn given_level_when_serialized_then_writes_lowercase_name() {
    // GIVEN: Debug level
    let level = LogLevel(LevelFilter::Debug);

    // WHEN: Serializing
    let json = serde_json::to_string(&level).unwrap();

    // THEN: Lowercase string that parses back
    assert_eq!(json, "\"debug\"");
    let back: LogLevel = serde_json::from_str(&json).unwrap();
    assert_eq!(back, level);
}
