use quickcheck::{Arbitrary, Gen};
use quickcheck_macros::quickcheck;
use resource_manager::{Config, PathAddress};
use serde_json::{json, Value};

const KEYS: &[&str] = &["alpha", "beta", "gamma", "items", "nested", "x"];

/// A well-formed address under the `custom` namespace
#[derive(Debug, Clone)]
struct Address(String);

impl Arbitrary for Address {
    fn arbitrary(g: &mut Gen) -> Self {
        let depth = 1 + usize::arbitrary(g) % 4;
        let mut segments = vec!["custom".to_string()];
        for _ in 0..depth {
            let key = g.choose(KEYS).copied().unwrap_or("x");
            if bool::arbitrary(g) {
                segments.push(format!("{}[{}]", key, usize::arbitrary(g) % 4));
            } else {
                segments.push(key.to_string());
            }
        }
        Address(segments.join("."))
    }
}

/// A JSON scalar
#[derive(Debug, Clone)]
struct Scalar(Value);

impl Arbitrary for Scalar {
    fn arbitrary(g: &mut Gen) -> Self {
        let value = match u8::arbitrary(g) % 4 {
            0 => Value::Bool(bool::arbitrary(g)),
            1 => json!(i32::arbitrary(g)),
            2 => Value::String(String::arbitrary(g)),
            _ => Value::Null,
        };
        Scalar(value)
    }
}

#[quickcheck]
fn set_then_get_round_trips(address: Address, value: Scalar) -> bool {
    let mut config = Config::default();
    config.set(&address.0, value.0.clone()).unwrap();
    config.get(&address.0) == Some(&value.0)
}

#[quickcheck]
fn repeated_set_is_idempotent(address: Address, value: Scalar) -> bool {
    let mut config = Config::default();
    config.set(&address.0, value.0.clone()).unwrap();
    let once = config.as_value().clone();
    config.set(&address.0, value.0).unwrap();
    config.as_value() == &once
}

#[quickcheck]
fn parse_display_round_trips(address: Address) -> bool {
    PathAddress::parse(&address.0)
        .map(|parsed| parsed.to_string() == address.0)
        .unwrap_or(false)
}

#[quickcheck]
fn get_never_fails(raw: String) -> bool {
    let config = Config::default();
    // Any input, well-formed or not, simply misses
    config.get(&raw).is_none() || PathAddress::parse(&raw).is_ok()
}

#[test]
fn providers_are_normalised_when_missing() {
    let config = Config::new(json!({})).unwrap();
    assert_eq!(config.get("providers.github"), Some(&json!([])));
    assert_eq!(config.get("providers.local"), Some(&json!([])));
}

#[test]
fn shipped_example_config_is_valid() {
    let data: Value = serde_json::from_str(include_str!("../config.example.json")).unwrap();
    let config = Config::new(data).unwrap();
    assert_eq!(config.github_entries()[0].target_dir.as_deref(), Some("./prompts"));
    assert_eq!(config.local_entries()[0].name, "shared");
}
