use quickapi_model::{resolve_preloads, PreloadRegistry, PreloadSource, PreloadSpec, ALWAYS_TRUE};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::collections::BTreeMap;

fn registry() -> PreloadRegistry {
    PreloadRegistry::new()
        .alias(
            "status",
            "pets",
            PreloadSpec::when("alive = ?").with_converter(|s| Value::Bool(s.parse().unwrap_or(false))),
        )
        .alias("naming", "pets", PreloadSpec::when("name = ?"))
        .alias("plain", "pets", PreloadSpec::always())
        .alias("everything", "pets", PreloadSpec::always())
        .alias("everything", "toys", PreloadSpec::always())
}

fn aliases(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

// ── PreloadSpec defaults ───────────────────────────────────────────

#[test]
fn empty_condition_becomes_always_true() {
    assert_eq!(PreloadSpec::always().effective_condition(), ALWAYS_TRUE);
    assert_eq!(PreloadSpec::when("   ").effective_condition(), ALWAYS_TRUE);
    assert_eq!(PreloadSpec::when("a = ?").effective_condition(), "a = ?");
}

#[test]
fn missing_converter_passes_string_through() {
    assert_eq!(PreloadSpec::always().convert("true"), json!("true"));
}

#[test]
fn converter_is_applied() {
    let spec = PreloadSpec::when("n = ?").with_converter(|s| json!(s.len()));
    assert_eq!(spec.convert("abcd"), json!(4));
}

// ── Resolution ───────────────────────────────────────────────────

#[test]
fn no_capability_resolves_nothing() {
    assert!(resolve_preloads(None, &aliases(&[("status", "true")])).is_empty());
}

#[test]
fn unknown_alias_resolves_nothing() {
    let reg = registry();
    let preloads = resolve_preloads(Some(&reg), &aliases(&[("nope", "1")]));
    assert!(preloads.is_empty());
}

#[test]
fn conditional_preload_binds_converted_value() {
    let reg = registry();
    let preloads = resolve_preloads(Some(&reg), &aliases(&[("status", "true")]));
    assert_eq!(preloads.len(), 1);
    assert_eq!(preloads[0].relation, "pets");
    assert_eq!(preloads[0].condition, "alive = ?");
    assert_eq!(preloads[0].params, vec![json!(true)]);
}

#[test]
fn string_preload_binds_raw_value() {
    let reg = registry();
    let preloads = resolve_preloads(Some(&reg), &aliases(&[("naming", "Rex")]));
    assert_eq!(preloads[0].params, vec![json!("Rex")]);
}

#[test]
fn unconditional_preload_binds_nothing() {
    let reg = registry();
    let preloads = resolve_preloads(Some(&reg), &aliases(&[("plain", "")]));
    assert_eq!(preloads[0].condition, ALWAYS_TRUE);
    assert!(preloads[0].params.is_empty());
}

#[test]
fn one_alias_configures_several_relations() {
    let reg = registry();
    let preloads = resolve_preloads(Some(&reg), &aliases(&[("everything", "")]));
    let relations: Vec<&str> = preloads.iter().map(|p| p.relation.as_str()).collect();
    assert_eq!(relations, vec!["pets", "toys"]);
}

#[test]
fn repeated_placeholders_repeat_value() {
    let reg = PreloadRegistry::new().alias("span", "pets", PreloadSpec::when("age > ? OR age = ?"));
    let preloads = resolve_preloads(Some(&reg), &aliases(&[("span", "3")]));
    assert_eq!(preloads[0].params, vec![json!("3"), json!("3")]);
}

#[test]
fn closure_delegate_is_a_source() {
    let delegate = |alias: &str| -> Option<BTreeMap<String, PreloadSpec>> {
        (alias == "all").then(|| BTreeMap::from([("pets".to_string(), PreloadSpec::always())]))
    };
    assert!(delegate.preload("all").is_some());
    assert!(delegate.preload("none").is_none());

    let preloads = resolve_preloads(Some(&delegate), &aliases(&[("all", "")]));
    assert_eq!(preloads.len(), 1);
}

#[test]
fn registry_len() {
    let reg = registry();
    assert_eq!(reg.len(), 4);
    assert!(!reg.is_empty());
    assert!(PreloadRegistry::new().is_empty());
}
