use std::fs;
use wiretest_test_support as _;

fn section_has_dep(table: &toml::value::Table, section: &str, name: &str) -> bool {
    table
        .get(section)
        .and_then(toml::Value::as_table)
        .map(|deps| deps.contains_key(name))
        .unwrap_or(false)
}

fn has_publish_dependency(value: &toml::Value, name: &str) -> bool {
    let table = match value.as_table() {
        Some(table) => table,
        None => return false,
    };

    if section_has_dep(table, "dependencies", name)
        || section_has_dep(table, "build-dependencies", name)
    {
        return true;
    }

    let target = match table.get("target").and_then(toml::Value::as_table) {
        Some(target) => target,
        None => return false,
    };

    target.values().any(|target_value| {
        target_value
            .as_table()
            .map(|target_table| {
                section_has_dep(target_table, "dependencies", name)
                    || section_has_dep(target_table, "build-dependencies", name)
            })
            .unwrap_or(false)
    })
}

#[test]
fn wiretest_manifest_has_no_test_support_publish_dependency() {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    let manifest_path = format!("{manifest_dir}/Cargo.toml");
    let manifest = fs::read_to_string(&manifest_path).expect("read Cargo.toml");
    let manifest = manifest.parse::<toml::Value>().expect("parse Cargo.toml");

    assert!(
        !has_publish_dependency(&manifest, "wiretest-test-support"),
        "wiretest-test-support must not appear in publish dependencies"
    );
}
