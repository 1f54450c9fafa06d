//! Release build settings.

#[test]
fn cargo_toml_has_release_profile() {
    let cargo_toml = include_str!("../Cargo.toml");
    assert!(
        cargo_toml.contains("[profile.release]"),
        "Cargo.toml must have a [profile.release] section"
    );
    assert!(
        cargo_toml.contains("lto = true"),
        "Release profile must enable LTO"
    );
    assert!(
        cargo_toml.contains("strip = true"),
        "Release profile must strip symbols"
    );
    assert!(
        cargo_toml.contains("codegen-units = 1"),
        "Release profile must use single codegen unit"
    );
}

#[test]
fn binary_name_matches_package() {
    let cargo_toml = include_str!("../Cargo.toml");
    assert!(cargo_toml.contains("name = \"etag-cache\""));
    assert!(cargo_toml.contains("path = \"src/main.rs\""));
}
