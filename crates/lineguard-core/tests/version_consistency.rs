//! Every workspace member inherits the workspace version, and path
//! dependencies between lineguard crates go through `[workspace.dependencies]`.

use std::path::{Path, PathBuf};

fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .ancestors()
        .nth(2)
        .expect("crate lives two levels below the workspace root")
        .to_path_buf()
}

fn read_toml(path: &Path) -> toml::Value {
    let text = std::fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("read {}: {e}", path.display()));
    text.parse()
        .unwrap_or_else(|e| panic!("parse {}: {e}", path.display()))
}

fn root_manifest() -> toml::Value {
    read_toml(&workspace_root().join("Cargo.toml"))
}

fn members() -> Vec<String> {
    root_manifest()["workspace"]["members"]
        .as_array()
        .expect("workspace.members is an array")
        .iter()
        .map(|m| m.as_str().expect("member is a string").to_string())
        .collect()
}

fn inherits_workspace(value: Option<&toml::Value>) -> bool {
    value
        .and_then(|v| v.as_table())
        .and_then(|t| t.get("workspace"))
        .and_then(|v| v.as_bool())
        == Some(true)
}

#[test]
fn workspace_lists_every_lineguard_crate() {
    let members = members();
    for expected in [
        "crates/lineguard-core",
        "crates/lineguard-state",
        "crates/lineguard-cli",
        "crates/lineguardd",
    ] {
        assert!(
            members.iter().any(|m| m == expected),
            "{expected} missing from workspace.members: {members:?}"
        );
    }
}

#[test]
fn members_inherit_workspace_version() {
    let root = workspace_root();
    for member in members() {
        let manifest = read_toml(&root.join(&member).join("Cargo.toml"));
        let version = manifest.get("package").and_then(|p| p.get("version"));
        assert!(
            inherits_workspace(version),
            "{member} should use version.workspace = true, got {version:?}"
        );
    }
}

#[test]
fn internal_dependencies_use_workspace_entries() {
    let root = workspace_root();
    for member in members() {
        let manifest = read_toml(&root.join(&member).join("Cargo.toml"));
        let Some(deps) = manifest.get("dependencies").and_then(|d| d.as_table()) else {
            continue;
        };
        for (name, spec) in deps.iter().filter(|(n, _)| n.starts_with("lineguard")) {
            assert!(
                inherits_workspace(Some(spec)),
                "{member} depends on {name} without workspace = true"
            );
        }
    }
}

#[test]
fn workspace_version_matches_cargo_pkg() {
    let ws_version = root_manifest()["workspace"]["package"]["version"]
        .as_str()
        .expect("workspace.package.version is a string")
        .to_string();
    assert_eq!(ws_version, env!("CARGO_PKG_VERSION"));
}
