//! Every workspace member inherits the workspace version, and the internal
//! crate pins in `[workspace.dependencies]` follow it.

use std::path::{Path, PathBuf};

fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .ancestors()
        .nth(2)
        .expect("crate lives two levels below the workspace root")
        .to_path_buf()
}

fn manifest(dir: &Path) -> toml::Value {
    let path = dir.join("Cargo.toml");
    let text = std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("read {}: {e}", path.display()));
    text.parse()
        .unwrap_or_else(|e| panic!("parse {}: {e}", path.display()))
}

fn root_manifest() -> toml::Value {
    manifest(&workspace_root())
}

fn workspace_version() -> String {
    root_manifest()["workspace"]["package"]["version"]
        .as_str()
        .expect("workspace.package.version")
        .to_string()
}

fn members() -> Vec<String> {
    root_manifest()["workspace"]["members"]
        .as_array()
        .expect("workspace.members")
        .iter()
        .filter_map(|m| m.as_str().map(str::to_string))
        .collect()
}

#[test]
fn members_inherit_workspace_version() {
    let members = members();
    assert!(members.iter().any(|m| m.ends_with("aifix-core")));

    for member in members {
        let doc = manifest(&workspace_root().join(&member));
        let inherits = doc["package"]["version"]
            .get("workspace")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        assert!(inherits, "{member} must declare version.workspace = true");
    }
}

#[test]
fn compiled_version_is_workspace_version() {
    assert_eq!(workspace_version(), env!("CARGO_PKG_VERSION"));
    assert_eq!(aifix_core::VERSION, env!("CARGO_PKG_VERSION"));
}

#[test]
fn internal_pins_follow_workspace_version() {
    let root = root_manifest();
    let deps = root["workspace"]["dependencies"]
        .as_table()
        .expect("workspace.dependencies");
    let version = workspace_version();

    let internal: Vec<_> = deps.iter().filter(|(name, _)| name.starts_with("aifix-")).collect();
    assert!(!internal.is_empty());
    for (name, spec) in internal {
        assert!(spec.get("path").is_some(), "{name} should be a path dependency");
        assert_eq!(
            spec.get("version").and_then(|v| v.as_str()),
            Some(version.as_str()),
            "{name} pin drifted from the workspace version"
        );
    }
}
