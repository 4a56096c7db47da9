//! Manifest parsing, validation and round-trip tests

use std::collections::BTreeMap;

use comfy_manifest::{
    CustomNodeSpec, DependencySpec, Error, InstallMethod, MigrationManifest, PytorchSpec,
    SystemInfo,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

#[test]
fn parses_documented_shape() {
    let text = r#"{
        "schema_version": "1.0",
        "system_info": {"python_version": "3.11.5", "cuda_version": "12.1"},
        "custom_nodes": [
            {"name": "X", "install_method": "local", "url": "X"},
            {"name": "Y", "install_method": "git", "url": "https://github.com/o/y.git", "ref": "deadbeef", "has_post_install": true}
        ],
        "dependencies": {
            "packages": {"numpy": "1.26.0"},
            "pytorch": {"index_url": "https://download.pytorch.org/whl/cu121", "packages": {"torch": "2.1.0+cu121"}},
            "git_requirements": ["clip @ git+https://github.com/openai/CLIP.git"]
        }
    }"#;

    let manifest = MigrationManifest::from_json(text).unwrap();
    assert_eq!(manifest.custom_nodes.len(), 2);
    assert_eq!(manifest.custom_nodes[1].install_method, InstallMethod::Git);
    assert_eq!(manifest.custom_nodes[1].git_ref.as_deref(), Some("deadbeef"));
    assert!(manifest.custom_nodes[1].has_post_install);
    assert_eq!(manifest.dependencies.packages["numpy"], "1.26.0");
    assert!(manifest.dependencies.editable_installs.is_empty());
}

#[test]
fn unknown_install_method_is_a_parse_error() {
    let text = r#"{
        "schema_version": "1.0",
        "system_info": {"python_version": "3.11.5"},
        "custom_nodes": [{"name": "X", "install_method": "registry", "url": "X"}]
    }"#;
    assert!(matches!(
        MigrationManifest::from_json(text),
        Err(Error::Json(_))
    ));
}

#[test]
fn unsupported_schema_version_fails_validation() {
    let text = r#"{"schema_version": "0.9", "system_info": {"python_version": "3.11.5"}}"#;
    assert!(matches!(
        MigrationManifest::from_json(text),
        Err(Error::UnsupportedSchema { .. })
    ));
}

#[test]
fn nested_entities_are_revalidated() {
    let text = r#"{
        "schema_version": "1.0",
        "system_info": {"python_version": "3.11.5"},
        "custom_nodes": [{"name": "X", "install_method": "archive", "url": "not-a-url"}]
    }"#;
    assert!(matches!(
        MigrationManifest::from_json(text),
        Err(Error::InvalidCustomNode { .. })
    ));
}

fn node_strategy() -> impl Strategy<Value = CustomNodeSpec> {
    let name = "[A-Za-z][A-Za-z0-9_-]{0,15}";
    prop_oneof![
        (name, "[a-z0-9]{1,10}").prop_map(|(n, slug)| CustomNodeSpec::archive(
            n,
            format!("https://example.com/{slug}.zip")
        )),
        (name, "[a-z0-9]{1,10}", proptest::option::of("[0-9a-f]{7,40}")).prop_map(
            |(n, slug, r)| CustomNodeSpec::git(n, format!("https://github.com/o/{slug}.git"), r)
        ),
        (name, any::<bool>()).prop_map(|(n, post)| CustomNodeSpec::local(n).with_post_install(post)),
    ]
}

fn manifest_strategy() -> impl Strategy<Value = MigrationManifest> {
    (
        (3u32..4, 8u32..14, 0u32..20),
        proptest::option::of("1[12]\\.[0-9]"),
        proptest::collection::vec(node_strategy(), 0..6),
        proptest::collection::btree_map("[a-z][a-z0-9-]{0,10}", "[0-9]\\.[0-9]{1,2}\\.[0-9]", 0..8),
        any::<bool>(),
        proptest::collection::vec("git\\+https://github\\.com/o/[a-z]{1,8}\\.git", 0..3),
    )
        .prop_map(|((maj, min, patch), cuda, nodes, packages, with_torch, git_reqs)| {
            let mut seen = std::collections::HashSet::new();
            let custom_nodes = nodes
                .into_iter()
                .filter(|n| seen.insert(n.name.clone()))
                .collect();
            MigrationManifest {
                schema_version: "1.0".into(),
                system_info: SystemInfo {
                    python_version: format!("{maj}.{min}.{patch}"),
                    cuda_version: cuda,
                    torch_version: None,
                    comfyui_version: None,
                },
                custom_nodes,
                dependencies: DependencySpec {
                    packages,
                    pytorch: with_torch.then(|| PytorchSpec {
                        index_url: "https://download.pytorch.org/whl/cpu".into(),
                        packages: BTreeMap::from([("torch".to_string(), "2.1.0".to_string())]),
                    }),
                    editable_installs: Vec::new(),
                    git_requirements: git_reqs,
                },
            }
        })
}

proptest! {
    #[test]
    fn value_round_trip_is_identity(manifest in manifest_strategy()) {
        manifest.validate().unwrap();
        let value = manifest.to_value().unwrap();
        let restored = MigrationManifest::from_value(value).unwrap();
        prop_assert_eq!(restored, manifest);
    }
}
