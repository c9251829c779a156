use assert_cmd::prelude::*;
use neuro_atlas::BundleBuilder;
use predicates::str::contains;
use std::io::Write;
use std::process::Command;
use tempfile::NamedTempFile;

fn build_bundle() -> NamedTempFile {
    let atlas = r#"<atlas>
  <structure>
    <name>Frontal Lobe</name>
    <region>lobe</region>
    <function>Planning and voluntary movement</function>
    <mesh>meshes/frontal.obj</mesh>
  </structure>
  <structure>
    <name>Optic Nerve</name>
    <region>cranial_nerve</region>
    <nerve_info>CN II, carries visual information</nerve_info>
  </structure>
  <structure>
    <name>Head Shell</name>
  </structure>
</atlas>
"#;
    let buffer = BundleBuilder::new(1)
        .mesh("meshes/frontal.obj", b"v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n")
        .atlas(atlas)
        .finish();

    let mut tmp = NamedTempFile::new().expect("temp bundle");
    tmp.write_all(&buffer).expect("write bundle");
    tmp
}

#[test]
fn cli_prints_the_structure_census() {
    let bundle = build_bundle();
    let mut cmd = Command::cargo_bin("neuro-atlas").expect("binary exists");
    cmd.arg(bundle.path()).arg("--summary-only");
    cmd.assert()
        .success()
        .stdout(contains("Loaded atlas with 3 structures (2 interactive)"))
        .stdout(contains(" - Frontal Lobe (lobe)"))
        .stdout(contains(" - Optic Nerve (cranial nerve)"))
        .stdout(contains(" - Head Shell (decorative)"));
}

#[test]
fn cli_rejects_a_missing_bundle() {
    let mut cmd = Command::cargo_bin("neuro-atlas").expect("binary exists");
    cmd.arg("does-not-exist.atlas").arg("--summary-only");
    cmd.assert()
        .failure()
        .stderr(contains("unable to open does-not-exist.atlas"));
}

#[test]
fn cli_rejects_unknown_flags() {
    let bundle = build_bundle();
    let mut cmd = Command::cargo_bin("neuro-atlas").expect("binary exists");
    cmd.arg(bundle.path()).arg("--frobnicate");
    cmd.assert()
        .failure()
        .stderr(contains("Unknown argument: --frobnicate"));
}
