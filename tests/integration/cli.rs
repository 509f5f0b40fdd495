//! The `selfswap-pack` binary.

use assert_cmd::Command;
use predicates::prelude::*;
use selfswap::decode::decode_artifact;
use selfswap::manifest::VersionManifest;
use std::fs;
use tempfile::TempDir;

#[test]
fn test_pack_single_binary() {
    let temp_dir = TempDir::new().unwrap();
    let binary = temp_dir.path().join("myapp");
    fs::write(&binary, b"packed by the cli").unwrap();

    Command::cargo_bin("selfswap-pack")
        .unwrap()
        .current_dir(temp_dir.path())
        .env_remove("RUST_LOG")
        .env_remove("SELFSWAP_PLATFORM")
        .args(["myapp", "0.9.1", "--platform", "linux-amd64"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Published"))
        .stdout(predicate::str::contains("linux-amd64"));

    // Default output directory is ./public
    let public = temp_dir.path().join("public");
    let manifest = VersionManifest::from_slice(&fs::read(public.join("linux-amd64.json")).unwrap())
        .unwrap();
    assert_eq!(manifest.version, "0.9.1");

    let artifact = fs::File::open(public.join("0.9.1").join("linux-amd64.zst")).unwrap();
    assert_eq!(decode_artifact(artifact).unwrap(), b"packed by the cli");
}

#[test]
fn test_pack_directory_quietly() {
    let temp_dir = TempDir::new().unwrap();
    let dist = temp_dir.path().join("dist");
    fs::create_dir(&dist).unwrap();
    fs::write(dist.join("darwin-arm64"), b"mac").unwrap();
    fs::write(dist.join("linux-386"), b"linux").unwrap();
    let out = temp_dir.path().join("site");

    Command::cargo_bin("selfswap-pack")
        .unwrap()
        .env_remove("RUST_LOG")
        .arg(&dist)
        .arg("3.0.0")
        .arg("-o")
        .arg(&out)
        .arg("--quiet")
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    assert!(out.join("darwin-arm64.json").exists());
    assert!(out.join("linux-386.json").exists());
    assert!(out.join("3.0.0").join("darwin-arm64.zst").exists());
}

#[test]
fn test_pack_missing_binary_fails() {
    let temp_dir = TempDir::new().unwrap();

    Command::cargo_bin("selfswap-pack")
        .unwrap()
        .current_dir(temp_dir.path())
        .args(["does-not-exist", "1.0.0"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("error"))
        .stderr(predicate::str::contains("does-not-exist"));
}

#[test]
fn test_pack_rejects_malformed_platform() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("myapp"), b"x").unwrap();

    Command::cargo_bin("selfswap-pack")
        .unwrap()
        .current_dir(temp_dir.path())
        .args(["myapp", "1.0.0", "--platform", "linux"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid platform 'linux'"));
}
