//! The packager's output directory, served as-is, must be what the updater expects.

use selfswap::platform::Platform;
use selfswap::publish::Publisher;
use selfswap::test_utils::{MemoryFetcher, RecordingHider, fake_executable};
use selfswap::updater::Updater;
use static_site::serve_dir;
use std::path::Path;
use tempfile::TempDir;

const BASE_URL: &str = "http://updates.test";

/// Minimal static "server": every file under `root` becomes a URL under `{base}/{app}/`.
mod static_site {
    use selfswap::test_utils::MemoryFetcher;
    use std::path::Path;

    pub fn serve_dir(fetcher: &MemoryFetcher, base: &str, app: &str, root: &Path) {
        add(fetcher, &format!("{base}/{app}"), root);
    }

    fn add(fetcher: &MemoryFetcher, prefix: &str, dir: &Path) {
        for entry in std::fs::read_dir(dir).unwrap() {
            let entry = entry.unwrap();
            let name = entry.file_name().to_string_lossy().into_owned();
            let url = format!("{prefix}/{name}");
            if entry.file_type().unwrap().is_dir() {
                add(fetcher, &url, &entry.path());
            } else {
                fetcher.insert(url, std::fs::read(entry.path()).unwrap());
            }
        }
    }
}

fn write_binary(dir: &Path, name: &str, content: &[u8]) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_published_release_is_installable() {
    let temp_dir = TempDir::new().unwrap();
    let build = write_binary(temp_dir.path(), "build-output", b"freshly built 2.0.0");
    let public = temp_dir.path().join("public");
    let platform = Platform::new("linux", "arm64");

    Publisher::new(&public, "2.0.0").publish_file(&build, &platform).unwrap();

    let fetcher = MemoryFetcher::new();
    serve_dir(&fetcher, BASE_URL, "myapp", &public);

    let install_dir = temp_dir.path().join("install");
    std::fs::create_dir(&install_dir).unwrap();
    let exe = fake_executable(&install_dir, "myapp", b"running 1.0.0");

    let mut updater = Updater::builder("1.0.0", BASE_URL, "myapp")
        .platform(platform)
        .fetcher(fetcher)
        .hider(RecordingHider::new())
        .executable_path(&exe)
        .build();

    assert_eq!(updater.check_available().unwrap(), Some("2.0.0".to_string()));
    assert!(updater.apply_update().unwrap().is_updated());
    assert_eq!(std::fs::read(&exe).unwrap(), b"freshly built 2.0.0");
}

#[test]
fn test_multi_platform_publish_serves_each_platform() {
    let temp_dir = TempDir::new().unwrap();
    let dist = temp_dir.path().join("dist");
    std::fs::create_dir(&dist).unwrap();
    write_binary(&dist, "linux-amd64", b"linux image");
    write_binary(&dist, "windows-amd64", b"windows image");
    let public = temp_dir.path().join("public");

    let published = Publisher::new(&public, "1.5.0").publish_dir(&dist).unwrap();
    assert_eq!(published.len(), 2);

    let fetcher = MemoryFetcher::new();
    serve_dir(&fetcher, BASE_URL, "myapp", &public);

    for (platform, expected) in [
        (Platform::new("linux", "amd64"), &b"linux image"[..]),
        (Platform::new("windows", "amd64"), &b"windows image"[..]),
    ] {
        let image =
            selfswap::artifact::fetch_binary(&fetcher, BASE_URL, "myapp", "1.5.0", &platform)
                .unwrap();
        assert_eq!(image, expected);
    }
}
