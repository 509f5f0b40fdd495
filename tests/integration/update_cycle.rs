use selfswap::core::SelfswapError;
use selfswap::platform::Platform;
use selfswap::replace::BackupDisposition;
use selfswap::test_utils::{
    FaultyFs, MemoryFetcher, RecordingHider, dir_entries, fake_executable, init_test_logging,
};
use selfswap::updater::{UpdateStatus, Updater};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

const BASE_URL: &str = "http://updates.test";
const CURRENT: &[u8] = b"\x7fELF current build";
const RELEASE: &[u8] = b"\x7fELF release build 1.2.0";

fn linux_amd64() -> Platform {
    Platform::new("linux", "amd64")
}

fn release_fetcher() -> Arc<MemoryFetcher> {
    Arc::new(MemoryFetcher::new().with_release(BASE_URL, "myapp", &linux_amd64(), "1.2.0", RELEASE))
}

fn install(temp_dir: &TempDir) -> (PathBuf, PathBuf) {
    let dir = temp_dir.path().canonicalize().unwrap();
    let exe = fake_executable(&dir, "myapp", CURRENT);
    (dir, exe)
}

fn updater(version: &str, exe: &Path, fetcher: &Arc<MemoryFetcher>, fs: &Arc<FaultyFs>) -> Updater {
    Updater::builder(version, BASE_URL, "myapp")
        .platform(linux_amd64())
        .fetcher(Arc::clone(fetcher))
        .swap_fs(Arc::clone(fs))
        .hider(RecordingHider::new())
        .executable_path(exe)
        .build()
}

#[test]
fn test_update_replaces_executable_and_fires_callback_once() {
    init_test_logging(None);
    let temp_dir = TempDir::new().unwrap();
    let (dir, exe) = install(&temp_dir);
    let fired = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&fired);

    let mut updater = Updater::builder("1.1.0", BASE_URL, "myapp")
        .platform(linux_amd64())
        .fetcher(release_fetcher())
        .executable_path(&exe)
        .on_successful_update(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .build();

    let status = updater.run_in_background().unwrap();

    assert_eq!(
        status,
        UpdateStatus::Updated {
            from: "1.1.0".to_string(),
            to: "1.2.0".to_string(),
            backup: BackupDisposition::Removed,
        }
    );
    assert_eq!(std::fs::read(&exe).unwrap(), RELEASE);
    assert_eq!(dir_entries(&dir), vec!["myapp".to_string()]);
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}

#[test]
fn test_dev_build_is_inert() {
    let temp_dir = TempDir::new().unwrap();
    let (_dir, exe) = install(&temp_dir);
    let fetcher = release_fetcher();
    let fs = Arc::new(FaultyFs::new());
    let mut updater = updater("dev", &exe, &fetcher, &fs);

    assert_eq!(updater.run_in_background().unwrap(), UpdateStatus::Disabled);
    assert_eq!(updater.apply_update().unwrap(), UpdateStatus::Disabled);

    assert!(fetcher.requests().is_empty());
    assert!(fs.operations().is_empty());
}

#[test]
fn test_second_update_is_a_no_op() {
    let temp_dir = TempDir::new().unwrap();
    let (_dir, exe) = install(&temp_dir);
    let fetcher = release_fetcher();

    // First process updates itself
    let fs = Arc::new(FaultyFs::new());
    updater("1.1.0", &exe, &fetcher, &fs).apply_update().unwrap();
    assert!(!fs.operations().is_empty());

    // The restarted process now runs 1.2.0
    let fs = Arc::new(FaultyFs::new());
    let mut restarted = updater("1.2.0", &exe, &fetcher, &fs);
    for _ in 0..2 {
        assert!(!restarted.apply_update().unwrap().is_updated());
    }
    assert!(fs.operations().is_empty());
    assert_eq!(std::fs::read(&exe).unwrap(), RELEASE);
}

#[test]
fn test_failed_promote_restores_exact_bytes() {
    let temp_dir = TempDir::new().unwrap();
    let (dir, exe) = install(&temp_dir);
    let fetcher = release_fetcher();
    let fs = Arc::new(FaultyFs::new().fail_rename(2));

    let err = updater("1.1.0", &exe, &fetcher, &fs).apply_update().unwrap_err();

    assert!(matches!(err, SelfswapError::Swap { .. }));
    assert!(!err.is_fatal());
    assert_eq!(std::fs::read(&exe).unwrap(), CURRENT);
    assert_eq!(dir_entries(&dir), vec!["myapp".to_string()]);
}

#[test]
fn test_double_failure_keeps_both_causes() {
    let temp_dir = TempDir::new().unwrap();
    let (dir, exe) = install(&temp_dir);
    let fetcher = release_fetcher();
    let fs = Arc::new(FaultyFs::new().fail_rename(2).fail_rename(3));

    let err = updater("1.1.0", &exe, &fetcher, &fs).apply_update().unwrap_err();

    let SelfswapError::FatalSwap {
        swap_error,
        recovery_error,
        ..
    } = &err
    else {
        panic!("expected FatalSwap, got {err:?}");
    };
    assert!(swap_error.to_string().contains("#2"));
    assert!(recovery_error.to_string().contains("#3"));

    // Operator-facing rendering asks for manual intervention
    let ctx = selfswap::core::user_friendly_error(anyhow::Error::from(err));
    assert!(ctx.to_string().contains("Manual intervention required"));

    assert_eq!(dir_entries(&dir), vec![".myapp.new".to_string(), ".myapp.old".to_string()]);
}

#[test]
fn test_unresolvable_manifest_is_fetch_error() {
    let temp_dir = TempDir::new().unwrap();
    let (_dir, exe) = install(&temp_dir);
    let fetcher = Arc::new(MemoryFetcher::new().with_failure(
        "http://updates.test/myapp/linux-amd64.json",
        "connection refused",
    ));
    let fs = Arc::new(FaultyFs::new());

    let err = updater("1.1.0", &exe, &fetcher, &fs).check_available().unwrap_err();

    assert!(err.is_fetch());
    assert!(err.to_string().contains("connection refused"));
}
