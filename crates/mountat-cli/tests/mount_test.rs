//! End-to-end mounts of overlay fixtures through every mechanism.
//!
//! These need `CAP_SYS_ADMIN` and overlayfs:
//! `sudo -E cargo test -p mountat-cli -- --ignored`.

#![allow(clippy::expect_used, clippy::unwrap_used, missing_docs)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use mountat_bench::driver::{Driver, Mechanism};
use mountat_bench::fixture::OverlayFixture;
use mountat_bench::verify::verify_mount;
use mountat_common::config::BenchConfig;
use mountat_core::filesystem::mount::unmount_with_retry;
use mountat_core::isolation::fork;
use mountat_core::isolation::reexec::ReexecMounter;
use mountat_core::retry::{RetryPolicy, Settlement};

const BIN: &str = env!("CARGO_BIN_EXE_mountat");

// Tests that move the process cwd, directly or through the direct
// baseline, must not overlap.
static CWD_LOCK: Mutex<()> = Mutex::new(());

fn lock_cwd() -> MutexGuard<'static, ()> {
    CWD_LOCK.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Runs `f` while another thread keeps moving the process-wide cwd between
/// `elsewhere` and the current directory.
fn with_cwd_flipping<T>(elsewhere: PathBuf, f: impl FnOnce() -> T) -> T {
    let home = std::env::current_dir().unwrap();
    let stop = Arc::new(AtomicBool::new(false));
    let flipper = {
        let stop = Arc::clone(&stop);
        std::thread::spawn(move || {
            while !stop.load(Ordering::SeqCst) {
                std::env::set_current_dir(&elsewhere).unwrap();
                std::env::set_current_dir(&home).unwrap();
            }
        })
    };

    let value = f();
    stop.store(true, Ordering::SeqCst);
    flipper.join().unwrap();
    value
}

fn driver() -> Driver {
    Driver::new(&BenchConfig::default())
        .expect("driver")
        .with_reexec(ReexecMounter::with_executable(BIN))
}

fn round_trip(mechanism: Mechanism, layers: usize) {
    let mut fixture = OverlayFixture::build(layers).expect("fixture");
    let common = fixture.open_common().expect("open common");
    let driver = driver();

    driver.mount(mechanism, &fixture, &common).expect("mount");
    let verified = verify_mount(&fixture.layout().target_dir, layers);
    driver.unmount(&fixture).expect("unmount");
    fixture.cleanup().expect("cleanup");
    verified.expect("verify");
}

#[test]
#[ignore = "requires root and overlayfs"]
fn fork_round_trip_across_layer_counts() {
    for layers in [1, 16, 128] {
        round_trip(Mechanism::Fork, layers);
    }
}

#[test]
#[ignore = "requires root and overlayfs"]
fn reexec_round_trip_across_layer_counts() {
    for layers in [1, 16, 128] {
        round_trip(Mechanism::Reexec, layers);
    }
}

#[test]
#[ignore = "requires root and overlayfs"]
fn direct_baseline_round_trip() {
    let _cwd = lock_cwd();
    round_trip(Mechanism::Direct, 16);
}

#[test]
#[ignore = "requires root and overlayfs"]
fn reexec_ten_layers_reads_back_layer_seven() {
    let mut fixture = OverlayFixture::build(10).expect("fixture");
    let mounter = ReexecMounter::with_executable(BIN);

    mounter
        .mount_at(&fixture.layout().common_dir, fixture.request())
        .expect("mount");
    let content = std::fs::read_to_string(fixture.layout().target_dir.join("commit-7"));
    driver().unmount(&fixture).expect("unmount");
    fixture.cleanup().expect("cleanup");

    assert_eq!(content.expect("read commit-7"), "Hi, I'm No.7 Layer!");
}

#[test]
#[ignore = "requires root and overlayfs"]
fn unmount_converges_on_unmounted_target() {
    let mut fixture = OverlayFixture::build(2).expect("fixture");
    let outcome = unmount_with_retry(&fixture.layout().target_dir, &RetryPolicy::default())
        .expect("unmount");
    assert_eq!(outcome, Settlement::AlreadySettled(1));
    fixture.cleanup().expect("cleanup");
}

#[test]
#[ignore = "requires root and overlayfs"]
fn fork_mount_ignores_concurrent_chdir() {
    let _cwd = lock_cwd();
    let mut fixture = OverlayFixture::build(32).expect("fixture");
    let common = fixture.open_common().expect("open common");
    let before = std::env::current_dir().unwrap();

    // The relative lower layers do not exist under the upper directory.
    let mounted = with_cwd_flipping(fixture.layout().upper_dir.clone(), || {
        fork::mount_at(&common, fixture.request())
    });

    mounted.expect("mount");
    let verified = verify_mount(&fixture.layout().target_dir, 32);
    driver().unmount(&fixture).expect("unmount");
    fixture.cleanup().expect("cleanup");
    verified.expect("verify");
    assert_eq!(std::env::current_dir().unwrap(), before);
}

#[test]
#[ignore = "requires root and overlayfs"]
fn reexec_mount_ignores_concurrent_chdir() {
    let _cwd = lock_cwd();
    let mut fixture = OverlayFixture::build(32).expect("fixture");
    let mounter = ReexecMounter::with_executable(BIN);
    let before = std::env::current_dir().unwrap();

    let mounted = with_cwd_flipping(fixture.layout().upper_dir.clone(), || {
        mounter.mount_at(&fixture.layout().common_dir, fixture.request())
    });

    mounted.expect("mount");
    let verified = verify_mount(&fixture.layout().target_dir, 32);
    driver().unmount(&fixture).expect("unmount");
    fixture.cleanup().expect("cleanup");
    verified.expect("verify");
    assert_eq!(std::env::current_dir().unwrap(), before);
}

#[test]
#[ignore = "requires root and overlayfs"]
fn run_case_reports_every_iteration() {
    let _cwd = lock_cwd();
    let config = BenchConfig {
        layers: vec![4],
        iterations: 3,
        verify: true,
        ..BenchConfig::default()
    };
    let driver = Driver::new(&config)
        .expect("driver")
        .with_reexec(ReexecMounter::with_executable(BIN));
    let report = driver
        .run_bench(&config, &Mechanism::ALL)
        .expect("bench");
    assert_eq!(report.cases.len(), 3);
    assert!(report.cases.iter().all(|c| c.iterations == 3));
}
