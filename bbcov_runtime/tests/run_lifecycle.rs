//! Whole-run behavior through the process-wide entry points.

#![allow(non_snake_case)]

use std::ffi::CString;
use std::fs;
use std::path::Path;

use bbcov_runtime::ffi::{__cov_fini, __record_bb_cov, set_config};
use bbcov_runtime::{finalize, record, reset, store_path, CoverageStore, RuntimeConfig};
use serial_test::serial;
use tempfile::tempdir;

fn fresh_run() {
    reset();
    set_config(RuntimeConfig::default());
}

fn source_in(dir: &Path, name: &str) -> String {
    dir.join(name).display().to_string()
}

#[test]
#[serial]
fn two_runs__disjoint_blocks__then_store_accumulates_both() {
    let dir = tempdir().expect("tempdir");
    let source = source_in(dir.path(), "main.c");

    fresh_run();
    record(&source, "foo", 0);
    record(&source, "foo", 2);
    finalize();

    fresh_run();
    record(&source, "foo", 1);
    record(&source, "foo", 3);
    finalize();

    assert_eq!(
        fs::read_to_string(store_path(&source)).expect("read store"),
        "F foo 1\nB 0 1\nB 1 1\nB 2 1\nB 3 1\n"
    );
}

#[test]
#[serial]
fn finalize__called_twice__then_store_unchanged() {
    let dir = tempdir().expect("tempdir");
    let source = source_in(dir.path(), "main.c");

    fresh_run();
    record(&source, "main", 0);
    record(&source, "helper(int)", 1);
    finalize();
    let first = fs::read_to_string(store_path(&source)).expect("read store");
    finalize();
    let second = fs::read_to_string(store_path(&source)).expect("read store");

    assert_eq!(first, second);
}

#[test]
#[serial]
fn finalize__index_past_template__then_store_grows() {
    let dir = tempdir().expect("tempdir");
    let source = source_in(dir.path(), "main.c");
    fs::write(store_path(&source), "F foo 0\nb 0 0\nb 1 0\nb 2 0\n").expect("seed template");

    fresh_run();
    record(&source, "foo", 5);
    finalize();

    let stored = CoverageStore::load(&store_path(&source)).expect("load").store;
    assert_eq!(
        stored.function("foo").expect("foo").as_slice(),
        &[false, false, false, false, false, true]
    );
}

#[test]
#[serial]
fn finalize__malformed_prior_store__then_prefix_kept_rest_dropped() {
    let dir = tempdir().expect("tempdir");
    let source = source_in(dir.path(), "main.c");
    fs::write(
        store_path(&source),
        "F alpha 1\nB 0 1\ngarbage\nF omega 1\nB 0 1\n",
    )
    .expect("seed store");

    fresh_run();
    record(&source, "beta", 0);
    finalize();

    assert_eq!(
        fs::read_to_string(store_path(&source)).expect("read store"),
        "F alpha 1\nB 0 1\nF beta 1\nB 0 1\n"
    );
}

#[test]
#[serial]
fn c_abi__record_then_fini__then_store_written() {
    let dir = tempdir().expect("tempdir");
    let source = source_in(dir.path(), "abi.c");
    let file = CString::new(source.clone()).unwrap();
    let function = CString::new("main").unwrap();

    fresh_run();
    unsafe {
        __record_bb_cov(file.as_ptr(), function.as_ptr(), 1);
        __record_bb_cov(file.as_ptr(), function.as_ptr(), 1);
    }
    __cov_fini();

    assert_eq!(
        fs::read_to_string(store_path(&source)).expect("read store"),
        "F main 1\nB 0 0\nB 1 1\n"
    );
}

#[test]
#[serial]
fn finalize__store_directory_missing__then_no_panic_and_other_files_written() {
    let dir = tempdir().expect("tempdir");
    let lost = source_in(&dir.path().join("gone"), "lost.c");
    let kept = source_in(dir.path(), "kept.c");

    fresh_run();
    record(&lost, "f", 0);
    record(&kept, "g", 0);
    let report = finalize();

    assert_eq!(report.files.len(), 2);
    assert!(store_path(&kept).exists());
    assert!(!store_path(&lost).exists());
}
