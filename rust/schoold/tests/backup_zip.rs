#[path = "../src/backup.rs"]
mod backup;
mod test_support;

use serde_json::json;
use std::fs::File;
use std::io::{Read, Write};
use test_support::{create_school, request_ok, select_workspace, spawn_sidecar, temp_dir};
use zip::write::FileOptions;

fn write_bundle(path: &std::path::Path, manifest: serde_json::Value, db: &[u8]) {
    let f = File::create(path).expect("create bundle");
    let mut zip = zip::ZipWriter::new(f);
    let opts = FileOptions::default();
    zip.start_file("manifest.json", opts).expect("manifest entry");
    zip.write_all(manifest.to_string().as_bytes())
        .expect("write manifest");
    zip.start_file("db/school.sqlite3", opts).expect("db entry");
    zip.write_all(db).expect("write db");
    zip.finish().expect("finish bundle");
}

#[test]
fn export_then_restore_copies_the_database() {
    let workspace = temp_dir("schoold-backup-src");
    let workspace2 = temp_dir("schoold-backup-dst");
    let out_dir = temp_dir("schoold-backup-out");

    let bytes = b"sqlite-test-payload";
    std::fs::write(workspace.join("school.sqlite3"), bytes).expect("write source db");

    let bundle_path = out_dir.join("nested").join("workspace.zip");
    let export = backup::export_workspace_bundle(&workspace, &bundle_path).expect("export bundle");
    assert_eq!(export.bundle_format, backup::BUNDLE_FORMAT);
    assert_eq!(export.entry_count, 2);
    assert_eq!(export.sha256.len(), 64);

    let f = File::open(&bundle_path).expect("open bundle");
    let mut archive = zip::ZipArchive::new(f).expect("open zip archive");
    let mut manifest = String::new();
    archive
        .by_name("manifest.json")
        .expect("manifest entry")
        .read_to_string(&mut manifest)
        .expect("read manifest");
    let manifest: serde_json::Value = serde_json::from_str(&manifest).expect("manifest json");
    assert_eq!(manifest["format"], json!(backup::BUNDLE_FORMAT));
    assert_eq!(manifest["sha256"], json!(export.sha256));
    assert!(manifest["exportedAt"].is_string());

    // Stale journal files must not survive a restore.
    std::fs::write(workspace2.join("school.sqlite3-wal"), b"stale").expect("write wal");
    let restored =
        backup::restore_workspace_bundle(&bundle_path, &workspace2).expect("restore bundle");
    assert_eq!(restored.bundle_format, backup::BUNDLE_FORMAT);
    assert!(restored.exported_at.is_some());
    let copied = std::fs::read(workspace2.join("school.sqlite3")).expect("read restored db");
    assert_eq!(copied, bytes);
    assert!(!workspace2.join("school.sqlite3-wal").exists());
}

#[test]
fn export_without_database_fails() {
    let workspace = temp_dir("schoold-backup-empty");
    let out = temp_dir("schoold-backup-empty-out").join("b.zip");
    assert!(backup::export_workspace_bundle(&workspace, &out).is_err());
}

#[test]
fn tampered_bundles_leave_the_workspace_untouched() {
    let workspace = temp_dir("schoold-backup-tamper");
    let dir = temp_dir("schoold-backup-tamper-bundles");
    std::fs::write(workspace.join("school.sqlite3"), b"original").expect("write db");

    let mismatch = dir.join("mismatch.zip");
    write_bundle(
        &mismatch,
        json!({ "format": backup::BUNDLE_FORMAT, "sha256": "00".repeat(32) }),
        b"replacement",
    );
    let err = backup::restore_workspace_bundle(&mismatch, &workspace).expect_err("mismatch");
    assert!(format!("{err:#}").contains("checksum mismatch"));

    let wrong_format = dir.join("format.zip");
    write_bundle(
        &wrong_format,
        json!({ "format": "other-format-v9", "sha256": "00" }),
        b"replacement",
    );
    let err = backup::restore_workspace_bundle(&wrong_format, &workspace).expect_err("format");
    assert!(format!("{err:#}").contains("unsupported bundle format"));

    let not_zip = dir.join("plain.txt");
    std::fs::write(&not_zip, b"hello").expect("write plain file");
    assert!(backup::restore_workspace_bundle(&not_zip, &workspace).is_err());

    let kept = std::fs::read(workspace.join("school.sqlite3")).expect("read db");
    assert_eq!(kept, b"original");
}

#[test]
fn restore_over_ipc_brings_back_exported_data() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ws = select_workspace(&mut stdin, &mut reader, "schoold-backup-ipc");
    let _ = create_school(&mut stdin, &mut reader, "Al Noor", None);

    let bundle = temp_dir("schoold-backup-ipc-out").join("backup.zip");
    let exported = request_ok(
        &mut stdin,
        &mut reader,
        "exp",
        "backup.export",
        json!({ "outPath": bundle.to_string_lossy() }),
    );
    assert_eq!(exported["bundleFormat"], json!(backup::BUNDLE_FORMAT));

    let _ = create_school(&mut stdin, &mut reader, "Al Amal", None);
    let listed = request_ok(&mut stdin, &mut reader, "l1", "schools.list", json!({}));
    assert_eq!(listed["schools"].as_array().map(|a| a.len()), Some(2));

    let restored = request_ok(
        &mut stdin,
        &mut reader,
        "res",
        "backup.restore",
        json!({ "inPath": bundle.to_string_lossy() }),
    );
    assert_eq!(restored["success"], json!(true));
    let listed = request_ok(&mut stdin, &mut reader, "l2", "schools.list", json!({}));
    let schools = listed["schools"].as_array().expect("schools");
    assert_eq!(schools.len(), 1);
    assert_eq!(schools[0]["name"], json!("Al Noor"));

    let missing = request_ok(
        &mut stdin,
        &mut reader,
        "res2",
        "backup.restore",
        json!({ "inPath": "/nonexistent/backup.zip" }),
    );
    assert_eq!(missing["success"], json!(false));
    // The workspace is still open after a rejected restore.
    let listed = request_ok(&mut stdin, &mut reader, "l3", "schools.list", json!({}));
    assert_eq!(listed["schools"].as_array().map(|a| a.len()), Some(1));

    drop(stdin);
    let _ = child.wait();
}
