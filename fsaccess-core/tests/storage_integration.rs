//! End-to-end tests of the storage contract against the in-memory platform.

use fsaccess_core::platform::memory::{MemoryPlatform, PickerResponse, SequentialIds};
use fsaccess_core::{
    FileId, FsAccessConfig, FsAccessError, HostError, HostErrorKind, StorageOpts, StorageProvider,
};
use test_case::test_case;

async fn pick(platform: &MemoryPlatform, name: &str, bytes: &[u8]) -> String {
    let storage = platform.storage();
    platform.picker.select(&platform.disk.create_file(name, bytes));
    storage.list(None).await.expect("list").remove(0).path
}

#[tokio::test]
async fn test_list_on_empty_cache_creates_record() {
    let platform = MemoryPlatform::new();
    let storage = platform.storage();
    let handle = platform.disk.create_file("vault.kdbx", b"kdbx");
    platform.picker.select(&handle);

    let listed = storage.list(Some("/ignored")).await.expect("list");

    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].name, "vault.kdbx");
    assert!(uuid::Uuid::parse_str(&listed[0].path).is_ok());
    assert_eq!(platform.cached_ids(), vec![FileId::new(listed[0].path.clone())]);
    assert_eq!(
        platform.picker.last_filter().expect("filter").extensions,
        vec![".kdbx".to_string()]
    );
}

#[tokio::test]
async fn test_picking_same_file_reuses_id() {
    let platform = MemoryPlatform::new();
    let storage = platform.storage();
    let handle = platform.disk.create_file("vault.kdbx", b"kdbx");

    platform.picker.select(&handle);
    let first = storage.list(None).await.expect("first list");
    platform.picker.select(&platform.disk.reopen(&handle));
    let second = storage.list(None).await.expect("second list");

    assert_eq!(first, second);
    assert_eq!(platform.cached_ids().len(), 1);
}

#[tokio::test]
async fn test_distinct_files_get_distinct_ids() {
    let platform = MemoryPlatform::new();
    let storage = platform.storage_with(FsAccessConfig::default(), SequentialIds::new());
    platform.picker.select(&platform.disk.create_file("a.kdbx", b"a"));
    platform.picker.select(&platform.disk.create_file("b.kdbx", b"b"));

    let a = storage.list(None).await.expect("list a").remove(0);
    let b = storage.list(None).await.expect("list b").remove(0);

    assert_eq!(a.path, "file-1");
    assert_eq!(b.path, "file-2");
    let loaded = storage.load("file-2", &StorageOpts::new()).await.expect("load");
    assert_eq!(loaded.data, b"b");
}

#[test_case(PickerResponse::Cancel, "user_cancelled" ; "dismissed")]
#[test_case(PickerResponse::Fail(HostError::new(HostErrorKind::Abort, "aborted")), "user_cancelled" ; "abort error")]
#[test_case(PickerResponse::Fail(HostError::new(HostErrorKind::Security, "no gesture")), "io" ; "picker failure")]
#[tokio::test]
async fn test_list_picker_failures(response: PickerResponse, code: &str) {
    let platform = MemoryPlatform::new();
    let storage = platform.storage();
    platform.picker.push(response);

    let err = storage.list(None).await.unwrap_err();

    assert_eq!(err.code(), code);
    assert!(platform.cached_ids().is_empty());
}

#[tokio::test]
async fn test_save_then_load_round_trip() {
    let platform = MemoryPlatform::new();
    let storage = platform.storage();
    let path = pick(&platform, "vault.kdbx", b"old").await;
    let opts = StorageOpts::new();

    let saved = storage
        .save(&path, &opts, b"new contents", None)
        .await
        .expect("save");
    let loaded = storage.load(&path, &opts).await.expect("load");

    assert_eq!(saved.path, path);
    assert_eq!(loaded.data, b"new contents");
    assert_eq!(loaded.stat.rev, saved.rev);
}

#[tokio::test]
async fn test_save_with_matching_rev_advances_rev() {
    let platform = MemoryPlatform::new();
    let storage = platform.storage();
    let path = pick(&platform, "vault.kdbx", b"v1").await;
    let opts = StorageOpts::new();

    let before = storage.stat(&path, &opts).await.expect("stat");
    let saved = storage
        .save(&path, &opts, b"v2", Some(before.rev))
        .await
        .expect("save");

    assert!(saved.rev >= before.rev);
    let saved_again = storage
        .save(&path, &opts, b"v3", Some(saved.rev))
        .await
        .expect("second save");
    assert!(saved_again.rev >= saved.rev);
}

#[tokio::test]
async fn test_save_with_frozen_clock_keeps_rev() {
    let platform = MemoryPlatform::new();
    let storage = platform.storage();
    let path = pick(&platform, "vault.kdbx", b"v1").await;
    let opts = StorageOpts::new();
    let before = storage.stat(&path, &opts).await.expect("stat");
    platform.disk.set_time(before.rev);
    platform.disk.set_tick(0);

    let saved = storage
        .save(&path, &opts, b"v2", Some(before.rev))
        .await
        .expect("save");

    // Two writes within one timestamp tick are indistinguishable.
    assert_eq!(saved.rev, before.rev);
}

#[tokio::test]
async fn test_save_conflict_reports_current_rev_and_skips_write() {
    let platform = MemoryPlatform::new();
    let storage = platform.storage();
    let handle = platform.disk.create_file("vault.kdbx", b"original");
    platform.picker.select(&handle);
    let path = storage.list(None).await.expect("list").remove(0).path;
    platform.disk.set_time(100);
    platform.disk.modify_externally(&handle, b"external");
    platform.disk.set_time(105);
    platform.disk.modify_externally(&handle, b"external 2");
    let writes = platform.disk.write_count();

    let err = storage
        .save(&path, &StorageOpts::new(), b"mine", Some(100))
        .await
        .unwrap_err();

    assert!(err.is_rev_conflict());
    assert_eq!(err.conflict_stat().map(|stat| stat.rev), Some(105));
    assert_eq!(platform.disk.contents(&handle).expect("file"), b"external 2");
    assert_eq!(platform.disk.write_count(), writes);
}

#[tokio::test]
async fn test_successful_save_writes_handle_back_to_cache() {
    let platform = MemoryPlatform::new();
    let storage = platform.storage();
    let path = pick(&platform, "vault.kdbx", b"v1").await;
    let opts = StorageOpts::new();
    let puts = platform.store.put_count();

    let before = storage.stat(&path, &opts).await.expect("stat");
    storage
        .save(&path, &opts, b"v2", Some(before.rev))
        .await
        .expect("save");

    assert_eq!(platform.store.put_count(), puts + 1);
    assert_eq!(platform.cached_ids(), vec![FileId::new(path)]);
}

#[tokio::test]
async fn test_failed_save_does_not_touch_cache() {
    let platform = MemoryPlatform::new();
    let storage = platform.storage();
    let handle = platform.disk.create_file("vault.kdbx", b"original");
    platform.picker.select(&handle);
    let path = storage.list(None).await.expect("list").remove(0).path;
    let opts = StorageOpts::new();
    let stale = storage.stat(&path, &opts).await.expect("stat");
    platform.disk.modify_externally(&handle, b"external");
    let puts = platform.store.put_count();

    let err = storage
        .save(&path, &opts, b"mine", Some(stale.rev))
        .await
        .unwrap_err();
    assert!(err.is_rev_conflict());

    platform.disk.fail_writes(true);
    let err = storage.save(&path, &opts, b"mine", None).await.unwrap_err();
    assert_eq!(err.code(), "io");

    assert_eq!(platform.store.put_count(), puts);
}

#[tokio::test]
async fn test_list_skips_cached_handle_of_deleted_file() {
    let platform = MemoryPlatform::new();
    let storage = platform.storage_with(FsAccessConfig::default(), SequentialIds::new());
    let gone = platform.disk.create_file("gone.kdbx", b"");
    platform.picker.select(&gone);
    storage.list(None).await.expect("first list");
    platform.disk.delete_file(&gone);

    let vault = platform.disk.create_file("vault.kdbx", b"data");
    platform.picker.select(&vault);
    let listed = storage.list(None).await.expect("list after delete");

    assert_eq!(listed[0].path, "file-2");
    platform.picker.select(&platform.disk.reopen(&vault));
    let again = storage.list(None).await.expect("list again");
    assert_eq!(again, listed);
    assert_eq!(platform.cached_ids().len(), 2);
}

#[tokio::test]
async fn test_load_returns_stat_taken_before_read() {
    let platform = MemoryPlatform::new();
    let storage = platform.storage();
    let handle = platform.disk.create_file("vault.kdbx", b"data");
    platform.picker.select(&handle);
    let path = storage.list(None).await.expect("list").remove(0).path;

    let loaded = storage.load(&path, &StorageOpts::new()).await.expect("load");

    assert_eq!(loaded.data, b"data");
    assert_eq!(Some(loaded.stat.rev), platform.disk.last_modified(&handle));
}

#[tokio::test]
async fn test_remove_then_stat_is_not_found() {
    let platform = MemoryPlatform::new();
    let storage = platform.storage();
    let path = pick(&platform, "vault.kdbx", b"data").await;
    let opts = StorageOpts::new();

    storage.remove(&path).await.expect("remove");

    assert!(matches!(
        storage.stat(&path, &opts).await,
        Err(FsAccessError::NotFound { .. })
    ));
    assert!(platform.cached_ids().is_empty());
    storage.remove(&path).await.expect("second remove");
}

#[tokio::test]
async fn test_deleted_file_is_io_error() {
    let platform = MemoryPlatform::new();
    let storage = platform.storage();
    let handle = platform.disk.create_file("vault.kdbx", b"data");
    platform.picker.select(&handle);
    let path = storage.list(None).await.expect("list").remove(0).path;

    platform.disk.delete_file(&handle);
    let err = storage.stat(&path, &StorageOpts::new()).await.unwrap_err();

    assert!(matches!(err, FsAccessError::Io { .. }));
}

#[tokio::test]
async fn test_write_failure_is_io_error_and_keeps_contents() {
    let platform = MemoryPlatform::new();
    let storage = platform.storage();
    let handle = platform.disk.create_file("vault.kdbx", b"data");
    platform.picker.select(&handle);
    let path = storage.list(None).await.expect("list").remove(0).path;

    platform.disk.fail_writes(true);
    let err = storage
        .save(&path, &StorageOpts::new(), b"lost", None)
        .await
        .unwrap_err();

    assert_eq!(err.code(), "io");
    assert_eq!(platform.disk.contents(&handle).expect("file"), b"data");
}

#[tokio::test]
async fn test_cache_outage_is_cache_error() {
    let platform = MemoryPlatform::new();
    let storage = platform.storage();
    let path = pick(&platform, "vault.kdbx", b"data").await;

    platform.store.set_failing(true);
    let err = storage.load(&path, &StorageOpts::new()).await.unwrap_err();
    assert_eq!(err.code(), "cache");

    platform.store.set_failing(false);
    assert!(storage.load(&path, &StorageOpts::new()).await.is_ok());
}

#[tokio::test]
async fn test_handles_survive_adapter_restart() {
    let platform = MemoryPlatform::new();
    let path = pick(&platform, "vault.kdbx", b"persisted").await;

    let restarted = platform.storage();
    let loaded = restarted
        .load(&path, &StorageOpts::new())
        .await
        .expect("load after restart");

    assert_eq!(loaded.data, b"persisted");
}

#[tokio::test]
async fn test_custom_cache_name_is_used() {
    let platform = MemoryPlatform::new();
    let config = FsAccessConfig::from_json(r#"{"cacheName": "OtherHandles"}"#).expect("config");
    let storage = platform.storage_with(config, SequentialIds::new());
    platform.picker.select(&platform.disk.create_file("vault.kdbx", b""));

    storage.list(None).await.expect("list");

    assert!(platform.cached_ids().is_empty());
    assert_eq!(
        platform.store.keys("OtherHandles", "files"),
        vec![FileId::new("file-1")]
    );
}
