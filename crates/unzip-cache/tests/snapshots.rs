use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use unzip_cache::{
    ArchiveCache, ArchivePath, ConversionResult, DeletionOutcome, ListingOutcome,
    PathLockRegistry, SnapshotReconciler,
};
use unzip_test_utils::{Fault, MasterRepositoryMock, MemoryStorage};

const OLD_BUILD: &str = "/org/x/1.0-SNAPSHOT/x-1.0-20140301.1-1.zip";
const LATEST_BUILD: &str = "/org/x/1.0-SNAPSHOT/x-1.0-20140302.1-2.zip";

fn latest_conversion() -> ConversionResult {
    ConversionResult::converted("/org/x/1.0-SNAPSHOT/x-", "1.0-20140302.1-2")
}

fn reconciler(local: &Arc<MemoryStorage>) -> SnapshotReconciler {
    SnapshotReconciler::new(local.clone(), Arc::new(PathLockRegistry::new()))
}

fn seeded(paths: &[&str]) -> Arc<MemoryStorage> {
    let local = Arc::new(MemoryStorage::new());
    for path in paths {
        local.insert(path, 1_000, Vec::new());
    }
    local
}

#[test]
fn removes_superseded_snapshot_builds() {
    let local = seeded(&["/a/1.0-SNAPSHOT/x", "/a/1.0-SNAPSHOT/y", "/a/2.0/z"]);

    let report = reconciler(&local).clean_snapshots(&ConversionResult::converted("a/", "2.0"));

    assert_eq!(report.folder.as_deref(), Some("/"));
    assert_eq!(report.listing, ListingOutcome::Listed { items: 3 });
    assert_eq!(
        report.deleted().collect::<Vec<_>>(),
        ["/a/1.0-SNAPSHOT/x", "/a/1.0-SNAPSHOT/y"]
    );
    assert_eq!(local.paths(), ["/a/2.0/z"]);
}

#[test]
fn cleanup_is_idempotent() {
    let local = seeded(&[OLD_BUILD, LATEST_BUILD]);
    let reconciler = reconciler(&local);
    let conversion = latest_conversion();

    let first = reconciler.clean_snapshots(&conversion);
    assert_eq!(first.deleted().count(), 1);
    let after_first = local.paths();

    let second = reconciler.clean_snapshots(&conversion);
    assert!(second.attempts.is_empty(), "{second:?}");
    assert_eq!(local.paths(), after_first);
    assert_eq!(local.paths(), [LATEST_BUILD]);
}

#[test]
fn cleanup_stays_inside_the_version_folder() {
    let local = seeded(&[
        OLD_BUILD,
        LATEST_BUILD,
        "/org/x/1.0-SNAPSHOT/maven-metadata.xml",
        "/org/x/maven-metadata.xml",
        "/org/x/0.9/x-0.9.zip",
    ]);

    let report = reconciler(&local).clean_snapshots(&latest_conversion());

    assert_eq!(report.folder.as_deref(), Some("/org/x/1.0-SNAPSHOT/"));
    assert_eq!(report.listing, ListingOutcome::Listed { items: 3 });
    assert_eq!(report.deleted().collect::<Vec<_>>(), [OLD_BUILD]);
    assert_eq!(
        local.paths(),
        [
            "/org/x/0.9/x-0.9.zip",
            "/org/x/1.0-SNAPSHOT/maven-metadata.xml",
            LATEST_BUILD,
            "/org/x/maven-metadata.xml",
        ]
    );
}

#[test]
fn without_snapshots_everything_in_the_folder_goes() {
    let local = seeded(&[
        OLD_BUILD,
        LATEST_BUILD,
        "/org/x/1.0-SNAPSHOT/maven-metadata.xml",
        "/org/x/maven-metadata.xml",
        "/org/y/1.0/y-1.0.zip",
    ]);

    let report = reconciler(&local)
        .clean_snapshots(&ConversionResult::no_snapshot("/org/x/1.0-SNAPSHOT/x-"));

    assert_eq!(report.folder.as_deref(), Some("/org/x/1.0-SNAPSHOT/"));
    assert_eq!(report.deleted().count(), 3);
    assert_eq!(
        local.paths(),
        ["/org/x/maven-metadata.xml", "/org/y/1.0/y-1.0.zip"]
    );
}

#[test]
fn one_failed_deletion_does_not_stop_the_others() {
    let local = seeded(&["/a/1.0/x", "/a/1.1/y", "/a/1.2/z", "/a/2.0/w"]);
    local.fail_delete("/a/1.0/x", Fault::Storage);
    local.fail_delete("/a/1.1/y", Fault::Unsupported);

    let report = reconciler(&local).clean_snapshots(&ConversionResult::converted("/a/", "2.0"));

    assert_eq!(report.attempts.len(), 3);
    assert_eq!(report.failures().count(), 2);
    assert!(matches!(
        report.attempts[0].outcome,
        DeletionOutcome::Failed { .. }
    ));
    assert!(matches!(
        report.attempts[1].outcome,
        DeletionOutcome::Unsupported { .. }
    ));
    assert_eq!(report.attempts[2].outcome, DeletionOutcome::Deleted);
    assert_eq!(local.paths(), ["/a/1.0/x", "/a/1.1/y", "/a/2.0/w"]);
}

#[test]
fn items_already_gone_are_not_failures() {
    let local = seeded(&["/a/1.0/x", "/a/2.0/w"]);
    local.fail_delete("/a/1.0/x", Fault::NotFound);

    let report = reconciler(&local).clean_snapshots(&ConversionResult::converted("/a/", "2.0"));

    assert_eq!(report.attempts[0].outcome, DeletionOutcome::AlreadyGone);
    assert_eq!(report.failures().count(), 0);
}

#[test]
fn a_missing_folder_is_not_an_error() {
    let local = Arc::new(MemoryStorage::new());

    let report =
        reconciler(&local).clean_snapshots(&ConversionResult::no_snapshot("/org/x/1.0-SNAPSHOT/x-"));

    assert_eq!(report.listing, ListingOutcome::FolderMissing);
    assert!(report.attempts.is_empty());
}

#[test]
fn listing_faults_are_swallowed() {
    let local = seeded(&["/a/1.0/x"]);
    local.fail_list(Fault::Storage);

    let report = reconciler(&local).clean_snapshots(&ConversionResult::converted("/a/", "2.0"));

    assert!(matches!(report.listing, ListingOutcome::Failed { .. }));
    assert_eq!(local.paths(), ["/a/1.0/x"]);
}

#[test]
fn unchanged_conversions_touch_nothing() {
    let local = seeded(&["/a/1.0/x"]);
    local.fail_list(Fault::Storage);

    let report = reconciler(&local).clean_snapshots(&ConversionResult::unchanged("/a/", "2.0"));

    assert_eq!(report.listing, ListingOutcome::Skipped);
    assert_eq!(report.folder, None);
    assert_eq!(local.delete_count(), 0);
}

#[test]
fn cleanup_waits_for_the_folder_lock() {
    let local = seeded(&[OLD_BUILD, LATEST_BUILD]);
    let master = Arc::new(MasterRepositoryMock::default());
    let cache = ArchiveCache::with_locks(
        local.clone(),
        master,
        Arc::new(PathLockRegistry::new()),
    );
    let reconciler = cache.reconciler();

    // The folder `get_archive` locks for a build of this version.
    let held = cache
        .locks()
        .acquire(&ArchivePath::new(LATEST_BUILD).parent_folder());
    let guard = held.lock();

    let (done_tx, done_rx) = mpsc::channel();
    let worker = thread::spawn(move || {
        let report = reconciler.clean_snapshots(&latest_conversion());
        done_tx.send(()).unwrap();
        report
    });

    assert!(done_rx.recv_timeout(Duration::from_millis(50)).is_err());
    assert_eq!(local.delete_count(), 0);

    drop(guard);
    drop(held);
    let report = worker.join().unwrap();
    assert_eq!(report.deleted().collect::<Vec<_>>(), [OLD_BUILD]);
    assert!(cache.locks().is_empty());
}

#[test]
fn cleanup_waits_for_a_fetch_in_the_version_folder() {
    let local = seeded(&[OLD_BUILD]);
    let master = Arc::new(MasterRepositoryMock::default());
    master.put(LATEST_BUILD, 2_000, b"latest".to_vec());
    master.set_delay(Duration::from_millis(300));
    let cache = Arc::new(ArchiveCache::with_locks(
        local.clone(),
        master.clone(),
        Arc::new(PathLockRegistry::new()),
    ));

    let fetch = thread::spawn({
        let cache = cache.clone();
        move || cache.get_archive(LATEST_BUILD).map(|file| file.modified_millis)
    });
    while cache.locks().is_empty() {
        thread::yield_now();
    }
    // Let the fetch settle into its upstream call while holding the folder lock.
    thread::sleep(Duration::from_millis(20));

    let (done_tx, done_rx) = mpsc::channel();
    let reconciler = cache.reconciler();
    let cleanup = thread::spawn(move || {
        let report = reconciler.clean_snapshots(&latest_conversion());
        done_tx.send(()).unwrap();
        report
    });

    assert!(done_rx.recv_timeout(Duration::from_millis(50)).is_err());
    assert_eq!(local.delete_count(), 0);

    assert_eq!(fetch.join().unwrap().unwrap(), 2_000);
    let report = cleanup.join().unwrap();
    assert_eq!(report.listing, ListingOutcome::Listed { items: 2 });
    assert_eq!(report.deleted().collect::<Vec<_>>(), [OLD_BUILD]);
    assert_eq!(local.paths(), [LATEST_BUILD]);
    assert_eq!(master.retrieve_calls(), 1);
}
