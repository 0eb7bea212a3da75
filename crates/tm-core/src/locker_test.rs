use super::*;
use crate::store::{FsStore, MemoryStore};
use tempfile::tempdir;

fn memory_locker(marker: Option<PathBuf>) -> (Arc<MemoryStore>, Locker) {
    let store = Arc::new(MemoryStore::new());
    let locker = Locker::new(store.clone(), marker);
    (store, locker)
}

#[test]
fn test_acquire_and_release() {
    let (store, locker) = memory_locker(None);
    assert_eq!(locker.blocked().unwrap(), None);

    let guard = locker.try_acquire().unwrap().expect("lock should be free");
    assert!(store.exists(LOCK_KEY).unwrap());
    assert_eq!(locker.blocked().unwrap(), Some(Gate::Locked));

    let holder = locker.holder().unwrap().unwrap();
    assert_eq!(holder.token, guard.token);
    assert_eq!(holder.pid, std::process::id());

    guard.release().unwrap();
    assert!(!store.exists(LOCK_KEY).unwrap());
    assert_eq!(locker.blocked().unwrap(), None);
}

#[test]
fn test_second_acquire_fails_while_held() {
    let (_, locker) = memory_locker(None);
    let _guard = locker.try_acquire().unwrap().unwrap();
    assert!(locker.try_acquire().unwrap().is_none());
}

#[test]
fn test_drop_releases_lock() {
    let (store, locker) = memory_locker(None);
    {
        let _guard = locker.try_acquire().unwrap().unwrap();
        assert!(store.exists(LOCK_KEY).unwrap());
    }
    assert!(!store.exists(LOCK_KEY).unwrap());
    assert!(locker.try_acquire().unwrap().is_some());
}

#[test]
fn test_drop_releases_lock_on_error_path() {
    fn failing_run(locker: &Locker) -> CoreResult<()> {
        let _guard = locker.try_acquire()?.unwrap();
        Err(CoreError::ConfigInvalid {
            message: "boom".to_string(),
        })
    }

    let (store, locker) = memory_locker(None);
    assert!(failing_run(&locker).is_err());
    assert!(!store.exists(LOCK_KEY).unwrap());
}

#[test]
fn test_maintenance_blocks_without_touching_lock() {
    let dir = tempdir().unwrap();
    let marker = dir.path().join("maintenance.flag");
    let (store, locker) = memory_locker(Some(marker.clone()));

    assert!(!locker.is_maintenance());
    locker.enable_maintenance().unwrap();
    assert!(marker.exists());
    assert!(locker.is_maintenance());
    assert_eq!(locker.blocked().unwrap(), Some(Gate::Maintenance));

    assert!(locker.try_acquire().unwrap().is_none());
    assert!(!store.exists(LOCK_KEY).unwrap());

    locker.disable_maintenance().unwrap();
    locker.disable_maintenance().unwrap();
    assert!(!locker.is_maintenance());
    assert!(locker.try_acquire().unwrap().is_some());
}

#[test]
fn test_maintenance_toggle_requires_marker() {
    let (_, locker) = memory_locker(None);
    assert!(matches!(
        locker.enable_maintenance(),
        Err(CoreError::ConfigInvalid { .. })
    ));
}

#[test]
fn test_force_release_removes_stale_lock() {
    let (store, locker) = memory_locker(None);
    store.set(LOCK_KEY, "").unwrap();

    let holder = locker.force_release().unwrap().unwrap();
    assert!(holder.token.is_empty());
    assert!(!store.exists(LOCK_KEY).unwrap());
    assert!(locker.force_release().unwrap().is_none());
}

#[test]
fn test_guard_does_not_release_foreign_lock() {
    let (store, locker) = memory_locker(None);
    let stale = locker.try_acquire().unwrap().unwrap();

    locker.force_release().unwrap();
    let current = locker.try_acquire().unwrap().unwrap();

    stale.release().unwrap();
    assert!(store.exists(LOCK_KEY).unwrap());
    assert_eq!(locker.holder().unwrap().unwrap().token, current.token);

    current.release().unwrap();
    assert!(!store.exists(LOCK_KEY).unwrap());
}

#[test]
fn test_two_lockers_share_a_directory() {
    let dir = tempdir().unwrap();
    let first = Locker::new(Arc::new(FsStore::open(dir.path()).unwrap()), None);
    let second = Locker::new(Arc::new(FsStore::open(dir.path()).unwrap()), None);

    let guard = first.try_acquire().unwrap().unwrap();
    assert!(dir.path().join(LOCK_KEY).exists());
    assert_eq!(second.blocked().unwrap(), Some(Gate::Locked));
    assert!(second.try_acquire().unwrap().is_none());

    drop(guard);
    assert!(second.try_acquire().unwrap().is_some());
}
