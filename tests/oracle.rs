use std::fs;

use camino::Utf8PathBuf;
use chrono::Duration;

use workshop_sync::domain::{ContentItem, ItemId};
use workshop_sync::oracle::{Freshness, decide};
use workshop_sync::store::Store;

fn store_in(temp: &tempfile::TempDir) -> Store {
    let root = Utf8PathBuf::from_path_buf(temp.path().join("LocalMods")).unwrap();
    Store::new_with_paths(root, "filelist.xml")
}

#[test]
fn installed_item_not_older_than_remote_is_fresh() {
    let temp = tempfile::tempdir().unwrap();
    let store = store_in(&temp);
    let id: ItemId = "2701251094".parse().unwrap();
    fs::create_dir_all(store.item_dir(&id).as_std_path()).unwrap();
    fs::write(store.manifest_path(&id).as_std_path(), "<contentpackage/>").unwrap();

    let item = ContentItem::inspect(&store, id);
    let mtime = item.local_manifest_mtime.unwrap();

    let same = item.clone().with_remote_updated_at(Some(mtime));
    assert_eq!(decide(&same), Freshness::Fresh);
    let older = item.clone().with_remote_updated_at(Some(mtime - Duration::hours(1)));
    assert_eq!(decide(&older), Freshness::Fresh);
    let newer = item.with_remote_updated_at(Some(mtime + Duration::hours(1)));
    assert_eq!(decide(&newer), Freshness::NeedsFetch);
}

#[test]
fn uninstalled_item_needs_fetch_whatever_the_remote_says() {
    let temp = tempfile::tempdir().unwrap();
    let store = store_in(&temp);
    let id: ItemId = "1".parse().unwrap();

    let item = ContentItem::inspect(&store, id);
    assert!(!item.is_present());
    assert_eq!(decide(&item), Freshness::NeedsFetch);
    let known = item.with_remote_updated_at(Some(chrono::Utc::now() - Duration::days(365)));
    assert_eq!(decide(&known), Freshness::NeedsFetch);
}
