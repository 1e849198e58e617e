use serde::Serialize;

use crate::domain::{ContentItem, ItemId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Freshness {
    Fresh,
    NeedsFetch,
}

/// The freshness policy. Rules are checked in order and the first match wins.
///
/// Unknown remote metadata never forces a fetch: without proof of staleness
/// the local copy is kept.
pub fn decide(item: &ContentItem) -> Freshness {
    if !item.local_present {
        return Freshness::NeedsFetch;
    }
    if !item.manifest_present {
        return Freshness::NeedsFetch;
    }
    let Some(remote) = item.remote_updated_at else {
        return Freshness::Fresh;
    };
    match item.local_manifest_mtime {
        Some(local) if remote <= local => Freshness::Fresh,
        _ => Freshness::NeedsFetch,
    }
}

/// Ids that need fetching, in input order. `force` marks everything stale.
pub fn decide_all(items: &[ContentItem], force: bool) -> Vec<ItemId> {
    items
        .iter()
        .filter(|item| force || decide(item) == Freshness::NeedsFetch)
        .map(|item| item.id.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use camino::Utf8PathBuf;
    use chrono::{DateTime, Duration, Utc};

    use super::*;

    fn item(local: bool, manifest: bool) -> ContentItem {
        ContentItem {
            id: "100".parse().unwrap(),
            local_path: Utf8PathBuf::from("LocalMods/100"),
            manifest_path: Utf8PathBuf::from("LocalMods/100/filelist.xml"),
            local_present: local,
            manifest_present: manifest,
            local_manifest_mtime: manifest.then(|| ts(1_700_000_000)),
            remote_updated_at: None,
        }
    }

    fn ts(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    #[test]
    fn missing_directory_always_needs_fetch() {
        for remote in [None, Some(ts(0)), Some(ts(2_000_000_000))] {
            let item = item(false, false).with_remote_updated_at(remote);
            assert_eq!(decide(&item), Freshness::NeedsFetch);
        }
    }

    #[test]
    fn missing_manifest_needs_fetch() {
        let item = item(true, false).with_remote_updated_at(Some(ts(0)));
        assert_eq!(decide(&item), Freshness::NeedsFetch);
    }

    #[test]
    fn unknown_remote_is_fresh() {
        assert_eq!(decide(&item(true, true)), Freshness::Fresh);
    }

    #[test]
    fn remote_not_newer_is_fresh() {
        let local = item(true, true);
        let mtime = local.local_manifest_mtime.unwrap();
        for remote in [mtime, mtime - Duration::days(3)] {
            let item = local.clone().with_remote_updated_at(Some(remote));
            assert_eq!(decide(&item), Freshness::Fresh);
        }
    }

    #[test]
    fn remote_newer_needs_fetch() {
        let local = item(true, true);
        let remote = local.local_manifest_mtime.unwrap() + Duration::seconds(1);
        let item = local.with_remote_updated_at(Some(remote));
        assert_eq!(decide(&item), Freshness::NeedsFetch);
    }

    #[test]
    fn unknown_local_mtime_with_remote_needs_fetch() {
        let mut local = item(true, true);
        local.local_manifest_mtime = None;
        let item = local.with_remote_updated_at(Some(ts(1)));
        assert_eq!(decide(&item), Freshness::NeedsFetch);
    }

    #[test]
    fn force_marks_everything_stale() {
        let items = vec![item(true, true), item(false, false)];
        assert_eq!(decide_all(&items, false).len(), 1);
        assert_eq!(decide_all(&items, true).len(), 2);
    }
}
