use std::fs;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use workshop_sync::config::{Settings, SettingsLoader, player_config_item_ids};
use workshop_sync::error::SyncError;

#[test]
fn parse_camel_case_settings() {
    let settings = Settings::from_json(
        r#"{
            "fetcher": { "path": "/opt/steamcmd/steamcmd.sh" },
            "files": { "workshopPath": "/games/Barotrauma/LocalMods" },
            "download": { "timeout": 120, "maxWorkers": 4 },
            "somethingElse": true
        }"#,
    )
    .unwrap();

    assert_eq!(
        settings.fetcher.path.to_str(),
        Some("/opt/steamcmd/steamcmd.sh")
    );
    assert_eq!(settings.fetcher.app_id, "602960");
    assert_eq!(
        settings.files.workshop_path,
        Utf8PathBuf::from("/games/Barotrauma/LocalMods")
    );
    assert_eq!(settings.files.manifest, "filelist.xml");
    assert_eq!(settings.download.timeout, 120);
    assert_eq!(settings.download.max_workers, 4);
    assert!(settings.remote.enabled);
    assert!(settings.advisories().is_empty());
}

#[test]
fn parse_snake_case_aliases() {
    let settings = Settings::from_json(
        r#"{
            "steamcmd": { "path": "steamcmd.exe", "app_id": "274900" },
            "files": { "workshop_path": "Mods" },
            "download": { "max_workers": 12 }
        }"#,
    )
    .unwrap();

    assert_eq!(settings.fetcher.path.to_str(), Some("steamcmd.exe"));
    assert_eq!(settings.fetcher.app_id, "274900");
    assert_eq!(settings.files.workshop_path, Utf8PathBuf::from("Mods"));
    assert_eq!(settings.download.max_workers, 12);
    assert_eq!(settings.download.timeout, 300);
    assert_eq!(settings.advisories().len(), 1);
}

#[test]
fn invalid_settings_are_rejected() {
    let err = Settings::from_json(r#"{ "download": { "timeout": "soon" } }"#).unwrap_err();
    assert_matches!(err, SyncError::SettingsParse(_));
}

#[test]
fn explicit_settings_file_must_exist() {
    let temp = tempfile::tempdir().unwrap();
    let missing = temp.path().join("nope.json");
    let err = SettingsLoader::resolve(missing.to_str()).unwrap_err();
    assert_matches!(err, SyncError::SettingsRead(_));
}

#[test]
fn explicit_settings_file_is_loaded() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("workshop-sync.json");
    fs::write(&path, r#"{ "download": { "maxWorkers": 6 } }"#).unwrap();

    let settings = SettingsLoader::resolve(path.to_str()).unwrap();
    assert_eq!(settings.download.max_workers, 6);
}

#[test]
fn read_ids_from_player_config_file() {
    let temp = tempfile::tempdir().unwrap();
    let path = Utf8PathBuf::from_path_buf(temp.path().join("config_player.xml")).unwrap();
    fs::write(
        path.as_std_path(),
        r#"<?xml version="1.0" encoding="utf-8"?>
<config language="English">
  <contentpackages>
    <core path="Content/ContentPackages/Vanilla.xml" />
    <regularpackages>
      <package path="LocalMods/2701251094/filelist.xml" enabled="true" />
      <package path="LocalMods/1234567890/filelist.xml" enabled="true" />
      <package path="LocalMods/2701251094/filelist.xml" enabled="true" />
    </regularpackages>
  </contentpackages>
</config>"#,
    )
    .unwrap();

    let ids = player_config_item_ids(&path).unwrap();
    let values = ids.iter().map(|id| id.as_str()).collect::<Vec<_>>();
    assert_eq!(values, vec!["2701251094", "1234567890", "2701251094"]);
}

#[test]
fn missing_player_config_is_fatal() {
    let temp = tempfile::tempdir().unwrap();
    let path = Utf8PathBuf::from_path_buf(temp.path().join("config_player.xml")).unwrap();
    assert_matches!(
        player_config_item_ids(&path),
        Err(SyncError::PlayerConfigRead(_))
    );
}
