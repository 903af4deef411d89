// Record files: per-class paths, JSON and binary formats, atomic replace

mod common;

use common::sample;
use diskfree::history::{RecordFormat, RecordStore};
use diskfree::models::{VolumeClass, VolumeRecords};

fn records() -> VolumeRecords {
    let mut r = VolumeRecords::new();
    r.insert("Data".into(), vec![sample(300, 1000, 1.5), sample(299, 1000, 5.5)]);
    r.insert(
        "//admin@nas.local/share on /Volumes/share (smbfs)".into(),
        vec![sample(50, 200, 1.5)],
    );
    r.insert("Gone".into(), vec![]);
    r
}

#[test]
fn class_files_are_separate() {
    let dir = tempfile::TempDir::new().unwrap();
    let local = RecordStore::for_class(dir.path(), VolumeClass::Local, RecordFormat::Json);
    let network = RecordStore::for_class(dir.path(), VolumeClass::Network, RecordFormat::Binary);
    assert_eq!(local.path(), dir.path().join("LocalVolumeRecords.json"));
    assert_eq!(network.path(), dir.path().join("NetworkVolumeRecords.bin"));
}

#[tokio::test]
async fn missing_file_loads_empty() {
    let dir = tempfile::TempDir::new().unwrap();
    for format in [RecordFormat::Json, RecordFormat::Binary] {
        let store = RecordStore::for_class(dir.path(), VolumeClass::Local, format);
        assert!(store.load().await.unwrap().is_empty());
    }
}

#[tokio::test]
async fn json_save_then_load() {
    let dir = tempfile::TempDir::new().unwrap();
    let store = RecordStore::for_class(dir.path(), VolumeClass::Local, RecordFormat::Json);
    store.save(&records()).await.unwrap();
    assert_eq!(store.load().await.unwrap(), records());

    let text = std::fs::read_to_string(store.path()).unwrap();
    assert!(text.contains("\"importantCapacityBytes\""));
    assert!(text.contains("\"timestamp\":1.5"));
}

#[tokio::test]
async fn binary_save_then_load() {
    let dir = tempfile::TempDir::new().unwrap();
    let store = RecordStore::for_class(dir.path(), VolumeClass::Network, RecordFormat::Binary);
    store.save(&records()).await.unwrap();
    assert_eq!(store.load().await.unwrap(), records());
    assert_eq!(std::fs::read(store.path()).unwrap()[0], 1);
}

#[tokio::test]
async fn save_replaces_previous_contents() {
    let dir = tempfile::TempDir::new().unwrap();
    let store = RecordStore::for_class(dir.path(), VolumeClass::Local, RecordFormat::Json);
    store.save(&records()).await.unwrap();

    let mut smaller = VolumeRecords::new();
    smaller.insert("Data".into(), vec![sample(1, 2, 9.0)]);
    store.save(&smaller).await.unwrap();

    assert_eq!(store.load().await.unwrap(), smaller);
    let leftovers: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(Result::ok)
        .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty());
}

#[tokio::test]
async fn interrupted_save_leftover_is_overwritten() {
    let dir = tempfile::TempDir::new().unwrap();
    let store = RecordStore::for_class(dir.path(), VolumeClass::Local, RecordFormat::Json);
    let tmp = dir.path().join("LocalVolumeRecords.json.tmp");
    std::fs::write(&tmp, vec![b'x'; 64 * 1024]).unwrap();

    store.save(&records()).await.unwrap();

    assert!(!tmp.exists());
    assert_eq!(store.load().await.unwrap(), records());
}

#[tokio::test]
async fn save_creates_data_dir() {
    let dir = tempfile::TempDir::new().unwrap();
    let nested = dir.path().join("a/b");
    let store = RecordStore::for_class(&nested, VolumeClass::Local, RecordFormat::Json);
    store.save(&records()).await.unwrap();
    assert!(store.path().exists());
}

#[tokio::test]
async fn corrupt_file_is_an_error() {
    let dir = tempfile::TempDir::new().unwrap();
    let json = RecordStore::for_class(dir.path(), VolumeClass::Local, RecordFormat::Json);
    std::fs::write(json.path(), b"{not json").unwrap();
    assert!(json.load().await.is_err());

    let bin = RecordStore::for_class(dir.path(), VolumeClass::Local, RecordFormat::Binary);
    std::fs::write(bin.path(), [9u8, 0, 0]).unwrap();
    assert!(bin.load().await.is_err());
}
