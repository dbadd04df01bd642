use std::sync::Arc;
use std::time::Duration;

use sane_verifier::roots::{
    BLOCKS_TO_STORE, FileRootStore, HnsdIngester, RootEntry, RootStore, TrustedRootWindow,
};

fn root(n: u32) -> String {
    format!("{:064x}", n)
}

#[test]
fn test_ring_evicts_oldest() {
    let mut window = TrustedRootWindow::default();
    for h in 0..(BLOCKS_TO_STORE as u32 + 5) {
        window.push(RootEntry::new(h, 1_000 + h as u64, &root(h)).unwrap());
    }

    assert_eq!(window.len(), BLOCKS_TO_STORE);
    assert_eq!(window.iter().next().map(|e| e.height), Some(5));
    assert!(window.find(&root(4)).is_none());
    assert!(window.find(&root(44)).is_some());
}

#[test]
fn test_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("roots.json");
    let store = FileRootStore::new(&path);

    let mut window = TrustedRootWindow::default();
    window.push(RootEntry::new(136260, 1667396404, &root(1)).unwrap());
    window.push(RootEntry::new(136261, 1667397004, &root(2)).unwrap());
    store.save(&window).unwrap();

    let reloaded = FileRootStore::new(&path).load().unwrap();
    assert_eq!(reloaded, window);

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(json[1]["height"], 136261);
    assert_eq!(json[1]["tree_root"], root(2));
}

#[test]
fn test_hnsd_output_into_store() {
    let output = format!(
        "[info] (chain) adding block: 00000000\n\
         chain (100): tree_root {} timestamp 1700000000\n\
         chain (101): tree_root {} timestamp 1700000600\n\
         chain (101):  rejected: bad-diffbits\n\
         chain (101): tree_root {} timestamp 1700000601\n\
         chain (102): tree_root {} timestamp 1700001200\n",
        root(100),
        root(1011),
        root(101),
        root(102)
    );

    let mut ingester = HnsdIngester::new(TrustedRootWindow::default());
    let committed = ingester.ingest_reader(output.as_bytes());
    assert_eq!(committed, 2);
    assert_eq!(ingester.flush().map(|e| e.height), Some(102));

    let window = ingester.finish();
    let heights: Vec<u32> = window.iter().map(|e| e.height).collect();
    assert_eq!(heights, vec![100, 101, 102]);
    assert!(window.find(&root(1011)).is_none());
}

#[test]
fn test_snapshot_survives_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("roots.json");
    let store = FileRootStore::new(&path);

    let mut window = TrustedRootWindow::default();
    window.push(RootEntry::new(1, 1, &root(1)).unwrap());
    store.save(&window).unwrap();
    let before = store.current().unwrap();

    window.push(RootEntry::new(2, 2, &root(2)).unwrap());
    store.save(&window).unwrap();

    assert_eq!(before.len(), 1);
    assert_eq!(store.current().unwrap().len(), 2);
}

#[test]
fn test_watcher_invalidates_on_external_write() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("roots.json");
    std::fs::write(&path, "[]").unwrap();

    let store = Arc::new(FileRootStore::new(&path));
    store.watch().unwrap();
    assert!(store.current().unwrap().is_empty());

    let mut window = TrustedRootWindow::default();
    window.push(RootEntry::new(7, 7, &root(7)).unwrap());
    let temp = dir.path().join("roots.json.new");
    std::fs::write(&temp, window.to_json().unwrap()).unwrap();
    std::fs::rename(&temp, &path).unwrap();

    let mut seen = false;
    for _ in 0..50 {
        if matches!(store.current(), Ok(w) if w.len() == 1) {
            seen = true;
            break;
        }
        std::thread::sleep(Duration::from_millis(100));
    }
    assert!(seen, "watcher did not pick up the new roots");
}
