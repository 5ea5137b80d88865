use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use treefs::{Backend, Bytes, Entry, Error, InMemory, StorageError, TreeCodec};

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
struct Pair {
    left: u32,
    right: u32,
    label: String,
}

impl Pair {
    fn uniform(n: u32) -> Self {
        Self {
            left: n,
            right: n,
            label: format!("pair-{}", n),
        }
    }
}

#[tokio::test]
async fn test_async_round_trip_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("pair");
    let codec = TreeCodec::new();

    codec.encode_async(Pair::uniform(7), target.clone()).await.unwrap();
    assert_eq!(
        std::fs::read_to_string(target.join("label.txt")).unwrap(),
        "pair-7"
    );

    let back: Pair = codec.decode_async(target).await.unwrap();
    assert_eq!(back, Pair::uniform(7));
}

#[tokio::test]
async fn test_async_invalid_path() {
    let codec = TreeCodec::builder().backend(InMemory::new()).build();
    let err = codec.encode_async(1i64, "/").await.unwrap_err();
    assert!(matches!(err, Error::InvalidPath { .. }));
}

/// In-memory storage that parks reads while `hold` is set and logs every
/// `label` leaf it writes.
#[derive(Default)]
struct Turnstile {
    inner: InMemory,
    hold: AtomicBool,
    parked: AtomicBool,
    labels: Mutex<Vec<String>>,
}

impl Backend for Turnstile {
    fn exists(&self, path: &Path) -> bool {
        self.inner.exists(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.inner.is_dir(path)
    }

    fn create_dir_all(&self, path: &Path) -> Result<(), StorageError> {
        self.inner.create_dir_all(path)
    }

    fn write_atomic(&self, path: &Path, data: Bytes) -> Result<(), StorageError> {
        if path.ends_with("label.txt") {
            let label = String::from_utf8_lossy(&data).into_owned();
            self.labels.lock().unwrap().push(label);
        }
        self.inner.write_atomic(path, data)
    }

    fn read(&self, path: &Path) -> Result<Bytes, StorageError> {
        while self.hold.load(Ordering::SeqCst) {
            self.parked.store(true, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(1));
        }
        self.inner.read(path)
    }

    fn list_dir(&self, path: &Path) -> Result<Vec<Entry>, StorageError> {
        self.inner.list_dir(path)
    }
}

#[tokio::test]
async fn test_encodes_apply_in_admission_order() {
    let disk = Arc::new(Turnstile::default());
    let codec = TreeCodec::builder().backend(Arc::clone(&disk)).build();
    codec.encode_async(Pair::uniform(0), "/p").await.unwrap();

    // A decode parked inside the backend keeps the gate shared.
    disk.hold.store(true, Ordering::SeqCst);
    let reader = {
        let codec = codec.clone();
        tokio::spawn(async move { codec.decode_async::<Pair>("/p").await })
    };
    while !disk.parked.load(Ordering::SeqCst) {
        tokio::task::yield_now().await;
    }

    let mut writers = Vec::new();
    for n in 1..=8 {
        let codec = codec.clone();
        writers.push(tokio::spawn(async move {
            codec.encode_async(Pair::uniform(n), "/p").await
        }));
        // Let this writer queue on the gate before spawning the next.
        tokio::task::yield_now().await;
    }
    assert_eq!(disk.labels.lock().unwrap().len(), 1);

    disk.hold.store(false, Ordering::SeqCst);
    assert_eq!(reader.await.unwrap().unwrap(), Pair::uniform(0));
    for writer in writers {
        writer.await.unwrap().unwrap();
    }

    let expected: Vec<String> = (0..=8).map(|n| format!("pair-{}", n)).collect();
    assert_eq!(*disk.labels.lock().unwrap(), expected);
    let last: Pair = codec.decode_async("/p").await.unwrap();
    assert_eq!(last, Pair::uniform(8));
}

#[tokio::test]
#[should_panic]
async fn test_blocking_encode_inside_runtime_panics() {
    let codec = TreeCodec::builder().backend(InMemory::new()).build();
    let _ = codec.encode(&1i64, "/n");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_encodes_to_distinct_paths() {
    let codec = TreeCodec::builder().backend(InMemory::new()).build();

    let mut tasks = Vec::new();
    for n in 0..16 {
        let codec = codec.clone();
        tasks.push(tokio::spawn(async move {
            codec
                .encode_async(Pair::uniform(n), format!("/pairs/{}", n))
                .await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    for n in 0..16 {
        let back: Pair = codec.decode_async(format!("/pairs/{}", n)).await.unwrap();
        assert_eq!(back, Pair::uniform(n));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_decodes_never_observe_a_half_encoded_record() {
    let dir = tempfile::tempdir().unwrap();
    let target = Arc::new(dir.path().join("pair"));
    let codec = TreeCodec::new();
    codec
        .encode_async(Pair::uniform(0), target.as_ref().clone())
        .await
        .unwrap();

    let writer = {
        let codec = codec.clone();
        let target = Arc::clone(&target);
        tokio::spawn(async move {
            for n in 1..=50 {
                codec
                    .encode_async(Pair::uniform(n), target.as_ref().clone())
                    .await
                    .unwrap();
            }
        })
    };

    let mut readers = Vec::new();
    for _ in 0..4 {
        let codec = codec.clone();
        let target = Arc::clone(&target);
        readers.push(tokio::spawn(async move {
            for _ in 0..50 {
                let pair: Pair = codec.decode_async(target.as_ref().clone()).await.unwrap();
                assert_eq!(pair.left, pair.right);
                assert_eq!(pair.label, format!("pair-{}", pair.left));
            }
        }));
    }

    writer.await.unwrap();
    for reader in readers {
        reader.await.unwrap();
    }

    let last: Pair = codec.decode_async(target.as_ref().clone()).await.unwrap();
    assert_eq!(last, Pair::uniform(50));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_blocking_api_from_blocking_pool() {
    let codec = TreeCodec::builder().backend(InMemory::new()).build();

    let back = tokio::task::spawn_blocking(move || {
        codec.encode(&vec!["x", "y"], "/xs").unwrap();
        codec.decode::<Vec<String>>("/xs").unwrap()
    })
    .await
    .unwrap();

    assert_eq!(back, vec!["x", "y"]);
}
