//! End-to-end behaviour of ConfigMapSource against the in-process backend.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use configmap_source::encoder::checksum;
use configmap_source::BackendError;
use configmap_source::ConfigMapSource;
use configmap_source::ConstructionError;
use configmap_source::Error;
use configmap_source::MemoryBackend;
use configmap_source::Source;
use configmap_source::SourceConfig;
use configmap_source::SourceOptions;
use configmap_source::StreamTerminated;
use tokio::time::sleep;
use tokio::time::timeout;

fn data(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

fn source_for(backend: &MemoryBackend) -> ConfigMapSource {
    ConfigMapSource::try_new(
        SourceConfig::default(),
        SourceOptions::new().name("app").namespace("prod"),
        backend,
    )
    .expect("source should build")
}

async fn wait_for_no_open_streams(backend: &MemoryBackend) {
    for _ in 0..200 {
        if backend.open_streams() == 0 {
            return;
        }
        sleep(Duration::from_millis(5)).await;
    }
    panic!("streams still open: {}", backend.open_streams());
}

#[tokio::test]
async fn read_should_snapshot_current_resource() {
    let backend = MemoryBackend::new();
    backend.put("prod", "app", data(&[("b", "2"), ("a", "1")]));
    let source = source_for(&backend);

    let cs = source.read().await.unwrap();

    assert_eq!(&cs.data()[..], br#"{"a":"1","b":"2"}"#);
    assert_eq!(cs.checksum(), checksum(br#"{"a":"1","b":"2"}"#));
}

#[tokio::test]
async fn read_missing_resource_should_fail_with_backend_error() {
    let backend = MemoryBackend::new();
    let source = source_for(&backend);

    assert!(matches!(
        source.read().await,
        Err(Error::Backend(BackendError::NotFound { .. }))
    ));
}

#[tokio::test]
async fn watch_then_stop_should_release_backend_connection() {
    let backend = MemoryBackend::new();
    let source = source_for(&backend);
    let watcher = source.watch().await.unwrap();
    assert_eq!(backend.open_streams(), 1);

    backend.put("prod", "app", data(&[("a", "1")]));
    backend.put("prod", "app", data(&[("a", "2")]));

    assert_eq!(&watcher.next().await.unwrap().data()[..], br#"{"a":"1"}"#);
    assert_eq!(&watcher.next().await.unwrap().data()[..], br#"{"a":"2"}"#);

    watcher.stop().await;

    assert_eq!(backend.open_streams(), 0);
    assert!(matches!(watcher.next().await, Err(Error::Cancelled)));
}

#[tokio::test]
async fn watch_checksums_should_match_read_for_same_content() {
    let backend = MemoryBackend::new();
    backend.put("prod", "app", data(&[("k", "v")]));
    let source = source_for(&backend);
    let watcher = source.watch().await.unwrap();

    backend.put("prod", "app", data(&[("k", "v")]));
    let watched = watcher.next().await.unwrap();
    let read = source.read().await.unwrap();

    assert!(watched.is_same_content(&read));
    watcher.stop().await;
}

#[tokio::test]
async fn deleting_resource_should_end_watch() {
    let backend = MemoryBackend::new();
    let source = source_for(&backend);
    let watcher = source.watch().await.unwrap();

    backend.put("prod", "app", data(&[("a", "1")]));
    backend.delete("prod", "app");

    assert!(watcher.next().await.is_ok());
    assert!(matches!(
        watcher.next().await,
        Err(Error::StreamTerminated(StreamTerminated::EndOfStream))
    ));
    assert_eq!(backend.open_streams(), 0);
}

#[tokio::test]
async fn injected_stream_failure_should_be_distinguishable_from_cancel() {
    let backend = MemoryBackend::new();
    let source = source_for(&backend);
    let watcher = source.watch().await.unwrap();

    backend.fail_watchers("prod", "app", BackendError::Stream("too old resource version".into()));

    let err = watcher.next().await.unwrap_err();
    assert!(err.is_terminal());
    assert!(!err.is_cancelled());
    assert!(matches!(
        err,
        Error::StreamTerminated(StreamTerminated::Backend(BackendError::Stream(_)))
    ));
    assert_eq!(backend.open_streams(), 0);
}

#[tokio::test]
async fn re_watch_after_termination_should_open_fresh_stream() {
    let backend = MemoryBackend::new();
    let source = source_for(&backend);

    let first = source.watch().await.unwrap();
    backend.delete("prod", "app");
    assert!(first.next().await.unwrap_err().is_terminal());

    let second = source.watch().await.unwrap();
    backend.put("prod", "app", data(&[("again", "yes")]));
    assert_eq!(&second.next().await.unwrap().data()[..], br#"{"again":"yes"}"#);

    second.stop().await;
    drop(first);
    wait_for_no_open_streams(&backend).await;
}

#[tokio::test]
async fn independent_watchers_should_each_see_every_event() {
    let backend = MemoryBackend::new();
    let source = Arc::new(source_for(&backend));

    let a = source.watch().await.unwrap();
    let b = source.watch().await.unwrap();
    backend.put("prod", "app", data(&[("n", "1")]));

    let from_a = timeout(Duration::from_secs(1), a.next()).await.unwrap().unwrap();
    let from_b = timeout(Duration::from_secs(1), b.next()).await.unwrap().unwrap();
    assert!(from_a.is_same_content(&from_b));

    a.stop().await;
    assert_eq!(backend.open_streams(), 1);
    b.stop().await;
    assert_eq!(backend.open_streams(), 0);
}

#[tokio::test]
async fn unreadable_auth_config_should_be_replayed_without_backend_calls() {
    let backend = MemoryBackend::new();
    let source = ConfigMapSource::new(
        SourceConfig::default(),
        SourceOptions::new().config_path("/nonexistent/kubeconfig"),
        &backend,
    );

    for _ in 0..2 {
        assert!(matches!(
            source.read().await,
            Err(Error::Construction(ConstructionError::AuthConfig { .. }))
        ));
        assert!(matches!(
            source.watch().await,
            Err(Error::Construction(ConstructionError::AuthConfig { .. }))
        ));
    }
    assert_eq!(backend.open_streams(), 0);
}
