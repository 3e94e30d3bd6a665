use std::time::Duration;

use tokio::time::timeout;

use super::*;
use crate::test_utils::config_data;
use crate::BackendError;
use crate::ConstructionError;
use crate::SourceIdentity;

#[tokio::test]
async fn get_should_return_stored_data() {
    let backend = MemoryBackend::new();
    backend.put("default", "micro", config_data(&[("a", "1")]));

    let data = backend.get("micro", "default").await.unwrap();

    assert_eq!(data, config_data(&[("a", "1")]));
}

#[tokio::test]
async fn get_missing_resource_should_return_not_found() {
    let backend = MemoryBackend::new();
    backend.put("other", "micro", config_data(&[("a", "1")]));

    let result = backend.get("micro", "default").await;

    assert_eq!(
        result,
        Err(BackendError::NotFound {
            namespace: "default".into(),
            name: "micro".into(),
        })
    );
}

#[tokio::test]
async fn open_watch_should_receive_full_snapshots_in_write_order() {
    let backend = MemoryBackend::new();
    let mut stream = backend.open_watch("micro", "default").await.unwrap();

    backend.put("default", "micro", config_data(&[("a", "1")]));
    backend.put("default", "micro", config_data(&[("a", "1"), ("b", "2")]));
    backend.put("default", "unrelated", config_data(&[("x", "y")]));

    assert_eq!(stream.receive().await, Some(Ok(config_data(&[("a", "1")]))));
    assert_eq!(
        stream.receive().await,
        Some(Ok(config_data(&[("a", "1"), ("b", "2")])))
    );
    assert_eq!(backend.watcher_count("default", "micro"), 1);

    stream.close();
}

#[tokio::test]
async fn close_should_unregister_stream_once() {
    let backend = MemoryBackend::new();
    let mut first = backend.open_watch("micro", "default").await.unwrap();
    let _second = backend.open_watch("micro", "default").await.unwrap();
    assert_eq!(backend.open_streams(), 2);

    first.close();
    first.close();

    assert_eq!(backend.open_streams(), 1);
    assert_eq!(backend.watcher_count("default", "micro"), 1);
    assert_eq!(first.receive().await, None);
}

#[tokio::test]
async fn dropping_stream_should_release_it() {
    let backend = MemoryBackend::new();
    let stream = backend.open_watch("micro", "default").await.unwrap();

    drop(stream);

    assert_eq!(backend.open_streams(), 0);
    assert_eq!(backend.watcher_count("default", "micro"), 0);
}

#[tokio::test]
async fn delete_should_end_open_streams() {
    let backend = MemoryBackend::new();
    backend.put("default", "micro", config_data(&[("a", "1")]));
    let mut stream = backend.open_watch("micro", "default").await.unwrap();

    backend.delete("default", "micro");

    let next = timeout(Duration::from_secs(1), stream.receive()).await.unwrap();
    assert_eq!(next, None);
    assert!(backend.get("micro", "default").await.is_err());
}

#[tokio::test]
async fn fail_watchers_should_push_error_then_end() {
    let backend = MemoryBackend::new();
    let mut stream = backend.open_watch("micro", "default").await.unwrap();

    backend.fail_watchers("default", "micro", BackendError::Stream("expired".into()));

    assert_eq!(
        stream.receive().await,
        Some(Err(BackendError::Stream("expired".into())))
    );
    assert_eq!(stream.receive().await, None);
}

#[test]
fn connect_should_share_the_store() {
    let backend = MemoryBackend::new();
    assert!(backend.connect(&SourceIdentity::new("micro", "default", "")).is_ok());
}

#[test]
fn connect_should_reject_unreadable_config_path() {
    let backend = MemoryBackend::new();

    let result = backend.connect(&SourceIdentity::new(
        "micro",
        "default",
        "/nonexistent/kubeconfig",
    ));

    assert!(matches!(result, Err(ConstructionError::AuthConfig { .. })));
}

#[test]
fn connect_should_accept_existing_config_path() {
    let backend = MemoryBackend::new();
    let kubeconfig = tempfile::NamedTempFile::new().unwrap();

    let result = backend.connect(&SourceIdentity::new(
        "micro",
        "default",
        kubeconfig.path().to_str().unwrap(),
    ));

    assert!(result.is_ok());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_puts_should_leave_last_event_equal_to_stored_value() {
    let backend = MemoryBackend::new();
    let mut stream = backend.open_watch("micro", "default").await.unwrap();

    let writers = 8;
    let writes = 50;
    let mut tasks = Vec::new();
    for w in 0..writers {
        let backend = backend.clone();
        tasks.push(tokio::spawn(async move {
            for i in 0..writes {
                backend.put("default", "micro", config_data(&[("writer", format!("{w}-{i}").as_str())]));
                tokio::task::yield_now().await;
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let mut last = None;
    for _ in 0..writers * writes {
        last = Some(stream.receive().await.unwrap().unwrap());
    }

    assert_eq!(last, Some(backend.get("micro", "default").await.unwrap()));
    stream.close();
}
