use bytes::Bytes;
use futures_util::StreamExt;
use futures_util::stream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::manager::{DownloadError, DownloadEvent, Downloader};
use crate::remote::{FileHandle, MockRemoteStore, RemoteError};

fn file(id: &str, name: &str) -> FileHandle {
    FileHandle {
        id: id.to_string(),
        name: name.to_string(),
        mime_type: None,
        size: None,
        parent_id: None,
        is_folder: false,
        modified_at: None,
    }
}

fn folder(id: &str, name: &str) -> FileHandle {
    FileHandle {
        is_folder: true,
        ..file(id, name)
    }
}

fn drain(rx: &mut mpsc::UnboundedReceiver<DownloadEvent>) -> Vec<DownloadEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test(flavor = "multi_thread")]
async fn download_writes_file_and_emits_events() {
    let mut remote = MockRemoteStore::new();
    remote.expect_download_stream().returning(|_, _| {
        let chunks = vec![Ok(Bytes::from_static(b"hel")), Ok(Bytes::from_static(b"lo"))];
        Ok((stream::iter(chunks).boxed(), 5))
    });

    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("audio.mp3");
    let (tx, mut rx) = mpsc::unbounded_channel();
    let downloader = Downloader::new(CancellationToken::new()).with_events(tx);

    let received = downloader
        .download_to_file(&remote, &file("f1", "audio.mp3"), &dest)
        .await
        .unwrap();

    assert_eq!(received, 5);
    assert_eq!(std::fs::read(&dest).unwrap(), b"hello");
    assert!(!dir.path().join("audio.mp3.part").exists());

    let events = drain(&mut rx);
    assert!(matches!(
        events.first(),
        Some(DownloadEvent::Started { total: 5, .. })
    ));
    assert!(
        events
            .iter()
            .any(|e| matches!(e, DownloadEvent::Progress { received: 5, .. }))
    );
    assert!(matches!(
        events.last(),
        Some(DownloadEvent::Completed { .. })
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn midstream_error_removes_partial_file() {
    let mut remote = MockRemoteStore::new();
    remote.expect_download_stream().returning(|_, _| {
        let chunks = vec![
            Ok(Bytes::from_static(b"abc")),
            Err(RemoteError::network("connection reset")),
        ];
        Ok((stream::iter(chunks).boxed(), 10))
    });

    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("audio.mp3");
    let (tx, mut rx) = mpsc::unbounded_channel();
    let downloader = Downloader::new(CancellationToken::new()).with_events(tx);

    let err = downloader
        .download_to_file(&remote, &file("f1", "audio.mp3"), &dest)
        .await
        .unwrap_err();

    assert!(matches!(err, DownloadError::Remote(_)));
    assert!(!dest.exists());
    assert!(!dir.path().join("audio.mp3.part").exists());
    assert!(
        drain(&mut rx)
            .iter()
            .any(|e| matches!(e, DownloadEvent::Failed { .. }))
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn short_stream_is_a_size_mismatch() {
    let mut remote = MockRemoteStore::new();
    remote.expect_download_stream().returning(|_, _| {
        let chunks = vec![Ok(Bytes::from_static(b"abc"))];
        Ok((stream::iter(chunks).boxed(), 10))
    });

    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("audio.mp3");
    let downloader = Downloader::default();

    let err = downloader
        .download_to_file(&remote, &file("f1", "audio.mp3"), &dest)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        DownloadError::SizeMismatch {
            expected: 10,
            actual: 3
        }
    ));
    assert!(!dest.exists());
    assert!(!dir.path().join("audio.mp3.part").exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn cancelled_token_stops_before_any_request() {
    let remote = MockRemoteStore::new();
    let cancel = CancellationToken::new();
    cancel.cancel();
    let downloader = Downloader::new(cancel);

    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("audio.mp3");
    let err = downloader
        .download_to_file(&remote, &file("f1", "audio.mp3"), &dest)
        .await
        .unwrap_err();

    assert!(matches!(err, DownloadError::Cancelled));
    assert!(!dest.exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn folder_without_manifest_is_fatal() {
    let mut remote = MockRemoteStore::new();
    remote
        .expect_list()
        .returning(|_, _| Ok(vec![file("a1", "audio.mp3")]));

    let dir = tempfile::tempdir().unwrap();
    let downloader = Downloader::default();
    let err = downloader
        .fetch_project_folder(&remote, &folder("p1", "proj-1"), dir.path())
        .await
        .unwrap_err();

    assert!(matches!(err, DownloadError::MissingManifest { .. }));
}

#[tokio::test(flavor = "multi_thread")]
async fn audio_failure_still_yields_the_manifest() {
    let mut remote = MockRemoteStore::new();
    remote
        .expect_list()
        .returning(|_, _| Ok(vec![file("m1", "project.json"), file("a1", "audio.mp3")]));
    remote
        .expect_download_bytes()
        .returning(|_| Ok(b"{\"id\":\"p1\"}".to_vec()));
    remote
        .expect_download_stream()
        .returning(|_, _| Err(RemoteError::network("flaky")));

    let dir = tempfile::tempdir().unwrap();
    let downloader = Downloader::default();
    let fetched = downloader
        .fetch_project_folder(&remote, &folder("p1", "proj-1"), dir.path())
        .await
        .unwrap();

    assert_eq!(fetched.manifest, b"{\"id\":\"p1\"}");
    assert!(fetched.audio_path.is_none());
    assert!(fetched.audio_skipped.is_some());
}

#[tokio::test(flavor = "multi_thread")]
async fn fetches_manifest_and_audio_into_staging() {
    let mut remote = MockRemoteStore::new();
    remote
        .expect_list()
        .returning(|_, _| Ok(vec![file("m1", "project.json"), file("a1", "audio.mp3")]));
    remote
        .expect_download_bytes()
        .returning(|_| Ok(b"{\"id\":\"p1\"}".to_vec()));
    remote.expect_download_stream().returning(|_, _| {
        let chunks = vec![Ok(Bytes::from_static(b"mp3data"))];
        Ok((stream::iter(chunks).boxed(), 7))
    });

    let dir = tempfile::tempdir().unwrap();
    let downloader = Downloader::default();
    let fetched = downloader
        .fetch_project_folder(&remote, &folder("p1", "proj 1"), dir.path())
        .await
        .unwrap();

    let audio = fetched.audio_path.expect("audio downloaded");
    assert_eq!(audio, dir.path().join("proj 1.mp3"));
    assert_eq!(std::fs::read(&audio).unwrap(), b"mp3data");
}
