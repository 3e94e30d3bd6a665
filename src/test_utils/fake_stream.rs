use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::backend::BackendStream;
use crate::backend::ConfigData;
use crate::BackendError;

type StreamItem = std::result::Result<ConfigData, BackendError>;

/// Scripted backend stream. Events are pushed through the paired
/// [`FakeStreamHandle`]; releases are counted so tests can assert the stream
/// was closed exactly once.
pub struct FakeStream {
    events: mpsc::UnboundedReceiver<StreamItem>,
    closed: bool,
    releases: Arc<AtomicUsize>,
}

pub struct FakeStreamHandle {
    sender: Option<mpsc::UnboundedSender<StreamItem>>,
    releases: Arc<AtomicUsize>,
}

pub fn fake_stream() -> (FakeStream, FakeStreamHandle) {
    let (sender, events) = mpsc::unbounded_channel();
    let releases = Arc::new(AtomicUsize::new(0));
    (
        FakeStream {
            events,
            closed: false,
            releases: releases.clone(),
        },
        FakeStreamHandle {
            sender: Some(sender),
            releases,
        },
    )
}

impl FakeStreamHandle {
    /// Queues a full snapshot event
    pub fn push(
        &self,
        data: ConfigData,
    ) {
        if let Some(sender) = &self.sender {
            let _ = sender.send(Ok(data));
        }
    }

    /// Queues a stream error
    pub fn fail(
        &self,
        error: BackendError,
    ) {
        if let Some(sender) = &self.sender {
            let _ = sender.send(Err(error));
        }
    }

    /// Ends the stream after the queued events
    pub fn finish(&mut self) {
        self.sender.take();
    }

    /// How many times the stream released its connection
    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::Acquire)
    }

    pub fn is_released(&self) -> bool {
        self.releases() > 0
    }
}

#[async_trait]
impl BackendStream for FakeStream {
    async fn receive(&mut self) -> Option<StreamItem> {
        if self.closed {
            return None;
        }
        self.events.recv().await
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.events.close();
        self.releases.fetch_add(1, Ordering::AcqRel);
    }
}
