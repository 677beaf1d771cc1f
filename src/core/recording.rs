use tokio::sync::oneshot;

/// A finished recording: the container chunks in arrival order.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordedMix<C> {
    pub mime_type: String,
    pub chunks: Vec<C>,
}

/// Collects encoder chunks for one live recording and resolves its result
/// exactly once, when [`RecordingSession::finish`] is called.
///
/// The session never finishes on its own; dropping it without finishing
/// closes the result channel with an error instead.
#[derive(Debug)]
pub struct RecordingSession<C> {
    mime_type: String,
    chunks: Vec<C>,
    done: Option<oneshot::Sender<RecordedMix<C>>>,
}

impl<C> RecordingSession<C> {
    pub fn new(mime_type: impl Into<String>) -> (Self, oneshot::Receiver<RecordedMix<C>>) {
        let (tx, rx) = oneshot::channel();
        let session = Self {
            mime_type: mime_type.into(),
            chunks: Vec::new(),
            done: Some(tx),
        };
        (session, rx)
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn is_finished(&self) -> bool {
        self.done.is_none()
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Append a chunk. Empty chunks and chunks after `finish` are dropped.
    pub fn push_chunk(&mut self, chunk: C, len: usize) {
        if len == 0 || self.is_finished() {
            return;
        }
        self.chunks.push(chunk);
    }

    /// Resolve the result. Returns `false` if it was already resolved.
    pub fn finish(&mut self) -> bool {
        let Some(tx) = self.done.take() else {
            return false;
        };
        let mix = RecordedMix {
            mime_type: self.mime_type.clone(),
            chunks: std::mem::take(&mut self.chunks),
        };
        if tx.send(mix).is_err() {
            log::debug!("[recording] result receiver dropped before finish");
        }
        true
    }
}
