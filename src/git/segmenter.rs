//! Regrouping of a flat line stream into per-commit buffers
//!
//! `git log` with a custom `--format` prints one header line per commit followed
//! by that commit's numstat lines. Each header begins with a sentinel that never
//! appears in ordinary output, so a buffer is simply "a sentinel line and
//! everything up to the next one".

use futures::stream::{self, Stream, StreamExt};

/// Default record sentinel: two U+241E SYMBOL FOR RECORD SEPARATOR characters
pub const DEFAULT_SENTINEL: &str = "\u{241E}\u{241E}";

/// Explicit state machine behind the iterator and stream adaptors.
///
/// The only state is the buffer currently being filled.
#[derive(Debug)]
pub struct CommitSegmenter {
    sentinel: String,
    current: Option<Vec<String>>,
    emitted: usize,
}

impl CommitSegmenter {
    pub fn new(sentinel: impl Into<String>) -> Self {
        Self {
            sentinel: sentinel.into(),
            current: None,
            emitted: 0,
        }
    }

    /// Feed one line; returns the previous buffer when `line` opens a new one
    pub fn push(&mut self, line: String) -> Option<Vec<String>> {
        if line.starts_with(&self.sentinel) {
            let finished = self.current.replace(vec![line]);
            if finished.is_some() {
                self.emitted += 1;
            }
            finished
        } else {
            match self.current.as_mut() {
                Some(buffer) => buffer.push(line),
                None => tracing::debug!("Dropping line before first commit header: {:?}", line),
            }
            None
        }
    }

    /// Flush the last buffer at end of input
    pub fn finish(&mut self) -> Option<Vec<String>> {
        let last = self.current.take();
        if last.is_some() {
            self.emitted += 1;
        } else if self.emitted == 0 {
            tracing::info!("No commits found in log output");
        }
        last
    }

    /// Number of buffers emitted so far
    pub fn emitted(&self) -> usize {
        self.emitted
    }
}

/// Iterator adaptor produced by [`segment_lines`]
pub struct Segments<I> {
    lines: I,
    segmenter: CommitSegmenter,
    exhausted: bool,
}

impl<I> Iterator for Segments<I>
where
    I: Iterator<Item = String>,
{
    type Item = Vec<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.exhausted {
            return None;
        }
        for line in self.lines.by_ref() {
            if let Some(buffer) = self.segmenter.push(line) {
                return Some(buffer);
            }
        }
        self.exhausted = true;
        self.segmenter.finish()
    }
}

/// Lazily group `lines` into per-commit buffers
pub fn segment_lines<I>(lines: I, sentinel: &str) -> Segments<I::IntoIter>
where
    I: IntoIterator<Item = String>,
{
    Segments {
        lines: lines.into_iter(),
        segmenter: CommitSegmenter::new(sentinel),
        exhausted: false,
    }
}

/// Stream counterpart of [`segment_lines`].
///
/// An upstream error is forwarded as-is and ends the stream; the partially
/// filled buffer is discarded in that case.
pub fn segment_stream<S, E>(lines: S, sentinel: &str) -> impl Stream<Item = Result<Vec<String>, E>> + use<S, E>
where
    S: Stream<Item = Result<String, E>> + Unpin,
{
    let state = (lines, CommitSegmenter::new(sentinel), false);

    stream::unfold(state, |(mut lines, mut segmenter, done)| async move {
        if done {
            return None;
        }
        while let Some(item) = lines.next().await {
            match item {
                Ok(line) => {
                    if let Some(buffer) = segmenter.push(line) {
                        return Some((Ok(buffer), (lines, segmenter, false)));
                    }
                }
                Err(e) => return Some((Err(e), (lines, segmenter, true))),
            }
        }
        segmenter
            .finish()
            .map(|buffer| (Ok(buffer), (lines, segmenter, true)))
    })
}
