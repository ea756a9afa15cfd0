//! Shell-first streaming sink.

use std::fmt::Display;

use futures::{Sink, SinkExt};
use ppr_core::{PprError, PprResult, TimingContext};

/// State of the streaming sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SinkState {
    /// Nothing sent.
    Initial,
    /// Document head sent.
    HeadSent,
    /// Shell markup sent, boundary chunks may follow.
    ShellSent,
    /// Response completed.
    Completed,
}

/// Sink that enforces head, then shell, then boundary chunks.
///
/// Generic over any `Sink<Vec<u8>>`, such as the sending half of a
/// `futures::channel::mpsc` channel feeding a response body.
pub struct StreamingSink<S, E>
where
    S: Sink<Vec<u8>, Error = E> + Unpin,
    E: Display,
{
    inner: S,
    state: SinkState,
    timing: TimingContext,
    chunks_sent: usize,
    bytes_sent: usize,
}

impl<S, E> StreamingSink<S, E>
where
    S: Sink<Vec<u8>, Error = E> + Unpin,
    E: Display,
{
    /// Create a new streaming sink.
    pub fn new(sink: S, timing: TimingContext) -> Self {
        Self {
            inner: sink,
            state: SinkState::Initial,
            timing,
            chunks_sent: 0,
            bytes_sent: 0,
        }
    }

    async fn write(&mut self, chunk: &str) -> PprResult<()> {
        self.inner
            .send(chunk.as_bytes().to_vec())
            .await
            .map_err(|e| PprError::StreamError(e.to_string()))?;
        self.chunks_sent += 1;
        self.bytes_sent += chunk.len();
        Ok(())
    }

    /// Send the document head. Must be the first chunk.
    pub async fn send_head(&mut self, html: &str) -> PprResult<()> {
        if self.state != SinkState::Initial {
            return Err(PprError::StreamError("Head already sent".to_string()));
        }
        self.write(html).await?;
        self.timing.mark("head_sent");
        self.state = SinkState::HeadSent;
        Ok(())
    }

    /// Send the prepared shell markup. Must follow the head.
    pub async fn send_shell(&mut self, html: &str) -> PprResult<()> {
        if self.state != SinkState::HeadSent {
            return Err(PprError::StreamError(
                "Shell must follow the head exactly once".to_string(),
            ));
        }
        self.timing.mark("shell_start");
        self.write(html).await?;
        self.timing.mark("shell_sent");
        self.state = SinkState::ShellSent;
        Ok(())
    }

    /// Send a chunk after the shell.
    pub async fn send_chunk(&mut self, html: &str) -> PprResult<()> {
        match self.state {
            SinkState::Initial | SinkState::HeadSent => Err(PprError::ShellNotSent),
            SinkState::Completed => Err(PprError::StreamError("Sink already completed".to_string())),
            SinkState::ShellSent => self.write(html).await,
        }
    }

    /// Send a boundary's chunk and record its timing mark.
    pub async fn send_boundary(&mut self, id: &str, html: &str) -> PprResult<()> {
        self.send_chunk(html).await?;
        self.timing.mark_boundary(id);
        Ok(())
    }

    /// Send the closing markup and complete the response.
    pub async fn complete(&mut self, closing: &str) -> PprResult<()> {
        self.send_chunk(closing).await?;
        self.state = SinkState::Completed;
        self.timing.mark("complete");
        Ok(())
    }

    /// Close the underlying sink, ending the body.
    pub async fn close(&mut self) -> PprResult<()> {
        self.inner
            .close()
            .await
            .map_err(|e| PprError::StreamError(e.to_string()))
    }

    /// Whether the shell has been sent.
    pub fn shell_sent(&self) -> bool {
        matches!(self.state, SinkState::ShellSent | SinkState::Completed)
    }

    /// Chunks written so far.
    pub fn chunks_sent(&self) -> usize {
        self.chunks_sent
    }

    /// Bytes written so far.
    pub fn bytes_sent(&self) -> usize {
        self.bytes_sent
    }

    /// Get timing context reference.
    pub fn timing(&self) -> &TimingContext {
        &self.timing
    }
}
