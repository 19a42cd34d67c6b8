//! Streaming output for a support turn

use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

/// Finite, non-restartable sequence of text fragments.
///
/// Dropping the stream closes the channel, which tells the producer to stop.
pub struct TokenStream {
    receiver: mpsc::Receiver<String>,
}

impl TokenStream {
    pub fn new(receiver: mpsc::Receiver<String>) -> Self {
        Self { receiver }
    }

    /// Get next fragment
    pub async fn next(&mut self) -> Option<String> {
        self.receiver.recv().await
    }

    /// Collect all fragments into a string
    pub async fn collect(mut self) -> String {
        let mut result = String::new();
        while let Some(token) = self.next().await {
            result.push_str(&token);
        }
        result
    }

    /// Collect fragments individually, preserving boundaries
    pub async fn fragments(mut self) -> Vec<String> {
        let mut out = Vec::new();
        while let Some(token) = self.next().await {
            out.push(token);
        }
        out
    }
}

impl Stream for TokenStream {
    type Item = String;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}
