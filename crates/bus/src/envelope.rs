// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reply envelopes
//!
//! An envelope is the capability to deliver a reply to whoever issued a
//! request, without the replier knowing the caller's transport.

use crate::message::Publisher;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Delivers reply messages to a request originator
pub trait Envelope<M>: Send + Sync {
    fn reply_with(&self, message: M);
}

/// Invokes a callback in the replier's thread
struct CallbackEnvelope<F>(F);

impl<M, F> Envelope<M> for CallbackEnvelope<F>
where
    F: Fn(M) + Send + Sync,
{
    fn reply_with(&self, message: M) {
        (self.0)(message)
    }
}

/// Forwards the reply to a publisher, which is safe from any thread
struct PublishEnvelope<M> {
    publisher: Arc<dyn Publisher<M>>,
}

impl<M> Envelope<M> for PublishEnvelope<M> {
    fn reply_with(&self, message: M) {
        self.publisher.publish(message)
    }
}

/// Sends the reply over a tokio channel so async callers can await it
struct ChannelEnvelope<M> {
    sender: mpsc::UnboundedSender<M>,
}

impl<M: Send> Envelope<M> for ChannelEnvelope<M> {
    fn reply_with(&self, message: M) {
        // A dropped receiver means the caller stopped waiting
        if self.sender.send(message).is_err() {
            tracing::debug!("reply receiver dropped");
        }
    }
}

/// Cloneable handle to an envelope, carried inside request messages
pub struct ReplyTo<M> {
    inner: Arc<dyn Envelope<M>>,
}

impl<M: 'static> ReplyTo<M> {
    pub fn new(envelope: impl Envelope<M> + 'static) -> Self {
        Self {
            inner: Arc::new(envelope),
        }
    }

    /// Reply by calling `f` on the replying thread
    pub fn callback(f: impl Fn(M) + Send + Sync + 'static) -> Self {
        Self::new(CallbackEnvelope(f))
    }

    /// Reply by publishing to `publisher`
    pub fn publish(publisher: Arc<dyn Publisher<M>>) -> Self {
        Self::new(PublishEnvelope { publisher })
    }

    pub fn reply_with(&self, message: M) {
        self.inner.reply_with(message)
    }
}

impl<M: Send + 'static> ReplyTo<M> {
    /// Reply through a fresh channel; returns the receiving half
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<M>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self::new(ChannelEnvelope { sender }), receiver)
    }
}

impl<M> Clone for ReplyTo<M> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<M> fmt::Debug for ReplyTo<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ReplyTo")
    }
}
