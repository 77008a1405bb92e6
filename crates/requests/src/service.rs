// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request management service
//!
//! Owns every in-flight request manager, keyed by correlation id. Request
//! messages create managers, acknowledgements go to the manager they name,
//! and replication facts and timer ticks go to all of them. Completed
//! managers are dropped right away.
//!
//! The service is a mailbox [`Handler`], so the managers it owns are only
//! ever touched by the mailbox worker thread.

use crate::append::WriteEvents;
use crate::commit::TransactionCommit;
use crate::config::RequestTimeouts;
use crate::delete::DeleteStream;
use crate::error::RequestError;
use crate::id::CorrelationId;
use crate::manager::{Durability, Outcome, Request, RequestManager, NO_POSITION};
use crate::messages::{CoreMessage, LogPosition};
use crate::result::OperationResult;
use crate::start::TransactionStart;
use crate::write::TransactionWrite;
use esr_bus::{Clock, Handler, HandlerError, Message, Publisher, ReplyTo, SystemClock};
use std::collections::HashMap;
use std::sync::Arc;

pub struct RequestManagementService<C: Clock = SystemClock> {
    bus: Arc<dyn Publisher<CoreMessage>>,
    timeouts: RequestTimeouts,
    clock: C,
    managers: HashMap<CorrelationId, Box<dyn Request>>,
    replicated_to: LogPosition,
}

impl RequestManagementService<SystemClock> {
    pub fn new(bus: Arc<dyn Publisher<CoreMessage>>, timeouts: RequestTimeouts) -> Self {
        Self::with_clock(bus, timeouts, SystemClock)
    }
}

impl<C: Clock> RequestManagementService<C> {
    pub fn with_clock(
        bus: Arc<dyn Publisher<CoreMessage>>,
        timeouts: RequestTimeouts,
        clock: C,
    ) -> Self {
        Self {
            bus,
            timeouts,
            clock,
            managers: HashMap::new(),
            replicated_to: NO_POSITION,
        }
    }

    /// Number of requests still awaiting completion
    pub fn in_flight(&self) -> usize {
        self.managers.len()
    }

    pub fn is_in_flight(&self, correlation_id: &CorrelationId) -> bool {
        self.managers.contains_key(correlation_id)
    }

    /// Highest replication position seen so far
    pub fn replicated_to(&self) -> LogPosition {
        self.replicated_to
    }

    /// Start a request and track it until it completes.
    ///
    /// A request reusing an in-flight correlation id is answered at once with
    /// `ForwardTimeout` and never started; the live request is untouched.
    pub fn register(&mut self, mut request: Box<dyn Request>) -> Result<(), RequestError> {
        let correlation_id = request.correlation_id();
        if self.managers.contains_key(&correlation_id) {
            request.reject(Outcome {
                message: Some("Correlation id already in flight.".to_string()),
                ..Outcome::new(OperationResult::ForwardTimeout)
            });
            return Err(RequestError::DuplicateCorrelation(correlation_id));
        }

        request.start();
        if self.replicated_to > NO_POSITION {
            request.handle(&CoreMessage::ReplicatedTo {
                log_position: self.replicated_to,
            });
        }
        if request.is_completed() {
            return Ok(());
        }

        tracing::trace!(%correlation_id, kind = request.kind(), "request registered");
        self.managers.insert(correlation_id, request);
        Ok(())
    }

    pub fn process(&mut self, message: &CoreMessage) -> Result<(), RequestError> {
        if let Some(request) = self.create(message) {
            return self.register(request);
        }
        match message {
            CoreMessage::ReplicatedTo { log_position } => {
                self.replicated_to = self.replicated_to.max(*log_position);
                self.broadcast(message);
                Ok(())
            }
            CoreMessage::RequestManagerTimerTick { .. } => {
                self.broadcast(message);
                Ok(())
            }
            _ if message.is_acknowledgement() => match message.correlation_id() {
                Some(correlation_id) => self.route(correlation_id, message),
                None => Ok(()),
            },
            _ => Ok(()),
        }
    }

    fn route(
        &mut self,
        correlation_id: CorrelationId,
        message: &CoreMessage,
    ) -> Result<(), RequestError> {
        let Some(manager) = self.managers.get_mut(&correlation_id) else {
            return Err(RequestError::UnknownCorrelation(correlation_id));
        };
        manager.handle(message);
        if manager.is_completed() {
            self.managers.remove(&correlation_id);
        }
        Ok(())
    }

    fn broadcast(&mut self, message: &CoreMessage) {
        for manager in self.managers.values_mut() {
            manager.handle(message);
        }
        self.managers.retain(|_, manager| !manager.is_completed());
    }

    fn create(&self, message: &CoreMessage) -> Option<Box<dyn Request>> {
        let request = match message {
            CoreMessage::TransactionStart {
                correlation_id,
                envelope,
                stream_id,
                expected_version,
            } => self.manager(
                *correlation_id,
                envelope,
                TransactionStart::new(stream_id.clone(), *expected_version),
            ),
            CoreMessage::TransactionWrite {
                correlation_id,
                envelope,
                transaction_id,
                events,
            } => self.manager(
                *correlation_id,
                envelope,
                TransactionWrite::new(*transaction_id, events.clone()),
            ),
            CoreMessage::TransactionCommit {
                correlation_id,
                envelope,
                transaction_id,
            } => self.manager(
                *correlation_id,
                envelope,
                TransactionCommit::new(*transaction_id),
            ),
            CoreMessage::WriteEvents {
                correlation_id,
                envelope,
                stream_id,
                expected_version,
                events,
            } => self.manager(
                *correlation_id,
                envelope,
                WriteEvents::new(stream_id.clone(), *expected_version, events.clone()),
            ),
            CoreMessage::DeleteStream {
                correlation_id,
                envelope,
                stream_id,
                expected_version,
                hard_delete,
            } => self.manager(
                *correlation_id,
                envelope,
                DeleteStream::new(stream_id.clone(), *expected_version, *hard_delete),
            ),
            _ => return None,
        };
        Some(request)
    }

    fn manager<D: Durability>(
        &self,
        correlation_id: CorrelationId,
        envelope: &ReplyTo<CoreMessage>,
        durability: D,
    ) -> Box<dyn Request> {
        Box::new(RequestManager::new(
            correlation_id,
            envelope.clone(),
            Arc::clone(&self.bus),
            self.timeouts,
            self.clock.clone(),
            durability,
        ))
    }
}

impl<C: Clock> Handler<CoreMessage> for RequestManagementService<C> {
    fn handle(&mut self, message: &CoreMessage) -> Result<(), HandlerError> {
        match self.process(message) {
            Ok(()) => {}
            // Normal for acks that arrive after their request completed
            Err(RequestError::UnknownCorrelation(correlation_id)) => tracing::debug!(
                %correlation_id,
                kind = message.type_name(),
                "no request in flight"
            ),
            Err(e) => tracing::warn!(error = %e, "rejected request"),
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "service_tests.rs"]
mod tests;
