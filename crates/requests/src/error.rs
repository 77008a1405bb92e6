// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for request management

use crate::id::CorrelationId;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("request {0} is already in flight")]
    DuplicateCorrelation(CorrelationId),
    #[error("no request in flight for {0}")]
    UnknownCorrelation(CorrelationId),
}
