// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2024 Oxide Computer Company

use std::convert;
use std::time::Duration;

/// Failure of a single exchange with an agent.  These are the only errors the
/// fallback layer may replace with synthesized data.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The agent did not answer within the session timeout
    #[error("no response after {0:?}")]
    Timeout(Duration),
    /// The agent answered with an error status, or with something we could
    /// not decode
    #[error("SNMP error: {0}")]
    Protocol(String),
}

impl convert::From<snmp2::Error> for TransportError {
    fn from(err: snmp2::Error) -> Self {
        TransportError::Protocol(format!("{err:?}"))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TopodError {
    /// The host could not be resolved to an address
    #[error("Invalid host: {0}")]
    InvalidHost(String),
    /// A polling session could not be set up for the host
    #[error("failed to open session to {host}: {reason}")]
    Session { host: String, reason: String },
    /// A request to an agent failed after all retries were exhausted
    #[error("SNMP request to {host} failed: {source}")]
    Transport {
        host: String,
        #[source]
        source: TransportError,
    },
    /// The agent does not implement an object we require
    #[error("No such object: {0}")]
    Missing(String),
    /// A request was well-formed but asked for something we cannot do
    #[error("Invalid argument: {0}")]
    Invalid(String),
}

impl TopodError {
    pub fn transport(host: &str, source: TransportError) -> Self {
        TopodError::Transport {
            host: host.to_string(),
            source,
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, TopodError::Transport { .. })
    }
}

impl convert::From<TopodError> for dropshot::HttpError {
    fn from(o: TopodError) -> dropshot::HttpError {
        match o {
            TopodError::InvalidHost(e) => {
                dropshot::HttpError::for_bad_request(None, e)
            }
            TopodError::Session { .. } => {
                dropshot::HttpError::for_internal_error(o.to_string())
            }
            TopodError::Transport { .. } => {
                dropshot::HttpError::for_unavail(None, o.to_string())
            }
            TopodError::Missing(e) => dropshot::HttpError::for_status(
                Some(e),
                http::StatusCode::NOT_FOUND,
            ),
            TopodError::Invalid(e) => {
                dropshot::HttpError::for_bad_request(None, e)
            }
        }
    }
}
