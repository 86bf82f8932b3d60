//! Command client - drives one exchange from typed intent to typed outcome
//!
//! This module handles:
//! - Acquiring the per-endpoint session/sequence context
//! - Encoding the request and exchanging it over the transport
//! - Decoding and classifying the response
//! - Retry with backoff for transient failures

use bytes::BytesMut;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use crate::codec::{self, CodecError, Request};
use crate::command::Command;
use crate::session::SessionRegistry;
use crate::transport::{Transport, TransportError};
use crate::{limits, CompletionCode, Endpoint};

/// Classified failure of a command exchange.
///
/// The four kinds stay distinct so the caller can report precise
/// diagnostics; intermediate attempt failures are folded into the final
/// outcome.
#[derive(Error, Debug)]
pub enum ExecuteError {
    /// The request itself could not be encoded; nothing was sent
    #[error("request could not be encoded: {0}")]
    InvalidRequest(#[source] CodecError),

    /// Transport failure persisting past the retry budget
    #[error("endpoint {address} unreachable after {attempts} attempt(s): {source}")]
    Unreachable {
        address: String,
        attempts: u32,
        #[source]
        source: TransportError,
    },

    /// The controller answered with a non-success completion code
    #[error("device rejected command: {code}")]
    DeviceRejected { code: CompletionCode },

    /// The response failed structural or semantic decoding
    #[error("malformed response from {address} after {attempts} attempt(s): {source}")]
    MalformedResponse {
        address: String,
        attempts: u32,
        #[source]
        source: CodecError,
    },
}

/// Retry budget and backoff schedule
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum attempts per command (including the first)
    pub max_attempts: u32,
    /// Backoff before the second attempt; doubles per retry
    pub backoff_base: Duration,
    /// Upper bound on the backoff delay
    pub backoff_cap: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: limits::MAX_ATTEMPTS,
            backoff_base: Duration::from_millis(limits::BACKOFF_BASE_MS),
            backoff_cap: Duration::from_millis(limits::BACKOFF_CAP_MS),
        }
    }
}

impl RetryPolicy {
    /// Delay before the attempt following `completed` attempts
    pub fn backoff(&self, completed: u32) -> Duration {
        let exp = completed.saturating_sub(1).min(10);
        let delay = self.backoff_base * (1u32 << exp);
        delay.min(self.backoff_cap)
    }
}

/// Executes typed commands against endpoints.
///
/// Exchanges on the same endpoint are serialized by its session lock;
/// exchanges on distinct endpoints proceed in parallel.
pub struct CommandClient {
    transport: Arc<dyn Transport>,
    sessions: SessionRegistry,
    retry: RetryPolicy,
    request_timeout: Duration,
}

impl CommandClient {
    /// Create a client with default retry policy and timeouts
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            sessions: SessionRegistry::new(),
            retry: RetryPolicy::default(),
            request_timeout: Duration::from_millis(limits::REQUEST_TIMEOUT_MS),
        }
    }

    /// Override the retry policy
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Override the default per-exchange timeout
    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    /// Execute a command against an endpoint
    pub async fn execute<C: Command>(
        &self,
        endpoint: &Endpoint,
        command: &C,
    ) -> Result<C::Output, ExecuteError> {
        self.run(endpoint, command, None).await
    }

    /// Execute with a caller deadline.
    ///
    /// Once the deadline has passed, the in-flight exchange is the last:
    /// no further retries are attempted.
    pub async fn execute_with_deadline<C: Command>(
        &self,
        endpoint: &Endpoint,
        command: &C,
        deadline: Instant,
    ) -> Result<C::Output, ExecuteError> {
        self.run(endpoint, command, Some(deadline)).await
    }

    async fn run<C: Command>(
        &self,
        endpoint: &Endpoint,
        command: &C,
        deadline: Option<Instant>,
    ) -> Result<C::Output, ExecuteError> {
        let session = self.sessions.session_for(endpoint).await;
        // Held for the whole exchange, retries included: one outcome per
        // request before the sequence context is reused
        let mut sequence = session.acquire().await;

        let per_call = endpoint.request_timeout.unwrap_or(self.request_timeout);
        let mut attempts = 0u32;

        loop {
            let call_timeout = match deadline {
                Some(d) => {
                    let remaining = d.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        return Err(ExecuteError::Unreachable {
                            address: endpoint.address.clone(),
                            attempts,
                            source: TransportError::Timeout(per_call),
                        });
                    }
                    remaining.min(per_call)
                }
                None => per_call,
            };

            attempts += 1;
            let seq = sequence.advance();

            let mut params = BytesMut::new();
            command.encode_params(&mut params);
            let frame = codec::encode_request(&Request {
                netfn: command.netfn(),
                cmd: command.cmd(),
                seq,
                data: params.freeze(),
            })
            .map_err(ExecuteError::InvalidRequest)?;

            debug!(
                "executing cmd={:#04x} seq={} against {} (attempt {}/{})",
                command.cmd(),
                seq,
                endpoint.address,
                attempts,
                self.retry.max_attempts
            );

            let raw = match self
                .transport
                .exchange(endpoint, frame, call_timeout)
                .await
            {
                Ok(raw) => raw,
                Err(e) => {
                    if !command.idempotent()
                        || attempts >= self.retry.max_attempts
                        || deadline_passed(deadline)
                    {
                        return Err(ExecuteError::Unreachable {
                            address: endpoint.address.clone(),
                            attempts,
                            source: e,
                        });
                    }
                    warn!(
                        "transport failure on {} (attempt {}/{}): {}",
                        endpoint.address, attempts, self.retry.max_attempts, e
                    );
                    sleep(self.retry.backoff(attempts)).await;
                    continue;
                }
            };

            let decode_error = match decode_matching(&raw, seq, command.cmd()) {
                Ok(response) => {
                    if !response.completion.is_success() {
                        // The controller actively refused; resending cannot help
                        return Err(ExecuteError::DeviceRejected {
                            code: response.completion,
                        });
                    }
                    match command.decode_reply(&response.data) {
                        Ok(value) => return Ok(value),
                        Err(e) => e,
                    }
                }
                Err(e) => e,
            };

            if attempts >= self.retry.max_attempts || deadline_passed(deadline) {
                return Err(ExecuteError::MalformedResponse {
                    address: endpoint.address.clone(),
                    attempts,
                    source: decode_error,
                });
            }
            warn!(
                "malformed response from {} (attempt {}/{}): {}",
                endpoint.address, attempts, self.retry.max_attempts, decode_error
            );
            sleep(self.retry.backoff(attempts)).await;
        }
    }
}

/// Decode a response and verify it answers the request we sent
fn decode_matching(
    raw: &[u8],
    seq: u8,
    cmd: u8,
) -> Result<codec::Response, CodecError> {
    let response = codec::decode_response(raw)?;
    if response.seq != seq {
        return Err(CodecError::SequenceMismatch {
            expected: seq,
            actual: response.seq,
        });
    }
    if response.cmd != cmd {
        return Err(CodecError::CommandMismatch {
            expected: cmd,
            actual: response.cmd,
        });
    }
    Ok(response)
}

fn deadline_passed(deadline: Option<Instant>) -> bool {
    deadline.map_or(false, |d| Instant::now() >= d)
}
