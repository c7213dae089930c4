//! Connection state tracking.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::protocol::TransactionStatus;

/// Lifecycle of a driver connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Authenticating,
    /// Idle between exchanges, with the server's transaction status.
    Ready(TransactionStatusState),
    /// An exchange is in progress.
    Busy,
    /// The link can no longer be trusted (I/O or framing failure).
    Error,
    Disconnected,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransactionStatusState {
    #[default]
    Idle,
    InTransaction,
    InFailed,
}

impl From<TransactionStatus> for TransactionStatusState {
    fn from(status: TransactionStatus) -> Self {
        match status {
            TransactionStatus::Idle => TransactionStatusState::Idle,
            TransactionStatus::Transaction => TransactionStatusState::InTransaction,
            TransactionStatus::Error => TransactionStatusState::InFailed,
        }
    }
}

/// Health flags readable without taking the connection lock.
///
/// An exchange sets `in_flight` before writing and clears it on
/// ReadyForQuery, so a future dropped mid-exchange leaves the flag set and the
/// connection is never reused with unread responses on the wire.
#[derive(Debug, Default)]
pub struct ConnectionHealth {
    in_flight: AtomicBool,
    broken: AtomicBool,
    in_transaction: AtomicBool,
}

impl ConnectionHealth {
    pub fn begin_exchange(&self) {
        self.in_flight.store(true, Ordering::Release);
    }

    pub fn finish_exchange(&self, status: TransactionStatusState) {
        self.in_transaction
            .store(status != TransactionStatusState::Idle, Ordering::Release);
        self.in_flight.store(false, Ordering::Release);
    }

    pub fn mark_broken(&self) {
        self.broken.store(true, Ordering::Release);
    }

    pub fn is_broken(&self) -> bool {
        self.broken.load(Ordering::Acquire)
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Idle, healthy and outside any transaction block.
    pub fn is_reusable(&self) -> bool {
        !self.broken.load(Ordering::Acquire)
            && !self.in_flight.load(Ordering::Acquire)
            && !self.in_transaction.load(Ordering::Acquire)
    }
}
