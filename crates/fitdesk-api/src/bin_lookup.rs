//! BIN Lookup Sequencing
//!
//! The payment method lookup fires once six digits are typed, while the
//! member keeps typing. Responses can arrive out of order, so every lookup
//! gets a ticket from a monotonically increasing counter and only the answer
//! holding the newest ticket may update the form.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use fitdesk_checkout::{PaymentMethodId, BIN_LENGTH};

use crate::error::Result;
use crate::payment::PaymentApi;

/// Handle for one in-flight lookup
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BinTicket {
    seq: u64,
    bin: String,
}

impl BinTicket {
    pub fn bin(&self) -> &str {
        &self.bin
    }

    pub const fn seq(&self) -> u64 {
        self.seq
    }
}

/// Issues and validates lookup tickets
#[derive(Debug, Default)]
pub struct BinLookupTracker {
    latest: AtomicU64,
    current_bin: Mutex<Option<String>>,
}

impl BinLookupTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ticket for a new lookup, if the card digits call for one
    ///
    /// Returns `None` while fewer than six digits are present or when the
    /// prefix matches the last issued lookup. Dropping below six digits
    /// invalidates any lookup still in flight.
    pub fn request(&self, card_digits: &str) -> Option<BinTicket> {
        let mut current = self
            .current_bin
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let Some(bin) = card_digits.get(..BIN_LENGTH) else {
            if current.take().is_some() {
                self.latest.fetch_add(1, Ordering::SeqCst);
            }
            return None;
        };

        if current.as_deref() == Some(bin) {
            return None;
        }

        *current = Some(bin.to_string());
        let seq = self.latest.fetch_add(1, Ordering::SeqCst) + 1;

        Some(BinTicket {
            seq,
            bin: bin.to_string(),
        })
    }

    /// True if `ticket` belongs to the newest lookup
    pub fn is_current(&self, ticket: &BinTicket) -> bool {
        self.latest.load(Ordering::SeqCst) == ticket.seq
    }

    /// Let the prefix of a failed lookup be requested again
    ///
    /// Only the newest ticket can release; an older failure leaves the
    /// tracker alone.
    pub fn release(&self, ticket: &BinTicket) -> bool {
        let mut current = self
            .current_bin
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if self.is_current(ticket) && current.as_deref() == Some(ticket.bin()) {
            *current = None;
            true
        } else {
            false
        }
    }

    /// Forget the current prefix and invalidate in-flight lookups
    pub fn reset(&self) {
        let mut current = self
            .current_bin
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *current = None;
        self.latest.fetch_add(1, Ordering::SeqCst);
    }
}

/// Runs lookups against the payment API and drops stale answers
pub struct BinResolver {
    api: Arc<dyn PaymentApi>,
    tracker: BinLookupTracker,
}

impl BinResolver {
    pub fn new(api: Arc<dyn PaymentApi>) -> Self {
        Self {
            api,
            tracker: BinLookupTracker::new(),
        }
    }

    pub const fn tracker(&self) -> &BinLookupTracker {
        &self.tracker
    }

    /// Ticket for the current card digits, see [`BinLookupTracker::request`]
    pub fn request(&self, card_digits: &str) -> Option<BinTicket> {
        self.tracker.request(card_digits)
    }

    /// Perform the lookup for `ticket`
    ///
    /// `Ok(None)` means a newer lookup superseded this one and the answer
    /// must not be applied. On failure the prefix is released so the next
    /// keystroke with the same BIN issues a fresh ticket.
    pub async fn resolve(&self, ticket: &BinTicket) -> Result<Option<PaymentMethodId>> {
        let id = match self.api.lookup_payment_method(ticket.bin()).await {
            Ok(id) => id,
            Err(e) => {
                if self.tracker.release(ticket) {
                    tracing::warn!(bin = %ticket.bin(), error = %e, "BIN lookup failed");
                }
                return Err(e);
            }
        };

        if self.tracker.is_current(ticket) {
            Ok(Some(id))
        } else {
            tracing::debug!(
                bin = %ticket.bin(),
                seq = ticket.seq(),
                "Discarding stale BIN lookup"
            );
            Ok(None)
        }
    }
}
