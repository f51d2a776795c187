use std::collections::HashMap;

/// What a pending command transaction expects back. A sum type instead of
/// boolean flags (§9): adding a new command kind, e.g. `deleteStream`, is a
/// compile-time-enforced match arm rather than another flag to thread
/// through every call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionKind {
    Connect,
    ReleaseStream,
    FcPublish,
    CreateStream,
    DeleteStream,
}

/// Tracks in-flight command transactions by id. IDs are monotonically
/// assigned per session starting at 1.0 and are always integral, so the
/// wire's `f64` transaction id round-trips losslessly through a `u64` key.
#[derive(Debug, Default)]
pub struct TransactionTable {
    next_id: u64,
    inflight: HashMap<u64, TransactionKind>,
}

impl TransactionTable {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            inflight: HashMap::new(),
        }
    }

    /// Allocates the next transaction id and records what kind of command it
    /// is, returning the id as the `f64` the wire expects.
    pub fn begin(&mut self, kind: TransactionKind) -> f64 {
        let id = self.next_id;
        self.next_id += 1;
        self.inflight.insert(id, kind);
        id as f64
    }

    /// Consumes the transaction matching `tx_id`, if any is still pending.
    pub fn complete(&mut self, tx_id: f64) -> Option<TransactionKind> {
        let id = Self::id_from_wire(tx_id)?;
        self.inflight.remove(&id)
    }

    /// Transactions still open at teardown time — logged, never silently
    /// dropped (§8: "an unclaimed transaction at session-teardown time is
    /// logged").
    pub fn unclaimed(&self) -> impl Iterator<Item = (u64, TransactionKind)> + '_ {
        self.inflight.iter().map(|(id, kind)| (*id, *kind))
    }

    fn id_from_wire(tx_id: f64) -> Option<u64> {
        if tx_id.is_finite() && tx_id >= 0.0 && tx_id.fract() == 0.0 {
            Some(tx_id as u64)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_assigned_monotonically_starting_at_one() {
        let mut table = TransactionTable::new();
        assert_eq!(table.begin(TransactionKind::Connect), 1.0);
        assert_eq!(table.begin(TransactionKind::CreateStream), 2.0);
    }

    #[test]
    fn completing_a_transaction_removes_it_and_returns_its_kind() {
        let mut table = TransactionTable::new();
        let id = table.begin(TransactionKind::Connect);
        assert_eq!(table.complete(id), Some(TransactionKind::Connect));
        assert_eq!(table.complete(id), None);
    }

    #[test]
    fn unclaimed_transactions_are_visible_for_teardown_logging() {
        let mut table = TransactionTable::new();
        table.begin(TransactionKind::Connect);
        table.begin(TransactionKind::CreateStream);
        assert_eq!(table.unclaimed().count(), 2);
    }
}
