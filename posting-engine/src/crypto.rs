//! Content fingerprints for duplicate detection
//!
//! The fingerprint covers the fields a caller fixes at creation time.
//! Allocated values (id, counters) are left out so that resubmitting the
//! same payload produces the same hash and is rejected by the store.

use crate::types::{Transaction, TransactionHash};
use chrono::Datelike;
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};

/// Canonical encoding version, bumped whenever the field list changes
const ENCODING_VERSION: u8 = 1;

/// Hash arbitrary bytes using SHA-256
pub fn hash_bytes(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Fingerprint a candidate transaction
pub fn transaction_hash(tx: &Transaction) -> TransactionHash {
    hash_bytes(&canonical_bytes(tx))
}

/// Deterministic, length-prefixed encoding of the immutable creation fields
pub fn canonical_bytes(tx: &Transaction) -> Vec<u8> {
    let mut buf = Vec::with_capacity(128 + tx.slots.len() * 48);
    buf.push(ENCODING_VERSION);
    buf.extend_from_slice(&tx.company_id.to_be_bytes());
    buf.extend_from_slice(&tx.node_id.to_be_bytes());
    buf.push(tx.transaction_type.as_u8());
    buf.extend_from_slice(&tx.currency_id.to_be_bytes());
    put_decimal(&mut buf, tx.rate);
    put_decimal(&mut buf, tx.amount);
    let days = tx.post_date.map(|d| d.num_days_from_ce()).unwrap_or(0);
    buf.extend_from_slice(&days.to_be_bytes());
    buf.extend_from_slice(&tx.created_by.to_be_bytes());
    put_str(&mut buf, tx.invoice.as_deref().unwrap_or(""));
    put_str(&mut buf, &tx.description);
    buf.extend_from_slice(&tx.nonce.to_be_bytes());

    buf.extend_from_slice(&(tx.slots.len() as u32).to_be_bytes());
    for slot in &tx.slots {
        buf.extend_from_slice(&slot.account_id.to_be_bytes());
        buf.extend_from_slice(&slot.currency_id.to_be_bytes());
        put_decimal(&mut buf, slot.debit);
        put_decimal(&mut buf, slot.credit);
    }
    buf
}

fn put_str(buf: &mut Vec<u8>, s: &str) {
    buf.extend_from_slice(&(s.len() as u32).to_be_bytes());
    buf.extend_from_slice(s.as_bytes());
}

// 100 and 100.00 must encode identically
fn put_decimal(buf: &mut Vec<u8>, d: Decimal) {
    put_str(buf, &d.normalize().to_string());
}
