//! Record extraction: locate repeated record elements in a parsed feed
//! and convert each into a canonical, typed record.
//!
//! Extraction is total per element — an absent child yields an empty or
//! zero value, never an error — so one odd record cannot abort its
//! siblings. Validation that can reject a record (missing idempotency
//! key, barcode shape) happens in the reconciler.

pub mod item;
pub mod order;
