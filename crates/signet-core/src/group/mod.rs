//! Group messaging with sender keys.
//!
//! ```text
//! sender                                   member
//!   GroupSessionBuilder::create(name) ──▶ distribution (over 1:1 sessions)
//!                                          GroupSessionBuilder::process(name, dist)
//!   GroupCipher::encrypt ───────────────▶ GroupCipher::decrypt
//! ```
//!
//! Records are keyed by [`SenderKeyName`](crate::SenderKeyName): the group
//! id plus the sending device's address.

mod builder;
mod cipher;
mod distribution;
pub mod migrate;

use ciborium::Value;

pub use builder::GroupSessionBuilder;
pub use cipher::GroupCipher;
pub use distribution::SenderKeyDistributionMessage;

use crate::{fields, record::SENDER_KEY_STATES};

/// State list of a normalized session.
fn states(session: &Value) -> &[Value] {
    fields::get(session, SENDER_KEY_STATES).and_then(Value::as_array).map_or(&[][..], Vec::as_slice)
}
