//! Fuzz target for the sender-key pipeline
//!
//! Drives create, distribute, encrypt and decrypt through the engine and
//! the stored-state migration, with adversarial plaintexts, delivery order
//! and ciphertext corruption.
//!
//! # Strategy
//!
//! - Arbitrary engine seeds and plaintexts (empty to large)
//! - Arbitrary delivery order, including duplicates
//! - Single-bit corruption of delivered ciphertexts
//! - Arbitrary bytes handed to the message parser
//!
//! # Invariants
//!
//! - Nothing panics
//! - Every untouched message decrypts to its plaintext, in any order
//! - A duplicate delivery is rejected
//! - A corrupted message never opens to a different plaintext
//! - Migration of stored states is idempotent

#![no_main]

use arbitrary::Arbitrary;
use ciborium::Value;
use libfuzzer_sys::fuzz_target;
use signet_core::{group::migrate::normalize_session, Engine, EngineConfig, NativeEngine};
use signet_crypto::Rng;

#[derive(Debug, Clone, Arbitrary)]
struct Scenario {
    seed: [u8; 32],
    plaintexts: Vec<Vec<u8>>,
    deliveries: Vec<Delivery>,
    garbage: Vec<u8>,
}

#[derive(Debug, Clone, Arbitrary)]
enum Delivery {
    Intact(u8),
    Corrupted { message: u8, byte: u16, bit: u8 },
}

fn states(states: Vec<Value>) -> Value {
    Value::Map(vec![(Value::Text("senderKeyStates".into()), Value::Array(states))])
}

fuzz_target!(|scenario: Scenario| {
    let engine = NativeEngine::with_rng(Rng::from_seed(scenario.seed), EngineConfig::default());
    let _ = engine.deserialize_sender_key_message(&scenario.garbage);

    let Ok(stored) = engine.create_sender_key_state() else {
        return;
    };
    let record = states(vec![stored]);
    let own = normalize_session(&engine, &record).expect("fresh state migrates");
    assert_eq!(normalize_session(&engine, &own).expect("canonical state migrates"), own);

    let own_state = match &own {
        Value::Map(entries) => {
            entries[0].1.as_array().and_then(|s| s.first()).cloned().expect("one state")
        },
        _ => unreachable!("session is a map"),
    };
    let distribution = engine.create_distribution_message(&own_state).expect("distribution");
    let mut peer = engine
        .process_distribution_message(&distribution, &states(Vec::new()))
        .expect("process distribution");

    let mut sender = own;
    let mut sent = Vec::new();
    for plaintext in scenario.plaintexts.iter().take(32) {
        let (next, ciphertext) = engine.group_encrypt(&sender, plaintext).expect("group encrypt");
        sender = next;
        sent.push((plaintext.clone(), ciphertext));
    }
    if sent.is_empty() {
        return;
    }

    let mut delivered = vec![false; sent.len()];
    for delivery in scenario.deliveries.iter().take(64) {
        match *delivery {
            Delivery::Intact(index) => {
                let index = usize::from(index) % sent.len();
                let (plaintext, ciphertext) = &sent[index];
                let message =
                    engine.deserialize_sender_key_message(ciphertext).expect("own message parses");
                match engine.group_decrypt(&peer, &message) {
                    Ok((next, opened)) => {
                        assert!(!delivered[index], "duplicate delivery decrypted");
                        assert_eq!(&opened, plaintext);
                        delivered[index] = true;
                        peer = next;
                    },
                    Err(_) => assert!(delivered[index], "fresh message failed to decrypt"),
                }
            },
            Delivery::Corrupted { message, byte, bit } => {
                let index = usize::from(message) % sent.len();
                let mut ciphertext = sent[index].1.clone();
                let at = usize::from(byte) % ciphertext.len();
                ciphertext[at] ^= 1 << (bit % 8);
                if let Ok(message) = engine.deserialize_sender_key_message(&ciphertext) {
                    if let Ok((_, opened)) = engine.group_decrypt(&peer, &message) {
                        assert_eq!(
                            &opened, &sent[index].0,
                            "corruption produced a different plaintext"
                        );
                    }
                }
            },
        }
    }
});
