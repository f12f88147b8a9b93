//! End-to-end flows through the dispatcher: provisioning, unlocking,
//! address export, streaming transaction signing, message signing and
//! verification, and the failure paths around each.

use std::collections::VecDeque;

use hex_literal::hex;

use coldcore::crypto::{keccak256, recover_address};
use coldcore::dispatcher::Device;
use coldcore::entropy::EntropySource;
use coldcore::flash::{Flash, RamFlash, ERASED_BYTE, FLASH_TOTAL_SIZE, SECTOR_SIZE};
use coldcore::ui::{AutoApprove, ConfirmationGate, ConfirmationRequest, Decision};
use common::types::HARDENED;
use common::{Bip32Path, Error, Request, Response};

/// Seed of the standard test mnemonic "abandon abandon ... about".
const SEED: [u8; 64] = hex!(
    "5eb00bbddcf069084889a8ab9155568165f5c453ccb85e70811aaed6f6da5fc1"
    "9a5ac40b389cd370d086206dec8aa6c43daea6690f20ad3d8d48b2d2ce9e38e4"
);

/// m/44'/60'/0'/0/0 of the test seed.
const KNOWN_ADDRESS: [u8; 20] = hex!("9858EfFD232B4033E47d90003D41EC34EcaEda94");

fn eth_path() -> Bip32Path {
    Bip32Path::from_slice(&[HARDENED | 44, HARDENED | 60, HARDENED, 0, 0])
}

/// Entropy source that replays a fixed byte sequence.
struct FixedEntropy {
    bytes: Vec<u8>,
}

impl FixedEntropy {
    fn seed() -> Self {
        Self {
            bytes: SEED.to_vec(),
        }
    }
}

impl EntropySource for FixedEntropy {
    fn fill(&mut self, buf: &mut [u8]) {
        for (i, b) in buf.iter_mut().enumerate() {
            *b = self.bytes[i % self.bytes.len()];
        }
    }
}

/// Gate that replays a script of decisions, then cancels everything.
struct ScriptedGate {
    script: VecDeque<Decision>,
}

impl ScriptedGate {
    fn new(script: &[Decision]) -> Self {
        Self {
            script: script.iter().copied().collect(),
        }
    }
}

impl ConfirmationGate for ScriptedGate {
    fn request(&mut self, _prompt: &ConfirmationRequest) -> Decision {
        self.script.pop_front().unwrap_or(Decision::Cancelled)
    }
}

type TestDevice<G> = Device<RamFlash, G, FixedEntropy>;

fn blank_device<G: ConfirmationGate>(gate: G) -> TestDevice<G> {
    Device::open(RamFlash::new(FLASH_TOTAL_SIZE), gate, FixedEntropy::seed()).unwrap()
}

/// Provisioned and unlocked device, ready for gated operations.
fn unlocked_device() -> TestDevice<AutoApprove> {
    let mut device = blank_device(AutoApprove);
    assert_eq!(
        device.dispatch(&Request::ResetDevice {
            pin: "1234".to_owned()
        }),
        Response::Success
    );
    assert_eq!(
        device.dispatch(&Request::UnlockPin {
            pin: "1234".to_owned()
        }),
        Response::Success
    );
    device
}

#[test]
fn test_full_lifecycle_reset_unlock_get_address() {
    let mut device = unlocked_device();

    let response = device.dispatch(&Request::GetAddress {
        address_path: eth_path(),
        show_display: false,
        coin_type: 60,
    });
    assert_eq!(
        response,
        Response::Address {
            raw: KNOWN_ADDRESS,
            display: None,
        }
    );
}

#[test]
fn test_get_address_with_display_confirms_checksum() {
    let mut device = unlocked_device();

    let response = device.dispatch(&Request::GetAddress {
        address_path: eth_path(),
        show_display: true,
        coin_type: 60,
    });
    assert_eq!(
        response,
        Response::Address {
            raw: KNOWN_ADDRESS,
            display: Some("0x9858EfFD232B4033E47d90003D41EC34EcaEda94".to_owned()),
        }
    );
}

#[test]
fn test_reset_refused_when_initialized() {
    let mut device = unlocked_device();
    assert_eq!(
        device.dispatch(&Request::ResetDevice {
            pin: "5678".to_owned()
        }),
        Response::Failure(Error::DataError)
    );
}

#[test]
fn test_guard_order_uninitialized_before_pin() {
    let mut device = blank_device(AutoApprove);
    let before = device_snapshot(&device);

    let response = device.dispatch(&Request::SignTx {
        address_path: eth_path(),
        total_length: 16,
    });
    assert_eq!(response, Response::Failure(Error::NotInitialized));
    // A refused request must leave no trace
    assert_eq!(device_snapshot(&device), before);
}

#[test]
fn test_pin_gated_requests_locked_until_unlock() {
    let mut device = blank_device(AutoApprove);
    assert_eq!(
        device.dispatch(&Request::ResetDevice {
            pin: "1234".to_owned()
        }),
        Response::Success
    );

    let request = Request::GetAddress {
        address_path: eth_path(),
        show_display: false,
        coin_type: 60,
    };
    assert_eq!(
        device.dispatch(&request),
        Response::Failure(Error::PinInvalid)
    );

    // Wrong PIN keeps the session locked
    assert_eq!(
        device.dispatch(&Request::UnlockPin {
            pin: "0000".to_owned()
        }),
        Response::Failure(Error::PinInvalid)
    );
    assert_eq!(
        device.dispatch(&request),
        Response::Failure(Error::PinInvalid)
    );

    assert_eq!(
        device.dispatch(&Request::UnlockPin {
            pin: "1234".to_owned()
        }),
        Response::Success
    );
    assert!(matches!(device.dispatch(&request), Response::Address { .. }));
}

#[test]
fn test_unlock_before_reset_reports_not_initialized() {
    let mut device = blank_device(AutoApprove);
    assert_eq!(
        device.dispatch(&Request::UnlockPin {
            pin: "1234".to_owned()
        }),
        Response::Failure(Error::NotInitialized)
    );
}

#[test]
fn test_streaming_sign_produces_recoverable_signature() {
    let mut device = unlocked_device();
    let payload = b"pretend transaction payload, streamed in three chunks";

    let response = device.dispatch(&Request::SignTx {
        address_path: eth_path(),
        total_length: payload.len() as u32,
    });
    let Response::TxRequest {
        session_token,
        bytes_remaining,
    } = response
    else {
        panic!("expected TxRequest, got {response:?}");
    };
    assert_eq!(bytes_remaining, payload.len() as u32);

    let mut signature = None;
    for chunk in payload.chunks(20) {
        let response = device.dispatch(&Request::TxAck {
            session_token,
            data: chunk.to_vec(),
        });
        match response {
            Response::TxRequest { session_token: t, .. } => assert_eq!(t, session_token),
            Response::TxSignature(sig) => signature = Some(sig),
            other => panic!("unexpected response {other:?}"),
        }
    }

    let sig = signature.expect("final chunk must produce the signature");
    let mut packed = Vec::with_capacity(65);
    packed.extend_from_slice(&sig.r);
    packed.extend_from_slice(&sig.s);
    packed.push(sig.v);
    let recovered = recover_address(&keccak256(payload), &packed).unwrap();
    assert_eq!(recovered, KNOWN_ADDRESS);
}

#[test]
fn test_stream_overflow_discards_session() {
    let mut device = unlocked_device();

    let Response::TxRequest { session_token, .. } = device.dispatch(&Request::SignTx {
        address_path: eth_path(),
        total_length: 4,
    }) else {
        panic!("expected TxRequest");
    };

    assert_eq!(
        device.dispatch(&Request::TxAck {
            session_token,
            data: vec![0u8; 5],
        }),
        Response::Failure(Error::DataError)
    );

    // The session is gone; the correct remainder is refused too
    assert_eq!(
        device.dispatch(&Request::TxAck {
            session_token,
            data: vec![0u8; 4],
        }),
        Response::Failure(Error::DataError)
    );
}

#[test]
fn test_token_mismatch_discards_session() {
    let mut device = unlocked_device();

    let Response::TxRequest { session_token, .. } = device.dispatch(&Request::SignTx {
        address_path: eth_path(),
        total_length: 8,
    }) else {
        panic!("expected TxRequest");
    };

    assert_eq!(
        device.dispatch(&Request::TxAck {
            session_token: session_token + 1,
            data: vec![0u8; 8],
        }),
        Response::Failure(Error::DataError)
    );
    assert_eq!(
        device.dispatch(&Request::TxAck {
            session_token,
            data: vec![0u8; 8],
        }),
        Response::Failure(Error::DataError)
    );
}

#[test]
fn test_foreign_request_discards_session() {
    let mut device = unlocked_device();

    let Response::TxRequest { session_token, .. } = device.dispatch(&Request::SignTx {
        address_path: eth_path(),
        total_length: 8,
    }) else {
        panic!("expected TxRequest");
    };

    // An interleaved non-continuation request kills the stream
    assert!(matches!(
        device.dispatch(&Request::GetAddress {
            address_path: eth_path(),
            show_display: false,
            coin_type: 60,
        }),
        Response::Address { .. }
    ));

    assert_eq!(
        device.dispatch(&Request::TxAck {
            session_token,
            data: vec![0u8; 8],
        }),
        Response::Failure(Error::DataError)
    );
}

#[test]
fn test_unrecognized_message_leaves_session_intact() {
    let mut device = unlocked_device();
    let payload = [0xC4u8; 4];

    let Response::TxRequest { session_token, .. } = device.dispatch(&Request::SignTx {
        address_path: eth_path(),
        total_length: payload.len() as u32,
    }) else {
        panic!("expected TxRequest");
    };

    // A stray undecodable frame is refused without touching the stream
    assert_eq!(
        device.dispatch(&Request::Unknown { msg_type: 0 }),
        Response::Failure(Error::UnknownMessage)
    );

    let response = device.dispatch(&Request::TxAck {
        session_token,
        data: payload.to_vec(),
    });
    let Response::TxSignature(sig) = response else {
        panic!("expected TxSignature, got {response:?}");
    };

    let mut packed = Vec::with_capacity(65);
    packed.extend_from_slice(&sig.r);
    packed.extend_from_slice(&sig.s);
    packed.push(sig.v);
    let recovered = recover_address(&keccak256(&payload), &packed).unwrap();
    assert_eq!(recovered, KNOWN_ADDRESS);
}

#[test]
fn test_new_session_invalidates_old_token() {
    let mut device = unlocked_device();

    let Response::TxRequest { session_token: first, .. } = device.dispatch(&Request::SignTx {
        address_path: eth_path(),
        total_length: 8,
    }) else {
        panic!("expected TxRequest");
    };
    let Response::TxRequest { session_token: second, .. } = device.dispatch(&Request::SignTx {
        address_path: eth_path(),
        total_length: 8,
    }) else {
        panic!("expected TxRequest");
    };

    assert_ne!(first, second);
    assert_eq!(
        device.dispatch(&Request::TxAck {
            session_token: first,
            data: vec![0u8; 8],
        }),
        Response::Failure(Error::DataError)
    );
}

#[test]
fn test_sign_tx_rejects_bad_arguments() {
    let mut device = unlocked_device();

    assert_eq!(
        device.dispatch(&Request::SignTx {
            address_path: Bip32Path::new(),
            total_length: 8,
        }),
        Response::Failure(Error::DataError)
    );
    assert_eq!(
        device.dispatch(&Request::SignTx {
            address_path: eth_path(),
            total_length: 0,
        }),
        Response::Failure(Error::DataError)
    );
}

#[test]
fn test_cancelled_confirmation_leaves_state_unchanged() {
    let mut device = blank_device(ScriptedGate::new(&[Decision::Cancelled]));
    let before = device_snapshot(&device);

    assert_eq!(
        device.dispatch(&Request::ResetDevice {
            pin: "1234".to_owned()
        }),
        Response::Failure(Error::ActionCancelled)
    );
    assert_eq!(device_snapshot(&device), before);

    // Still not initialized afterwards
    assert_eq!(
        device.dispatch(&Request::UnlockPin {
            pin: "1234".to_owned()
        }),
        Response::Failure(Error::NotInitialized)
    );
}

#[test]
fn test_cancelled_sign_produces_no_session() {
    let mut device = blank_device(ScriptedGate::new(&[
        Decision::Confirmed, // reset
        Decision::Cancelled, // sign
    ]));
    device.dispatch(&Request::ResetDevice {
        pin: "1234".to_owned(),
    });
    device.dispatch(&Request::UnlockPin {
        pin: "1234".to_owned(),
    });

    assert_eq!(
        device.dispatch(&Request::SignTx {
            address_path: eth_path(),
            total_length: 8,
        }),
        Response::Failure(Error::ActionCancelled)
    );
    assert_eq!(
        device.dispatch(&Request::TxAck {
            session_token: 1,
            data: vec![0u8; 8],
        }),
        Response::Failure(Error::DataError)
    );
}

#[test]
fn test_wipe_erases_config_sector() {
    let mut device = unlocked_device();
    assert_eq!(device.dispatch(&Request::WipeDevice), Response::Success);

    let snapshot = device_snapshot(&device);
    assert!(snapshot[..SECTOR_SIZE].iter().all(|&b| b == ERASED_BYTE));

    // Gated operations report factory state again
    assert_eq!(
        device.dispatch(&Request::GetAddress {
            address_path: eth_path(),
            show_display: false,
            coin_type: 60,
        }),
        Response::Failure(Error::NotInitialized)
    );
}

#[test]
fn test_sign_message_verifies() {
    let mut device = unlocked_device();
    let message = b"hello from the device".to_vec();

    let response = device.dispatch(&Request::SignMessage {
        address_path: eth_path(),
        message: message.clone(),
    });
    let Response::MessageSignature { address, signature } = response else {
        panic!("expected MessageSignature, got {response:?}");
    };
    assert_eq!(address, KNOWN_ADDRESS);
    assert_eq!(signature.len(), 65);

    assert_eq!(
        device.dispatch(&Request::VerifyMessage {
            address,
            message: message.clone(),
            signature: signature.clone(),
        }),
        Response::Success
    );

    // Same signature against a different message must not verify
    assert_eq!(
        device.dispatch(&Request::VerifyMessage {
            address,
            message: b"a different message".to_vec(),
            signature,
        }),
        Response::Failure(Error::DataError)
    );
}

#[test]
fn test_verify_message_rejects_wrong_address() {
    let mut device = unlocked_device();
    let message = b"attribution matters".to_vec();

    let Response::MessageSignature { signature, .. } = device.dispatch(&Request::SignMessage {
        address_path: eth_path(),
        message: message.clone(),
    }) else {
        panic!("expected MessageSignature");
    };

    assert_eq!(
        device.dispatch(&Request::VerifyMessage {
            address: [0x11; 20],
            message,
            signature,
        }),
        Response::Failure(Error::DataError)
    );
}

#[test]
fn test_cancel_reports_action_cancelled() {
    let mut device = unlocked_device();
    assert_eq!(
        device.dispatch(&Request::Cancel),
        Response::Failure(Error::ActionCancelled)
    );
}

#[test]
fn test_unknown_message_fails_closed() {
    let mut device = blank_device(AutoApprove);
    assert_eq!(
        device.dispatch(&Request::Unknown { msg_type: 0xFFFF }),
        Response::Failure(Error::UnknownMessage)
    );
}

fn device_snapshot<G: ConfirmationGate>(device: &TestDevice<G>) -> Vec<u8> {
    device.flash().snapshot()
}
