//! Streaming transaction signing.
//!
//! `SignTx` validates the request, obtains user confirmation, derives
//! the signing key and opens a session; each `TxAck` feeds payload
//! bytes into the running digest. The final chunk produces the
//! signature and closes the session. Any protocol violation (wrong
//! token, overlong stream, missing session) discards the session so no
//! signature over ambiguous data can ever be produced.

use common::{Error, Request, Response};
use log::debug;

use crate::dispatcher::Device;
use crate::entropy::EntropySource;
use crate::flash::Flash;
use crate::ui::{ConfirmationGate, ConfirmationKind, ConfirmationRequest};

pub fn start<F: Flash, G: ConfirmationGate, E: EntropySource>(
    device: &mut Device<F, G, E>,
    request: &Request,
) -> Result<Response, Error> {
    let Request::SignTx {
        address_path,
        total_length,
    } = request
    else {
        return Err(Error::ProcessError);
    };

    if address_path.is_empty() || !address_path.is_resolvable() || *total_length == 0 {
        return Err(Error::DataError);
    }

    // Confirm before the key exists, so cancellation never has to
    // clean up derived material
    device.confirm(&ConfirmationRequest::new(
        ConfirmationKind::ProtectCall,
        "Sign transaction",
        format!("Sign {total_length} bytes of transaction data?"),
    ))?;

    let node = device.derive_node(address_path.as_slice())?;
    let token = device.session.open_signing(*total_length, node);
    debug!("signing session {token} open, expecting {total_length} bytes");

    Ok(Response::TxRequest {
        session_token: token,
        bytes_remaining: *total_length,
    })
}

pub fn ack<F: Flash, G: ConfirmationGate, E: EntropySource>(
    device: &mut Device<F, G, E>,
    request: &Request,
) -> Result<Response, Error> {
    let Request::TxAck {
        session_token,
        data,
    } = request
    else {
        return Err(Error::ProcessError);
    };

    let Some(session) = device.session.signing_mut() else {
        return Err(Error::DataError);
    };

    if session.token() != *session_token {
        debug!(
            "token mismatch: session {} vs ack {}",
            session.token(),
            session_token
        );
        device.session.discard_signing();
        return Err(Error::DataError);
    }

    if let Err(e) = session.absorb(data) {
        device.session.discard_signing();
        return Err(e);
    }

    if !session.is_complete() {
        return Ok(Response::TxRequest {
            session_token: *session_token,
            bytes_remaining: session.bytes_remaining(),
        });
    }

    let session = device.session.take_signing().ok_or(Error::ProcessError)?;
    let signature = session.finalize()?;
    Ok(Response::TxSignature(signature))
}
