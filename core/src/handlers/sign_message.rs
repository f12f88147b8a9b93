//! Personal message signing (EIP-191).

use common::{Error, Request, Response};

use crate::crypto::{personal_message_digest, signature_rsv};
use crate::dispatcher::Device;
use crate::entropy::EntropySource;
use crate::flash::Flash;
use crate::ui::{ConfirmationGate, ConfirmationKind, ConfirmationRequest};

/// Longest message rendered verbatim in a prompt.
const PREVIEW_LIMIT: usize = 256;

/// Message as shown to the user: verbatim when printable UTF-8,
/// hex-encoded otherwise, truncated either way.
fn preview(message: &[u8]) -> String {
    match core::str::from_utf8(message) {
        Ok(text) if !text.chars().any(char::is_control) => {
            let mut shown: String = text.chars().take(PREVIEW_LIMIT).collect();
            if shown.len() < text.len() {
                shown.push('…');
            }
            shown
        }
        _ => {
            let mut shown = hex::encode(&message[..message.len().min(PREVIEW_LIMIT / 2)]);
            if message.len() > PREVIEW_LIMIT / 2 {
                shown.push('…');
            }
            format!("0x{shown}")
        }
    }
}

pub fn run<F: Flash, G: ConfirmationGate, E: EntropySource>(
    device: &mut Device<F, G, E>,
    request: &Request,
) -> Result<Response, Error> {
    let Request::SignMessage {
        address_path,
        message,
    } = request
    else {
        return Err(Error::ProcessError);
    };

    if address_path.is_empty() || !address_path.is_resolvable() {
        return Err(Error::DataError);
    }

    device.confirm(&ConfirmationRequest::new(
        ConfirmationKind::ProtectCall,
        "Sign message",
        preview(message),
    ))?;

    let node = device.derive_node(address_path.as_slice())?;
    let address = node.address()?;
    let digest = personal_message_digest(message);
    let (sig, recid) = node.sign_digest(&digest)?;

    Ok(Response::MessageSignature {
        address,
        signature: signature_rsv(&sig, recid),
    })
}
