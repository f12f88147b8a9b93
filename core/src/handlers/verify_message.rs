//! Personal message signature verification.
//!
//! Recovery and comparison happen before the user is prompted: a
//! signature that does not match the claimed address fails without any
//! interaction, so the prompts only ever show cryptographically
//! verified content.

use common::{Error, Request, Response};
use subtle::ConstantTimeEq;

use crate::checksum::{checksum_address, ChecksumVariant};
use crate::crypto::{personal_message_digest, recover_address};
use crate::dispatcher::Device;
use crate::entropy::EntropySource;
use crate::flash::Flash;
use crate::ui::{ConfirmationGate, ConfirmationKind, ConfirmationRequest};

pub fn run<F: Flash, G: ConfirmationGate, E: EntropySource>(
    device: &mut Device<F, G, E>,
    request: &Request,
) -> Result<Response, Error> {
    let Request::VerifyMessage {
        address,
        message,
        signature,
    } = request
    else {
        return Err(Error::ProcessError);
    };

    let digest = personal_message_digest(message);
    let recovered = recover_address(&digest, signature)?;

    if !bool::from(recovered.ct_eq(address)) {
        return Err(Error::DataError);
    }

    device.confirm(&ConfirmationRequest::new(
        ConfirmationKind::Other,
        "Verified signer",
        checksum_address(address, &ChecksumVariant::PLAIN),
    ))?;
    device.confirm(&ConfirmationRequest::new(
        ConfirmationKind::Other,
        "Verified message",
        String::from_utf8_lossy(message).into_owned(),
    ))?;

    Ok(Response::Success)
}
