//! Address derivation and optional on-device confirmation.

use common::{Error, Request, Response};

use crate::checksum::{checksum_address, variant_for_coin_type};
use crate::dispatcher::Device;
use crate::entropy::EntropySource;
use crate::flash::Flash;
use crate::ui::{ConfirmationGate, ConfirmationKind, ConfirmationRequest};

pub fn run<F: Flash, G: ConfirmationGate, E: EntropySource>(
    device: &mut Device<F, G, E>,
    request: &Request,
) -> Result<Response, Error> {
    let Request::GetAddress {
        address_path,
        show_display,
        coin_type,
    } = request
    else {
        return Err(Error::ProcessError);
    };

    if address_path.is_empty() || !address_path.is_resolvable() {
        return Err(Error::DataError);
    }

    // The node is dropped before the gate can block; only the public
    // address survives into the prompt
    let raw = device.derive_node(address_path.as_slice())?.address()?;

    let display = if *show_display {
        let variant = variant_for_coin_type(*coin_type);
        let text = checksum_address(&raw, &variant);
        device.confirm(&ConfirmationRequest::new(
            ConfirmationKind::Other,
            "Confirm address",
            text.clone(),
        ))?;
        Some(text)
    } else {
        None
    };

    Ok(Response::Address { raw, display })
}
