//! Device management: provisioning, wiping, PIN unlock, cancellation.

use common::{Error, Request, Response};
use log::info;
use zeroize::Zeroizing;

use crate::dispatcher::Device;
use crate::entropy::EntropySource;
use crate::flash::Flash;
use crate::state::DeviceSession;
use crate::storage;
use crate::ui::{ConfirmationGate, ConfirmationKind, ConfirmationRequest};

/// Provisions a fresh device: new seed from the entropy source, PIN
/// stored as a digest. Refused when a configuration already exists so
/// a host cannot silently replace a wallet.
pub fn reset<F: Flash, G: ConfirmationGate, E: EntropySource>(
    device: &mut Device<F, G, E>,
    request: &Request,
) -> Result<Response, Error> {
    let Request::ResetDevice { pin } = request else {
        return Err(Error::ProcessError);
    };

    if device.session.initialized() {
        return Err(Error::DataError);
    }
    if pin.is_empty() {
        return Err(Error::DataError);
    }

    device.confirm(&ConfirmationRequest::new(
        ConfirmationKind::ProtectCall,
        "Create wallet",
        "Generate a new seed on this device?".to_owned(),
    ))?;

    let mut seed = Zeroizing::new([0u8; 64]);
    device.entropy.fill(&mut seed[..]);

    let digest = storage::pin_digest(pin);
    storage::provision(&mut device.flash, &digest, &seed)?;

    device.config = Some(storage::DeviceConfig {
        pin_digest: digest,
        seed,
    });
    device.session.set_initialized(true);
    info!("device provisioned");

    Ok(Response::Success)
}

/// Erases the configuration and returns to factory state. The prompt
/// is the last line of defense for an irreversible operation.
pub fn wipe<F: Flash, G: ConfirmationGate, E: EntropySource>(
    device: &mut Device<F, G, E>,
    request: &Request,
) -> Result<Response, Error> {
    let Request::WipeDevice = request else {
        return Err(Error::ProcessError);
    };

    device.confirm(&ConfirmationRequest::new(
        ConfirmationKind::WipeDevice,
        "Wipe device",
        "Erase the seed and all settings? This cannot be undone.".to_owned(),
    ))?;

    storage::wipe(&mut device.flash)?;
    device.config = None;
    device.session = DeviceSession::new(false);
    info!("device wiped");

    Ok(Response::Success)
}

/// Verifies the PIN for this session. Failure clears any prior
/// verification.
pub fn unlock_pin<F: Flash, G: ConfirmationGate, E: EntropySource>(
    device: &mut Device<F, G, E>,
    request: &Request,
) -> Result<Response, Error> {
    let Request::UnlockPin { pin } = request else {
        return Err(Error::ProcessError);
    };

    let config = device.config.as_ref().ok_or(Error::NotInitialized)?;
    if storage::pin_matches(config, pin) {
        device.session.set_pin_verified(true);
        Ok(Response::Success)
    } else {
        device.session.set_pin_verified(false);
        Err(Error::PinInvalid)
    }
}

/// Aborts whatever was in flight. The dispatcher has already discarded
/// any signing session by the time this runs; the reply tells the host
/// the device is idle.
pub fn cancel<F: Flash, G: ConfirmationGate, E: EntropySource>(
    _device: &mut Device<F, G, E>,
    request: &Request,
) -> Result<Response, Error> {
    let Request::Cancel = request else {
        return Err(Error::ProcessError);
    };
    Err(Error::ActionCancelled)
}
