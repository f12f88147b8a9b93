//! Handler registry.
//!
//! Each request type maps to one entry pairing its guard set with its
//! handler function. Adding an operation means adding a variant, a
//! handler, and a row here; the dispatcher never changes.

use common::{Error, Request, Response};

use crate::dispatcher::{Device, Guards, RequestKind};
use crate::entropy::EntropySource;
use crate::flash::Flash;
use crate::ui::ConfirmationGate;

mod device;
mod get_address;
mod sign_message;
mod sign_tx;
mod verify_message;

/// One registry row: preconditions plus the handler to run once they
/// hold.
pub struct HandlerEntry<F: Flash, G: ConfirmationGate, E: EntropySource> {
    pub guards: Guards,
    pub run: fn(&mut Device<F, G, E>, &Request) -> Result<Response, Error>,
}

/// Looks up the entry for a request kind. `None` means the message is
/// not part of the protocol and fails with `UnknownMessage`.
pub fn registry<F: Flash, G: ConfirmationGate, E: EntropySource>(
    kind: RequestKind,
) -> Option<HandlerEntry<F, G, E>> {
    fn entry<F: Flash, G: ConfirmationGate, E: EntropySource>(
        guards: Guards,
        run: fn(&mut Device<F, G, E>, &Request) -> Result<Response, Error>,
    ) -> Option<HandlerEntry<F, G, E>> {
        Some(HandlerEntry { guards, run })
    }

    match kind {
        RequestKind::ResetDevice => entry(Guards::NONE, device::reset),
        RequestKind::WipeDevice => entry(Guards::NONE, device::wipe),
        RequestKind::UnlockPin => entry(Guards::INITIALIZED, device::unlock_pin),
        RequestKind::Cancel => entry(Guards::NONE, device::cancel),
        RequestKind::SignTx => entry(Guards::PIN_GATED, sign_tx::start),
        RequestKind::TxAck => entry(Guards::NONE, sign_tx::ack),
        RequestKind::GetAddress => entry(Guards::PIN_GATED, get_address::run),
        RequestKind::SignMessage => entry(Guards::PIN_GATED, sign_message::run),
        RequestKind::VerifyMessage => entry(Guards::NONE, verify_message::run),
        RequestKind::Unknown => None,
    }
}
