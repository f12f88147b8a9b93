//! Host-emulation binary.
//!
//! Wires the command core to the host: flash image file, entropy
//! device, button input, and a framed request/response stream on
//! stdin/stdout. Frames are a 4-byte little-endian length followed by
//! a postcard-encoded message.
//!
//! Exit codes: 0 when the host closes stdin, 1 on any setup failure.

use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::Path;
use std::process;
use std::thread;

use log::{error, info, warn};

use common::Request;
use coldcore::dispatcher::Device;
use coldcore::entropy::DevRandom;
use coldcore::flash::{FileFlash, FLASH_TOTAL_SIZE};
use coldcore::platform::{self, ButtonConfig, SetupError};
use coldcore::ui::{ButtonEvent, EventGate};

/// Largest frame the transport will buffer. The length prefix comes
/// from an untrusted host and must not drive allocation on its own.
const MAX_FRAME_LEN: u64 = 1024 * 1024;

/// One frame off the wire.
enum Frame {
    Payload(Vec<u8>),
    /// Length prefix exceeded `MAX_FRAME_LEN`; the bytes were drained,
    /// not buffered.
    Oversized,
}

/// Reads one length-prefixed frame; `None` on clean EOF.
fn read_frame(input: &mut impl Read) -> io::Result<Option<Frame>> {
    let mut len_bytes = [0u8; 4];
    match input.read_exact(&mut len_bytes) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    }
    let len = u64::from(u32::from_le_bytes(len_bytes));

    if len > MAX_FRAME_LEN {
        // Drain so the next frame starts at the right offset
        let skipped = io::copy(&mut input.by_ref().take(len), &mut io::sink())?;
        if skipped < len {
            return Err(io::ErrorKind::UnexpectedEof.into());
        }
        return Ok(Some(Frame::Oversized));
    }

    let mut frame = vec![0u8; len as usize];
    input.read_exact(&mut frame)?;
    Ok(Some(Frame::Payload(frame)))
}

fn write_frame(output: &mut impl Write, frame: &[u8]) -> io::Result<()> {
    let len = frame.len() as u32;
    output.write_all(&len.to_le_bytes())?;
    output.write_all(frame)?;
    output.flush()
}

/// Feeds button lines from a FIFO into the confirmation gate.
///
/// Lines `y`/`yes` confirm, `n`/`no` reject; anything else is ignored.
/// The thread ends when the FIFO closes, which the gate reads as
/// rejection of any later prompt.
fn spawn_fifo_reader(path: String, tx: std::sync::mpsc::Sender<ButtonEvent>) -> Result<(), SetupError> {
    let file = std::fs::File::open(&path).map_err(|source| SetupError::Buttons {
        path: path.clone(),
        source,
    })?;
    thread::spawn(move || {
        for line in BufReader::new(file).lines() {
            let Ok(line) = line else { break };
            let event = match line.trim() {
                "y" | "yes" => ButtonEvent::Confirm,
                "n" | "no" => ButtonEvent::Reject,
                other => {
                    warn!("ignoring button input {other:?}");
                    continue;
                }
            };
            if tx.send(event).is_err() {
                break;
            }
        }
    });
    Ok(())
}

fn serve(
    device: &mut Device<FileFlash, EventGate, DevRandom>,
) -> io::Result<()> {
    let mut stdin = io::stdin().lock();
    let mut stdout = io::stdout().lock();

    while let Some(frame) = read_frame(&mut stdin)? {
        // An undecodable or oversized frame still gets its one response
        let request = match frame {
            Frame::Payload(bytes) => postcard::from_bytes::<Request>(&bytes)
                .unwrap_or(Request::Unknown { msg_type: 0 }),
            Frame::Oversized => {
                warn!("oversized frame rejected");
                Request::Unknown { msg_type: 0 }
            }
        };

        let response = device.dispatch(&request);

        let encoded = match postcard::to_allocvec(&response) {
            Ok(bytes) => bytes,
            Err(e) => {
                error!("response encoding failed: {e}");
                process::exit(1);
            }
        };
        write_frame(&mut stdout, &encoded)?;
    }

    info!("host closed the stream");
    Ok(())
}

fn setup_and_run() -> Result<(), SetupError> {
    // Validate button wiring before anything else touches hardware or
    // secrets
    let buttons = ButtonConfig::from_env()?;
    info!(
        "buttons: yes=GPIO{} no=GPIO{}",
        buttons.gpio_yes, buttons.gpio_no
    );

    let random_path = platform::random_dev();
    let entropy = DevRandom::open(Path::new(&random_path)).map_err(|source| SetupError::Entropy {
        path: random_path,
        source,
    })?;

    let flash_path = platform::flash_file();
    let flash = FileFlash::open(Path::new(&flash_path), FLASH_TOTAL_SIZE).map_err(|source| {
        SetupError::Flash {
            path: flash_path,
            source,
        }
    })?;

    let (tx, gate) = EventGate::pair();
    if let Some(fifo) = platform::button_fifo() {
        spawn_fifo_reader(fifo, tx)?;
    } else if cfg!(feature = "autoapprove") {
        // Stand-in for held-down hardware buttons during development
        thread::spawn(move || {
            while tx.send(ButtonEvent::Confirm).is_ok() {
                thread::sleep(std::time::Duration::from_millis(10));
            }
        });
    }

    let mut device = Device::open(flash, gate, entropy).map_err(|_| SetupError::Storage)?;
    info!("device ready, initialized={}", device.initialized());

    if let Err(e) = serve(&mut device) {
        error!("transport failed: {e}");
        process::exit(1);
    }
    Ok(())
}

fn main() {
    env_logger::init();

    if let Err(e) = setup_and_run() {
        error!("setup failed: {e}");
        process::exit(1);
    }
}
