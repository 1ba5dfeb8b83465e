//! Simulates a handler serving devices that share short addresses.
//!
//! Six devices from three applications are squeezed onto two addresses.
//! Each sends a couple of uplinks, a forger injects frames signed with
//! keys nobody registered, and the whole lot arrives as one shuffled
//! batch. The handler sorts it out by MIC.
//!
//! Run with `RUST_LOG=lorahub_registry=trace` to watch every MIC check.

use lorahub::prelude::*;
use rand::seq::SliceRandom;

const ADDRESSES: [DevAddr; 2] = [
    DevAddr([0x26, 0x01, 0x00, 0x01]),
    DevAddr([0x26, 0x01, 0x00, 0x02]),
];

const APPLICATIONS: [AppEui; 3] = [
    AppEui([0x70, 0xB3, 0xD5, 0x7E, 0xD0, 0x00, 0x00, 0x01]),
    AppEui([0x70, 0xB3, 0xD5, 0x7E, 0xD0, 0x00, 0x00, 0x02]),
    AppEui([0x70, 0xB3, 0xD5, 0x7E, 0xD0, 0x00, 0x00, 0x03]),
];

const UPLINKS_PER_DEVICE: u16 = 2;
const FORGED_FRAMES: usize = 2;

#[tokio::main]
async fn main() -> Result<(), HubError> {
    lorahub::init_logging("info");

    let monitor = ChannelSink::spawn(256);
    let handler = HandlerBuilder::new(Registry::in_memory()?)
        .monitor(monitor.clone())
        .build();

    // Every application gets one device on every address.
    let mut devices = Vec::new();
    for dev_addr in ADDRESSES {
        for app_eui in APPLICATIONS {
            devices.push(handler.activate(app_eui, dev_addr).await?);
        }
    }
    tracing::info!(devices = devices.len(), addresses = ADDRESSES.len(), "devices activated");

    let mut batch = Vec::new();
    for (n, device) in devices.iter().enumerate() {
        for fcnt in 1..=UPLINKS_PER_DEVICE {
            let reading = format!("device {n} reading {fcnt}");
            batch.push(
                DataFrameBuilder::uplink(device.dev_addr, fcnt)
                    .payload(1, reading.as_bytes())
                    .build(&device.nwk_skey, &device.app_skey)?,
            );
        }
    }
    for n in 0..FORGED_FRAMES {
        let forged = SessionKeys::generate();
        batch.push(
            DataFrameBuilder::uplink(ADDRESSES[n % ADDRESSES.len()], 1)
                .payload(1, b"forged")
                .build(&forged.nwk_skey, &forged.app_skey)?,
        );
    }
    batch.shuffle(&mut rand::rng());

    let received = batch.len();
    let mut uplinks = handler.handle_uplinks(batch).await?;
    uplinks.sort_by_key(|u| *u.id.as_bytes());

    println!("received {received} frames, resolved {} devices", uplinks.len());
    for uplink in &uplinks {
        println!("  {}", uplink.id);
        for frame in &uplink.frames {
            println!(
                "    fcnt={:<3} port={:<3} {}",
                frame.fcnt,
                frame.fport.unwrap_or_default(),
                String::from_utf8_lossy(&frame.payload)
            );
        }
    }

    let stats = handler.stats();
    println!(
        "matched {} / dropped {} / monitor records {}",
        stats.matched,
        stats.dropped,
        monitor.records(StreamKind::HandlerUplink).await?.len()
    );

    Ok(())
}
