//! Interactive terminal for an Extron SW6 switcher.
//!
//! Commands:
//!
//!   /in <1-6>     Select an input (leaves auto mode first if needed)
//!   /auto on|off  Enable or disable auto-switch mode
//!   /query        Request a full status dump
//!   /state        Print the current state
//!   /info         Print the device identity
//!   /reconnect    Disconnect and connect again
//!   /help         Print command list
//!   /quit         Close and exit
//!
//! Usage: cargo run --example interactive -- /dev/ttyUSB0
//!        cargo run --example interactive -- tcp://10.0.0.20:4001

use std::io::Write;

use tokio::io::AsyncBufReadExt;

use extron_sw6::{SwitcherBuilder, SwitcherEvent, VideoSwitcher};

#[tokio::main]
async fn main() -> extron_sw6::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <device path | tcp://host:port>", args[0]);
        std::process::exit(1);
    }

    let address = &args[1];

    eprintln!("Connecting to {address}...");
    let switcher = SwitcherBuilder::new(address).connect().await?;
    eprintln!("Connected: {}", switcher.identity().name);
    eprintln!();
    eprintln!("Type /help for command list, /quit to exit.");
    eprintln!();

    // State printer; stderr so it doesn't mix with the prompt
    let mut event_rx = switcher.subscribe();
    let mut state_rx = switcher.watch();
    tokio::spawn(async move {
        while let Ok(event) = event_rx.recv().await {
            match event {
                SwitcherEvent::StateChanged => {
                    let state = state_rx.borrow_and_update().clone();
                    eprint!("\r  [state: {state:?}]\r\n> ");
                }
                other => eprint!("\r  [event: {other:?}]\r\n> "),
            }
            let _ = std::io::stderr().flush();
        }
    });

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    loop {
        eprint!("> ");
        let _ = std::io::stderr().flush();

        let line = match lines.next_line().await {
            Ok(Some(l)) => l,
            Ok(None) => break,
            Err(e) => {
                eprintln!("stdin error: {e}");
                break;
            }
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if !line.starts_with('/') {
            eprintln!("Commands start with /. Type /help for list.");
            continue;
        }

        let parts: Vec<&str> = line.split_whitespace().collect();
        let cmd = parts[0];
        let arg = parts.get(1).copied().unwrap_or("");

        match cmd {
            "/help" | "/h" => {
                eprintln!("Commands:");
                eprintln!("  /in <1-6>     Select an input");
                eprintln!("  /auto on|off  Enable or disable auto-switch mode");
                eprintln!("  /query        Request a full status dump");
                eprintln!("  /state        Print the current state");
                eprintln!("  /info         Print the device identity");
                eprintln!("  /reconnect    Disconnect and connect again");
                eprintln!("  /help         Print command list");
                eprintln!("  /quit         Close and exit");
            }
            "/in" => match arg.parse::<u8>() {
                Ok(n) => match switcher.set_input(n).await {
                    Ok(()) => eprintln!("Requested input {n}"),
                    Err(e) => eprintln!("Error: {e}"),
                },
                Err(_) => eprintln!("Usage: /in <1-6>"),
            },
            "/auto" => match arg {
                "on" => switcher.set_auto_mode(true).await,
                "off" => switcher.set_auto_mode(false).await,
                _ => eprintln!("Usage: /auto on|off"),
            },
            "/query" => switcher.query().await,
            "/state" => eprintln!("{:#?}", switcher.state()),
            "/info" => {
                let identity = switcher.identity();
                eprintln!("Device: {}", identity.name);
                eprintln!("Manufacturer: {}", identity.manufacturer);
                eprintln!("Model: {}", identity.model);
                eprintln!("Address: {}", identity.identifier);
                if let Some(version) = switcher.state().firmware_version {
                    eprintln!("Firmware: {version}");
                }
            }
            "/reconnect" => {
                switcher.disconnect().await;
                match switcher.connect().await {
                    Ok(()) => eprintln!("Reconnected"),
                    Err(e) => eprintln!("Error: {e}"),
                }
            }
            "/quit" | "/exit" | "/q" => {
                break;
            }
            _ => {
                eprintln!("Unknown command: {cmd} (type /help for list)");
            }
        }
    }

    eprintln!("Closing...");
    switcher.disconnect().await;
    eprintln!("Done.");
    Ok(())
}
