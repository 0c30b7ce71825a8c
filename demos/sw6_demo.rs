use std::time::Duration;

use extron_sw6::{SwitcherBuilder, VideoSwitcher, probe};

#[tokio::main]
async fn main() -> extron_sw6::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let address = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "/dev/ttyUSB0".to_string());

    println!("Checking {address}...");
    probe(&address).await?;

    let switcher = SwitcherBuilder::new(&address).connect().await?;
    println!("Connected to: {}", switcher.identity().name);

    // Subscribe to events
    let mut events = switcher.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            println!("  Event: {event:?}");
        }
    });

    // Give the initial status dump a moment to arrive
    tokio::time::sleep(Duration::from_millis(500)).await;
    println!("Initial state: {:?}", switcher.state());

    println!("\nSelecting input 2...");
    switcher.set_input(2).await?;
    tokio::time::sleep(Duration::from_millis(500)).await;

    println!("Enabling auto-switch mode...");
    switcher.set_auto_mode(true).await;
    tokio::time::sleep(Duration::from_millis(500)).await;

    println!("Selecting input 5 (leaves auto mode)...");
    switcher.set_input(5).await?;
    tokio::time::sleep(Duration::from_millis(500)).await;

    switcher.query().await;
    tokio::time::sleep(Duration::from_millis(500)).await;
    println!("Final state: {:?}", switcher.state());

    println!("\nDone. Closing connection.");
    switcher.disconnect().await;

    Ok(())
}
