// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Authlink terminal front end.

use anyhow::Result;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use authlink::auth::FprintdOracle;
use authlink::bluetooth::rfcomm::{self, AdapterGate, RfcommTransport};
use authlink::bluetooth::{PermissionGate, Session};
use authlink::config::Config;
use authlink::events::{EventProcessor, UiEvent};
use authlink::state::{AppState, DisplaySink};
use authlink::status::{FanoutSink, StatusSink, TracingSink};

const HELP: &str = "Commands: connect, auth, cancel, disconnect, enable, status, quit";

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("authlink=info".parse()?),
        )
        .init();

    info!("Starting authlink v{}...", env!("CARGO_PKG_VERSION"));

    // Load configuration; an argument overrides the peer address
    let mut config = Config::load()?;
    if let Some(address) = std::env::args().nth(1) {
        config.link.peer_address = address.parse()?;
    }
    info!("Configuration loaded, peer {}", config.link.peer_address);

    let adapter = match rfcomm::open_adapter(config.link.adapter.as_deref()).await {
        Ok(adapter) => adapter,
        Err(e) => {
            error!("Bluetooth not supported: {}", e);
            return Err(e.into());
        }
    };

    let state = AppState::new();
    let sink: Arc<dyn StatusSink> = Arc::new(
        FanoutSink::new()
            .with(TracingSink)
            .with(DisplaySink::new(state.clone())),
    );

    let gate: Arc<dyn PermissionGate> = Arc::new(AdapterGate::new(adapter.clone()));
    let transport = Arc::new(RfcommTransport::new(adapter, config.link.rfcomm_channel));
    let session = Arc::new(
        Session::new(
            config.link.peer_address,
            transport,
            gate.clone(),
            sink.clone(),
        )
        .with_connect_timeout(config.link.connect_timeout()),
    );
    let oracle = Arc::new(FprintdOracle::new(&config.auth));

    if !gate.has_authority().await {
        info!("Bluetooth adapter is off; type 'enable' to power it on");
    }

    let (event_tx, event_rx) = mpsc::channel::<UiEvent>(16);
    let processor = EventProcessor::new(session.clone(), oracle, gate, sink);
    let processor_task = tokio::spawn(processor.run(event_rx));

    println!("{}", HELP);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(e) => {
                        error!("Failed to read input: {}", e);
                        break;
                    }
                };
                match line.trim() {
                    "" => {}
                    "help" => println!("{}", HELP),
                    "status" => {
                        println!(
                            "Link to {}: {} ({})",
                            session.peer(),
                            state.get_connection_status(),
                            session.state().as_str()
                        );
                        println!("Auth: {}", state.get_auth_status());
                    }
                    "quit" | "exit" | "q" => break,
                    other => match UiEvent::parse(other) {
                        Some(event) => {
                            if event_tx.send(event).await.is_err() {
                                break;
                            }
                        }
                        None => println!("Unknown command: {}. {}", other, HELP),
                    },
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    drop(event_tx);
    if let Err(e) = processor_task.await {
        error!("Event processor failed: {}", e);
    }
    session.teardown().await;

    info!("authlink stopped");
    Ok(())
}
