use clap::Parser;
use log::{error, info};
use sma_emeter::{config::OutputMode, Config, OutputManager, SmaManager};
use std::{net::Ipv4Addr, path::PathBuf, time::Duration};
use tokio::task::JoinHandle;

/// Receive and decode SMA Energy Meter multicast datagrams
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Multicast group (or unicast address) to listen on
    #[arg(short = 'a', long = "mcipaddr")]
    mcipaddr: Option<Ipv4Addr>,

    #[arg(short, long)]
    port: Option<u16>,

    /// Local interface used to join the multicast group
    #[arg(short, long)]
    interface: Option<Ipv4Addr>,

    /// Grid summary output in deci-watt, same as `--output summary`
    #[arg(short, long)]
    js: bool,

    #[arg(short, long, value_enum)]
    output: Option<OutputMode>,

    #[arg(short, long, env = "EMETER_CONFIG")]
    config: Option<PathBuf>,
}

fn apply_args(config: &mut Config, args: &Args) {
    if let Some(a) = args.mcipaddr {
        config.receiver.address = a;
    }
    if let Some(p) = args.port {
        config.receiver.port = p;
    }
    if let Some(i) = args.interface {
        config.receiver.interface = i;
    }
    if let Some(o) = args.output {
        config.output.mode = o;
    }
    if args.js {
        config.output.mode = OutputMode::Summary;
    }
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // Initialize logging
    let default_filter = std::env::var("EMETER_LOG_LEVEL").unwrap_or("info".to_string());
    env_logger::init_from_env(env_logger::Env::new().default_filter_or(default_filter));

    let args = Args::parse();
    let mut config = match Config::load(args.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            error!("{}", e);
            return Err(std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()));
        }
    };
    apply_args(&mut config, &args);

    info!("MC IP address: {}", config.receiver.address);
    info!("Port: {}", config.receiver.port);

    let (tx, rx) = tokio::sync::mpsc::channel(100);
    let mut threads: Vec<JoinHandle<()>> = Vec::new();

    #[allow(unused_mut)]
    let mut output = OutputManager::new(rx, config.output.mode);
    #[cfg(feature = "mqtt")]
    if let Some(mqtt_config) = &config.mqtt {
        output = output.with_mqtt(sma_emeter::mqtt::MqttPublisher::new(mqtt_config));
    }
    threads.push(tokio::spawn(async move {
        output.start_thread().await;
    }));

    let mut sma = SmaManager::new(tx, config.receiver.clone());
    threads.push(tokio::spawn(async move {
        sma.start_thread().await;
    }));

    info!("All modules started, now waiting for a signal to exit");
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping");
                break;
            }
            _ = tokio::time::sleep(Duration::from_secs(1)) => {
                if threads.iter().any(|t| t.is_finished()) {
                    error!("A module stopped, exiting");
                    break;
                }
            }
        }
    }

    for task in threads.iter_mut() {
        task.abort();
    }
    Ok(())
}
