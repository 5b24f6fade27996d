use clap::Parser;
use gpio_gate::config::Config;
use gpio_gate::consts;
use gpio_gate::gpio::{self, VirtualPin};
use gpio_gate::input::{self, ClickClassifier};
use gpio_gate::manager::RelayManager;
use gpio_gate::mqtt;
use gpio_gate::relay::Relay;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
struct Args {
    #[arg(long, default_value = "config.yaml")]
    config_path: String,

    // MQTT connection
    #[arg(long)]
    mqtt_host: String,
    #[arg(long, default_value_t = 1883)]
    mqtt_port: u16,
    #[arg(long, default_value = "")]
    mqtt_username: String,
    #[arg(long, default_value = "")]
    mqtt_password: String,

    // Other
    #[arg(long, default_value = consts::GATE_NAME)]
    topic_prefix: String,
}

fn init_log() {
    let timer = fmt::time::ChronoLocal::new("%H:%M:%S%.3f".to_string());

    // Configure a custom event formatter
    let format = fmt::format()
        .with_level(true)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_file(false)
        .with_source_location(true)
        .with_timer(timer)
        .compact();

    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::DEBUG.into())
        .from_env()
        .expect("RUST_LOG configuration is valid")
        .add_directive("rumqttc=info".parse().expect("directive is valid"));

    fmt().event_format(format).with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_log();
    let args = Args::parse();

    let config = Config::from_file(&args.config_path)?;
    info!("Starting GPIO Gate. Args: {:?} Config: {:?}", args, config);

    let initiator = mqtt::Initiator::new(
        "gpio-gate-mqtt",
        &args.mqtt_host,
        args.mqtt_port,
        &args.mqtt_username,
        &args.mqtt_password,
        &args.topic_prefix,
    )
    .await?;
    let bus = Arc::new(initiator.start());

    // Relays on the in-memory backend; a board-specific backend would hand
    // in its own OutputPin implementations here.
    let relays: Vec<Relay> = config
        .output
        .iter()
        .map(|id| Relay::new(id, Box::new(VirtualPin::default())))
        .collect();

    let mut manager = RelayManager::new(
        relays,
        config.relay_input_map.clone(),
        &args.topic_prefix,
        bus.sender(),
    )?;
    manager.start(&config.ha_discovery).await?;

    // One classifier task per input. The edge senders are what a hardware
    // backend pushes transitions into from its callback context; holding
    // them here keeps the edge and gesture channels open for the whole run
    // even with no backend attached yet.
    let (gesture_tx, gesture_rx) = mpsc::channel(15);
    let mut edge_senders = Vec::new();
    for id in &config.input {
        let (edge_tx, edge_rx) = gpio::edge_channel();
        tokio::spawn(input::run(
            ClickClassifier::new(id),
            edge_rx,
            gesture_tx.clone(),
        ));
        edge_senders.push((id.clone(), edge_tx));
    }
    info!("gpio-gate initialized.");

    manager.run(bus, gesture_rx).await;
    drop(edge_senders);
    drop(gesture_tx);
    Ok(())
}
