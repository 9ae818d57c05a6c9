//! tuio-monitor: log TUIO events from a sender to the terminal.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use tuio_client::{
    ClientConfig, Tuio3DCursor, Tuio3DObject, TuioBlob, TuioClient, TuioContainer, TuioCursor,
    TuioListener, TuioObject, TuioTime,
};

#[derive(Debug, Parser)]
#[command(name = "tuio-monitor", about = "Log TUIO events to the terminal", version)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long, env = "TUIO_CONFIG")]
    config: Option<String>,

    /// UDP port to listen on (overrides the config file)
    #[arg(short, long)]
    port: Option<u16>,

    /// Local address to bind (overrides the config file)
    #[arg(short, long)]
    bind: Option<String>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Log output format: pretty, compact or json (overrides the config file)
    #[arg(long)]
    log_format: Option<String>,
}

/// Prints every entity event at info level.
struct ConsoleListener;

impl TuioListener for ConsoleListener {
    fn object_added(&self, object: &TuioObject) {
        info!(
            sid = object.session_id(),
            symbol = object.symbol_id(),
            x = object.x(),
            y = object.y(),
            angle = object.angle_degrees(),
            "object added"
        );
    }
    fn object_updated(&self, object: &TuioObject) {
        info!(
            sid = object.session_id(),
            x = object.x(),
            y = object.y(),
            angle = object.angle_degrees(),
            speed = object.motion_speed(),
            "object updated"
        );
    }
    fn object_removed(&self, object: &TuioObject) {
        info!(sid = object.session_id(), "object removed");
    }

    fn object_3d_added(&self, object: &Tuio3DObject) {
        info!(
            sid = object.session_id(),
            symbol = object.symbol_id(),
            x = object.x(),
            y = object.y(),
            z = object.z(),
            "3D object added"
        );
    }
    fn object_3d_updated(&self, object: &Tuio3DObject) {
        info!(
            sid = object.session_id(),
            x = object.x(),
            y = object.y(),
            z = object.z(),
            "3D object updated"
        );
    }
    fn object_3d_removed(&self, object: &Tuio3DObject) {
        info!(sid = object.session_id(), "3D object removed");
    }

    fn cursor_added(&self, cursor: &TuioCursor) {
        info!(
            sid = cursor.session_id(),
            id = cursor.cursor_id(),
            x = cursor.x(),
            y = cursor.y(),
            "cursor down"
        );
    }
    fn cursor_updated(&self, cursor: &TuioCursor) {
        info!(
            sid = cursor.session_id(),
            id = cursor.cursor_id(),
            x = cursor.x(),
            y = cursor.y(),
            speed = cursor.motion_speed(),
            "cursor move"
        );
    }
    fn cursor_removed(&self, cursor: &TuioCursor) {
        info!(
            sid = cursor.session_id(),
            id = cursor.cursor_id(),
            "cursor up"
        );
    }

    fn cursor_3d_added(&self, cursor: &Tuio3DCursor) {
        info!(
            sid = cursor.session_id(),
            id = cursor.cursor_id(),
            x = cursor.x(),
            y = cursor.y(),
            z = cursor.z(),
            "3D cursor added"
        );
    }
    fn cursor_3d_updated(&self, cursor: &Tuio3DCursor) {
        info!(
            sid = cursor.session_id(),
            x = cursor.x(),
            y = cursor.y(),
            z = cursor.z(),
            "3D cursor updated"
        );
    }
    fn cursor_3d_removed(&self, cursor: &Tuio3DCursor) {
        info!(sid = cursor.session_id(), "3D cursor removed");
    }

    fn blob_added(&self, blob: &TuioBlob) {
        info!(
            sid = blob.session_id(),
            x = blob.x(),
            y = blob.y(),
            w = blob.width(),
            h = blob.height(),
            "blob added"
        );
    }
    fn blob_updated(&self, blob: &TuioBlob) {
        info!(
            sid = blob.session_id(),
            x = blob.x(),
            y = blob.y(),
            area = blob.area(),
            "blob updated"
        );
    }
    fn blob_removed(&self, blob: &TuioBlob) {
        info!(sid = blob.session_id(), "blob removed");
    }

    fn refresh(&self, _time: TuioTime) {}
}

fn init_logging(config: &ClientConfig, verbose: u8) {
    let default_level = match verbose {
        0 => config.logging.level.as_str(),
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match config.logging.format.as_str() {
        "json" => builder.json().init(),
        "compact" => builder.compact().init(),
        _ => builder.pretty().init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => {
            ClientConfig::load(path).with_context(|| format!("loading config from {path}"))?
        }
        None => ClientConfig::default(),
    };
    let mut config = config.with_overrides(cli.bind.clone(), cli.port);
    if let Some(format) = &cli.log_format {
        config.logging.format = format.clone();
    }
    config.validate().context("invalid configuration")?;
    init_logging(&config, cli.verbose);

    let client = TuioClient::with_config(config);
    client.add_listener(Arc::new(ConsoleListener));
    client
        .connect()
        .await
        .context("starting the TUIO client")?;
    info!(port = client.port(), "tuio-monitor running, Ctrl-C to stop");

    tokio::signal::ctrl_c().await.context("waiting for Ctrl-C")?;
    if let Err(e) = client.disconnect() {
        warn!(error = %e, "disconnect failed");
    }
    Ok(())
}
