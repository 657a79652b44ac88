// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use anyhow::{anyhow, Context, Result};
use bgp::log::init_logger;
use bgp::{AsPath, PathOrigin, Speaker, SpeakerConfig, UpdateHandler};
use clap::{Args, Parser, Subcommand};
use slog::{info, warn, Logger};
use std::sync::mpsc::channel;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a speaker against a single peer until interrupted.
    Run(Run),
}

#[derive(Args, Debug)]
struct Run {
    /// Read the speaker configuration from this JSON file instead of the
    /// command line.
    #[arg(short, long)]
    config: Option<String>,

    /// Router id in dotted IPv4 notation.
    #[arg(long, required_unless_present = "config")]
    router_id: Option<String>,

    /// Local autonomous system number.
    #[arg(long, required_unless_present = "config")]
    asn: Option<u16>,

    /// Hold time in seconds.
    #[arg(long, default_value_t = 90)]
    hold_time: u16,

    /// Peer address or hostname.
    #[arg(long, required_unless_present = "config")]
    peer: Option<String>,

    /// Peer TCP port.
    #[arg(long, default_value_t = bgp::BGP_PORT)]
    port: u16,

    /// Prefix to announce once connected, may be repeated.
    #[arg(long = "prefix", name = "prefix")]
    prefixes: Vec<String>,

    /// Next hop for announced prefixes, may be repeated.
    #[arg(long = "next-hop", name = "next-hop")]
    next_hops: Vec<String>,

    /// Emit debug records.
    #[arg(long, default_value_t = false)]
    debug: bool,
}

impl Run {
    fn speaker_config(&self) -> Result<SpeakerConfig> {
        if let Some(path) = &self.config {
            let f = std::fs::File::open(path)
                .with_context(|| format!("open config {path}"))?;
            return serde_json::from_reader(f)
                .with_context(|| format!("parse config {path}"));
        }
        let mut c = SpeakerConfig::new(
            self.router_id.clone().ok_or(anyhow!("router id required"))?,
            self.asn.ok_or(anyhow!("asn required"))?,
            self.hold_time,
            self.peer.clone().ok_or(anyhow!("peer required"))?,
        );
        c.port = self.port;
        c.debug = self.debug;
        Ok(c)
    }
}

fn main() -> Result<()> {
    let args = Cli::parse();
    match args.command {
        Commands::Run(r) => run(r),
    }
}

fn run(r: Run) -> Result<()> {
    let log = init_logger();
    let config = r.speaker_config()?;

    let handler: UpdateHandler = {
        let log = log.clone();
        Arc::new(move |update: bgp::UpdateMessage| {
            info!(log, "update from peer";
                "withdrawn" => format!("{:?}", update.withdrawn),
                "prefixes" => format!("{:?}", update.prefixes),
                "next_hops" => format!("{:?}", update.next_hops),
                "as_path" => format!("{:?}", update.as_path.path)
            );
        })
    };
    let speaker = Speaker::new(&config, Some(handler), log.clone())?;

    for prefix in &r.prefixes {
        let result = speaker.add(
            prefix,
            PathOrigin::Igp,
            AsPath::sequence(vec![config.asn]),
            r.next_hops.clone(),
        );
        match result {
            // Stored, goes out with the replay on connect.
            Ok(()) | Err(bgp::Error::NotConnected) => {}
            Err(e) => return Err(e).context(format!("announce {prefix}")),
        }
    }

    speaker.connect()?;
    info!(log, "speaker running"; "peer" => speaker.params().peer);

    wait_for_termination(&log)?;

    if let Err(e) = speaker.disconnect() {
        warn!(log, "disconnect: {e}");
    }
    Ok(())
}

fn wait_for_termination(log: &Logger) -> Result<()> {
    let (tx, rx) = channel();
    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })
    .context("set termination handler")?;
    rx.recv().context("termination channel")?;
    info!(log, "shutting down");
    Ok(())
}
