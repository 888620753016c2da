// PCAP Funnel - Main Entry Point
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! PCAP Funnel - explore a parsed packet capture from the command line.

use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use pcap_funnel::detail::IpDetail;
use pcap_funnel::graph::Readability;
use pcap_funnel::ingest::{split_into_batches, Ingest, IngestEvent};
use pcap_funnel::lookup::{CancellationToken, GeoClient, HostnameClient, DEFAULT_HOSTNAME_URL};
use pcap_funnel::models::{into_dataset, time_extent, FiltrationLayers, Layer, Mode, Packet};
use pcap_funnel::presets::{preset, FiltersDocument, PRESETS};
use pcap_funnel::session::{format_timestamp, Session, TimeSelection};
use pcap_funnel::stats::{top_country, NumberStats, StatElement};
use pcap_funnel::Settings;

#[derive(Debug, Parser)]
#[command(name = "pcap-funnel", version, about = "Cascading filters over a parsed packet capture")]
struct Cli {
    /// Dataset JSON file (array of packets)
    dataset: PathBuf,

    /// Filtration layers, top to bottom
    #[arg(short, long, value_delimiter = ',')]
    layers: Vec<Layer>,

    /// Named layer preset (see --list-presets)
    #[arg(long, conflicts_with = "layers")]
    preset: Option<String>,

    /// Import layers, selections, and time range from an exported filters file
    #[arg(short, long)]
    filters: Option<PathBuf>,

    /// Export the resulting filters to a file
    #[arg(long)]
    export: Option<PathBuf>,

    /// Measurement mode of every layer
    #[arg(short, long)]
    mode: Option<Mode>,

    /// Select every value of every layer, top to bottom
    #[arg(long)]
    select_all: bool,

    /// Toggle a value, as layer=value (repeatable)
    #[arg(short, long, value_parser = parse_selection)]
    select: Vec<(Layer, String)>,

    /// Start of the time selection (epoch seconds)
    #[arg(long)]
    from: Option<f64>,

    /// End of the time selection (epoch seconds)
    #[arg(long)]
    to: Option<f64>,

    /// Rows shown per statistic
    #[arg(short, long)]
    top: Option<usize>,

    /// Feed the dataset through batched ingestion in parts of this size
    #[arg(long)]
    batch_size: Option<usize>,

    /// Show the traffic of a single IP from the filtered dataset
    #[arg(long)]
    ip: Option<String>,

    /// Enrich the IP view with geolocation and hostnames
    #[arg(long, requires = "ip")]
    lookup: bool,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// List layer presets and exit
    #[arg(long)]
    list_presets: bool,
}

fn parse_selection(s: &str) -> Result<(Layer, String), String> {
    let (layer, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected layer=value, got {}", s))?;
    Ok((layer.trim().parse()?, value.to_string()))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LayerReport {
    layer: Layer,
    mode: Mode,
    input_packets: usize,
    selected: Vec<String>,
    top: Vec<StatElement>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Report {
    time_selection: String,
    time_filtered: NumberStats,
    layers: Vec<LayerReport>,
    filtered: NumberStats,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct IpReport {
    ip: String,
    incoming_packets: usize,
    outgoing_packets: usize,
    incoming_flows: usize,
    outgoing_flows: usize,
    top_ports: Vec<StatElement>,
    peers: Vec<String>,
    top_country: Option<String>,
    hostnames: Vec<(String, String)>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if cli.list_presets {
        for preset in &PRESETS {
            let layers: Vec<&str> = preset.layers.iter().map(|l| l.as_str()).collect();
            println!("{:<36} [{}]", preset.name, layers.join(", "));
        }
        return Ok(());
    }

    let settings = Settings::new();
    debug!("Settings from {}", settings.path().display());
    let mut dashboard = settings.dashboard().clone();
    if let Some(mode) = cli.mode {
        dashboard.default_mode = mode;
    }
    let stat_limit = cli.top.unwrap_or(dashboard.stat_limit);

    let content = fs::read_to_string(&cli.dataset)
        .with_context(|| format!("Failed to read dataset {}", cli.dataset.display()))?;
    let packets: Vec<Packet> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse dataset {}", cli.dataset.display()))?;

    let mut session = Session::new(dashboard);
    match cli.batch_size {
        Some(batch_size) => load_in_batches(&mut session, &cli.dataset, packets, batch_size).await,
        None => session.change_dataset(into_dataset(packets)),
    }

    if let Some(name) = &cli.preset {
        let Some(preset) = preset(name) else {
            bail!("Unknown preset {:?}", name);
        };
        session.apply_preset(preset);
    } else if !cli.layers.is_empty() {
        session.reset_layers(FiltrationLayers::new(cli.layers.iter().copied()));
    }

    if let Some(path) = &cli.filters {
        let document = FiltersDocument::load(path)
            .with_context(|| format!("Failed to import filters from {}", path.display()))?;
        session.apply_filters_document(document);
    }

    if cli.from.is_some() || cli.to.is_some() {
        let (first, last) = time_extent(session.dataset()).unwrap_or_default();
        session.set_time_selection(TimeSelection::range(
            cli.from.unwrap_or(first),
            cli.to.unwrap_or(last),
        ));
    }

    if cli.select_all {
        let layers: Vec<Layer> = session.layers().iter().collect();
        for layer in layers {
            session.select_all(layer);
        }
    }
    for (layer, value) in &cli.select {
        session.toggle_selection(*layer, value);
    }

    let report = build_report(&session, stat_limit);
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    if let Some(ip) = &cli.ip {
        let Some(mut detail) = IpDetail::new(ip, session.filtered_dataset()) else {
            bail!("No traffic for {} in the filtered dataset", ip);
        };

        if cli.lookup {
            let geo = GeoClient::new(&session.settings().geo_server_url)?;
            let hostnames = HostnameClient::new(DEFAULT_HOSTNAME_URL)?;
            let token = CancellationToken::new();
            detail.enrich(&geo, &hostnames, &token).await;
        }

        let report = build_ip_report(&mut detail, session.mode(Layer::Port), stat_limit);
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            print_ip_report(&report, &mut detail);
        }
    }

    if let Some(path) = &cli.export {
        session
            .export_filters()
            .save(path)
            .with_context(|| format!("Failed to export filters to {}", path.display()))?;
        info!("Exported filters to {}", path.display());
    }

    Ok(())
}

async fn load_in_batches(
    session: &mut Session,
    source: &std::path::Path,
    packets: Vec<Packet>,
    batch_size: usize,
) {
    let (sender, mut receiver) = mpsc::channel(16);
    let mut ingest = Ingest::new();
    let name = source.display().to_string();

    // The request id is assigned when the request is handled
    ingest.handle(IngestEvent::Request { name }, session);
    let request_id = ingest.accepting().unwrap_or_default();

    let producer = tokio::spawn(async move {
        for message in split_into_batches(request_id, packets, batch_size) {
            if sender.send(IngestEvent::Batch(message)).await.is_err() {
                break;
            }
        }
    });

    ingest.run(&mut receiver, session).await;
    if let Err(e) = producer.await {
        debug!("Batch producer stopped: {}", e);
    }
}

fn build_report(session: &Session, stat_limit: usize) -> Report {
    let layers = session
        .layers()
        .iter()
        .map(|layer| {
            let mut selected: Vec<String> = session
                .selections()
                .get(layer)
                .map(|values| values.iter().cloned().collect())
                .unwrap_or_default();
            selected.sort();
            LayerReport {
                layer,
                mode: session.mode(layer),
                input_packets: session.layer_input(layer).len(),
                selected,
                top: session.stat(layer).iter().take(stat_limit).cloned().collect(),
            }
        })
        .collect();

    Report {
        time_selection: session.time_selection().to_string(),
        time_filtered: NumberStats::from_dataset(session.time_filtered()),
        layers,
        filtered: NumberStats::from_dataset(session.filtered_dataset()),
    }
}

fn print_numbers(label: &str, numbers: &NumberStats) {
    println!(
        "{:<14} {} packets, {} flows, {} bytes, {} IPs",
        label, numbers.packets, numbers.flows, numbers.bytes, numbers.ips
    );
}

fn print_report(report: &Report) {
    println!("Time selection: {}", report.time_selection);
    print_numbers("Time filtered:", &report.time_filtered);

    for layer in &report.layers {
        println!();
        println!(
            "{} ({}, {} packets in, {} selected)",
            layer.layer.display_name(),
            layer.mode.display_name(),
            layer.input_packets,
            layer.selected.len()
        );
        for element in &layer.top {
            let mark = if layer.selected.contains(&element.value) { "x" } else { " " };
            println!("  [{}] {:<40} {:>12}", mark, element.value, element.count);
        }
    }

    println!();
    print_numbers("Filtered:", &report.filtered);
}

fn build_ip_report(detail: &mut IpDetail, mode: Mode, stat_limit: usize) -> IpReport {
    let top_ports = detail
        .stats(mode)
        .get(Layer::Port)
        .iter()
        .take(stat_limit)
        .cloned()
        .collect();
    let peers = detail.peers();
    let countries = detail.countries(mode);
    let mut hostnames: Vec<(String, String)> = detail
        .hostnames()
        .iter()
        .map(|(ip, name)| (ip.clone(), name.clone()))
        .collect();
    hostnames.sort();

    IpReport {
        ip: detail.ip().to_string(),
        incoming_packets: detail.incoming().len(),
        outgoing_packets: detail.outgoing().len(),
        incoming_flows: detail.incoming_flows().len(),
        outgoing_flows: detail.outgoing_flows().len(),
        top_ports,
        peers,
        top_country: top_country(&countries).map(|country| country.code.clone()),
        hostnames,
    }
}

fn print_ip_report(report: &IpReport, detail: &mut IpDetail) {
    println!();
    println!("IP {}", report.ip);
    println!(
        "  received {} packets in {} flows, sent {} packets in {} flows",
        report.incoming_packets,
        report.incoming_flows,
        report.outgoing_packets,
        report.outgoing_flows
    );
    if let (Some(first), Some(last)) = (detail.packets().first(), detail.packets().last()) {
        println!(
            "  active {} - {}",
            format_timestamp(first.timestamp),
            format_timestamp(last.timestamp)
        );
    }
    if let Some(country) = &report.top_country {
        println!("  top country: {}", country);
    }
    for element in &report.top_ports {
        println!("  port {:<10} {:>12}", element.value, element.count);
    }

    let sankey = detail.sankey(Mode::Packets, Readability::AggregateBelowCutoff, 10);
    for link in &sankey.links {
        let source = &sankey.nodes[link.source];
        let target = &sankey.nodes[link.target];
        let source_name = report
            .hostnames
            .iter()
            .find(|(ip, _)| *ip == source.ip)
            .map(|(_, name)| name.as_str())
            .unwrap_or(source.id.as_str());
        println!("  {} -> {}: {}", source_name, target.id, link.value);
    }
}
