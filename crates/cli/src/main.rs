use std::str::FromStr;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use kapply_apply::{ApplyResult, ClientHolder, Dispatcher};
use kapply_core::{env_usize, DirSource, ManifestSource, TracingRecorder};
use kapply_kubehub::KubeCaches;
use tokio::signal;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "kapplyctl", version, about = "Apply Kubernetes manifests: create if missing, update if changed")]
struct Cli {
    /// Output format
    #[arg(short = 'o', long = "output", value_enum, global = true, default_value_t = Output::Human)]
    output: Output,

    /// Directory manifest paths are relative to
    #[arg(long = "dir", global = true, env = "KAPPLY_DIR", default_value = ".")]
    dir: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Output { Human, Json }

#[derive(Subcommand, Debug)]
enum Commands {
    /// Apply manifests against the current kube context
    Apply {
        /// Serve ConfigMap/Secret reads for this namespace from a watch cache (repeatable)
        #[arg(long = "cache-ns")]
        cache_ns: Vec<String>,
        /// Manifest files, applied in order
        #[arg(required = true)]
        files: Vec<String>,
    },
    /// Decode manifests without contacting a cluster
    Decode {
        #[arg(required = true)]
        files: Vec<String>,
    },
}

fn init_tracing() {
    let env = std::env::var("KAPPLY_LOG").unwrap_or_else(|_| "info".to_string());
    let filter = tracing_subscriber::EnvFilter::from_str(&env).unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).with_writer(std::io::stderr).init();
}

fn init_metrics() {
    if let Ok(addr) = std::env::var("KAPPLY_METRICS_ADDR") {
        if let Ok(sock) = addr.parse::<std::net::SocketAddr>() {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            match builder.with_http_listener(sock).install() {
                Ok(_) => info!(addr = %addr, "Prometheus metrics exporter listening"),
                Err(e) => warn!(error = %e, "failed to install metrics exporter"),
            }
        } else {
            warn!(addr = %addr, "invalid KAPPLY_METRICS_ADDR; expected host:port");
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    init_metrics();
    let cli = Cli::parse();
    let manifests = DirSource::new(&cli.dir);
    let dispatcher = Dispatcher::standard();

    let ok = match cli.command {
        Commands::Apply { cache_ns, files } => {
            info!(files = files.len(), cache_ns = ?cache_ns, "apply invoked");
            let clients = connect(&cache_ns).await?;
            let recorder = TracingRecorder::new("kapplyctl");
            let files: Vec<&str> = files.iter().map(|s| s.as_str()).collect();
            let results = tokio::select! {
                r = dispatcher.apply_all(&clients, &recorder, &manifests, &files) => r,
                _ = signal::ctrl_c() => {
                    warn!("interrupted; remaining manifests were not applied");
                    std::process::exit(130);
                }
            };
            print_results(cli.output, &results)?;
            results.iter().all(|r| r.is_ok())
        }
        Commands::Decode { files } => {
            let mut ok = true;
            let mut rows = Vec::with_capacity(files.len());
            for file in &files {
                let decoded = manifests
                    .read(file)
                    .and_then(|bytes| dispatcher.scheme().decode(&bytes).map_err(anyhow::Error::from));
                match decoded {
                    Ok(d) => {
                        let routed = dispatcher.registry().handles(&d.type_name);
                        rows.push(serde_json::json!({ "file": file, "kind": d.type_name, "namespace": d.namespace, "name": d.name, "routed": routed }));
                    }
                    Err(e) => {
                        ok = false;
                        error!(file = %file, error = %format!("{:#}", e), "decode failed");
                        rows.push(serde_json::json!({ "file": file, "error": format!("{:#}", e) }));
                    }
                }
            }
            match cli.output {
                Output::Human => {
                    println!("{:<32} {:<48} {}", "FILE", "KIND", "NAME");
                    for row in &rows {
                        let kind = row["kind"].as_str().or(row["error"].as_str()).unwrap_or("-");
                        let name = match (row["namespace"].as_str(), row["name"].as_str()) {
                            (Some(ns), Some(n)) => format!("{}/{}", ns, n),
                            (None, Some(n)) => n.to_string(),
                            _ => "-".to_string(),
                        };
                        println!("{:<32} {:<48} {}", row["file"].as_str().unwrap_or("-"), kind, name);
                    }
                }
                Output::Json => println!("{}", serde_json::to_string_pretty(&rows)?),
            }
            ok
        }
    };

    if !ok {
        std::process::exit(1);
    }
    Ok(())
}

/// Client holder for the current context, with watch caches for `cache_ns` when given.
async fn connect(cache_ns: &[String]) -> Result<ClientHolder> {
    let client = kapply_kubehub::kube_client().await?;
    let mut clients = ClientHolder::kubernetes(client.clone()).with_api_extensions(client.clone());
    if !cache_ns.is_empty() {
        let cap = env_usize("KAPPLY_CACHE_CAP", 2048);
        let wait = env_usize("KAPPLY_CACHE_WAIT_SECS", 8) as u64;
        let caches = KubeCaches::start(client, cache_ns, cap);
        if !caches.wait_synced(Duration::from_secs(wait)).await {
            warn!(wait_secs = wait, "caches not synced yet; unlisted namespaces are read live");
        }
        clients = clients.with_kubernetes_caches(caches);
    }
    Ok(clients)
}

fn print_results(output: Output, results: &[ApplyResult]) -> Result<()> {
    match output {
        Output::Human => {
            println!("{:<32} {:<48} {:<8} {}", "FILE", "KIND", "CHANGED", "ERROR");
            for r in results {
                println!("{}", human_row(r));
            }
        }
        Output::Json => println!("{}", serde_json::to_string_pretty(results)?),
    }
    Ok(())
}

fn human_row(r: &ApplyResult) -> String {
    let kind = if r.kind.is_empty() { "-" } else { r.kind.as_str() };
    let err = r.error.as_ref().map(|e| e.to_string()).unwrap_or_else(|| "-".to_string());
    format!("{:<32} {:<48} {:<8} {}", r.file, kind, r.changed, err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kapply_apply::ApplyError;

    #[test]
    fn parses_apply_flags() {
        let cli = Cli::try_parse_from(["kapplyctl", "-o", "json", "apply", "--cache-ns", "a", "--cache-ns", "b", "x.yaml", "y.yaml"]).unwrap();
        assert_eq!(cli.output, Output::Json);
        match cli.command {
            Commands::Apply { cache_ns, files } => {
                assert_eq!(cache_ns, vec!["a", "b"]);
                assert_eq!(files, vec!["x.yaml", "y.yaml"]);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(Cli::try_parse_from(["kapplyctl", "apply"]).is_err());
    }

    #[test]
    fn human_rows_show_errors() {
        let mut r = ApplyResult::new("cm.yaml");
        r.kind = "v1/ConfigMap".into();
        r.error = Some(ApplyError::MissingClient("kubeClient"));
        let row = human_row(&r);
        assert!(row.starts_with("cm.yaml"));
        assert!(row.contains("v1/ConfigMap"));
        assert!(row.ends_with("missing kubeClient"));
    }
}
