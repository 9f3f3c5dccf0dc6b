use anyhow::{Context, bail};
use std::path::PathBuf;
use std::sync::Arc;
use wordcount_cluster::config::logging::init_logging;
use wordcount_cluster::config::types::ClusterConfig;
use wordcount_cluster::coordinator::master::Master;
use wordcount_cluster::coordinator::worker::Worker;

enum Role {
    Master { files: Vec<PathBuf> },
    Worker { id: usize },
}

fn usage(program: &str) -> ! {
    eprintln!("Usage: {} [--config <path>] master <file1> [file2 ...]", program);
    eprintln!("       {} [--config <path>] worker <id>", program);
    eprintln!("Example: {} --config cluster.json master books/a.txt books/b.txt", program);
    eprintln!("Example: {} --config cluster.json worker 0", program);
    std::process::exit(1);
}

fn parse_args(args: &[String]) -> anyhow::Result<(Option<PathBuf>, Role)> {
    let mut config_path: Option<PathBuf> = None;
    let mut rest: Vec<&String> = Vec::new();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" => {
                let path = args.get(i + 1).context("--config needs a path")?;
                config_path = Some(PathBuf::from(path));
                i += 2;
            }
            _ => {
                rest.push(&args[i]);
                i += 1;
            }
        }
    }

    let role = match rest.split_first() {
        Some((role, files)) if role.as_str() == "master" => {
            if files.is_empty() {
                bail!("master needs at least one input file");
            }
            Role::Master {
                files: files.iter().map(|f| PathBuf::from(f.as_str())).collect(),
            }
        }
        Some((role, [id])) if role.as_str() == "worker" => Role::Worker {
            id: id
                .parse()
                .with_context(|| format!("invalid worker id {:?}", id))?,
        },
        _ => bail!("expected `master <files...>` or `worker <id>`"),
    };

    Ok((config_path, role))
}

async fn run_master(config: Arc<ClusterConfig>, files: Vec<PathBuf>) -> anyhow::Result<()> {
    let mut documents = Vec::with_capacity(files.len());
    for path in &files {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        tracing::info!("Loaded {} ({} bytes)", path.display(), content.len());
        documents.push(content);
    }

    let master = Master::new(config).await?;

    let cancel = master.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling pipeline");
            cancel.cancel();
        }
    });

    let report = master.run(&documents).await?;
    tracing::info!("Collected results from {} worker(s)", report.results.len());

    Ok(())
}

async fn run_worker(config: Arc<ClusterConfig>, id: usize) -> anyhow::Result<()> {
    let worker = Worker::new(config, id).await?;
    worker.start()?;

    tracing::info!("Press Ctrl+C to shutdown");
    tokio::signal::ctrl_c().await?;

    tracing::info!("Worker {} shutting down", id);
    worker.shutdown();
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("wordcount");

    let (config_path, role) = match parse_args(&args) {
        Ok(parsed) => parsed,
        Err(e) => {
            eprintln!("{}", e);
            usage(program);
        }
    };

    let config = match config_path {
        Some(path) => ClusterConfig::load(&path)?,
        None => {
            let config = ClusterConfig::default();
            config.validate()?;
            config
        }
    };

    init_logging(config.verbosity);
    tracing::info!(
        "Cluster: master {} and {} worker(s)",
        config.master.address(),
        config.num_workers()
    );

    let config = Arc::new(config);
    match role {
        Role::Master { files } => run_master(config, files).await,
        Role::Worker { id } => {
            config.worker(id)?;
            run_worker(config, id).await
        }
    }
}
