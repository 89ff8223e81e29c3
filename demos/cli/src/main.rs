use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use recon_core::{Clustering, DedupConfig, NormalizedBundle};
use recon_fhir::{normalize_bundle, reconcile, CodeLookup, HttpCodeLookup, RawBundle};
use serde_json::Value;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(
    name = "recon-cli",
    about = "Chuẩn hoá dữ liệu FHIR theo nguồn và đối soát thành một hồ sơ."
)]
struct Args {
    /// In JSON đầu ra có thụt lề.
    #[arg(long, global = true)]
    pretty: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Chuẩn hoá dữ liệu thô của một kết nối.
    Normalize {
        /// Đường dẫn tới file JSON thô: Bundle FHIR hoặc object theo loại.
        #[arg(short, long)]
        input: PathBuf,

        /// Nhãn nguồn ghi trên mọi bản ghi, ví dụ `epic`.
        #[arg(short, long)]
        source: String,

        /// Bắt buộc đầu vào là Bundle FHIR.
        #[arg(long)]
        bundle: bool,

        /// URL gốc của dịch vụ tra cứu thuật ngữ.
        #[arg(long, env = "RECON_LOOKUP_URL")]
        lookup_url: Option<String>,

        /// Thời gian chờ mỗi request tra cứu, tính bằng mili giây.
        #[arg(long, env = "RECON_LOOKUP_TIMEOUT_MS", default_value_t = 3000)]
        lookup_timeout_ms: u64,
    },
    /// Khử trùng lặp nhiều nguồn thành một hồ sơ đã đối soát.
    Reconcile {
        /// Bundle đã chuẩn hoá, hoặc bundle thô sẽ được chuẩn hoá ngay.
        #[arg(short, long, num_args = 1.., required = true)]
        input: Vec<PathBuf>,

        /// Nhãn nguồn cho đầu vào thô, theo thứ tự. Mặc định là tên file.
        #[arg(short, long)]
        source: Vec<String>,

        /// File JSON chứa ngưỡng so khớp; trường thiếu giữ giá trị mặc định.
        #[arg(long)]
        config: Option<PathBuf>,

        #[arg(long, env = "RECON_CLUSTERING", value_enum)]
        clustering: Option<ClusteringArg>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ClusteringArg {
    Seed,
    ConnectedComponents,
}

impl From<ClusteringArg> for Clustering {
    fn from(arg: ClusteringArg) -> Self {
        match arg {
            ClusteringArg::Seed => Clustering::Seed,
            ClusteringArg::ConnectedComponents => Clustering::ConnectedComponents,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("recon_fhir=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let output = match args.command {
        Command::Normalize {
            input,
            source,
            bundle,
            lookup_url,
            lookup_timeout_ms,
        } => {
            let raw = read_raw(&input, bundle)?;
            let lookup = lookup_url
                .map(|url| HttpCodeLookup::new(&url, Duration::from_millis(lookup_timeout_ms)))
                .transpose()
                .context("Không tạo được client tra cứu")?;

            let normalized = normalize_bundle(
                &raw,
                &source,
                lookup.as_ref().map(|lookup| lookup as &dyn CodeLookup),
            )
            .await;
            serde_json::to_value(normalized)?
        }
        Command::Reconcile {
            input,
            source,
            config,
            clustering,
        } => {
            let mut config = match config {
                Some(path) => serde_json::from_str::<DedupConfig>(&read(&path)?)
                    .with_context(|| format!("Config không hợp lệ: {}", path.display()))?,
                None => DedupConfig::default(),
            };
            if let Some(clustering) = clustering {
                config.clustering = clustering.into();
            }

            let mut bundles = Vec::with_capacity(input.len());
            for (index, path) in input.iter().enumerate() {
                let label = source.get(index).cloned().unwrap_or_else(|| file_stem(path));
                bundles.push(load_bundle(path, &label).await?);
            }
            serde_json::to_value(reconcile(&bundles, &config))?
        }
    };

    let text = if args.pretty {
        serde_json::to_string_pretty(&output)?
    } else {
        serde_json::to_string(&output)?
    };
    println!("{text}");
    Ok(())
}

fn read(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Không đọc được file {}", path.display()))
}

fn read_raw(path: &Path, require_bundle: bool) -> anyhow::Result<RawBundle> {
    let value: Value = serde_json::from_str(&read(path)?)
        .with_context(|| format!("File {} không phải JSON hợp lệ", path.display()))?;
    let raw = if require_bundle {
        RawBundle::from_fhir_bundle(&value)?
    } else {
        RawBundle::from_value(value)?
    };
    Ok(raw)
}

/// File đã chuẩn hoá có khối `_meta`; file khác được chuẩn hoá tại chỗ
/// với nhãn `source`.
async fn load_bundle(path: &Path, source: &str) -> anyhow::Result<NormalizedBundle> {
    let value: Value = serde_json::from_str(&read(path)?)
        .with_context(|| format!("File {} không phải JSON hợp lệ", path.display()))?;

    if value.get("_meta").is_some() {
        return serde_json::from_value(value)
            .with_context(|| format!("File {} không phải bundle đã chuẩn hoá", path.display()));
    }

    tracing::info!(path = %path.display(), source, "normalizing raw input");
    let raw = RawBundle::from_value(value)?;
    Ok(normalize_bundle(&raw, source, None).await)
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "unknown".to_string())
}
