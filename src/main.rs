use sift::cli::{Cli, Commands, ConfigAction, QueryLimits};
use sift::config::{Config, ConfigValidator};
use sift::corpus::{load_arxiv_metadata, MetadataExt};
use sift::embedding::embedder_for_model;
use sift::error::{Result, SiftError};
use sift::retrieval::{
    reranker_for_model, QueryRequest, RerankedResult, RetrievalOutput, RetrievalPipeline,
};
use sift::server::{IpcClient, IpcMessage, IpcResponse, Server, ServerStatus};
use std::path::PathBuf;
use std::sync::Arc;

/// Abstract preview length in result listings
const ABSTRACT_PREVIEW_CHARS: usize = 350;

fn main() -> Result<()> {
    let cli = Cli::parse_args();

    init_logging(cli.verbose);

    match cli.command {
        Commands::Serve { corpus, socket } => {
            cmd_serve(cli.config, cli.profile, corpus, socket)?;
        }
        Commands::Search {
            query,
            limits,
            corpus,
            json,
        } => {
            cmd_search(cli.config, cli.profile, &query, limits, corpus, json)?;
        }
        Commands::Query {
            query,
            limits,
            json,
        } => {
            cmd_query(cli.config, cli.profile, &query, limits, json)?;
        }
        Commands::Status => {
            cmd_status(cli.config, cli.profile)?;
        }
        Commands::Config { action } => {
            cmd_config(cli.config, cli.profile, action)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_filter = if verbose { "sift=debug" } else { "sift=info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().map_err(|e| SiftError::Io {
        source: e,
        context: "Failed to create tokio runtime".to_string(),
    })
}

fn cmd_serve(
    config_path: Option<PathBuf>,
    profile: Option<String>,
    corpus: Option<PathBuf>,
    socket: Option<PathBuf>,
) -> Result<()> {
    let mut config = load_config(config_path, profile)?;
    if let Some(corpus) = corpus {
        config.corpus.path = corpus;
    }
    if let Some(socket) = socket {
        config.server.socket_path = socket;
    }

    let pipeline = build_pipeline(&config)?;
    let socket_path = config.socket_path()?;

    println!(
        "✓ Indexed {} documents ({} index, {})",
        pipeline.index().len(),
        pipeline.index().kind(),
        pipeline.index().binding()
    );
    println!("  Listening on {}", socket_path.display());

    let server = Server::new(Arc::new(pipeline), socket_path);
    runtime()?.block_on(server.run())
}

fn cmd_search(
    config_path: Option<PathBuf>,
    profile: Option<String>,
    query: &str,
    limits: QueryLimits,
    corpus: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    let mut config = load_config(config_path, profile)?;
    if let Some(corpus) = corpus {
        config.corpus.path = corpus;
    }

    let request = query_request(&config, query, limits);
    let pipeline = build_pipeline(&config)?;

    let output = runtime()?.block_on(pipeline.retrieve(&request))?;
    print_output(&output, json)
}

fn cmd_query(
    config_path: Option<PathBuf>,
    profile: Option<String>,
    query: &str,
    limits: QueryLimits,
    json: bool,
) -> Result<()> {
    let config = load_config(config_path, profile)?;
    let request = query_request(&config, query, limits);
    let client = IpcClient::new(config.socket_path()?);

    let response = runtime()?.block_on(client.send(&IpcMessage::Search(request)))?;
    let output: RetrievalOutput = response_data(response)?;
    print_output(&output, json)
}

fn cmd_status(config_path: Option<PathBuf>, profile: Option<String>) -> Result<()> {
    let config = load_config(config_path, profile)?;
    let socket_path = config.socket_path()?;
    let client = IpcClient::new(socket_path.clone());

    let response = match runtime()?.block_on(client.send(&IpcMessage::Status)) {
        Ok(response) => response,
        Err(SiftError::ServerNotRunning { .. }) => {
            println!("Sift Status");
            println!("===========");
            println!("\nServer: Stopped ({})", socket_path.display());
            return Ok(());
        }
        Err(e) => return Err(e),
    };
    let status: ServerStatus = response_data(response)?;

    println!("Sift Status");
    println!("===========");
    println!("\nServer: Running ({})", socket_path.display());
    println!(
        "  Started: {} (up {}s)",
        status.started_at.format("%Y-%m-%d %H:%M:%S"),
        status.uptime_secs
    );
    println!("  Documents: {}", status.documents);
    println!(
        "  Embedder: {} ({}D), {} index",
        status.embedding_model, status.dimension, status.index_kind
    );
    println!("  Reranker: {}", status.reranker_model);

    Ok(())
}

fn cmd_config(
    config_path: Option<PathBuf>,
    profile: Option<String>,
    action: ConfigAction,
) -> Result<()> {
    match action {
        ConfigAction::Show { section } => {
            let config = load_config(config_path, profile)?;
            let value = serde_json::to_value(&config).map_err(|e| SiftError::Json {
                source: e,
                context: "Failed to serialize config".to_string(),
            })?;

            let shown = match &section {
                Some(section) => value.get(section).cloned().ok_or_else(|| {
                    SiftError::Config(format!("Unknown config section '{}'", section))
                })?,
                None => value,
            };

            let json = serde_json::to_string_pretty(&shown).map_err(|e| SiftError::Json {
                source: e,
                context: "Failed to serialize config".to_string(),
            })?;
            println!("{}", json);
        }
        ConfigAction::Validate { file } => {
            let path = match file.or(config_path) {
                Some(path) => path,
                None => Config::default_path()?,
            };
            let config = match profile {
                Some(profile) => Config::load_with_profile(&path, &profile)?,
                None => Config::load(&path)?,
            };
            println!("✓ Configuration is valid");
            println!("  Schema version: {}", config.meta.schema_version);
        }
        ConfigAction::Init { force } => {
            let path = match config_path {
                Some(path) => path,
                None => Config::default_path()?,
            };

            if path.exists() && !force {
                println!("Configuration file already exists at: {}", path.display());
                println!("Use --force to overwrite");
                return Ok(());
            }

            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| SiftError::Io {
                    source: e,
                    context: format!("Failed to create config directory: {:?}", parent),
                })?;
            }

            let config = Config::default();
            config.save(&path)?;

            println!("✓ Configuration initialized at: {}", path.display());
            println!("  Corpus: {}", config.corpus.path.display());
            println!("  Profiles: offline, fast, accuracy");
        }
    }

    Ok(())
}

fn load_config(config_path: Option<PathBuf>, profile: Option<String>) -> Result<Config> {
    let path = match config_path {
        Some(path) => path,
        None => Config::default_path()?,
    };

    if !path.exists() {
        tracing::warn!(
            "Config file not found, using defaults. Run 'sift config init' to create one."
        );
        let mut config = Config::default();
        config.apply_env_overrides();
        if let Some(profile) = profile {
            config.apply_profile(&profile)?;
        }
        ConfigValidator::validate(&config)?;
        return Ok(config);
    }

    if let Some(profile) = profile {
        Config::load_with_profile(&path, &profile)
    } else {
        Config::load(&path)
    }
}

fn build_pipeline(config: &Config) -> Result<RetrievalPipeline> {
    let corpus_path = config.corpus_path()?;
    tracing::info!("Loading corpus from {:?}", corpus_path);
    let corpus = load_arxiv_metadata(&corpus_path)?;

    let cache_dir = config.cache_dir()?;
    let embedder = embedder_for_model(
        &config.embedding.model,
        config.embedding.batch_size,
        cache_dir.clone(),
    )?;
    let reranker = reranker_for_model(
        &config.reranker.model,
        config.reranker.batch_size,
        cache_dir,
    )?;

    let pipeline = RetrievalPipeline::from_corpus(
        embedder,
        reranker,
        corpus,
        &config.index_options(),
        config.embedding.batch_size,
        config.pipeline_options()?,
    )?;

    Ok(pipeline)
}

fn query_request(config: &Config, query: &str, limits: QueryLimits) -> QueryRequest {
    QueryRequest::new(
        query,
        limits.top_k.unwrap_or(config.retrieval.default_top_k),
        limits.initial_k.unwrap_or(config.retrieval.default_initial_k),
    )
}

/// Unwrap a server response into its typed payload
fn response_data<T: serde::de::DeserializeOwned>(response: IpcResponse) -> Result<T> {
    if !response.success {
        let message = response
            .message
            .unwrap_or_else(|| "Request failed".to_string());
        return Err(SiftError::Server(match response.error_kind {
            Some(kind) => format!("{} ({})", message, kind),
            None => message,
        }));
    }

    let data = response
        .data
        .ok_or_else(|| SiftError::Server("Response carried no data".to_string()))?;

    serde_json::from_value(data).map_err(|e| SiftError::Json {
        source: e,
        context: "Failed to decode server response".to_string(),
    })
}

fn print_output(output: &RetrievalOutput, json: bool) -> Result<()> {
    if json {
        let text = serde_json::to_string_pretty(output).map_err(|e| SiftError::Json {
            source: e,
            context: "Failed to serialize results".to_string(),
        })?;
        println!("{}", text);
        return Ok(());
    }

    if output.results.is_empty() {
        println!("No results");
    }

    for (rank, result) in output.results.iter().enumerate() {
        print_result(rank + 1, result);
    }

    println!(
        "encode {:.1}ms · search {:.1}ms · rerank {:.1}ms",
        output.timings.encode.as_secs_f64() * 1000.0,
        output.timings.search.as_secs_f64() * 1000.0,
        output.timings.rerank.as_secs_f64() * 1000.0
    );

    Ok(())
}

fn print_result(rank: usize, result: &RerankedResult) {
    let meta = &result.metadata;
    let title = match meta.field("title") {
        "" => result.id.as_str(),
        title => title,
    };

    println!("{}. {}  [{:.3}]", rank, title.trim(), result.score);
    println!("   https://arxiv.org/abs/{}", result.id);

    let authors = meta.field("authors");
    if !authors.is_empty() {
        println!("   {}", authors.trim());
    }

    let categories = meta.field("categories");
    let date = meta.field("update_date");
    if !categories.is_empty() || !date.is_empty() {
        println!("   {} · {}", categories, date);
    }

    let abstract_text = meta.field("abstract").trim();
    if !abstract_text.is_empty() {
        println!(
            "   {}",
            RerankedResult::preview(abstract_text, ABSTRACT_PREVIEW_CHARS)
        );
    }
    println!();
}
