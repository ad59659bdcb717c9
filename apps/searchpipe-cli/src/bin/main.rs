use std::env;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context as _};
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use searchpipe_core::config::{Config, Settings};
use searchpipe_core::error::Error;
use searchpipe_core::pipeline::{ExecutionMode, PipelineDefinition};
use searchpipe_core::store::DirectoryStore;
use searchpipe_core::traits::{PipelineStore, SearchBackend};
use searchpipe_core::types::{BackendResponse, Context};
use searchpipe_elastic::ElasticBackend;
use searchpipe_executor::PipelineExecutor;
use searchpipe_stages::StageFactory;

const USAGE: &str = "Usage: searchpipe <command> [args...]

Commands:
  run <pipeline-id|file.json> <query> [flags]   execute one pipeline
  compare <query> <pipeline-id>... [flags]      execute several pipelines side by side
  validate <file.json>                          parse a definition and build its stages
  save <file.json>                              validate a definition and add it to the store
  show <pipeline-id>                            print a stored definition
  list                                          list stored pipelines
  health                                        check backend cluster health

Flags:
  --sequential | --phased       execution mode (default from config)
  --vector <file.json|a,b,c>    query embedding
  --context <file.json>         context object (e.g. {\"filters\": [...]})
  --collection <name>           default collection for search stages";

/// Log filter from `SEARCHPIPE_LOG`, then `RUST_LOG`, then `info`. Logs go to
/// stderr; stdout carries only JSON output.
fn init_tracing() {
    let filter = env::var("SEARCHPIPE_LOG")
        .ok()
        .and_then(|v| EnvFilter::try_new(v).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn parse_args() -> (String, Vec<String>) {
    let mut args: Vec<String> = env::args().collect();
    let prog = args.remove(0);
    if args.is_empty() {
        eprintln!("{}", USAGE.replacen("searchpipe", &prog, 1));
        std::process::exit(1);
    }
    let cmd = args.remove(0);
    (cmd, args)
}

/// Flags shared by `run` and `compare`, plus the remaining positionals.
#[derive(Debug, Default)]
struct RunFlags {
    mode: Option<ExecutionMode>,
    vector: Option<Vec<f64>>,
    context: Option<Context>,
    collection: Option<String>,
    positional: Vec<String>,
}

impl RunFlags {
    fn parse(args: &[String]) -> anyhow::Result<Self> {
        let mut flags = Self::default();
        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--sequential" => flags.mode = Some(ExecutionMode::Sequential),
                "--phased" => flags.mode = Some(ExecutionMode::Phased),
                "--vector" => {
                    let value = iter.next().ok_or_else(|| anyhow!("--vector needs a value"))?;
                    flags.vector = Some(parse_vector(value)?);
                }
                "--context" => {
                    let value = iter.next().ok_or_else(|| anyhow!("--context needs a file"))?;
                    flags.context = Some(read_context(Path::new(value))?);
                }
                "--collection" => {
                    let value = iter.next().ok_or_else(|| anyhow!("--collection needs a name"))?;
                    flags.collection = Some(value.clone());
                }
                other if other.starts_with("--") => bail!("unknown flag {other}"),
                _ => flags.positional.push(arg.clone()),
            }
        }
        Ok(flags)
    }
}

/// A JSON file holding an array of numbers, or an inline comma-separated list.
fn parse_vector(value: &str) -> anyhow::Result<Vec<f64>> {
    if Path::new(value).extension().is_some_and(|e| e == "json") {
        let content = fs::read_to_string(value).with_context(|| format!("reading vector file {value}"))?;
        return serde_json::from_str(&content).with_context(|| format!("{value} must hold a JSON array of numbers"));
    }
    value
        .split(',')
        .map(|part| part.trim().parse::<f64>().with_context(|| format!("invalid vector component '{part}'")))
        .collect()
}

fn read_context(path: &Path) -> anyhow::Result<Context> {
    let content = fs::read_to_string(path).with_context(|| format!("reading context file {}", path.display()))?;
    match serde_json::from_str(&content)? {
        Value::Object(map) => Ok(map),
        _ => bail!("{} must hold a JSON object", path.display()),
    }
}

fn resolve_pipeline(store: &DirectoryStore, reference: &str) -> anyhow::Result<PipelineDefinition> {
    let path = Path::new(reference);
    if path.extension().is_some_and(|e| e == "json") || path.is_file() {
        return Ok(DirectoryStore::load_file(path)?);
    }
    store
        .load(reference)?
        .ok_or_else(|| anyhow!("pipeline '{reference}' not found in {}", store.dir().display()))
}

fn executor(settings: &Settings, collection: Option<&str>) -> anyhow::Result<PipelineExecutor> {
    let backend = ElasticBackend::new(&settings.backend)?;
    let collection = collection.unwrap_or(&settings.backend.default_collection);
    debug!(hosts = ?backend.hosts(), collection, "backend configured");
    Ok(PipelineExecutor::new(StageFactory::new(Arc::new(backend), collection)))
}

/// Stands in for the cluster when stages are only built, never run.
struct OfflineBackend;

#[async_trait]
impl SearchBackend for OfflineBackend {
    async fn query(&self, collection: &str, _body: &Value) -> anyhow::Result<BackendResponse> {
        bail!("no backend connected (query against '{collection}')")
    }
}

/// Parse a definition file and build every enabled stage without touching
/// the network.
fn check_definition(path: &Path, default_collection: &str) -> searchpipe_core::error::Result<PipelineDefinition> {
    let definition = DirectoryStore::load_file(path)?;
    StageFactory::new(Arc::new(OfflineBackend), default_collection).validate_pipeline(&definition)?;
    Ok(definition)
}

fn show_pipeline(store: &DirectoryStore, id: &str) -> searchpipe_core::error::Result<PipelineDefinition> {
    store
        .load(id)?
        .ok_or_else(|| Error::NotFound(format!("pipeline '{id}' in {}", store.dir().display())))
}

fn print_json(value: &Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let config = Config::load().map_err(|e| {
        eprintln!("Error loading config: {}", e);
        e
    })?;
    let settings = config.settings()?;
    let store = DirectoryStore::new(settings.pipelines.dir_path(&env::current_dir()?));
    let (cmd, args) = parse_args();

    match cmd.as_str() {
        "run" => {
            let flags = RunFlags::parse(&args)?;
            let [reference, query] = flags.positional.as_slice() else {
                bail!("Usage: searchpipe run <pipeline-id|file.json> <query> [flags]");
            };
            let definition = resolve_pipeline(&store, reference)?;
            let mode = flags.mode.unwrap_or(settings.executor.mode);
            let result = executor(&settings, flags.collection.as_deref())?
                .execute(&definition, query, flags.vector.as_deref(), flags.context.as_ref(), mode)
                .await?;
            print_json(&result.summary())?;
        }
        "compare" => {
            let flags = RunFlags::parse(&args)?;
            let Some((query, ids)) = flags.positional.split_first().filter(|(_, ids)| !ids.is_empty()) else {
                bail!("Usage: searchpipe compare <query> <pipeline-id>... [flags]");
            };
            let definitions = ids.iter().map(|id| resolve_pipeline(&store, id)).collect::<anyhow::Result<Vec<_>>>()?;
            let mode = flags.mode.unwrap_or(settings.executor.mode);
            let comparison = executor(&settings, flags.collection.as_deref())?
                .compare(&definitions, query, flags.vector.as_deref(), flags.context.as_ref(), mode)
                .await;
            print_json(&comparison.summary())?;
            if comparison.all_failed() {
                bail!("all {} pipelines failed", comparison.failed);
            }
        }
        "validate" => {
            let Some(file) = args.first() else {
                bail!("Usage: searchpipe validate <file.json>");
            };
            match check_definition(Path::new(file), &settings.backend.default_collection) {
                Ok(def) => {
                    info!(pipeline = %def.id, stages = def.stages.len(), "definition is valid");
                    print_json(&json!({ "valid": true, "id": def.id, "stages": def.enabled_stages().len() }))?;
                }
                Err(e) => {
                    print_json(&json!({ "valid": false, "error": e.to_string() }))?;
                    std::process::exit(1);
                }
            }
        }
        "save" => {
            let Some(file) = args.first() else {
                bail!("Usage: searchpipe save <file.json>");
            };
            let outcome = check_definition(Path::new(file), &settings.backend.default_collection)
                .and_then(|def| store.save(&def).map(|()| def));
            match outcome {
                Ok(def) => {
                    info!(pipeline = %def.id, dir = %store.dir().display(), "pipeline saved");
                    print_json(&json!({ "saved": true, "id": def.id }))?;
                }
                Err(e) => {
                    let conflict = matches!(e, Error::AlreadyExists(_));
                    print_json(&json!({ "saved": false, "conflict": conflict, "error": e.to_string() }))?;
                    std::process::exit(1);
                }
            }
        }
        "show" => {
            let Some(id) = args.first() else {
                bail!("Usage: searchpipe show <pipeline-id>");
            };
            match show_pipeline(&store, id) {
                Ok(def) => println!("{}", def.to_json_pretty()?),
                Err(e) => {
                    eprintln!("{}", e);
                    std::process::exit(1);
                }
            }
        }
        "list" => {
            let pipelines: Vec<Value> = store
                .list()?
                .iter()
                .map(|def| json!({ "id": def.id, "name": def.name, "version": def.version, "status": def.metadata.status }))
                .collect();
            print_json(&Value::Array(pipelines))?;
        }
        "health" => {
            let backend = ElasticBackend::new(&settings.backend)?;
            let healthy = backend.health().await.unwrap_or_else(|e| {
                eprintln!("Health check failed: {}", e);
                false
            });
            print_json(&json!({ "healthy": healthy, "hosts": backend.hosts() }))?;
            if !healthy {
                std::process::exit(1);
            }
        }
        _ => {
            eprintln!("Unknown command: {}\n\n{}", cmd, USAGE);
            std::process::exit(1);
        }
    }
    Ok(())
}
