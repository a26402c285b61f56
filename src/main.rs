//! pdsx CLI entry point

use std::io::{self, IsTerminal};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{CommandFactory, Parser};
use tracing::{debug, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pdsx::batch::{self, BatchResult};
use pdsx::client::{RepoApi, XrpcClient};
use pdsx::config::{Args, Command, Settings};
use pdsx::display::{self, OutputFormat};
use pdsx::identity::{self, HttpIdentityResolver};
use pdsx::{operations, parsing, PdsxError};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    // Logs go to stderr so stdout stays parseable
    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("pdsx={log_level},warn").into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let Some(command) = args.command.clone() else {
        Args::command().print_help()?;
        return Ok(ExitCode::FAILURE);
    };

    let settings = Settings::from_args(&args);
    match run(&args, &settings, command).await {
        Ok(code) => Ok(code),
        Err(e) => {
            eprintln!("error: {e}");
            if e.is_transport() {
                eprintln!("hint: check --pds and network access, or raise --timeout-secs");
            }
            if std::env::var_os("DEBUG").is_some() {
                return Err(e.into());
            }
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn run(args: &Args, settings: &Settings, command: Command) -> pdsx::Result<ExitCode> {
    let resolver =
        HttpIdentityResolver::new(&settings.plc_url, &settings.pds_url, settings.timeout_secs)?;
    let client = connect(args, settings, &resolver).await?;
    let api: Arc<dyn RepoApi> = Arc::new(client);

    match command {
        Command::List {
            collection,
            limit,
            cursor,
            output,
        } => {
            let page =
                operations::list_records(&*api, &collection, args.repo.as_deref(), limit, cursor)
                    .await?;
            let format = output.unwrap_or(OutputFormat::Compact);

            let rendered = display::render_records(&collection, &page.records, format)?;
            if !rendered.is_empty() {
                println!("{rendered}");
            }
            if let Some(cursor) = page.cursor {
                if format.is_structured() {
                    eprintln!("{}", display::cursor_line(&cursor));
                } else {
                    println!("{}", display::cursor_line(&cursor));
                }
            }
        }

        Command::Get { uri, output } => {
            let repo = match (api.session_did(), args.repo.as_deref()) {
                (None, Some(repo)) => Some(identity::resolve_repo_did(&resolver, repo).await?),
                _ => None,
            };
            let entry = operations::get_record(&*api, &uri, repo.as_deref()).await?;
            let format = output.unwrap_or(OutputFormat::Table);
            println!("{}", display::render_record(&entry, format)?);
        }

        Command::Create {
            collection,
            fields,
            batch: batch_args,
        } => {
            let mut records = if fields.is_empty() {
                read_stdin(parsing::read_records)?
            } else {
                vec![parsing::parse_key_value_args(&fields)?]
            };

            match records.len() {
                0 => {
                    return Err(PdsxError::InvalidArgument(
                        "no records provided (use key=value arguments or pipe JSONL to stdin)"
                            .to_string(),
                    ))
                }
                1 => {
                    let record = records.remove(0);
                    let created = operations::create_record(&*api, &collection, record).await?;
                    println!(
                        "{}",
                        display::render_success("created", Some(&created.uri), Some(&created.cid))
                    );
                }
                _ => {
                    let options = batch_args.options(io::stdout().is_terminal());
                    let result = batch::batch_create(api, &collection, records, &options).await;
                    return Ok(report_batch(&result, "created"));
                }
            }
        }

        Command::Update {
            uri,
            fields,
            batch: batch_args,
        } => {
            let mut updates = match (uri, fields.is_empty()) {
                (Some(uri), false) => vec![(uri, parsing::parse_key_value_args(&fields)?)],
                (None, true) => read_stdin(parsing::read_updates)?,
                _ => {
                    return Err(PdsxError::InvalidArgument(
                        "provide both uri and fields, or pipe JSONL to stdin".to_string(),
                    ))
                }
            };

            match updates.len() {
                0 => {
                    return Err(PdsxError::InvalidArgument(
                        "no updates provided (use uri + key=value arguments or pipe JSONL to stdin)"
                            .to_string(),
                    ))
                }
                1 => {
                    let (uri, fields) = updates.remove(0);
                    let updated = operations::update_record(&*api, &uri, fields).await?;
                    println!(
                        "{}",
                        display::render_success("updated", Some(&updated.uri), Some(&updated.cid))
                    );
                }
                _ => {
                    let options = batch_args.options(io::stdout().is_terminal());
                    let result = batch::batch_update(api, updates, &options).await;
                    return Ok(report_batch(&result, "updated"));
                }
            }
        }

        Command::Delete {
            uris,
            batch: batch_args,
        } => {
            let uris = if uris.is_empty() {
                read_stdin(parsing::read_uris)?
            } else {
                uris
            };

            match uris.len() {
                0 => {
                    return Err(PdsxError::InvalidArgument(
                        "no URIs provided (use positional arguments or pipe to stdin)".to_string(),
                    ))
                }
                1 => {
                    operations::delete_record(&*api, &uris[0]).await?;
                    println!("{}", display::render_success("deleted", None, None));
                }
                _ => {
                    let options = batch_args.options(io::stdout().is_terminal());
                    let result = batch::batch_delete(api, uris, &options).await;
                    return Ok(report_batch(&result, "deleted"));
                }
            }
        }

        Command::UploadBlob { file_path } => {
            let blob = operations::upload_blob(&*api, &file_path).await?;
            println!("{}", display::render_blob(&blob)?);
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// Build a client for the command: logged in, or anonymous against the
/// PDS hosting `--repo`
async fn connect(
    args: &Args,
    settings: &Settings,
    resolver: &HttpIdentityResolver,
) -> pdsx::Result<XrpcClient> {
    if !args.needs_auth() {
        let pds = match (&settings.pds_override, args.repo.as_deref()) {
            (Some(pds), _) => pds.clone(),
            (None, Some(repo)) => identity::discover_pds(resolver, repo).await?,
            (None, None) => settings.pds_url.clone(),
        };
        debug!(pds = %pds, "Reading anonymously");
        return XrpcClient::new(settings.xrpc_config(&pds));
    }

    let (handle, password) = settings.credentials()?;
    let pds = match &settings.pds_override {
        Some(pds) => pds.clone(),
        None => match identity::discover_pds(resolver, handle).await {
            Ok(pds) => pds,
            Err(e) => {
                warn!(
                    handle = %handle,
                    error = %e,
                    fallback = %settings.pds_url,
                    "PDS discovery failed, using fallback"
                );
                settings.pds_url.clone()
            }
        },
    };

    let mut client = XrpcClient::new(settings.xrpc_config(&pds))?;
    client.login(handle, password).await?;
    Ok(client)
}

/// Read stdin with `read`, unless stdin is an interactive terminal
fn read_stdin<T>(
    read: impl FnOnce(io::StdinLock<'static>) -> pdsx::Result<Vec<T>>,
) -> pdsx::Result<Vec<T>> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        return Ok(Vec::new());
    }
    read(stdin.lock())
}

fn report_batch(result: &BatchResult, operation: &str) -> ExitCode {
    println!("{}", display::render_batch_result(result, operation));
    if result.failed.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
