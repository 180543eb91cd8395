use anyhow::{anyhow, bail, Error, Result};
use clap::Parser;
use log::info;
use sparqlc::consts::RESULT_TYPE_SPARQL_XML;
use sparqlc::{EndpointConfig, EndpointSettings, ResultType, Service, SparqlMethod, ValueRow};
use std::ffi::OsString;
use std::io::{BufRead, Read, Write};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(name = "sparqlc")]
#[command(version, about = "Run SPARQL queries against an endpoint")]
struct Cli {
    /// SPARQL endpoint URL; may be omitted when --config names one
    endpoint: Option<String>,
    /// Interactive mode - reads queries from stdin, separated by an empty line
    #[clap(long, short, action)]
    interactive: bool,
    /// Request method: get, post or post-url-encoded
    #[clap(long, short)]
    method: Option<SparqlMethod>,
    /// Result format to ask for: xml, json, xmlschema or any media type
    #[clap(long, short)]
    accept: Option<String>,
    /// Default graph IRI, can be repeated
    #[clap(long = "default-graph")]
    default_graphs: Vec<String>,
    /// Named graph IRI, can be repeated
    #[clap(long = "named-graph")]
    named_graphs: Vec<String>,
    /// Prefix declaration as NAME=IRI, can be repeated
    #[clap(long = "prefix", value_parser = parse_prefix)]
    prefixes: Vec<(String, String)>,
    /// Request timeout in seconds, 0 for none
    #[clap(long)]
    timeout: Option<f64>,
    /// Maximum number of redirects to follow
    #[clap(long)]
    max_redirects: Option<usize>,
    /// User name for basic authentication
    #[clap(long, short)]
    user: Option<String>,
    /// Password for basic authentication
    #[clap(long, requires = "user")]
    password: Option<String>,
    /// JSON endpoint configuration used as the base; flags override it
    #[clap(long, short)]
    config: Option<PathBuf>,
    /// Print the effective configuration and exit
    #[clap(long, action)]
    show_config: bool,
    /// Verbose mode - sets the RUST_LOG level to info, defaults to warning level
    #[clap(long, short, action, default_value = "false")]
    verbose: bool,
    /// Debug mode - sets the RUST_LOG level to debug, defaults to warning level
    #[clap(long, action, default_value = "false")]
    debug: bool,
}

fn parse_prefix(value: &str) -> std::result::Result<(String, String), String> {
    let Some((name, iri)) = value.split_once('=') else {
        return Err(format!("expected NAME=IRI, got '{value}'"));
    };
    let iri = iri.trim().trim_start_matches('<').trim_end_matches('>');
    if iri.is_empty() {
        return Err(format!("missing IRI for prefix '{name}'"));
    }
    Ok((name.trim().trim_end_matches(':').to_string(), iri.to_string()))
}

pub fn run() -> Result<()> {
    sparqlc::init_logging();
    let cmd = Cli::parse();
    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    execute(cmd, stdin.lock(), &mut stdout.lock())
}

pub fn run_from_args<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    run_with_io(args, stdin.lock(), &mut stdout.lock())
}

/// Like [`run_from_args`], reading queries from `input` and writing results to `output`.
pub fn run_with_io<I, T, R, W>(args: I, input: R, output: &mut W) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
    R: BufRead,
    W: Write,
{
    sparqlc::init_logging();
    let cmd = Cli::try_parse_from(args).map_err(Error::from)?;
    execute(cmd, input, output)
}

fn build_config(cmd: &Cli) -> Result<EndpointConfig> {
    let mut config = match (&cmd.config, &cmd.endpoint) {
        (Some(path), _) => EndpointConfig::from_file(path)?,
        (None, Some(endpoint)) => EndpointConfig::new(endpoint.as_str()),
        (None, None) => bail!("No endpoint given, pass one or a --config file"),
    };
    if let Some(endpoint) = &cmd.endpoint {
        config.endpoint = endpoint.clone();
    }
    if let Some(method) = cmd.method {
        config.method = method;
    }
    if let Some(accept) = &cmd.accept {
        match accept.parse::<ResultType>() {
            Ok(result_type) => config.set_result_type(result_type),
            Err(_) if accept.contains('/') => config.accept = accept.clone(),
            Err(e) => return Err(e.into()),
        }
    }
    for graph in &cmd.default_graphs {
        config.default_graphs.push(graph.clone());
    }
    for graph in &cmd.named_graphs {
        config.named_graphs.push(graph.clone());
    }
    for (name, iri) in &cmd.prefixes {
        config.prefixes.insert(name.clone(), iri.clone());
    }
    if let Some(timeout) = cmd.timeout {
        let Ok(timeout) = Duration::try_from_secs_f64(timeout) else {
            bail!("Invalid timeout {timeout}");
        };
        config.set_timeout(Some(timeout));
    }
    if let Some(max_redirects) = cmd.max_redirects {
        config.max_redirects = max_redirects;
    }
    Ok(config)
}

fn execute<R: BufRead, W: Write>(cmd: Cli, mut input: R, output: &mut W) -> Result<()> {
    // The RUST_LOG env var is set by `init_logging` if SPARQLC_LOG is present.
    // CLI flags for verbosity take precedence. If nothing is set, we default to "warn".
    if cmd.debug {
        std::env::set_var("RUST_LOG", "debug");
    } else if cmd.verbose {
        std::env::set_var("RUST_LOG", "info");
    } else if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "warn");
    }
    let _ = env_logger::try_init();

    let config = build_config(&cmd)?;
    if cmd.show_config {
        config.print();
        return Ok(());
    }

    let mut service = Service::from_config(config);
    if let Some(user) = &cmd.user {
        service.authenticate(user.as_str(), cmd.password.clone().unwrap_or_default());
    }

    if cmd.interactive {
        info!("Interactive mode against {}", service.endpoint());
        while let Some(statement) = read_query_block(&mut input)? {
            eprint!("Querying...");
            match run_query(&service, &statement, output) {
                Ok(()) => eprintln!("  done"),
                Err(e) => {
                    eprintln!();
                    writeln!(output, "Error: {e}")?;
                }
            }
        }
        Ok(())
    } else {
        let mut statement = String::new();
        input.read_to_string(&mut statement)?;
        if statement.trim().is_empty() {
            bail!("No query given on standard input");
        }
        run_query(&service, &statement, output)
    }
}

/// Reads one query: the non-empty lines up to the next empty line, joined with spaces.
/// Returns `None` once the input is exhausted.
pub fn read_query_block<R: BufRead>(input: &mut R) -> Result<Option<String>> {
    let mut lines: Vec<String> = Vec::new();
    let mut line = String::new();
    loop {
        line.clear();
        if input.read_line(&mut line)? == 0 {
            return Ok(if lines.is_empty() {
                None
            } else {
                Some(lines.join(" "))
            });
        }
        let trimmed = line.trim_end_matches(['\r', '\n']);
        if trimmed.trim().is_empty() {
            if !lines.is_empty() {
                return Ok(Some(lines.join(" ")));
            }
            continue;
        }
        lines.push(trimmed.to_string());
    }
}

/// Tab-separated values of a row; unbound positions are empty.
pub fn format_row(row: &ValueRow) -> String {
    row.iter()
        .map(|value| value.map(|v| v.to_string()).unwrap_or_default())
        .collect::<Vec<_>>()
        .join("\t")
}

fn run_query<W: Write>(service: &Service, statement: &str, output: &mut W) -> Result<()> {
    let mut results = service.query(statement)?;
    if !service
        .accept()
        .eq_ignore_ascii_case(RESULT_TYPE_SPARQL_XML)
    {
        let text = results.raw_response_text(None)?;
        writeln!(output, "{}", text.trim_end())?;
        return Ok(());
    }
    if let Some(answer) = results.has_result()? {
        writeln!(output, "{answer}")?;
        return Ok(());
    }
    for row in results {
        let row = row.map_err(|e| anyhow!("Failed to read results: {e}"))?;
        writeln!(output, "{}", format_row(&row))?;
    }
    Ok(())
}
