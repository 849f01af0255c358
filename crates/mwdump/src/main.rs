use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::Parser;
use mwdump_core::config::{DEFAULT_CONFIG_FILENAME, MwdumpConfig, api_url, load_config};
use mwdump_core::{
    ExportContext, ExportReport, HttpImageFetcher, MediaWikiClient, MediaWikiClientConfig,
    PrepareOutcome, export_wiki, prepare_output_dir,
};
use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};

#[derive(Debug, Parser)]
#[command(
    name = "mwdump",
    version,
    about = "Export a MediaWiki site into a static HTML snapshot"
)]
struct Cli {
    #[arg(
        short = 'w',
        long,
        value_name = "URL",
        help = "The MediaWiki host to crawl, including the protocol (http://, https://) [default: [wiki] host from the config file]"
    )]
    wiki_host: Option<String>,
    #[arg(
        short = 'p',
        long,
        value_name = "PATH",
        help = "The API path, for example \"/api.php\" [default: /api.php]"
    )]
    api_path: Option<String>,
    #[arg(short = 'o', long, value_name = "PATH", default_value = "out/")]
    out_dir: PathBuf,
    #[arg(
        short = 'd',
        long,
        value_name = "PATH",
        help = "File whose contents to include as the output HTML's <head>...</head>"
    )]
    head: Option<PathBuf>,
    #[arg(short = 's', long, help = "Do not verify https certificates")]
    skip_cert_verification: bool,
    #[arg(short = 'f', long, help = "Overwrite out_dir if it already exists")]
    force: bool,
    #[arg(
        long,
        value_name = "PREFIX",
        help = "Path prefix of internal page links [default: /wiki/]"
    )]
    link_prefix: Option<String>,
    #[arg(long, value_name = "PATH", help = "TOML config file [default: ./mwdump.toml]")]
    config: Option<PathBuf>,
    #[arg(short = 'v', long, help = "Log every request and image download")]
    verbose: bool,
}

fn main() -> Result<ExitCode> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = load_cli_config(cli.config.as_deref())?;
    let Some(wiki_host) = config.wiki_host(cli.wiki_host.as_deref()) else {
        bail!("no wiki host given: pass --wiki-host or set [wiki] host in the config file");
    };
    let context = ExportContext::new(&cli.out_dir)
        .with_link_prefix(
            cli.link_prefix
                .clone()
                .unwrap_or_else(|| config.link_prefix().to_string()),
        )
        .with_head(read_head(cli.head.as_deref())?);

    if prepare_output_dir(&context, cli.force)? == PrepareOutcome::AlreadyExists {
        println!("out_dir already exists. Use --force to remove it.");
        return Ok(ExitCode::from(1));
    }

    let api_path = cli.api_path.as_deref().unwrap_or(config.api_path());
    let client_config =
        MediaWikiClientConfig::from_config(&config, api_url(&wiki_host, api_path));
    log::info!(
        "exporting {} into {}",
        client_config.api_url,
        normalize_path(&cli.out_dir)
    );

    let mut client = MediaWikiClient::new(client_config)?;
    let fetcher = HttpImageFetcher::new(
        &config.user_agent(),
        config.timeout_ms(),
        cli.skip_cert_verification,
    )?;

    let report = export_wiki(&mut client, &fetcher, &context);
    print_report(&context, &report, cli.verbose);
    if let Some(halt) = report.halted {
        return Err(halt.error.context(match halt.title {
            Some(title) => format!("export halted at page {title}"),
            None => "export halted while listing pages".to_string(),
        }));
    }
    Ok(ExitCode::SUCCESS)
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let _ = TermLogger::init(
        level,
        Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    );
}

fn load_cli_config(path: Option<&Path>) -> Result<MwdumpConfig> {
    match path {
        Some(path) => {
            if !path.exists() {
                bail!("config file not found: {}", path.display());
            }
            load_config(path)
        }
        None => load_config(Path::new(DEFAULT_CONFIG_FILENAME)),
    }
}

fn read_head(path: Option<&Path>) -> Result<Option<String>> {
    let Some(path) = path else {
        return Ok(None);
    };
    let head = fs::read_to_string(path)
        .with_context(|| format!("failed to read head file {}", path.display()))?;
    Ok(Some(head))
}

fn print_report(context: &ExportContext, report: &ExportReport, verbose: bool) {
    println!("export");
    println!("out_dir: {}", normalize_path(&context.out_dir));
    println!("pages.written: {}", report.pages.len());
    if verbose {
        for page in &report.pages {
            println!("page: {} -> {}", page.title, normalize_path(&page.path));
        }
    }
    println!("images.written: {}", report.images_written);
    println!("requests: {}", report.request_count);
    match &report.halted {
        None => println!("status: complete"),
        Some(halt) => {
            println!("status: halted");
            println!(
                "halted_at: {}",
                halt.title.as_deref().unwrap_or("<page listing>")
            );
        }
    }
}

fn normalize_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
