// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod config;
mod logging;
mod runtime;

use acv_app::{AppState, ViewState};
use acv_store::{ACCESS_TOKEN_ENV, Client};
use anyhow::{Context, Result, anyhow, bail};
use config::Config;
use runtime::{Connector, HttpSettings, StoreRuntime};
use std::env;
use std::path::PathBuf;
use tracing::info;

fn main() {
    if let Err(error) = run() {
        eprintln!("acv: {error:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = parse_cli_args(env::args().skip(1), Config::default_path()?)?;
    if options.show_help {
        print_help();
        return Ok(());
    }

    if options.print_config_path {
        println!("{}", options.config_path.display());
        return Ok(());
    }

    if options.print_example {
        print!("{}", Config::example_config(&options.config_path));
        return Ok(());
    }

    let config = Config::load(&options.config_path).with_context(|| {
        format!(
            "load config {}; run `acv --print-example-config` to generate a template",
            options.config_path.display()
        )
    })?;

    let servers = if options.demo {
        match options.server.as_deref() {
            Some(server) => vec![server.to_owned()],
            None => acv_testkit::demo_servers()
                .iter()
                .map(|server| (*server).to_owned())
                .collect(),
        }
    } else {
        config.server_list(options.server.as_deref())
    };
    if servers.is_empty() {
        bail!(
            "no app configurations to open; pass an endpoint URL, list `servers` in {}, or try --demo",
            options.config_path.display()
        );
    }

    let connector = if options.demo {
        Connector::Demo
    } else {
        let settings = HttpSettings {
            label_filter: config.label_filter().to_owned(),
            api_version: config.api_version().to_owned(),
            timeout: config.store_timeout()?,
            access_token: env::var(ACCESS_TOKEN_ENV).ok(),
        };
        for server in &servers {
            Client::new(server, settings.timeout).with_context(|| {
                format!(
                    "invalid server {server:?}; fix the argument or `servers` in {}",
                    options.config_path.display()
                )
            })?;
        }
        Connector::Http(settings)
    };
    if options.check_only {
        return Ok(());
    }

    let log_file = config.log_file()?;
    logging::init(config.log_level()?, &log_file)?;
    info!(servers = servers.len(), demo = options.demo, "starting");

    let mut state = AppState::new(
        servers,
        ViewState::new(config.render_format(), config.json_indent()),
    );
    let mut runtime = StoreRuntime::new(connector);
    acv_tui::run_app(&mut state, &mut runtime)
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliOptions {
    config_path: PathBuf,
    server: Option<String>,
    print_config_path: bool,
    demo: bool,
    print_example: bool,
    check_only: bool,
    show_help: bool,
}

fn parse_cli_args<I, S>(args: I, default_config_path: PathBuf) -> Result<CliOptions>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut options = CliOptions {
        config_path: default_config_path,
        server: None,
        print_config_path: false,
        demo: false,
        print_example: false,
        check_only: false,
        show_help: false,
    };

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_ref() {
            "--config" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--config requires a file path"))?;
                options.config_path = PathBuf::from(value.as_ref());
            }
            "--print-config-path" => {
                options.print_config_path = true;
            }
            "--print-example-config" => {
                options.print_example = true;
            }
            "--demo" => {
                options.demo = true;
            }
            "--check" => {
                options.check_only = true;
            }
            "--help" | "-h" => {
                options.show_help = true;
            }
            flag if flag.starts_with('-') => {
                bail!("unknown argument {flag:?}; run with --help to see supported options");
            }
            server => {
                if let Some(first) = &options.server {
                    bail!(
                        "unexpected extra server {server:?} after {first:?}; list additional servers in the config file"
                    );
                }
                options.server = Some(server.to_owned());
            }
        }
    }

    Ok(options)
}

fn print_help() {
    println!("acv: browse and diff key revisions of an app configuration store");
    println!();
    println!("usage: acv [options] [endpoint]");
    println!("  endpoint                 Store URL to open first (e.g. https://name.azconfig.io)");
    println!("  --config <path>          Use a specific config path");
    println!("  --print-config-path      Print resolved config path");
    println!("  --print-example-config   Print a config template");
    println!("  --demo                   Browse seeded in-memory demo stores");
    println!("  --check                  Validate config and servers, then exit");
    println!("  --help                   Show this help");
    println!();
    println!("Set {ACCESS_TOKEN_ENV} to send a bearer token with every request.");
}
