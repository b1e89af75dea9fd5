//! bootkit binary entry point.

// CLI binary needs to output to stdout/stderr - this is intentional
#![allow(clippy::print_stdout, clippy::print_stderr)]

use clap::Parser;
use tracing::Instrument;

use bootkit::cli::{Cli, CliError, Commands, EXIT_OK, exit_code_for, render_error};
use bootkit::commands::{self, GenArgs, GlobalOptions};
use bootkit::tracing::{TracingConfig, init_tracing};

fn main() {
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Application panicked: {panic_info}");
        eprintln!("Internal error occurred. Run with RUST_LOG=debug for more information.");
    }));

    let cli = Cli::parse();

    let tracing_config = TracingConfig {
        format: cli.log_format,
        level: cli.level.into(),
        filter: None,
    };
    if let Err(e) = init_tracing(tracing_config) {
        eprintln!("{e:?}");
    }

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Fatal error: Failed to create tokio runtime: {e}");
            std::process::exit(1);
        }
    };

    let json = cli.json;
    let exit_code = match rt.block_on(run(cli)) {
        Ok(output) => {
            print!("{output}");
            EXIT_OK
        }
        Err(err) => {
            render_error(&err, json);
            exit_code_for(&err)
        }
    };
    std::process::exit(exit_code);
}

async fn run(cli: Cli) -> Result<String, CliError> {
    let Cli {
        command,
        json,
        config_file,
        ..
    } = cli;
    let global = GlobalOptions { json, config_file };
    let span = bootkit::command_span!(command.name());

    async move {
        match command {
            Commands::Bootstrap {
                selection,
                force,
                dry_run,
            } => commands::execute_bootstrap(&selection, force, dry_run, &global).await,
            Commands::Plan { selection } => commands::execute_plan(&selection, &global),
            Commands::Env { layout } => commands::execute_env(&layout, &global),
            Commands::Gen {
                configs,
                custom_config,
                args,
                reclient,
                layout,
                target,
            } => {
                let gen_args = GenArgs {
                    configs: &configs,
                    custom_config: custom_config.as_deref(),
                    args: &args,
                    reclient,
                    layout: &layout,
                    target: &target,
                };
                commands::execute_gen(gen_args, &global).await
            }
            Commands::Build {
                out_dir,
                targets,
                extra,
                layout,
            } => commands::execute_build(out_dir, targets, extra, &layout, &global).await,
        }
    }
    .instrument(span)
    .await
}
