use clap::Parser;
use taskmaster::cli::commands::Cli;
use taskmaster::cli::handlers;
use taskmaster::context::Context;

fn main() {
    let cli = Cli::parse();

    let ctx = match Context::load(cli.data_dir.as_deref()) {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        // No subcommand → launch TUI
        None => taskmaster::tui::run(&ctx),
        Some(command) => handlers::dispatch(&ctx, command, cli.json),
    };
    if let Err(e) = result {
        log::error!("command failed error={}", e);
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
