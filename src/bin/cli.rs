// src/bin/cli.rs
use clan_watch::cli;

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    let code = cli::run()?;
    std::process::exit(code);
}
