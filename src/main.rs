use clap::{Parser, Subcommand};

use commands::GlobalArgs;

mod commands;
mod output;
mod tty;

use commands::{command, config, release};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "deploycmd")]
#[command(version = VERSION)]
#[command(about = "Build and run atomic release commands for Unix and Windows hosts")]
struct Cli {
    /// Config directory (overrides ~/.config/deploycmd)
    #[arg(long, global = true, value_name = "DIR")]
    config_dir: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a single deployment command without running it
    Command(command::CommandArgs),
    /// Switch, roll back, and prune releases
    Release(release::ReleaseArgs),
    /// Inspect or reset deploycmd.json
    Config(config::ConfigArgs),
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    if let Some(dir) = &cli.config_dir {
        // paths::deploycmd() reads this on every config lookup
        std::env::set_var(deploycmd::paths::CONFIG_DIR_ENV, dir);
    }

    let global = GlobalArgs {};
    let (json_result, exit_code) = commands::run_json(cli.command, &global);
    output::print_json_result(json_result);

    std::process::ExitCode::from(exit_code_to_u8(exit_code))
}

fn exit_code_to_u8(code: i32) -> u8 {
    if code <= 0 {
        0
    } else if code >= 255 {
        255
    } else {
        code as u8
    }
}
