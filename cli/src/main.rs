use std::{io::Write as _, process::ExitCode};

use clap::Parser;
use colored::Colorize;
use ojudge_cli::{cmd::GlobalArgs, style::ColorTheme};

#[tokio::main]
async fn main() -> ExitCode {
    init_logger();

    let app = GlobalArgs::parse();
    app.exec_subcmd().await.unwrap_or_else(|e| {
        eprintln!("{} {:?}", "Error:".bright_red().bold(), e);
        ExitCode::FAILURE
    })
}

fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| {
            let level = record.level();
            writeln!(
                buf,
                "{} {}",
                format!("[{}]", level).color(level.color()).bold(),
                record.args()
            )
        })
        .init();
}
