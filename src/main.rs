use std::ffi::OsString;
use std::process::ExitCode;

use clap::Parser;
use yab_installer::action::{run_action, ActionContext, GithubActions};
use yab_installer::Api;

/// Install yab from GitHub Releases for the current job, or run it once.
#[derive(Parser)]
#[command(name = "setup-yab", disable_version_flag = true)]
struct Cli {
    /// Version to install; falls back to the `version` action input, then latest.
    #[arg(long)]
    version: Option<String>,

    /// Arguments to run yab with instead of publishing it on PATH.
    #[arg(last = true)]
    args: Vec<OsString>,
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let ctx = GithubActions::from_env();
    let installer = Api::new().build();
    let version = cli.version.unwrap_or_else(|| ctx.input("version"));

    if cli.args.is_empty() {
        return match run_action(&ctx, &installer, &version).await {
            Ok(_) => ExitCode::SUCCESS,
            Err(e) => {
                ctx.fail(&e.to_string());
                ExitCode::FAILURE
            }
        };
    }

    let result = match installer.install(&version).await {
        Ok(()) => installer.execute(&cli.args).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        Err(e) => {
            ctx.fail(&e.to_string());
            ExitCode::FAILURE
        }
    }
}
