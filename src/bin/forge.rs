use std::{
    fs,
    path::{Path, PathBuf},
    process::ExitCode,
};

use clap::Parser;

use forge::{ExecutionContext, ForgeError, Interpreter};

const USAGE: &str = "Usage: forge <program.forge>";

#[derive(Parser)]
#[command(author, version, about = "Forge language interpreter")]
struct Args {
    /// Program to run; must end in `.forge`
    script: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    init_tracing();
    let args = Args::parse();

    let Some(script) = args.script.filter(|path| is_forge_file(path)) else {
        println!("{USAGE}");
        return ExitCode::FAILURE;
    };
    if !script.exists() {
        eprintln!("File \"{}\" not found", script.display());
        return ExitCode::FAILURE;
    }

    match run_script(&script).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report(&err);
            ExitCode::FAILURE
        }
    }
}

async fn run_script(path: &Path) -> Result<(), ForgeError> {
    let source = fs::read_to_string(path)?;
    let interpreter = Interpreter::with_context(ExecutionContext::current_dir()?);
    interpreter.run_source(&source).await?;
    Ok(())
}

fn is_forge_file(path: &Path) -> bool {
    path.extension().and_then(|ext| ext.to_str()) == Some(forge::loader::SCRIPT_EXTENSION)
}

fn report(err: &ForgeError) {
    let line = err
        .line()
        .map(|line| line.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    eprintln!("\x1b[31m[Error at line {line}]: {err}\x1b[0m");
}

fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    // Only initialize if RUST_LOG is set
    if std::env::var("RUST_LOG").is_ok() {
        let filter = EnvFilter::from_default_env();
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_level(true),
            )
            .with(filter)
            .init();
    }
}
