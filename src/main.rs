use std::process::ExitCode;

use clai::cli::USAGE;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let _log_guard = clai::logging::init();

    match clai::run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("clai: {err:#}");
            if err.wants_usage() {
                print!("{USAGE}");
            }
            err.exit_code()
        }
    }
}
