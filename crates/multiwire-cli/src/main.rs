use multiwire_cli::CliError;

#[tokio::main]
async fn main() {
    if let Err(e) = multiwire_cli::run().await {
        eprintln!("Error: {:#}", e);
        if let Some(cli_error) = e.downcast_ref::<CliError>() {
            for hint in cli_error.suggestions() {
                eprintln!("  hint: {}", hint);
            }
        }
        std::process::exit(1);
    }
}
