use clap::Parser;
use nbrun::execute::EXIT_SETUP_ERROR;
use nbrun::Cli;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;

    // Parse command-line arguments
    let cli = Cli::parse();

    let code = match nbrun::execute(cli).await {
        Ok(code) => code,
        Err(report) => {
            eprintln!("Error: {report:?}");
            EXIT_SETUP_ERROR
        }
    };
    std::process::exit(code)
}
