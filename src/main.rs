//! CLI binary for GPU model selection and vLLM launch

mod cli;

use qa_serve::SelectionError;

fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Run CLI
    if let Err(err) = cli::run() {
        eprintln!("Error: {err:#}");
        let code = err
            .downcast_ref::<SelectionError>()
            .map(SelectionError::exit_code)
            .unwrap_or(1);
        std::process::exit(code);
    }
}
