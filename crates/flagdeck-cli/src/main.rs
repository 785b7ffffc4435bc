use std::process;

use flagdeck_cli::cancel::CancellationSource;
use flagdeck_telemetry::{LoggingConfig, init_logging};

#[tokio::main]
async fn main() {
    let verbose = std::env::args().any(|arg| arg == "-v" || arg == "--verbose");
    // A second subscriber cannot be installed; logging then stays as it is.
    let _ = init_logging(&LoggingConfig::for_cli(verbose));

    let cancel = CancellationSource::new().cancel_on_ctrl_c();
    let code = flagdeck_cli::run(&cancel).await;
    if code != 0 {
        process::exit(code);
    }
}
