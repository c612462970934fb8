use std::process::ExitCode;

use tracing::error;
use uuidflood::{tracer::MinimalTracer, Config, Destination, Pool};

fn main() -> ExitCode {
    if let Err(err) = MinimalTracer::register() {
        eprintln!("failed to install log subscriber: {err}");
    }

    let result = Config::from_env()
        .and_then(|config| Ok(Pool::new(config, Destination::stdout()?)))
        .and_then(Pool::run);

    match result {
        Ok(never) => match never {},
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}
