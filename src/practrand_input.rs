use std::{
    io::{self, Write},
    process::ExitCode,
};

use tracing::error;
use uuidflood::{tracer::MinimalTracer, Config, Engine, Generator, BLOCK_LEN};

const BUFFER_SIZE: usize = 256_usize.pow(2);

// Streams the raw blocks of the configured engine, e.g.
// `UUIDFLOOD_ENGINE=permutation practrand_input | RNG_test stdin`.
fn main() -> ExitCode {
    MinimalTracer::register().ok();
    match stream() {
        Ok(never) => match never {},
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn stream() -> uuidflood::Result<std::convert::Infallible> {
    let config = Config::from_env()?;
    let mut engine = Engine::seed(config.engine, BUFFER_SIZE / BLOCK_LEN)?;
    let mut buffer = vec![0; BUFFER_SIZE];
    let mut output = io::stdout().lock();
    loop {
        for chunk in buffer.chunks_exact_mut(BLOCK_LEN) {
            chunk.copy_from_slice(&engine.generate()?);
        }
        output
            .write_all(&buffer)
            .map_err(uuidflood::Error::WriteFailure)?;
    }
}
