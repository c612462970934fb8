use std::{convert::Infallible, process, thread};

use tracing::{debug, error, info};

use crate::{
    buffer::BatchBuffer,
    config::{Config, PIPE_ATOMIC_LINES},
    error::{Error, Result},
    rng::{Engine, Generator},
    sink::{BlockingWrite, Destination, Sink, SinkKind},
};

/// One generator, one sink and the batch between them, filled and flushed forever.
#[derive(Debug)]
pub struct Worker<G, S> {
    generator: G,
    sink: S,
    lines: usize,
}

impl<G: Generator, S: Sink> Worker<G, S> {
    /// Creates a worker that flushes every `lines` lines.
    pub fn new(generator: G, sink: S, lines: usize) -> Self {
        Self {
            generator,
            sink,
            lines,
        }
    }

    /// Allocates an empty batch from the sink.
    pub fn allocate(&self) -> Result<BatchBuffer<S::Storage>> {
        self.sink.allocate(self.lines)
    }

    /// Fills `batch` until it is full, flushes it, and returns the batch to fill next.
    #[inline]
    pub fn cycle(&mut self, mut batch: BatchBuffer<S::Storage>) -> Result<BatchBuffer<S::Storage>> {
        while batch.has_room() {
            let block = self.generator.generate()?;
            batch.append(&block);
        }
        self.sink.flush(batch)
    }

    /// Runs until something fails.
    pub fn run(mut self) -> Result<Infallible> {
        let mut batch = self.allocate()?;
        loop {
            batch = self.cycle(batch)?;
        }
    }
}

/// Runs `config.workers` workers against one destination.
#[derive(Debug)]
pub struct Pool {
    config: Config,
    destination: Destination,
}

impl Pool {
    pub fn new(config: Config, destination: Destination) -> Self {
        Self {
            config,
            destination,
        }
    }

    /// Starts `workers - 1` threads and runs the last worker on the calling thread.
    ///
    /// Never returns on success. A failing worker thread terminates the process after logging
    /// the error; a failure on the calling thread is returned.
    pub fn run(self) -> Result<Infallible> {
        let Self {
            mut config,
            destination,
        } = self;
        let is_pipe = destination.is_pipe()?;
        config.sink = config.sink.resolve(&destination)?;
        if config.sink == SinkKind::ZeroCopy && !is_pipe {
            return Err(Error::NotAPipe);
        }
        let workers = config.workers.get();
        if workers > 1 && is_pipe && config.batch_size > PIPE_ATOMIC_LINES {
            info!(
                requested = config.batch_size.get(),
                lines = PIPE_ATOMIC_LINES.get(),
                "capping batch size so concurrent batches reach the pipe whole"
            );
            config.batch_size = PIPE_ATOMIC_LINES;
        }

        info!(
            engine = %config.engine,
            sink = %config.sink,
            workers,
            batch_size = config.batch_size.get(),
            "starting"
        );

        for index in 1..workers {
            let destination = destination.try_clone()?;
            thread::Builder::new()
                .name(format!("uuidflood-worker-{index}"))
                .spawn(move || match run_worker(config, destination, index) {
                    Ok(never) => match never {},
                    Err(err) => fatal(&err),
                })
                .map_err(Error::Spawn)?;
        }
        run_worker(config, destination, 0)
    }
}

/// Builds a worker on the current thread and runs it.
pub fn run_worker(config: Config, destination: Destination, index: usize) -> Result<Infallible> {
    let lines = config.batch_size.get();
    let engine = Engine::seed(config.engine, lines)?;
    debug!(index, "worker started");
    match config.sink {
        #[cfg(target_os = "linux")]
        SinkKind::ZeroCopy => {
            Worker::new(engine, crate::sink::Splice::new(destination)?, lines).run()
        }
        #[cfg(not(target_os = "linux"))]
        SinkKind::ZeroCopy => Err(Error::NotAPipe),
        SinkKind::BlockingWrite | SinkKind::Auto => {
            Worker::new(engine, BlockingWrite::new(destination), lines).run()
        }
    }
}

/// Logs `err` and ends the process with a failure status.
pub fn fatal(err: &Error) -> ! {
    error!(thread = thread::current().name().unwrap_or("main"), "{err}");
    process::exit(1)
}
