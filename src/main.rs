use std::fs::OpenOptions;
use std::io::{self, BufWriter};
use std::process;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use powerlog::config::{Args, Settings, SinkTarget};
use powerlog::influx::InfluxSink;
use powerlog::logging;
use powerlog::record::{JsonLinesSink, Sink};
use powerlog::sampler::StopSignal;

/// Exit status after a second interrupt, 128 + SIGINT.
const FORCED_EXIT: i32 = 130;

fn main() -> Result<(), anyhow::Error> {
    let args = Args::parse();

    logging::init();

    let settings = args.validate().context("Invalid configuration")?;

    let stop = StopSignal::new();
    {
        let stop = stop.clone();
        ctrlc::set_handler(move || {
            if stop.raise() {
                eprintln!("\nInterrupted again, exiting now");
                process::exit(FORCED_EXIT);
            }
        })
        .context("Failed to install interrupt handler")?;
    }

    let sink = open_sink(&settings)?;

    sample(&settings, sink, stop.clone())?;

    if stop.is_raised() {
        info!("Interrupted");
        eprintln!("\nExit on interrupt: good bye!");
    }

    Ok(())
}

fn open_sink(settings: &Settings) -> Result<Box<dyn Sink>, anyhow::Error> {
    let sink: Box<dyn Sink> = match &settings.sink {
        SinkTarget::Stdout => Box::new(JsonLinesSink::new(io::stdout().lock())),
        SinkTarget::File(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Error opening \"{}\"", path.display()))?;

            Box::new(JsonLinesSink::new(BufWriter::new(file)))
        }
        SinkTarget::Influx(target) => {
            info!(url = %target.url, database = %target.database, "Writing to InfluxDB");
            Box::new(InfluxSink::new(target))
        }
    };

    Ok(sink)
}

#[cfg(feature = "raspberry_pi")]
fn sample(settings: &Settings, sink: Box<dyn Sink>, stop: StopSignal) -> Result<(), anyhow::Error> {
    use powerlog::raspberry_pi;
    use powerlog::sampler::{Options, Sampler};
    use powerlog::Channel;

    let voltage = raspberry_pi::open(Channel::Voltage, settings.voltage, settings.clock_hz)?;
    let current = raspberry_pi::open(Channel::Current, settings.current, settings.clock_hz)?;

    Sampler::new(voltage, current, sink, Options::from(settings), stop).run()?;

    Ok(())
}

#[cfg(not(feature = "raspberry_pi"))]
fn sample(
    _settings: &Settings,
    _sink: Box<dyn Sink>,
    _stop: StopSignal,
) -> Result<(), anyhow::Error> {
    anyhow::bail!("No SPI transport available: rebuild with `--features raspberry_pi`")
}
