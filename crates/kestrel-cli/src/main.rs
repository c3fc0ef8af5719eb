//! `kestrel` — command-line interface for the KN100 execution controller.
//!
//! ```text
//! USAGE:
//!   kestrel info                 Describe the synthetic demo model
//!   kestrel run [options]        Run it on the software runtime
//! ```
//!
//! Everything here targets the deterministic software runtime; it exists to
//! exercise the controller end to end and to show the counter report format.

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use kestrel_npu::prelude::*;
use kestrel_npu::sim::{SimCache, SimCounters, SimRuntime};

#[derive(Parser)]
#[command(name = "kestrel", about = "Kestrel KN100 execution controller CLI", version)]
struct Cli {
    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Describe the synthetic demo model: buffers, footprints, epochs.
    Info,
    /// Run the demo model on the software runtime.
    Run {
        /// Number of epochs in the synthetic execution graph.
        #[arg(long, default_value_t = 3)]
        epochs: u32,
        /// Hardware event-counting mode.
        #[arg(long, value_enum, default_value = "active")]
        mode: ModeArg,
        /// Print a per-epoch line as the run progresses.
        #[arg(long)]
        trace_epochs: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    /// No event counting.
    Off,
    /// Active-cycle counting on the data-stream ports.
    Active,
    /// High-enable pulse counting on the input ports.
    Pulses,
    /// Burst-length counting on the read/write ports.
    Bursts,
}

impl From<ModeArg> for CounterMode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Off => Self::Off,
            ModeArg::Active => Self::ActiveCycles,
            ModeArg::Pulses => Self::HighEnablePulses,
            ModeArg::Bursts => Self::BurstLength,
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Cmd::Info => cmd_info(),
        Cmd::Run {
            epochs,
            mode,
            trace_epochs,
        } => cmd_run(epochs, mode.into(), trace_epochs),
    }
}

fn cmd_info() -> Result<()> {
    let ctrl = ExecutionController::new(
        SimRuntime::synthetic(),
        SimCache::new(),
        SimCounters::new(),
        CounterMode::Off,
    )?;
    let info = ctrl.model_info();

    println!("Runtime      : {} ({})", info.version, info.build);
    println!("Epochs       : {}", info.epoch_count);
    println!("Parameters   : {} bytes", info.params_bytes);
    println!("Activations  : {} bytes", info.activations_bytes);

    println!("Inputs:");
    for buf in &info.inputs {
        println!(
            "  {:<10} {:#010x}+{:#x}  {}-bit",
            buf.name, buf.start_address, buf.length, buf.element_bits
        );
    }
    println!("Outputs:");
    for buf in &info.outputs {
        println!(
            "  {:<10} {:#010x}+{:#x}  {}-bit",
            buf.name, buf.start_address, buf.length, buf.element_bits
        );
    }

    Ok(())
}

fn cmd_run(epochs: u32, mode: CounterMode, trace_epochs: bool) -> Result<()> {
    let mut ctrl = ExecutionController::new(
        SimRuntime::builder().epochs(epochs).build(),
        SimCache::new(),
        SimCounters::new(),
        mode,
    )?;
    let id = ctrl.instance(0)?;

    if trace_epochs {
        ctrl.set_callback(
            id,
            Box::new(|epoch, counters| match counters {
                None => println!("epoch {epoch}: start"),
                Some(c) => println!(
                    "epoch {epoch}: done ({} accelerator cycles so far)",
                    c.accelerator_cycles_total
                ),
            }),
        )?;
    }

    let outcome = ctrl.run(id)?;
    let c = &outcome.counters;

    println!("Run complete : {} epochs, {} ticks", epochs, outcome.elapsed_ticks);
    println!("Counter mode : {:?}", c.counter_mode);
    println!("Host cycles  : {} total", c.cpu_cycles_total);
    if trace_epochs {
        println!(
            "               {} start / {} core / {} end",
            c.cpu_cycles_start, c.cpu_cycles_core, c.cpu_cycles_end
        );
    }
    println!("NPU cycles   : {}", c.accelerator_cycles_total);
    if c.sample_count > 0 {
        println!("Raw samples  : {:?}", &c.samples[..c.sample_count]);
    }

    Ok(())
}
