use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use lc3_vm::image::ImageFile;
use lc3_vm::sim::device::{ChannelKeyboard, StdoutDisplay};
use lc3_vm::sim::mem::MachineInitStrategy;
use lc3_vm::sim::{SimFlags, Simulator};
use lc3_vm::term::RawModeGuard;

const EXIT_LOAD_FAILURE: u8 = 1;
const EXIT_SIM_ERROR: u8 = 3;
const EXIT_STEP_LIMIT: u8 = 4;
const EXIT_INTERRUPTED: u8 = 130;

/// LC-3 virtual machine
#[derive(Parser)]
struct Args {
    /// Program images to load (later images overwrite earlier ones)
    #[arg(required = true)]
    images: Vec<PathBuf>,

    /// Stop after executing this many instructions.
    #[arg(long)]
    max_steps: Option<u64>,

    /// Leave the terminal in its normal (line-buffered, echoing) mode.
    #[arg(long)]
    no_raw: bool,

    /// Fill memory and registers with random values from this seed instead of zeroes.
    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> ExitCode {
    env_logger::init();

    let args = Args::parse();

    let machine_init = match args.seed {
        Some(seed) => MachineInitStrategy::Seeded { seed },
        None => MachineInitStrategy::default(),
    };
    let mut sim = Simulator::new(SimFlags { machine_init, ..Default::default() });

    for path in &args.images {
        match ImageFile::read(path) {
            Ok(image) => sim.load_image(&image),
            Err(e) => {
                log::error!("{}: {e}", path.display());
                eprintln!("failed to load image: {}", path.display());
                return ExitCode::from(EXIT_LOAD_FAILURE);
            }
        }
    }

    let use_raw = !args.no_raw && std::io::stdin().is_terminal();
    let guard = RawModeGuard::enter(use_raw).unwrap_or_else(|e| {
        log::warn!("could not enter raw mode: {e}");
        RawModeGuard::inactive()
    });

    let raw = guard.is_enabled();
    sim.device_handler.set_keyboard(ChannelKeyboard::stdin(sim.interrupt_flag().clone(), raw));
    sim.device_handler.set_display(StdoutDisplay::with_crlf(raw));

    let result = match args.max_steps {
        Some(n) => sim.run_with_limit(n),
        None => sim.run(),
    };
    drop(guard);

    match result {
        Ok(()) if sim.hit_halt() => ExitCode::SUCCESS,
        Ok(()) if sim.hit_interrupt() => {
            eprintln!("interrupted at x{:04X}", sim.pc);
            ExitCode::from(EXIT_INTERRUPTED)
        },
        Ok(()) => {
            eprintln!("stopped after {} instructions at x{:04X}", sim.instructions_run, sim.pc);
            ExitCode::from(EXIT_STEP_LIMIT)
        },
        Err(e) => {
            eprintln!("error at x{:04X}: {e}", sim.prefetch_pc());
            ExitCode::from(EXIT_SIM_ERROR)
        },
    }
}
