// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Parses arguments with clap and hands off to Layer 2.
//
//   1. `layout`   — print the block table of a preset
//   2. `init`     — build a network, save it as a checkpoint
//   3. `forward`  — run seeded passes, print gate usage
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, ForwardArgs, InitArgs, LayoutArgs};

use crate::domain::config::PrecisionProfile;

#[derive(Parser, Debug)]
#[command(
    name = "skipnet",
    version,
    about = "Build and run SkipNet residual networks with a recurrent skip gate and quantized convolutions."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Layout(args)  => run_layout(args),
            Commands::Init(args)    => run_init(args),
            Commands::Forward(args) => run_forward(args),
        }
    }
}

fn run_layout(args: LayoutArgs) -> Result<()> {
    let cfg = args.preset.config(PrecisionProfile::default());
    cfg.validate()?;

    println!(
        "{}: {} blocks, {} classes, {} reported decisions",
        args.preset,
        cfg.total_blocks(),
        cfg.num_classes,
        cfg.returned_decisions(),
    );
    for spec in cfg.block_layout() {
        println!("  {spec}");
    }
    Ok(())
}

fn run_init(args: InitArgs) -> Result<()> {
    use crate::application::init_use_case::InitUseCase;

    let dir     = args.checkpoint_dir.clone();
    let network = InitUseCase::new(args.into()).execute()?;
    println!("Saved {}-block network to '{dir}'.", network.total_blocks());
    Ok(())
}

fn run_forward(args: ForwardArgs) -> Result<()> {
    use crate::application::forward_use_case::ForwardUseCase;

    let summaries = ForwardUseCase::new(args.into()).execute()?;
    for (pass, s) in summaries.iter().enumerate() {
        println!(
            "\npass {}: batch {}, {} decisions, execution rate {:.3}, mean p {:.3}, ~{:.1} skipped block evaluations",
            pass + 1,
            s.batch_size,
            s.decisions(),
            s.overall_execution_rate(),
            s.overall_mean_probability(),
            s.skipped_evaluations(),
        );
        for (i, (rate, prob)) in s.execution_rate.iter().zip(&s.mean_probability).enumerate() {
            println!("  gate {:>3}  executed {:>5.1}%  p {:.3}", i, rate * 100.0, prob);
        }
    }
    Ok(())
}
