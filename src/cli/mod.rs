// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Entry point for all user interaction, parsed with clap.
// All business logic is delegated to Layer 2 (application).
//
//   1. `train`   — prepares the corpus and trains the classifier
//   2. `ask`     — loads the artifacts and answers one question
//   3. `sources` — lists the dataset registry
//
// Reference: Rust Book §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{AskArgs, Commands, TrainArgs};

use crate::domain::source::SourceRegistry;

#[derive(Parser, Debug)]
#[command(
    name = "medtalk-intent",
    version,
    about = "Train a BiLSTM attention classifier on medical Q&A data, then ask it questions."
)]
pub struct Cli {
    /// The subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Dispatch to the matching use case. The CLI only routes and prints.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args) => run_train(args),
            Commands::Ask(args)   => run_ask(args),
            Commands::Sources     => run_sources(),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    tracing::info!("Starting training on data in: {}", args.data_dir.display());

    let use_case = TrainUseCase::new(args.into());
    let summary  = use_case.execute()?;
    let outcome  = &summary.outcome;

    if outcome.cancelled {
        println!("Training cancelled after {} epochs.", outcome.history.len());
    } else if outcome.stopped_early {
        println!("Early stopping after {} epochs.", outcome.history.len());
    }
    println!(
        "Training complete: {} classes, {} train / {} validation examples.",
        summary.num_classes, summary.train_size, summary.val_size
    );
    if outcome.best_epoch > 0 {
        println!(
            "Best checkpoint: epoch {} (val_loss={:.4}) in '{}'",
            outcome.best_epoch,
            outcome.best_val_loss,
            summary.artifacts.checkpoint_dir.display()
        );
    }
    Ok(())
}

fn run_ask(args: AskArgs) -> Result<()> {
    use crate::application::ask_use_case::AskUseCase;

    let use_case = AskUseCase::new(&args.artifact_dir, args.top_k);
    if !use_case.is_model_loaded() {
        tracing::warn!(
            "No usable model in '{}'. Have you run 'train' first?",
            args.artifact_dir.display()
        );
    }

    let answer = use_case.answer(&args.question);
    println!("\n{}", answer);
    Ok(())
}

fn run_sources() -> Result<()> {
    for source in SourceRegistry::with_defaults().iter() {
        println!("{:<32} {:<5} {}", source.id, source.kind, source.tag.marker());
    }
    Ok(())
}
