use clap::Parser;
use crossterm::style::Stylize;
use intent_core::{Catalog, EngineConfig, EngineOutcome, IntentEngine, Locale};
use std::io::{stdin, stdout, Write};
use std::path::PathBuf;

const LEXICON_PATH: &str = "user_lexicon.bin";

#[derive(Parser)]
#[command(name = "intent_engine")]
#[command(about = "Interactive fuzzy intent matcher for spoken or typed commands")]
#[command(version)]
struct Args {
    /// JSON array of action specs
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Engine configuration (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Where learned terms are kept between sessions
    #[arg(long, default_value = LEXICON_PATH)]
    lexicon: PathBuf,

    /// Overrides the configured locale
    #[arg(long)]
    locale: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> intent_core::Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .init();

    let mut config = match &args.config {
        Some(path) => EngineConfig::from_json_file(path)?,
        None => EngineConfig::default(),
    };
    if let Some(tag) = &args.locale {
        config.locale = Locale::new(tag.as_str());
    }
    if args.verbose {
        config.debug = true;
    }

    let mut engine = IntentEngine::from_file_or_new(config, &args.lexicon);
    if let Some(path) = &args.catalog {
        engine.set_catalog(Catalog::from_json_file(path)?);
    }
    if args.verbose {
        engine.telemetry().on_any(|event, payload| {
            eprintln!("{} {}", event.dark_grey(), payload);
            Ok(())
        });
    }

    println!("{}", "Fuzzy intent console. Type 'exit' to save and quit.".bold());
    println!("Commands: ':teach <heard> <canonical>', ':locale <tag>'");
    println!("---------------------------------------------------------------");

    loop {
        print!("[{}] > ", engine.locale().to_string().cyan());
        stdout().flush()?;

        let mut input = String::new();
        if stdin().read_line(&mut input)? == 0 {
            break;
        }
        let line = input.trim();

        match line {
            "" => continue,
            "exit" => break,
            s if s.starts_with(":teach") => {
                let mut parts = s.split_whitespace().skip(1);
                match (parts.next(), parts.next()) {
                    (Some(heard), Some(canonical)) => {
                        let weight = engine.user_confirms(heard, canonical);
                        println!("Learned '{}' -> '{}' (weight {})", heard, canonical.green(), weight);
                    }
                    _ => println!("{}", "usage: :teach <heard> <canonical>".yellow()),
                }
            }
            s if s.starts_with(":locale") => match s.split_whitespace().nth(1) {
                Some(tag) => {
                    engine.set_locale(Locale::new(tag));
                    println!("Locale set to '{}'", engine.locale());
                }
                None => println!("{}", "usage: :locale <tag>".yellow()),
            },
            utterance => print_outcome(&engine.handle_utterance(utterance)),
        }
    }

    println!("\nSaving lexicon...");
    if let Err(e) = engine.save_lexicon() {
        eprintln!("{} Could not save lexicon: {}", "[ERROR]".red(), e);
    } else {
        println!("Lexicon saved to '{}'", args.lexicon.display());
    }
    Ok(())
}

fn print_outcome(outcome: &EngineOutcome) {
    match outcome {
        EngineOutcome::Dispatched(action) => {
            let confidence = action.meta.confidence.unwrap_or(1.0);
            println!("{} {:?} (confidence {:.3})", "=>".green().bold(), action.action_type, confidence);
            print_action(action);
        }
        EngineOutcome::AwaitingConfirmation(action) => {
            println!("{} {:?} needs confirmation", "??".yellow().bold(), action.action_type);
            print_action(action);
        }
        EngineOutcome::Rejected(reason) => {
            println!("{} {}", "xx".red().bold(), reason);
        }
    }
}

fn print_action(action: &intent_core::Action) {
    match serde_json::to_string_pretty(action) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("could not render action: {}", e),
    }
}
