use anyhow::{bail, Context, Result};
use clap::{value_parser, Arg, ArgAction, Command};
use grove_core::{BackendMode, EngineConfig, FinishResult, ProgressionEngine};
use grove_quiz::{ModuleId, Verdict};
use grove_reward::RewardGrant;
use grove_sync::{
    LessonContent, OfflineDataset, PresentationGateway, SubmitOutcome, TimerScope, ViewKey,
};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const REVEAL_DELAY: Duration = Duration::from_millis(250);

/// Prints gateway events; stage reveals are delayed follow-ups
struct ConsoleGateway {
    reveals: TimerScope,
}

impl PresentationGateway for ConsoleGateway {
    fn on_stage_increased(&self, new_stage: u32) {
        println!("  ** tree grew to stage {new_stage}");
        self.reveals.schedule(REVEAL_DELAY, move || {
            println!("  ** stage {new_stage} artwork revealed");
        });
    }

    fn on_completed(&self) {
        println!("  ** tree fully grown!");
    }

    fn on_reward_granted(&self, grant: &RewardGrant) {
        println!(
            "  ++ {} growth points, {} coins{}",
            grant.growth_points_earned,
            grant.coins_earned,
            if grant.fertilizer_bonus { ", fertilizer bonus" } else { "" }
        );
    }
}

fn cli() -> Command {
    Command::new("grove-demo")
        .version(grove_core::VERSION)
        .about("Run Grove quiz lessons against the offline progression backend")
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML engine configuration"),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON"),
        )
        .subcommand(Command::new("lessons").about("List bundled lessons"))
        .subcommand(Command::new("config").about("Print the effective configuration"))
        .subcommand(
            Command::new("play")
                .about("Take one or more lessons")
                .arg(
                    Arg::new("lesson")
                        .long("lesson")
                        .action(ArgAction::Append)
                        .help("Lesson ID (repeatable); defaults to every bundled lesson"),
                )
                .arg(
                    Arg::new("auto")
                        .long("auto")
                        .action(ArgAction::SetTrue)
                        .help("Answer every question correctly"),
                )
                .arg(
                    Arg::new("answers")
                        .long("answers")
                        .value_delimiter(',')
                        .help("Option IDs to answer with, in question order"),
                )
                .arg(
                    Arg::new("twice")
                        .long("twice")
                        .action(ArgAction::SetTrue)
                        .help("Deliver each completion twice to show duplicate suppression"),
                ),
        )
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("grove=info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<EngineConfig> {
    let config = match path {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => EngineConfig::default(),
    };
    if config.backend == BackendMode::Remote {
        bail!("grove-demo has no service client; use backend = \"offline\" or \"fallback\"");
    }
    Ok(config)
}

fn prompt_answer(lesson: &LessonContent, index: usize) -> Result<String> {
    let question = &lesson.questions[index];
    println!("\nQ{}: {}", index + 1, question.text);
    for (n, option) in question.options.iter().enumerate() {
        println!("  {}) {}", n + 1, option.text);
    }
    print!("> ");
    std::io::stdout().flush()?;

    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    let line = line.trim();
    let chosen = line
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|n| question.options.get(n))
        .map_or_else(|| line.to_string(), |o| o.id.to_string());
    Ok(chosen)
}

async fn play(
    engine: &ProgressionEngine,
    lesson: &LessonContent,
    module: Option<ModuleId>,
    auto: bool,
    answers: Option<&[String]>,
    twice: bool,
) -> Result<()> {
    println!("\n== {} ({})", lesson.title, lesson.id);
    let mut session = engine.start_session(lesson.id.clone(), module, lesson.questions.clone());

    for index in 0..lesson.questions.len() {
        let choice = if auto {
            Some(lesson.questions[index].correct_option_id.to_string())
        } else if let Some(answers) = answers {
            answers.get(index).cloned()
        } else {
            Some(prompt_answer(lesson, index)?)
        };

        if let Some(choice) = choice {
            if let Err(e) = session.select_answer(index, choice) {
                println!("  !! {e}; question left unanswered");
            }
        }
        if let Some(feedback) = session.feedback(index) {
            if !auto {
                let label = match feedback.verdict {
                    Verdict::Correct => "correct.",
                    Verdict::Incorrect => "not quite.",
                    Verdict::Unanswered => "skipped.",
                };
                println!("  {label} {}", feedback.explanation);
            }
        }
        session.next()?;
    }

    let deliveries = if twice { 2 } else { 1 };
    for _ in 0..deliveries {
        match engine.finish_and_submit(&mut session).await? {
            FinishResult::Submitted(SubmitOutcome::Granted { score, tree, .. }) => {
                println!(
                    "  score {}/{}; tree: {} points, stage {}/{}, {:.0}% into stage{}",
                    score.correct_count,
                    score.total_questions,
                    tree.growth_points(),
                    tree.current_stage() + 1,
                    tree.rules().total_stages(),
                    tree.progress_within_stage(),
                    if tree.is_completed() { ", completed" } else { "" }
                );
            }
            FinishResult::Submitted(SubmitOutcome::Duplicate(grant)) => {
                println!("  duplicate completion ignored (attempt {})", grant.attempt_id);
            }
            FinishResult::Submitted(SubmitOutcome::InFlight) => {
                println!("  submission already in flight");
            }
            FinishResult::Invalid(issue) => {
                println!("  answer set rejected: {issue}");
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("log-json"));
    let config = load_config(matches.get_one::<PathBuf>("config"))?;

    match matches.subcommand() {
        Some(("config", _)) => {
            print!("{}", config.to_toml_string()?);
        }
        Some(("lessons", _)) => {
            let dataset = OfflineDataset::bundled()?;
            for module in &dataset.modules {
                println!("{} - {}", module.id, module.title);
                for lesson in &module.lessons {
                    println!(
                        "  {:<20} {} ({} questions)",
                        lesson.id.as_str(),
                        lesson.title,
                        lesson.questions.len()
                    );
                }
            }
        }
        Some(("play", args)) => {
            let dataset = OfflineDataset::bundled()?;
            let selected: Vec<LessonContent> = match args.get_many::<String>("lesson") {
                Some(ids) => ids
                    .map(|id| {
                        dataset
                            .lesson(&id.as_str().into())
                            .cloned()
                            .with_context(|| format!("no lesson {id}"))
                    })
                    .collect::<Result<_>>()?,
                None => dataset.lessons().cloned().collect(),
            };
            let answers: Option<Vec<String>> =
                args.get_many::<String>("answers").map(|a| a.cloned().collect());

            let gateway = Arc::new(ConsoleGateway {
                reveals: TimerScope::new(),
            });
            let engine = ProgressionEngine::builder(config)
                .gateway(gateway.clone())
                .build_for_mode(None)?;

            for lesson in &selected {
                play(
                    &engine,
                    lesson,
                    dataset.module_of(&lesson.id).map(|m| m.id.clone()),
                    args.get_flag("auto"),
                    answers.as_deref(),
                    args.get_flag("twice"),
                )
                .await?;
            }

            tokio::time::sleep(REVEAL_DELAY * 2).await;
            gateway.reveals.cancel_all();

            if let Ok(balance) = engine.view(ViewKey::CoinBalance).await {
                println!("\ncoin balance: {balance:?}");
            }
            engine
                .journal()
                .verify_integrity()
                .context("reward journal failed verification")?;
            println!(
                "journal: {} grants, {} coins",
                engine.journal().len(),
                engine.journal().total_coins()
            );
        }
        _ => {
            cli().print_help()?;
        }
    }
    Ok(())
}
