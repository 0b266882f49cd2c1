use std::{
    env, fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context};
use clap::{ArgAction, Args, Parser, Subcommand};
use console::style;
use proofline_core::{
    languages::LANGUAGES, set_language, CheckClient, CommandError, Editor, Engine, FixOutcome,
    IgnoredRule, IgnoredRules, MemoryEditor, Navigation, Problem, Region, Settings,
};
use serde::Serialize;
use tracing::{debug, info};

/// Proofline CLI entry point.
#[derive(Debug, Parser)]
#[command(
    name = "proofline",
    about = "Check prose against a LanguageTool server and fix what it finds."
)]
struct Cli {
    /// Path to settings file (YAML). Defaults to proofline.yml if present.
    #[arg(long, global = true, default_value = "proofline.yml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Check a file and list the problems found.
    Check(CheckArgs),
    /// Apply the first suggested replacement of every problem.
    Fix(FixArgs),
    /// Manage deactivated rules.
    #[command(subcommand)]
    Rules(RulesCommand),
    /// List the languages that can be selected with --language.
    Languages,
}

#[derive(Debug, Args)]
struct ServerArgs {
    /// Language code for this document (e.g. en-US, de-DE, auto).
    #[arg(long, value_name = "CODE")]
    language: Option<String>,

    /// Check endpoint, overriding the settings file.
    #[arg(long, value_name = "URL")]
    server: Option<String>,
}

#[derive(Debug, Args)]
struct CheckArgs {
    #[arg(value_name = "FILE")]
    file: PathBuf,

    #[command(flatten)]
    server: ServerArgs,

    /// Only check characters START..END of the file.
    #[arg(long, value_name = "START:END", value_parser = parse_range)]
    range: Option<Region>,

    /// Emit JSON output for automation.
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,
}

#[derive(Debug, Args)]
struct FixArgs {
    #[arg(value_name = "FILE")]
    file: PathBuf,

    #[command(flatten)]
    server: ServerArgs,

    /// Write the fixed text back instead of printing it.
    #[arg(long, action = ArgAction::SetTrue)]
    write: bool,
}

#[derive(Debug, Subcommand)]
enum RulesCommand {
    /// Show every deactivated rule.
    List,
    /// Deactivate a rule by id.
    Add {
        id: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// Reactivate a rule.
    Remove { id: String },
}

#[derive(Debug, Serialize)]
struct ProblemReport {
    id: usize,
    line: usize,
    column: usize,
    offset: usize,
    length: usize,
    text: String,
    category: String,
    rule: String,
    message: String,
    replacements: Vec<String>,
    urls: Vec<String>,
}

#[derive(Debug, Serialize)]
struct CheckReport {
    path: String,
    language: String,
    problems: Vec<ProblemReport>,
}

/// Settings plus the ignored-rule list they point at.
struct Session {
    settings: Settings,
    rules: IgnoredRules,
}

impl Session {
    fn load(config: &Path) -> anyhow::Result<Self> {
        let settings = Settings::load_or_default(config)?;
        let root = match config.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => env::current_dir()?,
        };
        let rules = IgnoredRules::load(&settings.ignored_rules_file(&root))?;
        Ok(Self { settings, rules })
    }

    fn settings_for(&self, args: &ServerArgs) -> Settings {
        let mut settings = self.settings.clone();
        if let Some(server) = &args.server {
            settings.server = server.clone();
        }
        settings
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut session = Session::load(&cli.config)?;
    init_tracing(session.settings.debug)?;

    match cli.command {
        Command::Check(args) => run_check(&session, args).await,
        Command::Fix(args) => run_fix(&session, args).await,
        Command::Rules(command) => run_rules(&mut session, command),
        Command::Languages => {
            print_languages();
            Ok(())
        }
    }
}

fn init_tracing(debug: bool) -> anyhow::Result<()> {
    let level = if debug { "proofline=debug" } else { "proofline=info" };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.parse()?))
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

fn open_document(path: &Path, language: Option<&str>) -> anyhow::Result<MemoryEditor> {
    let text =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let mut editor = MemoryEditor::new(text);
    if let Some(code) = language {
        set_language(&mut editor, code).context("Run `proofline languages` for valid codes")?;
    }
    Ok(editor)
}

async fn check_document(
    engine: &mut Engine<PathBuf>,
    editor: &mut MemoryEditor,
    path: &PathBuf,
    settings: &Settings,
    rules: &IgnoredRules,
) -> anyhow::Result<String> {
    let client = CheckClient::from_settings(settings);
    let plan = engine.prepare_check(editor, settings, rules);
    info!(
        path = %path.display(),
        language = %plan.language,
        region = %plan.region,
        "checking"
    );
    let result = client
        .check(&plan.text, &plan.language, &plan.disabled_rules)
        .await;
    engine
        .complete_check(editor, path, &plan, result)
        .with_context(|| format!("Failed to check {} against {}", path.display(), client.endpoint()))?;
    Ok(plan.language)
}

async fn run_check(session: &Session, args: CheckArgs) -> anyhow::Result<()> {
    let settings = session.settings_for(&args.server);
    let mut editor = open_document(&args.file, args.server.language.as_deref())?;
    if let Some(range) = args.range {
        if range.end > editor.size() {
            bail!(
                "Range {range} is past the end of {} ({} characters)",
                args.file.display(),
                editor.size()
            );
        }
        editor.set_selection(range);
    }

    let mut engine = Engine::new(&settings)?;
    let language =
        check_document(&mut engine, &mut editor, &args.file, &settings, &session.rules).await?;
    let problems = engine.problems(&args.file);

    if args.json {
        let report = CheckReport {
            path: args.file.to_string_lossy().to_string(),
            language,
            problems: problems.iter().map(|p| report_for(editor.text(), p)).collect(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_human_report(&args.file, editor.text(), problems, &language);
    }
    Ok(())
}

async fn run_fix(session: &Session, args: FixArgs) -> anyhow::Result<()> {
    let settings = session.settings_for(&args.server);
    let mut editor = open_document(&args.file, args.server.language.as_deref())?;
    let mut engine = Engine::new(&settings)?;
    let doc = args.file.clone();
    check_document(&mut engine, &mut editor, &doc, &settings, &session.rules).await?;

    let mut applied = 0usize;
    let mut skipped = 0usize;
    while let Navigation::Selected(id) = engine.goto_next(&mut editor, &doc, true) {
        let outcome = match engine.apply_fix(&mut editor, &doc) {
            Ok(FixOutcome::Choose { problem, .. }) => {
                engine.choose_replacement(&mut editor, &doc, problem, Some(0))
            }
            other => other,
        };
        match outcome {
            Ok(FixOutcome::Applied { caret, .. }) => {
                debug!(%id, caret, "fixed");
                applied += 1;
            }
            Ok(_) => {}
            Err(CommandError::NoReplacements(_)) => skipped += 1,
            Err(err) => return Err(err).with_context(|| format!("Failed to fix problem {id}")),
        }
        for change in editor.take_changes() {
            engine.on_text_changed(&doc, &change);
        }
        engine.on_modified(&mut editor, &doc);
    }

    let summary = format!(
        "{} fixes applied, {} problems without suggestions",
        applied, skipped
    );
    if args.write {
        fs::write(&doc, editor.text())
            .with_context(|| format!("Failed to write {}", doc.display()))?;
        println!("{}: {}", style(doc.display()).bold(), summary);
    } else {
        print!("{}", editor.text());
        eprintln!("{summary}");
    }
    Ok(())
}

fn run_rules(session: &mut Session, command: RulesCommand) -> anyhow::Result<()> {
    match command {
        RulesCommand::List => {
            if session.rules.rules().is_empty() {
                println!("{}", style("no deactivated rules").green());
            }
            for rule in session.rules.rules() {
                println!("{}  {}", style(&rule.id).cyan(), rule.description);
            }
        }
        RulesCommand::Add { id, description } => {
            if !session.rules.add(IgnoredRule {
                id: id.clone(),
                description,
            }) {
                println!("rule {id} is already deactivated");
                return Ok(());
            }
            session.rules.save()?;
            println!("deactivated rule {}", style(&id).cyan());
        }
        RulesCommand::Remove { id } => {
            if !session.rules.remove(&id) {
                bail!("Rule {id} is not deactivated");
            }
            session.rules.save()?;
            println!("activated rule {}", style(&id).cyan());
        }
    }
    Ok(())
}

fn print_languages() {
    for (index, (name, code)) in LANGUAGES.iter().enumerate() {
        println!("{index:>3}  {}  {name}", style(format!("{code:<6}")).cyan());
    }
}

fn print_human_report(path: &Path, text: &str, problems: &[Problem], language: &str) {
    println!(
        "{} ({} problems, language {})",
        style(path.to_string_lossy()).bold(),
        problems.len(),
        language
    );
    if problems.is_empty() {
        println!("  {}", style("clean").green());
        return;
    }
    for problem in problems {
        let (line, column) = line_col(text, problem.offset);
        println!(
            "  [{}] {}:{} {}",
            style(&problem.category).yellow(),
            line,
            column,
            problem.message
        );
        println!("      → {}", problem.original_content);
        if !problem.replacements.is_empty() {
            println!("      suggestion: {}", problem.replacements.join(", "));
        }
        println!("      rule: {}", style(&problem.rule).dim());
    }
}

fn report_for(text: &str, problem: &Problem) -> ProblemReport {
    let (line, column) = line_col(text, problem.offset);
    ProblemReport {
        id: problem.id.0,
        line,
        column,
        offset: problem.offset,
        length: problem.length,
        text: problem.original_content.clone(),
        category: problem.category.clone(),
        rule: problem.rule.clone(),
        message: problem.message.clone(),
        replacements: problem.replacements.clone(),
        urls: problem.urls.clone(),
    }
}

/// 1-based line and column of a character offset.
fn line_col(text: &str, offset: usize) -> (usize, usize) {
    let mut line = 1;
    let mut column = 1;
    for ch in text.chars().take(offset) {
        if ch == '\n' {
            line += 1;
            column = 1;
        } else {
            column += 1;
        }
    }
    (line, column)
}

fn parse_range(value: &str) -> Result<Region, String> {
    let (start, end) = value
        .split_once(':')
        .ok_or_else(|| format!("expected START:END, got `{value}`"))?;
    let start = start
        .trim()
        .parse::<usize>()
        .map_err(|err| format!("invalid start `{start}`: {err}"))?;
    let end = end
        .trim()
        .parse::<usize>()
        .map_err(|err| format!("invalid end `{end}`: {err}"))?;
    Ok(Region::new(start, end))
}
