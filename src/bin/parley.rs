//! Interactive terminal client for chat-completion APIs.
//!
//! # Usage
//!
//! ```bash
//! # Chat with the default model
//! parley
//!
//! # Chat with a prompt template applied to every question
//! parley --prompt translator chat
//!
//! # Answer one question and exit
//! parley ask "What is a monad?"
//!
//! # Show configured prompts
//! parley config list-prompt
//! ```
//!
//! Type `/help` in the chat for slash commands.

use std::borrow::Cow;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use arrrg::CommandLine;
use rustyline::completion::Completer;
use rustyline::error::ReadlineError;
use rustyline::highlight::{CmdKind, Highlighter};
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::Validator;
use rustyline::{DefaultEditor, Editor, Helper};
use tracing_subscriber::EnvFilter;

use parley::chat::{
    ChatArgs, ChatConfig, config_path, history_path, onboard_api_key, parse_command, prompt_label,
};
use parley::cli::{self, CliCommand, ConfigAction};
use parley::{App, OpenAi, PlainTextRenderer, Renderer, TracingLogger};

#[tokio::main]
async fn main() {
    let usage = cli::usage();
    let (args, free) = ChatArgs::from_command_line_relaxed(&usage);
    init_tracing(args.verbose);

    if let Err(err) = run(args, free).await {
        if !err.is_exit_requested() {
            eprintln!("parley: {err}");
        }
        std::process::exit(err.exit_code());
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

async fn run(args: ChatArgs, free: Vec<String>) -> parley::Result<()> {
    let (command, operands) = cli::split_command(&free)?;
    let mut config = ChatConfig::load(&args)?;
    tracing::debug!(command = %command, model = %config.model, "starting");

    match command {
        CliCommand::Config => {
            let lines = match ConfigAction::parse(operands)? {
                ConfigAction::ListPrompt => cli::list_prompts(&config),
                ConfigAction::ListModel => cli::list_models(&config),
            };
            for line in lines {
                println!("{line}");
            }
            Ok(())
        }
        CliCommand::Ask => {
            let question = operands.join(" ");
            if question.trim().is_empty() {
                return Err(parley::Error::validation(
                    "usage: parley ask <question...>",
                    Some("question".to_string()),
                ));
            }
            ensure_api_key(&args, &mut config)?;
            let streaming = config.streaming;
            let mut app = build_app(config)?;
            let mut renderer = PlainTextRenderer::with_color(app.config().use_color);
            app.ask(&question, streaming, &mut renderer).await?;
            Ok(())
        }
        CliCommand::Chat => {
            ensure_api_key(&args, &mut config)?;
            let app = build_app(config)?;
            chat(app).await
        }
    }
}

/// Hides typed characters behind asterisks.
struct MaskedInput;

impl Completer for MaskedInput {
    type Candidate = String;
}

impl Hinter for MaskedInput {
    type Hint = String;
}

impl Validator for MaskedInput {}

impl Helper for MaskedInput {}

impl Highlighter for MaskedInput {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        Cow::Owned("*".repeat(line.chars().count()))
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _kind: CmdKind) -> bool {
        true
    }
}

/// Reads one line; Ctrl-C becomes [`parley::Error::Interrupted`] and Ctrl-D
/// becomes `None`.
fn read_line<H: Helper>(
    rl: &mut Editor<H, DefaultHistory>,
    prompt: &str,
) -> parley::Result<Option<String>> {
    match rl.readline(prompt) {
        Ok(line) => Ok(Some(line)),
        Err(ReadlineError::Interrupted) => Err(parley::Error::Interrupted),
        Err(ReadlineError::Eof) => Ok(None),
        Err(err) => Err(parley::Error::unknown(format!("Input error: {err}"))),
    }
}

/// First run: asks for an API key and saves it to the config file.
fn ensure_api_key(args: &ChatArgs, config: &mut ChatConfig) -> parley::Result<()> {
    if !config.needs_api_key() {
        return Ok(());
    }
    let Some(path) = config_path(args) else {
        return Ok(());
    };
    let mut rl: Editor<MaskedInput, DefaultHistory> = Editor::new()
        .map_err(|e| parley::Error::unknown(format!("cannot open terminal: {e}")))?;
    rl.set_helper(Some(MaskedInput));
    let key = onboard_api_key(
        &path,
        || read_line(&mut rl, "OpenAI API Key: ")?.ok_or(parley::Error::Interrupted),
        |line| println!("{line}"),
    )?;
    config.api_key = Some(key);
    Ok(())
}

fn build_app(config: ChatConfig) -> parley::Result<App<OpenAi>> {
    let client = OpenAi::with_options(config.api_key.clone(), config.base_url.clone(), None)?;
    let verbose = config.verbose;

    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&interrupted);
    ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst))
        .map_err(|e| parley::Error::unknown(format!("cannot install Ctrl+C handler: {e}")))?;

    let app = App::new(config, client).with_interrupt(interrupted);
    if verbose {
        Ok(app.with_logger(Arc::new(TracingLogger)))
    } else {
        Ok(app)
    }
}

async fn chat(mut app: App<OpenAi>) -> parley::Result<()> {
    let mut renderer = PlainTextRenderer::with_color(app.config().use_color);
    let mut rl = DefaultEditor::new()
        .map_err(|e| parley::Error::unknown(format!("cannot open terminal: {e}")))?;

    let history = history_path();
    if let Some(path) = &history {
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let _ = rl.load_history(path);
    }

    println!("parley (model: {})", app.config().model);
    println!("Type /help for commands, /quit to exit\n");

    let outcome = loop {
        let prompt = prompt_label(app.current());
        match read_line(&mut rl, &prompt) {
            Ok(Some(line)) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line);

                if let Some(command) = parse_command(line) {
                    match app.handle_command(command, &mut renderer) {
                        Ok(()) => {}
                        Err(err) if err.is_exit_requested() => break Ok(()),
                        Err(err) => renderer.print_error(&err.to_string()),
                    }
                    continue;
                }

                let streaming = app.config().streaming;
                match app.ask(line, streaming, &mut renderer).await {
                    Ok(_) => {}
                    Err(err) if err.is_abort() => {}
                    Err(err) if err.is_retryable() => {
                        renderer.print_error(&format!("{err}. Wait a moment and ask again."))
                    }
                    Err(err) => renderer.print_error(&err.to_string()),
                }
            }
            Ok(None) => {
                println!();
                break Ok(());
            }
            Err(err) if err.is_interrupted() => {
                println!("If you want to exit, please press <Ctrl+D>.");
            }
            Err(err) => break Err(err),
        }
    };

    if let Some(path) = &history {
        if let Err(err) = rl.save_history(path) {
            tracing::warn!(path = %path.display(), error = %err, "cannot save history");
        }
    }
    if outcome.is_ok() {
        println!("Goodbye!");
    }
    outcome
}
