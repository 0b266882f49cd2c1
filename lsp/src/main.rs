//! Proofline Language Server Protocol implementation.
//!
//! Open documents act as host editors for the problem-tracking engine.
//! Checks, fixes and navigation are exposed as `workspace/executeCommand`
//! commands, code actions and hover cards; problems are published as
//! diagnostics.

mod document;
mod scopes;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use dashmap::DashMap;
use proofline_core::tracker::live_region;
use proofline_core::{
    activate_rule, set_language, CheckClient, CommandError, Engine, FixOutcome, IgnoreOutcome,
    IgnoredRule, IgnoredRules, LinkOutcome, Navigation, PopupLink, Problem, ProblemId, Settings,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tokio::sync::{Mutex, RwLock};
use tower_lsp::jsonrpc::{Error as RpcError, Result};
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, LanguageServer, LspService, Server};
use tracing::{debug, info, warn};
use tracing_subscriber::{
    fmt, layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter, Registry,
};

use crate::document::{HostEffect, LspDocument};

const CONFIG_FILE: &str = "proofline.yml";
const SOURCE: &str = "proofline";

const CHECK: &str = "proofline.check";
const NEXT: &str = "proofline.next";
const PREVIOUS: &str = "proofline.previous";
const APPLY_FIX: &str = "proofline.applyFix";
const IGNORE: &str = "proofline.ignore";
const CLEAR: &str = "proofline.clear";
const DEACTIVATE_RULE: &str = "proofline.deactivateRule";
const ACTIVATE_RULE: &str = "proofline.activateRule";
const SET_LANGUAGE: &str = "proofline.setLanguage";
const FOLLOW_LINK: &str = "proofline.followLink";

const COMMANDS: &[&str] = &[
    CHECK,
    NEXT,
    PREVIOUS,
    APPLY_FIX,
    IGNORE,
    CLEAR,
    DEACTIVATE_RULE,
    ACTIVATE_RULE,
    SET_LANGUAGE,
    FOLLOW_LINK,
];

type LogHandle = reload::Handle<EnvFilter, Registry>;

/// Proofline Language Server backend.
struct Backend {
    client: Client,
    log: LogHandle,
    settings: RwLock<Settings>,
    checker: RwLock<Arc<CheckClient>>,
    // Lock order: rules, then engine, then a document entry.
    rules: Mutex<IgnoredRules>,
    engine: Mutex<Engine<Url>>,
    documents: DashMap<Url, LspDocument>,
    workspace_root: RwLock<Option<PathBuf>>,
    config_path: RwLock<Option<PathBuf>>,
}

impl Backend {
    fn new(client: Client, engine: Engine<Url>, log: LogHandle) -> Self {
        let settings = Settings::default();
        Self {
            client,
            log,
            checker: RwLock::new(Arc::new(CheckClient::from_settings(&settings))),
            settings: RwLock::new(settings),
            rules: Mutex::new(IgnoredRules::in_memory()),
            engine: Mutex::new(engine),
            documents: DashMap::new(),
            workspace_root: RwLock::new(None),
            config_path: RwLock::new(None),
        }
    }

    async fn reload_settings(&self) -> anyhow::Result<()> {
        let root = self.workspace_root.read().await.clone();
        let configured = self.config_path.read().await.clone();
        let resolved = match (configured, &root) {
            (Some(path), _) => path,
            (None, Some(root)) => root.join(CONFIG_FILE),
            (None, None) => PathBuf::from(CONFIG_FILE),
        };

        let settings = Settings::load_or_default(&resolved)?;
        let engine = Engine::new(&settings)?;
        let rules_root = root
            .or_else(|| resolved.parent().map(Path::to_path_buf))
            .unwrap_or_default();
        let rules = IgnoredRules::load(&settings.ignored_rules_file(&rules_root))?;
        self.log
            .reload(log_filter(settings.debug)?)
            .context("failed to update log level")?;

        *self.rules.lock().await = rules;
        *self.engine.lock().await = engine;
        for mut doc in self.documents.iter_mut() {
            doc.clear_markers();
        }
        *self.checker.write().await = Arc::new(CheckClient::from_settings(&settings));
        *self.settings.write().await = settings;
        *self.config_path.write().await = Some(resolved.clone());

        self.client
            .log_message(
                MessageType::INFO,
                format!("Proofline settings loaded: {}", resolved.display()),
            )
            .await;
        Ok(())
    }

    async fn report_reload(&self) {
        if let Err(err) = self.reload_settings().await {
            warn!(error = %format!("{err:#}"), "failed to load settings");
            self.client
                .log_message(
                    MessageType::ERROR,
                    format!("Failed to load settings: {err:#}"),
                )
                .await;
        }
        let uris: Vec<Url> = self.documents.iter().map(|e| e.key().clone()).collect();
        for uri in uris {
            self.publish_diagnostics(&uri).await;
        }
    }

    fn resolve_config_path(configured: &str, root: Option<&Path>) -> Option<PathBuf> {
        if configured.trim().is_empty() {
            return None;
        }
        let configured = PathBuf::from(configured);
        if configured.is_absolute() {
            Some(configured)
        } else {
            root.map(|root| root.join(configured))
        }
    }

    /// Runs one engine operation against an open document, then sends the
    /// queued host effects and republishes diagnostics.
    async fn run<R>(
        &self,
        uri: &Url,
        op: impl FnOnce(&mut Engine<Url>, &mut LspDocument) -> R,
    ) -> anyhow::Result<R> {
        let (result, effects) = {
            let mut engine = self.engine.lock().await;
            let mut doc = self
                .documents
                .get_mut(uri)
                .with_context(|| format!("{uri} is not open"))?;
            let result = op(&mut *engine, doc.value_mut());
            (result, doc.take_effects())
        };
        self.flush(uri, effects).await;
        self.publish_diagnostics(uri).await;
        Ok(result)
    }

    async fn flush(&self, uri: &Url, effects: Vec<HostEffect>) {
        for effect in effects {
            match effect {
                HostEffect::Edit(edit) => {
                    let mut changes = HashMap::new();
                    changes.insert(uri.clone(), vec![edit]);
                    let workspace_edit = WorkspaceEdit {
                        changes: Some(changes),
                        ..Default::default()
                    };
                    match self.client.apply_edit(workspace_edit).await {
                        Ok(response) if response.applied => {}
                        Ok(response) => {
                            warn!(reason = ?response.failure_reason, "client rejected edit")
                        }
                        Err(err) => warn!(error = %err, "applyEdit failed"),
                    }
                }
                HostEffect::Select(range) => {
                    let params = ShowDocumentParams {
                        uri: uri.clone(),
                        external: Some(false),
                        take_focus: Some(true),
                        selection: Some(range),
                    };
                    if let Err(err) = self.client.show_document(params).await {
                        debug!(error = %err, "showDocument failed");
                    }
                }
                HostEffect::Popup(text) => {
                    self.client.show_message(MessageType::INFO, text).await;
                }
                HostEffect::Status(text) => {
                    info!(status = %text);
                    self.client.show_message(MessageType::INFO, text).await;
                }
            }
        }
    }

    async fn publish_diagnostics(&self, uri: &Url) {
        let (diagnostics, version) = {
            let engine = self.engine.lock().await;
            let Some(doc) = self.documents.get(uri) else {
                return;
            };
            let diagnostics = engine
                .problems(uri)
                .iter()
                .map(|problem| to_lsp_diagnostic(&doc, problem))
                .collect::<Vec<_>>();
            (diagnostics, doc.version)
        };
        self.client
            .publish_diagnostics(uri.clone(), diagnostics, Some(version))
            .await;
    }

    async fn check(&self, uri: &Url, range: Option<Range>) -> anyhow::Result<usize> {
        let settings = self.settings.read().await.clone();
        let plan = {
            let rules = self.rules.lock().await;
            let engine = self.engine.lock().await;
            let mut doc = self
                .documents
                .get_mut(uri)
                .with_context(|| format!("{uri} is not open"))?;
            doc.select_range(range);
            engine.prepare_check(&*doc, &settings, &rules)
        };

        let checker = self.checker.read().await.clone();
        info!(%uri, language = %plan.language, region = %plan.region, "checking");
        let result = checker
            .check(&plan.text, &plan.language, &plan.disabled_rules)
            .await;

        // Edits made while the request was in flight are reconciled by
        // content: problems whose text no longer matches are dropped.
        self.run(uri, |engine, doc| engine.complete_check(doc, uri, &plan, result))
            .await?
            .with_context(|| format!("Failed to check {uri} against {}", checker.endpoint()))
    }

    /// Asks the user to pick one of several replacements.
    async fn choose(
        &self,
        uri: &Url,
        problem: ProblemId,
        replacements: Vec<String>,
    ) -> anyhow::Result<()> {
        let actions = replacements
            .iter()
            .map(|text| MessageActionItem {
                title: text.clone(),
                properties: HashMap::new(),
            })
            .collect();
        let picked = self
            .client
            .show_message_request(MessageType::INFO, "Choose a replacement", Some(actions))
            .await
            .context("showMessageRequest failed")?;
        let choice = picked.and_then(|item| replacements.iter().position(|r| *r == item.title));

        let outcome = self
            .run(uri, |engine, doc| {
                engine.choose_replacement(doc, uri, problem, choice)
            })
            .await?;
        if let Err(err) = outcome {
            debug!(error = %err, "replacement not applied");
        }
        Ok(())
    }

    async fn execute(&self, command: &str, args: &[Value]) -> anyhow::Result<Option<Value>> {
        let uri: Url = arg(args, 0, "uri")?;
        match command {
            CHECK => {
                let range: Option<Range> = opt_arg(args, 1, "range")?;
                let active = self.check(&uri, range).await?;
                Ok(Some(json!({ "active": active })))
            }
            NEXT | PREVIOUS => {
                let position: Position = arg(args, 1, "position")?;
                let forward = command == NEXT;
                let navigation = self
                    .run(&uri, |engine, doc| {
                        doc.select_at(position);
                        engine.goto_next(doc, &uri, forward)
                    })
                    .await?;
                Ok(match navigation {
                    Navigation::Selected(id) => Some(json!({ "problem": id })),
                    Navigation::Exhausted => None,
                })
            }
            APPLY_FIX => {
                let id: ProblemId = arg(args, 1, "problem")?;
                let index: Option<usize> = opt_arg(args, 2, "replacement")?;
                let outcome = self
                    .run(&uri, |engine, doc| {
                        engine.select(doc, &uri, id)?;
                        match index {
                            Some(index) => engine.choose_replacement(doc, &uri, id, Some(index)),
                            None => engine.apply_fix(doc, &uri),
                        }
                    })
                    .await?;
                if let Ok(FixOutcome::Choose {
                    problem,
                    replacements,
                }) = outcome
                {
                    self.choose(&uri, problem, replacements).await?;
                }
                Ok(None)
            }
            IGNORE => {
                let id: ProblemId = arg(args, 1, "problem")?;
                let outcome = self
                    .run(&uri, |engine, doc| ignore_and_advance(engine, doc, &uri, id))
                    .await?;
                Ok(outcome.ok().map(|(ignored, next)| {
                    json!({ "ignored": ignored.ignored, "next": selected_id(next) })
                }))
            }
            CLEAR => {
                let cleared = self
                    .run(&uri, |engine, doc| engine.clear_all(doc, &uri))
                    .await?;
                Ok(Some(json!({ "cleared": cleared })))
            }
            DEACTIVATE_RULE => {
                let id: ProblemId = arg(args, 1, "problem")?;
                let mut rules = self.rules.lock().await;
                let outcome = self
                    .run(&uri, |engine, doc| {
                        deactivate_and_advance(engine, doc, &uri, id, &mut rules)
                    })
                    .await?;
                let Ok((rule, next)) = outcome else {
                    return Ok(None);
                };
                rules.save()?;
                Ok(Some(json!({ "rule": rule.id, "next": selected_id(next) })))
            }
            ACTIVATE_RULE => {
                let rule_id: String = arg(args, 1, "rule")?;
                let mut rules = self.rules.lock().await;
                let outcome = self
                    .run(&uri, |_, doc| activate_rule(doc, &mut rules, &rule_id))
                    .await?;
                if outcome.is_ok() {
                    rules.save()?;
                }
                Ok(None)
            }
            SET_LANGUAGE => {
                let code: String = arg(args, 1, "language")?;
                let language = self
                    .run(&uri, |_, doc| set_language(doc, &code))
                    .await?
                    .ok()
                    .flatten();
                Ok(Some(json!({ "language": language.unwrap_or("auto") })))
            }
            FOLLOW_LINK => {
                let link: String = arg(args, 1, "link")?;
                let link: PopupLink = link.parse()?;
                let outcome = self
                    .run(&uri, |engine, doc| engine.follow_link(doc, &uri, &link))
                    .await?;
                if let Ok(LinkOutcome::Expanded(card)) = outcome {
                    let replacements = card.replacements.into_iter().map(|(text, _)| text).collect();
                    self.choose(&uri, card.problem, replacements).await?;
                }
                Ok(None)
            }
            other => anyhow::bail!("unknown command `{other}`"),
        }
    }
}

/// Ignores `id` with its equality class, then moves to the next problem.
fn ignore_and_advance(
    engine: &mut Engine<Url>,
    doc: &mut LspDocument,
    uri: &Url,
    id: ProblemId,
) -> std::result::Result<(IgnoreOutcome, Navigation), CommandError> {
    engine.select(doc, uri, id)?;
    let outcome = engine.ignore(doc, uri)?;
    Ok((outcome, engine.goto_next(doc, uri, true)))
}

/// Deactivates the rule behind `id`, then moves to the next problem.
fn deactivate_and_advance(
    engine: &mut Engine<Url>,
    doc: &mut LspDocument,
    uri: &Url,
    id: ProblemId,
    rules: &mut IgnoredRules,
) -> std::result::Result<(IgnoredRule, Navigation), CommandError> {
    engine.select(doc, uri, id)?;
    let rule = engine.deactivate_rule(doc, uri, rules)?;
    Ok((rule, engine.goto_next(doc, uri, true)))
}

fn selected_id(navigation: Navigation) -> Option<ProblemId> {
    match navigation {
        Navigation::Selected(id) => Some(id),
        Navigation::Exhausted => None,
    }
}

fn arg<T: DeserializeOwned>(args: &[Value], index: usize, name: &str) -> anyhow::Result<T> {
    let value = args
        .get(index)
        .cloned()
        .with_context(|| format!("missing argument `{name}`"))?;
    serde_json::from_value(value).with_context(|| format!("invalid argument `{name}`"))
}

fn opt_arg<T: DeserializeOwned>(
    args: &[Value],
    index: usize,
    name: &str,
) -> anyhow::Result<Option<T>> {
    match args.get(index) {
        None | Some(Value::Null) => Ok(None),
        Some(_) => arg(args, index, name).map(Some),
    }
}

/// Hover link target that routes back to `proofline.followLink`.
fn command_link(uri: &Url, link: &PopupLink) -> String {
    let args = json!([uri, link.to_string()]).to_string();
    let encoded: String = url::form_urlencoded::byte_serialize(args.as_bytes()).collect();
    format!("command:{FOLLOW_LINK}?{encoded}")
}

fn command(title: String, name: &str, arguments: Vec<Value>) -> Command {
    Command {
        title,
        command: name.to_string(),
        arguments: Some(arguments),
    }
}

fn to_lsp_diagnostic(doc: &LspDocument, problem: &Problem) -> Diagnostic {
    let region = live_region(doc, problem);
    Diagnostic {
        range: doc.range_of(region),
        severity: Some(DiagnosticSeverity::INFORMATION),
        code: Some(NumberOrString::String(problem.rule.clone())),
        code_description: problem
            .urls
            .first()
            .and_then(|url| Url::parse(url).ok())
            .map(|href| CodeDescription { href }),
        source: Some(SOURCE.to_string()),
        message: format!("[{}] {}", problem.category, problem.message),
        related_information: None,
        tags: None,
        data: Some(json!({ "problem": problem.id })),
    }
}

fn code_actions_for(uri: &Url, problem: &Problem) -> Vec<CodeActionOrCommand> {
    let id = json!(problem.id);
    let mut actions: Vec<CodeActionOrCommand> = problem
        .replacements
        .iter()
        .enumerate()
        .map(|(index, text)| {
            let title = format!("Replace with \"{text}\"");
            CodeActionOrCommand::CodeAction(CodeAction {
                title: title.clone(),
                kind: Some(CodeActionKind::QUICKFIX),
                command: Some(command(title, APPLY_FIX, vec![json!(uri), id.clone(), json!(index)])),
                is_preferred: Some(index == 0),
                ..Default::default()
            })
        })
        .collect();

    let ignore = format!("Ignore \"{}\"", problem.original_content);
    actions.push(CodeActionOrCommand::CodeAction(CodeAction {
        title: ignore.clone(),
        kind: Some(CodeActionKind::QUICKFIX),
        command: Some(command(ignore, IGNORE, vec![json!(uri), id.clone()])),
        ..Default::default()
    }));
    let deactivate = format!("Deactivate rule {}", problem.rule);
    actions.push(CodeActionOrCommand::CodeAction(CodeAction {
        title: deactivate.clone(),
        kind: Some(CodeActionKind::QUICKFIX),
        command: Some(command(deactivate, DEACTIVATE_RULE, vec![json!(uri), id])),
        ..Default::default()
    }));
    actions
}

fn log_filter(debug: bool) -> anyhow::Result<EnvFilter> {
    let level = if debug { "proofline=debug" } else { "proofline=info" };
    Ok(EnvFilter::from_default_env().add_directive(level.parse()?))
}

#[tower_lsp::async_trait]
impl LanguageServer for Backend {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        if let Some(root_uri) = params.root_uri.or_else(|| {
            params
                .workspace_folders
                .as_ref()
                .and_then(|folders| folders.first().map(|f| f.uri.clone()))
        }) {
            if let Ok(path) = root_uri.to_file_path() {
                *self.workspace_root.write().await = Some(path);
            }
        }

        if let Some(Value::Object(map)) = params.initialization_options {
            if let Some(Value::String(config_path)) = map.get("configPath") {
                let root = self.workspace_root.read().await.clone();
                *self.config_path.write().await =
                    Self::resolve_config_path(config_path, root.as_deref());
            }
        }

        if let Err(err) = self.reload_settings().await {
            self.client
                .log_message(
                    MessageType::ERROR,
                    format!("Failed to load settings: {err:#}"),
                )
                .await;
        }

        Ok(InitializeResult {
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Kind(
                    TextDocumentSyncKind::INCREMENTAL,
                )),
                hover_provider: Some(HoverProviderCapability::Simple(true)),
                code_action_provider: Some(CodeActionProviderCapability::Options(
                    CodeActionOptions {
                        code_action_kinds: Some(vec![CodeActionKind::QUICKFIX]),
                        work_done_progress_options: WorkDoneProgressOptions {
                            work_done_progress: None,
                        },
                        resolve_provider: Some(false),
                    },
                )),
                execute_command_provider: Some(ExecuteCommandOptions {
                    commands: COMMANDS.iter().map(|c| c.to_string()).collect(),
                    work_done_progress_options: WorkDoneProgressOptions {
                        work_done_progress: None,
                    },
                }),
                ..Default::default()
            },
            server_info: Some(ServerInfo {
                name: "Proofline Language Server".to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        })
    }

    async fn initialized(&self, _params: InitializedParams) {
        self.client
            .log_message(MessageType::INFO, "Proofline LSP initialized")
            .await;
    }

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let uri = params.text_document.uri;
        self.documents.insert(
            uri.clone(),
            LspDocument::new(params.text_document.text, params.text_document.version),
        );
        self.publish_diagnostics(&uri).await;
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let uri = params.text_document.uri;
        let version = params.text_document.version;
        let removed = {
            let mut engine = self.engine.lock().await;
            let Some(mut doc) = self.documents.get_mut(&uri) else {
                return;
            };
            for change in &params.content_changes {
                let edit = doc.apply_change(change);
                engine.on_text_changed(&uri, &edit);
            }
            doc.version = version;
            engine.on_modified(doc.value_mut(), &uri)
        };
        if !removed.is_empty() {
            debug!(%uri, count = removed.len(), "problems resolved by edit");
        }
        self.publish_diagnostics(&uri).await;
    }

    async fn did_save(&self, params: DidSaveTextDocumentParams) {
        let saved_path = params.text_document.uri.to_file_path().ok();
        let config_path = self.config_path.read().await.clone();
        let is_config = saved_path
            .as_ref()
            .zip(config_path.as_ref())
            .is_some_and(|(a, b)| a == b);
        if is_config {
            self.report_reload().await;
        }
    }

    async fn did_change_configuration(&self, params: DidChangeConfigurationParams) {
        if let Value::Object(map) = params.settings {
            if let Some(Value::String(config_path)) = map.get("configPath") {
                let root = self.workspace_root.read().await.clone();
                *self.config_path.write().await =
                    Self::resolve_config_path(config_path, root.as_deref());
            }
        }
        self.report_reload().await;
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let uri = params.text_document.uri;
        self.documents.remove(&uri);
        self.engine.lock().await.close_document(&uri);
        self.client.publish_diagnostics(uri, vec![], None).await;
    }

    async fn hover(&self, params: HoverParams) -> Result<Option<Hover>> {
        let uri = params.text_document_position_params.text_document.uri;
        let position = params.text_document_position_params.position;
        let engine = self.engine.lock().await;
        let Some(doc) = self.documents.get(&uri) else {
            return Ok(None);
        };
        let point = doc.offset_at(position);
        Ok(engine.hover(&*doc, &uri, point).map(|card| Hover {
            contents: HoverContents::Markup(MarkupContent {
                kind: MarkupKind::Markdown,
                value: card.render_markdown(|link| command_link(&uri, link)),
            }),
            range: Some(doc.range_of(card.region)),
        }))
    }

    async fn code_action(&self, params: CodeActionParams) -> Result<Option<CodeActionResponse>> {
        let uri = &params.text_document.uri;
        let engine = self.engine.lock().await;
        let Some(doc) = self.documents.get(uri) else {
            return Ok(None);
        };
        let wanted = doc.region_of(params.range);
        let actions: Vec<CodeActionOrCommand> = engine
            .problems(uri)
            .iter()
            .filter(|problem| {
                let region = live_region(&*doc, problem);
                region.start <= wanted.end && wanted.start <= region.end
            })
            .flat_map(|problem| code_actions_for(uri, problem))
            .collect();

        if actions.is_empty() {
            Ok(None)
        } else {
            Ok(Some(actions))
        }
    }

    async fn execute_command(&self, params: ExecuteCommandParams) -> Result<Option<Value>> {
        match self.execute(&params.command, &params.arguments).await {
            Ok(value) => Ok(value),
            Err(err) => {
                warn!(command = %params.command, error = %format!("{err:#}"), "command failed");
                self.client
                    .show_message(MessageType::ERROR, format!("{err:#}"))
                    .await;
                Err(RpcError::invalid_params(format!("{err:#}")))
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let (filter, log) = reload::Layer::new(log_filter(false)?);
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_ansi(false))
        .init();

    let engine = Engine::new(&Settings::default())?;
    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();

    let (service, socket) = LspService::new(|client| Backend::new(client, engine, log));
    Server::new(stdin, stdout, socket).serve(service).await;
    Ok(())
}
