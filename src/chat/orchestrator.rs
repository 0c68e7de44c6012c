//! Drives one question through a completion service and back into a session.
//!
//! Every call to [`CompletionOrchestrator::ask`] walks the same states:
//!
//! ```text
//! Pending -> Requesting -> Streaming | SingleShot -> Completed
//!                  \             \
//!                   +-------------+--> Failed
//! ```
//!
//! The user's message is recorded before the request is made, so it survives
//! any failure. The assistant's message is recorded only once the answer has
//! been fully received.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use futures::StreamExt;

use crate::chat::session::Session;
use crate::client_logger::CompletionLogger;
use crate::completion::{Completion, CompletionOptions, CompletionService, ResponseMode};
use crate::error::{Error, Result};
use crate::observability::{
    STREAM_DURATION, STREAM_HEARTBEATS, TURNS_COMPLETED, TURNS_FAILED, TURNS_INTERRUPTED,
    TURNS_STARTED,
};
use crate::prompts::PromptLookup;
use crate::types::{Model, QueryMessage};

/// Where a turn is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Pending,
    Requesting,
    Streaming,
    SingleShot,
    Completed,
    Failed,
}

impl fmt::Display for TurnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TurnState::Pending => "pending",
            TurnState::Requesting => "requesting",
            TurnState::Streaming => "streaming",
            TurnState::SingleShot => "single-shot",
            TurnState::Completed => "completed",
            TurnState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Turns questions into recorded answers.
pub struct CompletionOrchestrator<S: CompletionService> {
    service: S,
    options: CompletionOptions,
    logger: Option<Arc<dyn CompletionLogger>>,
    interrupted: Option<Arc<AtomicBool>>,
}

impl<S: CompletionService> CompletionOrchestrator<S> {
    /// An orchestrator that asks `service` with `options`.
    ///
    /// The mode in `options` is overridden per call by [`Self::ask`].
    pub fn new(service: S, options: CompletionOptions) -> Self {
        Self {
            service,
            options,
            logger: None,
            interrupted: None,
        }
    }

    /// Attach a logger that sees every payload, fragment and answer.
    pub fn with_logger(mut self, logger: Arc<dyn CompletionLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Watch `flag` while streaming; when it becomes true the turn is aborted.
    ///
    /// The flag is cleared at the start of every turn.
    pub fn with_interrupt(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupted = Some(flag);
        self
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    pub fn options(&self) -> &CompletionOptions {
        &self.options
    }

    pub fn set_model(&mut self, model: Model) {
        self.options.model = model;
    }

    pub fn set_temperature(&mut self, temperature: Option<f32>) {
        self.options.temperature = temperature;
    }

    fn is_interrupted(&self) -> bool {
        self.interrupted
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    fn transition(&self, session: &str, from: TurnState, to: TurnState) -> TurnState {
        tracing::debug!(session = %session, from = %from, to = %to, "turn transition");
        to
    }

    /// Ask `question` in `session` and record the answer.
    ///
    /// `on_progress` is called after every streamed text fragment with the
    /// answer so far and the fragment just received. It is never called in
    /// single-shot mode.
    ///
    /// On failure the user's message stays in the history and no assistant
    /// message is recorded.
    pub async fn ask(
        &self,
        session: &mut Session,
        prompts: &dyn PromptLookup,
        question: &str,
        mode: ResponseMode,
        on_progress: &mut dyn FnMut(&str, &str),
    ) -> Result<String> {
        if let Some(flag) = &self.interrupted {
            flag.store(false, Ordering::SeqCst);
        }
        TURNS_STARTED.click();

        let name = session.name().to_string();
        session.record_user_turn(question, prompts);
        let state = self.transition(&name, TurnState::Pending, TurnState::Requesting);

        let payload = session.build_query_view();
        if let Some(logger) = &self.logger {
            logger.log_request(&name, &payload);
        }

        match self.complete(&name, state, payload, mode, on_progress).await {
            Ok((state, answer)) => {
                self.transition(&name, state, TurnState::Completed);
                session.record_assistant_turn(answer.clone());
                if let Some(logger) = &self.logger {
                    logger.log_answer(&name, &answer);
                }
                TURNS_COMPLETED.click();
                Ok(answer)
            }
            Err((state, err)) => {
                self.transition(&name, state, TurnState::Failed);
                if err.is_abort() {
                    TURNS_INTERRUPTED.click();
                } else {
                    TURNS_FAILED.click();
                }
                tracing::warn!(session = %name, error = %err, "turn failed");
                Err(err)
            }
        }
    }

    async fn complete(
        &self,
        name: &str,
        state: TurnState,
        payload: Vec<QueryMessage>,
        mode: ResponseMode,
        on_progress: &mut dyn FnMut(&str, &str),
    ) -> std::result::Result<(TurnState, String), (TurnState, Error)> {
        let options = CompletionOptions {
            mode,
            ..self.options.clone()
        };
        let completion = self
            .service
            .complete(payload, &options)
            .await
            .map_err(|err| (state, err))?;

        match completion {
            Completion::Full(answer) => {
                let state = self.transition(name, state, TurnState::SingleShot);
                Ok((state, answer))
            }
            Completion::Stream(mut fragments) => {
                let state = self.transition(name, state, TurnState::Streaming);
                let started = Instant::now();
                let mut buffer = String::new();
                while let Some(fragment) = fragments.next().await {
                    if self.is_interrupted() {
                        return Err((state, Error::abort("interrupted by user")));
                    }
                    let fragment = fragment.map_err(|err| (state, err))?;
                    let Some(text) = fragment.text.filter(|text| !text.is_empty()) else {
                        STREAM_HEARTBEATS.click();
                        continue;
                    };
                    buffer.push_str(&text);
                    if let Some(logger) = &self.logger {
                        logger.log_fragment(name, &text);
                    }
                    on_progress(&buffer, &text);
                }
                STREAM_DURATION.add(started.elapsed().as_secs_f64());
                Ok((state, buffer))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::chat::session::SessionId;
    use crate::completion::Fragment;
    use crate::prompts::PromptLibrary;
    use crate::types::MessageRole;

    enum Script {
        Full(&'static str),
        Fragments(Vec<Option<&'static str>>),
        RateLimited,
        FailMidStream,
    }

    struct FakeService {
        script: Script,
        payloads: Mutex<Vec<(Vec<QueryMessage>, CompletionOptions)>>,
    }

    impl FakeService {
        fn new(script: Script) -> Self {
            Self {
                script,
                payloads: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait::async_trait]
    impl CompletionService for FakeService {
        async fn complete(
            &self,
            payload: Vec<QueryMessage>,
            options: &CompletionOptions,
        ) -> Result<Completion> {
            self.payloads
                .lock()
                .unwrap()
                .push((payload, options.clone()));
            match &self.script {
                Script::Full(text) => Ok(Completion::Full(text.to_string())),
                Script::Fragments(parts) => {
                    let items: Vec<Result<Fragment>> = parts
                        .iter()
                        .map(|part| Ok(Fragment { text: part.map(String::from) }))
                        .collect();
                    Ok(Completion::Stream(Box::pin(futures::stream::iter(items))))
                }
                Script::RateLimited => Err(Error::rate_limit("Too many requests", Some(1))),
                Script::FailMidStream => {
                    let items: Vec<Result<Fragment>> = vec![
                        Ok(Fragment::text("partial")),
                        Err(Error::streaming("connection reset", None)),
                    ];
                    Ok(Completion::Stream(Box::pin(futures::stream::iter(items))))
                }
            }
        }
    }

    #[derive(Default)]
    struct RecordingLogger {
        entries: Mutex<Vec<String>>,
    }

    impl CompletionLogger for RecordingLogger {
        fn log_request(&self, session: &str, payload: &[QueryMessage]) {
            self.entries
                .lock()
                .unwrap()
                .push(format!("request {session} {}", payload.len()));
        }

        fn log_fragment(&self, _session: &str, fragment: &str) {
            self.entries
                .lock()
                .unwrap()
                .push(format!("fragment {fragment}"));
        }

        fn log_answer(&self, _session: &str, answer: &str) {
            self.entries
                .lock()
                .unwrap()
                .push(format!("answer {answer}"));
        }
    }

    fn orchestrator(script: Script) -> CompletionOrchestrator<FakeService> {
        CompletionOrchestrator::new(
            FakeService::new(script),
            CompletionOptions::new(Model::default(), ResponseMode::SingleShot)
                .with_temperature(Some(0.7)),
        )
    }

    fn session() -> Session {
        Session::new(SessionId::new(1), "Chat01")
    }

    #[tokio::test]
    async fn streaming_assembles_fragments() {
        let orchestrator = orchestrator(Script::Fragments(vec![
            Some("Hel"),
            Some("lo"),
            Some(" world"),
        ]));
        let mut session = session();
        let mut seen = Vec::new();
        let answer = orchestrator
            .ask(
                &mut session,
                &PromptLibrary::new(),
                "hi",
                ResponseMode::Stream,
                &mut |cumulative, _| seen.push(cumulative.to_string()),
            )
            .await
            .unwrap();

        assert_eq!(answer, "Hello world");
        assert_eq!(seen, vec!["Hel", "Hello", "Hello world"]);
        assert_eq!(session.history().len(), 2);
        assert_eq!(session.history()[1].role(), MessageRole::Assistant);
        assert_eq!(session.history()[1].text(), "Hello world");
    }

    #[tokio::test]
    async fn heartbeats_are_skipped() {
        let orchestrator = orchestrator(Script::Fragments(vec![
            None,
            Some("a"),
            None,
            Some(""),
            Some("b"),
        ]));
        let mut session = session();
        let mut calls = Vec::new();
        let answer = orchestrator
            .ask(
                &mut session,
                &PromptLibrary::new(),
                "hi",
                ResponseMode::Stream,
                &mut |cumulative, fragment| {
                    calls.push((cumulative.to_string(), fragment.to_string()))
                },
            )
            .await
            .unwrap();
        assert_eq!(answer, "ab");
        assert_eq!(
            calls,
            vec![
                ("a".to_string(), "a".to_string()),
                ("ab".to_string(), "b".to_string())
            ]
        );
    }

    #[tokio::test]
    async fn single_shot_records_answer_without_progress() {
        let orchestrator = orchestrator(Script::Full("The answer"));
        let mut session = session();
        let mut calls = 0;
        let answer = orchestrator
            .ask(
                &mut session,
                &PromptLibrary::new(),
                "question",
                ResponseMode::SingleShot,
                &mut |_, _| calls += 1,
            )
            .await
            .unwrap();
        assert_eq!(answer, "The answer");
        assert_eq!(calls, 0);
        assert_eq!(session.history()[1].text(), "The answer");
        assert_eq!(session.turn_count(), 1);
    }

    #[tokio::test]
    async fn rate_limit_keeps_user_message() {
        let orchestrator = orchestrator(Script::RateLimited);
        let mut session = session();
        let before = session.turn_count();
        let err = orchestrator
            .ask(
                &mut session,
                &PromptLibrary::new(),
                "are you there?",
                ResponseMode::Stream,
                &mut |_, _| {},
            )
            .await
            .unwrap_err();

        assert!(err.is_rate_limit());
        assert_eq!(session.history().len(), 1);
        assert_eq!(session.history()[0].role(), MessageRole::User);
        assert_eq!(session.history()[0].text(), "are you there?");
        assert_eq!(session.turn_count(), before + 1);
    }

    #[tokio::test]
    async fn stream_error_records_no_partial_answer() {
        let orchestrator = orchestrator(Script::FailMidStream);
        let mut session = session();
        let err = orchestrator
            .ask(
                &mut session,
                &PromptLibrary::new(),
                "hi",
                ResponseMode::Stream,
                &mut |_, _| {},
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Streaming { .. }));
        assert_eq!(session.history().len(), 1);
    }

    #[tokio::test]
    async fn interrupt_aborts_stream() {
        let flag = Arc::new(AtomicBool::new(false));
        let orchestrator = orchestrator(Script::Fragments(vec![Some("one"), Some("two")]))
            .with_interrupt(Arc::clone(&flag));
        let mut session = session();
        let trip = Arc::clone(&flag);
        let err = orchestrator
            .ask(
                &mut session,
                &PromptLibrary::new(),
                "hi",
                ResponseMode::Stream,
                &mut |_, _| trip.store(true, Ordering::SeqCst),
            )
            .await
            .unwrap_err();
        assert!(err.is_abort());
        assert_eq!(session.history().len(), 1);
        assert_eq!(session.turn_count(), 1);
    }

    #[tokio::test]
    async fn stale_interrupt_is_cleared() {
        let flag = Arc::new(AtomicBool::new(true));
        let orchestrator = orchestrator(Script::Fragments(vec![Some("ok")]))
            .with_interrupt(Arc::clone(&flag));
        let mut session = session();
        let answer = orchestrator
            .ask(
                &mut session,
                &PromptLibrary::new(),
                "hi",
                ResponseMode::Stream,
                &mut |_, _| {},
            )
            .await
            .unwrap();
        assert_eq!(answer, "ok");
    }

    #[tokio::test]
    async fn payload_follows_context_mode_and_prompt() {
        let orchestrator = orchestrator(Script::Full("b"));
        let mut prompts = PromptLibrary::new();
        prompts.insert("assist", "TEST ASSIST");
        let mut session = session().with_prompt_name("assist");
        orchestrator
            .ask(&mut session, &prompts, "a", ResponseMode::SingleShot, &mut |_, _| {})
            .await
            .unwrap();
        session.set_contextless(true);
        orchestrator
            .ask(&mut session, &prompts, "c", ResponseMode::Stream, &mut |_, _| {})
            .await
            .unwrap();

        let payloads = orchestrator.service().payloads.lock().unwrap();
        assert_eq!(payloads[0].0, vec![QueryMessage::user("TEST ASSIST\n\na")]);
        assert_eq!(payloads[1].0, vec![QueryMessage::user("TEST ASSIST\n\nc")]);
        assert_eq!(payloads[0].1.mode, ResponseMode::SingleShot);
        assert_eq!(payloads[1].1.mode, ResponseMode::Stream);
        assert_eq!(payloads[1].1.temperature, Some(0.7));
    }

    #[tokio::test]
    async fn logger_sees_whole_exchange() {
        let logger = Arc::new(RecordingLogger::default());
        let orchestrator = orchestrator(Script::Fragments(vec![Some("x"), Some("y")]))
            .with_logger(logger.clone());
        let mut session = session();
        orchestrator
            .ask(
                &mut session,
                &PromptLibrary::new(),
                "hi",
                ResponseMode::Stream,
                &mut |_, _| {},
            )
            .await
            .unwrap();
        assert_eq!(
            *logger.entries.lock().unwrap(),
            vec!["request Chat01 1", "fragment x", "fragment y", "answer xy"]
        );
    }

    #[test]
    fn model_and_temperature_are_adjustable() {
        let mut orchestrator = orchestrator(Script::Full(""));
        orchestrator.set_model("gpt-4o".parse().unwrap());
        orchestrator.set_temperature(None);
        assert_eq!(orchestrator.options().model.to_string(), "gpt-4o");
        assert_eq!(orchestrator.options().temperature, None);
    }
}
