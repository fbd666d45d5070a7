mod common;

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

use askdoc::config::Config;
use askdoc::error::PipelineError;
use askdoc::models::{RouteLabel, Role};
use askdoc::progress::{IngestProgressEvent, NoProgress};
use askdoc::session::SessionState;

use common::{HashEmbedder, RecordingProgress, ScriptedModel, COURSE};

fn write_doc(tmp: &TempDir, name: &str, body: &str) -> PathBuf {
    let path = tmp.path().join(name);
    fs::write(&path, body).unwrap();
    path
}

async fn loaded_session(
    model: Arc<ScriptedModel>,
    embedder: Arc<HashEmbedder>,
) -> (TempDir, SessionState) {
    let tmp = TempDir::new().unwrap();
    let path = write_doc(&tmp, "course.txt", COURSE);
    let mut session = SessionState::new();
    session
        .initialize(&Config::minimal(), &path, model, embedder, &NoProgress)
        .await
        .unwrap();
    (tmp, session)
}

#[tokio::test]
async fn test_chat_question_gets_raw_question_only() {
    let model = Arc::new(ScriptedModel::course());
    let (_tmp, mut session) = loaded_session(model.clone(), Arc::default()).await;

    let answer = session.ask("How are you?").await.unwrap();

    assert_eq!(answer.route, RouteLabel::Chat);
    assert_eq!(model.answer_prompts(), vec!["How are you?".to_string()]);
}

#[tokio::test]
async fn test_local_question_gets_week_2_segment() {
    let model = Arc::new(ScriptedModel::course());
    let (_tmp, mut session) = loaded_session(model.clone(), Arc::default()).await;

    let answer = session.ask("What is covered in week 2?").await.unwrap();

    assert_eq!(answer.route, RouteLabel::Local);
    let prompts = model.answer_prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].starts_with("You are a helpful assistant."));
    let context = prompts[0]
        .split("Context:\n")
        .nth(1)
        .and_then(|rest| rest.split("\n\nQuestion:\n").next())
        .unwrap();
    assert!(context.contains("Week 2"), "context was: {context}");
    assert!(prompts[0].ends_with("What is covered in week 2?\n"));
}

#[tokio::test]
async fn test_global_question_gets_full_document() {
    let model = Arc::new(ScriptedModel::course());
    let (_tmp, mut session) = loaded_session(model.clone(), Arc::default()).await;

    let answer = session.ask("What is the total duration?").await.unwrap();

    assert_eq!(answer.route, RouteLabel::Global);
    let prompts = model.answer_prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains(&format!("Document:\n{}\n", COURSE)));
    assert!(prompts[0].ends_with("Answer:\n"));
}

#[tokio::test]
async fn test_unrecognised_label_routes_local() {
    let model = Arc::new(ScriptedModel::course());
    let (_tmp, mut session) = loaded_session(model.clone(), Arc::default()).await;

    let answer = session.ask("Is there a banana?").await.unwrap();

    assert_eq!(answer.route, RouteLabel::Local);
    assert!(model.answer_prompts()[0].contains("Context:\n"));
}

#[tokio::test]
async fn test_classifier_and_strategy_run_once_per_question() {
    let model = Arc::new(ScriptedModel::course());
    let (_tmp, mut session) = loaded_session(model.clone(), Arc::default()).await;

    session.ask("How are you?").await.unwrap();
    session.ask("What is covered in week 2?").await.unwrap();
    session.ask("What is the total duration?").await.unwrap();

    assert_eq!(model.classify_calls(), 3);
    assert_eq!(model.answer_prompts().len(), 3);
    assert_eq!(model.prompts().len(), 6);
}

#[tokio::test]
async fn test_answer_text_is_returned_verbatim() {
    let model = Arc::new(ScriptedModel::course());
    let (_tmp, mut session) = loaded_session(model.clone(), Arc::default()).await;

    let answer = session.ask("How are you?").await.unwrap();
    // Classifier prompt is call 1, the chat reply is call 2.
    assert_eq!(answer.text, "answer 2\n");
}

#[tokio::test]
async fn test_reinitialising_gives_same_route_and_context() {
    let first = Arc::new(ScriptedModel::course());
    let second = Arc::new(ScriptedModel::course());
    let (_t1, mut a) = loaded_session(first.clone(), Arc::default()).await;
    let (_t2, mut b) = loaded_session(second.clone(), Arc::default()).await;

    let ra = a.ask("What is covered in week 2?").await.unwrap();
    let rb = b.ask("What is covered in week 2?").await.unwrap();

    assert_eq!(ra.route, rb.route);
    assert_eq!(first.answer_prompts(), second.answer_prompts());
}

#[tokio::test]
async fn test_reset_clears_everything() {
    let model = Arc::new(ScriptedModel::course());
    let (_tmp, mut session) = loaded_session(model.clone(), Arc::default()).await;
    session.ask("How are you?").await.unwrap();
    assert_eq!(session.transcript().len(), 2);

    session.reset();

    assert!(!session.is_initialized());
    assert!(session.transcript().is_empty());
    let err = session.ask("How are you?").await.unwrap_err();
    assert!(matches!(err, PipelineError::NotInitialized));
    assert!(session.transcript().is_empty());
}

#[tokio::test]
async fn test_ask_before_initialize_is_not_initialized() {
    let mut session = SessionState::new();
    let err = session.ask("hello").await.unwrap_err();
    assert!(matches!(err, PipelineError::NotInitialized));
    assert_eq!(err.code(), "not_initialized");
}

#[tokio::test]
async fn test_empty_document_is_ingest_error_without_indexing() {
    let tmp = TempDir::new().unwrap();
    let path = write_doc(&tmp, "blank.txt", "   \n\n\t ");
    let embedder = Arc::new(HashEmbedder::default());
    let mut session = SessionState::new();

    let err = session
        .initialize(
            &Config::minimal(),
            &path,
            Arc::new(ScriptedModel::course()),
            embedder.clone(),
            &NoProgress,
        )
        .await
        .err()
        .unwrap();

    assert!(matches!(err, PipelineError::Ingest { .. }));
    assert_eq!(embedder.calls(), 0);
    assert!(!session.is_initialized());
}

#[tokio::test]
async fn test_failed_load_drops_previous_document() {
    let model = Arc::new(ScriptedModel::course());
    let (tmp, mut session) = loaded_session(model.clone(), Arc::default()).await;
    session.ask("How are you?").await.unwrap();

    let missing = tmp.path().join("missing.pdf");
    let result = session
        .initialize(
            &Config::minimal(),
            &missing,
            model,
            Arc::new(HashEmbedder::default()),
            &NoProgress,
        )
        .await;

    assert!(matches!(result, Err(PipelineError::Ingest { .. })));
    assert!(!session.is_initialized());
    assert!(session.transcript().is_empty());
}

#[tokio::test]
async fn test_transcript_records_turns_in_order() {
    let model = Arc::new(ScriptedModel::course());
    let (_tmp, mut session) = loaded_session(model, Arc::default()).await;

    session.ask("How are you?").await.unwrap();
    session.ask("What is the total duration?").await.unwrap();

    let turns = session.transcript().turns();
    let roles: Vec<Role> = turns.iter().map(|t| t.role).collect();
    assert_eq!(
        roles,
        vec![Role::User, Role::Assistant, Role::User, Role::Assistant]
    );
    assert_eq!(turns[0].text, "How are you?");
    assert_eq!(turns[2].text, "What is the total duration?");
    assert!(turns[0].at <= turns[3].at);
}

#[tokio::test]
async fn test_classification_failure_surfaces() {
    let model = Arc::new(ScriptedModel::failing_classifier());
    let (_tmp, mut session) = loaded_session(model.clone(), Arc::default()).await;

    let err = session.ask("How are you?").await.unwrap_err();

    assert!(matches!(err, PipelineError::Classification(_)));
    assert!(model.answer_prompts().is_empty());
    // Session stays usable after a per-question failure.
    assert!(session.is_initialized());
}

#[tokio::test]
async fn test_strategy_failure_keeps_user_turn_only() {
    let model = Arc::new(ScriptedModel::failing_answers());
    let (_tmp, mut session) = loaded_session(model, Arc::default()).await;

    let err = session.ask("What is the total duration?").await.unwrap_err();

    match err {
        PipelineError::Strategy { route, message } => {
            assert_eq!(route, RouteLabel::Global);
            assert!(message.contains("500"));
        }
        other => panic!("expected strategy error, got {other:?}"),
    }
    assert_eq!(session.transcript().len(), 1);
    assert_eq!(session.transcript().turns()[0].role, Role::User);
}

#[tokio::test]
async fn test_small_segments_are_batched_and_reported() {
    let tmp = TempDir::new().unwrap();
    let body = (1..=30)
        .map(|i| format!("Week {i}: topic number {i} covers chapter {i} in detail."))
        .collect::<Vec<_>>()
        .join("\n");
    let path = write_doc(&tmp, "long.md", &body);

    let mut config = Config::minimal();
    config.chunking.max_chars = 120;
    config.chunking.overlap_chars = 20;
    config.embedding.batch_size = 4;

    let embedder = Arc::new(HashEmbedder::default());
    let progress = RecordingProgress::default();
    let mut session = SessionState::new();
    let pipeline = session
        .initialize(
            &config,
            &path,
            Arc::new(ScriptedModel::course()),
            embedder.clone(),
            &progress,
        )
        .await
        .unwrap();

    let segments = pipeline.index().len();
    assert!(segments > 4);
    assert_eq!(embedder.calls(), segments.div_ceil(4));
    assert!(pipeline
        .index()
        .segments()
        .iter()
        .all(|s| s.text.chars().count() <= 120));

    let events = progress.events();
    assert!(matches!(events[0], IngestProgressEvent::Extracting { .. }));
    assert_eq!(events[1], IngestProgressEvent::Splitting { pages: 1 });
    assert_eq!(
        events.last(),
        Some(&IngestProgressEvent::Ready {
            segments: segments as u64
        })
    );
    let embedding_events = events
        .iter()
        .filter(|e| matches!(e, IngestProgressEvent::Embedding { .. }))
        .count();
    assert_eq!(embedding_events, segments.div_ceil(4));
}

#[tokio::test]
async fn test_local_retrieval_respects_k() {
    let tmp = TempDir::new().unwrap();
    let body = (1..=30)
        .map(|i| format!("Week {i}: topic number {i} covers chapter {i} in detail."))
        .collect::<Vec<_>>()
        .join("\n");
    let path = write_doc(&tmp, "long.md", &body);

    let mut config = Config::minimal();
    config.chunking.max_chars = 120;
    config.chunking.overlap_chars = 20;
    config.retrieval.k = 2;
    config.retrieval.fetch_k = 5;

    let model = Arc::new(ScriptedModel::course());
    let mut session = SessionState::new();
    session
        .initialize(
            &config,
            &path,
            model.clone(),
            Arc::new(HashEmbedder::default()),
            &NoProgress,
        )
        .await
        .unwrap();

    session.ask("What is covered in week 2?").await.unwrap();

    let prompt = &model.answer_prompts()[0];
    let context = prompt
        .split("Context:\n")
        .nth(1)
        .and_then(|rest| rest.split("\n\nQuestion:\n").next())
        .unwrap();
    // Two retrieved segments joined by one blank line.
    assert_eq!(context.matches("\n\n").count(), 1);
}
