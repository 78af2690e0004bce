mod common;

use codeloom::constants::AI_FAILURE_PREFIX;
use codeloom::*;
use common::*;
use std::sync::Arc;

const MULTI_FILE_REPLY: &str = "Here you go:\n\
```html\n<h1>Hi</h1>\n<script src=\"script.js\"></script>\n```\n\
```css\nh1 { color: red; }\n```\n\
```javascript\nconsole.log('hi');\n```\n";

fn list(dir: &std::path::Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn multi_file_sections_round_trip_through_disk() {
    let h = Harness::new(Arc::new(ScriptedModel::replying(MULTI_FILE_REPLY)), None).await;

    let dir = h
        .facade
        .generate(AppId(11), "hello page", GenerationType::MultiFile)
        .await
        .unwrap();
    assert_eq!(dir, h.root.path().join("multi_file_11"));
    assert_eq!(
        read(&dir, "index.html").as_deref(),
        Some("<h1>Hi</h1>\n<script src=\"script.js\"></script>")
    );
    assert_eq!(read(&dir, "style.css").as_deref(), Some("h1 { color: red; }"));
    assert_eq!(read(&dir, "script.js").as_deref(), Some("console.log('hi');"));
}

#[tokio::test]
async fn regenerating_overwrites_in_place() {
    let h = Harness::new(Arc::new(ScriptedModel::replying(MULTI_FILE_REPLY)), None).await;

    let first = h
        .facade
        .generate(AppId(12), "hello page", GenerationType::MultiFile)
        .await
        .unwrap();
    let before: Vec<(String, Option<String>)> = list(&first)
        .into_iter()
        .map(|n| (n.clone(), read(&first, &n)))
        .collect();

    let second = h
        .facade
        .generate(AppId(12), "hello page", GenerationType::MultiFile)
        .await
        .unwrap();
    assert_eq!(first, second);
    let after: Vec<(String, Option<String>)> = list(&second)
        .into_iter()
        .map(|n| (n.clone(), read(&second, &n)))
        .collect();
    assert_eq!(before, after);
}

#[tokio::test]
async fn missing_markup_is_validation_error_and_nothing_is_written() {
    let reply = "```css\nbody { margin: 0; }\n```";
    let h = Harness::new(Arc::new(ScriptedModel::replying(reply)), None).await;

    let err = h
        .facade
        .generate(AppId(13), "styles only", GenerationType::MultiFile)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(!h.root.path().join("multi_file_13").exists());

    // The model did answer, so its text is what gets recorded.
    let turns = h.turns(AppId(13)).await;
    assert_eq!(turns[1].text, reply);
}

#[tokio::test]
async fn upstream_failure_is_returned_and_recorded() {
    let h = Harness::new(Arc::new(ScriptedModel::replying("!fail")), None).await;

    let err = h
        .facade
        .generate(AppId(14), "anything", GenerationType::SingleFile)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UpstreamModel);

    let turns = h.turns(AppId(14)).await;
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0].text, "anything");
    assert!(turns[1].text.starts_with(AI_FAILURE_PREFIX));
    assert!(turns[1].text.contains("backend unavailable"));
}

#[tokio::test]
async fn tool_driven_type_is_stream_only() {
    let h = Harness::new(Arc::new(ScriptedModel::replying("x")), None).await;
    let err = h
        .facade
        .generate(AppId(15), "vue app", GenerationType::ToolDrivenProject)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert!(h.turns(AppId(15)).await.is_empty());
}

#[tokio::test]
async fn blank_message_is_rejected_before_anything_runs() {
    let h = Harness::new(Arc::new(ScriptedModel::replying("<p/>")), None).await;
    let err = h
        .facade
        .generate(AppId(16), "   ", GenerationType::SingleFile)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(h.turns(AppId(16)).await.is_empty());
}

#[tokio::test]
async fn session_window_carries_prior_turns() {
    let chat = Arc::new(ScriptedModel::replying("<p>v1</p>"));
    let h = Harness::new(chat.clone(), None).await;

    h.facade
        .generate(AppId(17), "first", GenerationType::SingleFile)
        .await
        .unwrap();
    h.facade
        .generate(AppId(17), "second", GenerationType::SingleFile)
        .await
        .unwrap();

    let requests = chat.requests.lock().unwrap();
    assert_eq!(requests.len(), 2);
    let contents: Vec<&str> = requests[1]
        .messages
        .iter()
        .map(|m| m.content.as_str())
        .collect();
    assert_eq!(contents, vec!["first", "<p>v1</p>", "second"]);
}

#[tokio::test]
async fn delete_app_clears_history_and_sessions() {
    let h = Harness::new(Arc::new(ScriptedModel::replying("<p/>")), None).await;
    h.facade
        .generate(AppId(18), "make it", GenerationType::SingleFile)
        .await
        .unwrap();
    assert!(h.facade.sessions().contains(AppId(18), GenerationType::SingleFile).await);

    let removed = h.facade.delete_app(AppId(18)).await.unwrap();
    assert_eq!(removed, 2);
    assert!(h.turns(AppId(18)).await.is_empty());
    assert!(!h.facade.sessions().contains(AppId(18), GenerationType::SingleFile).await);
}

#[tokio::test]
async fn upstream_failure_keeps_the_window_alternating() {
    let chat = Arc::new(ScriptedModel::replying("!fail"));
    let h = Harness::new(chat.clone(), None).await;

    for prompt in ["first", "second"] {
        let err = h
            .facade
            .generate(AppId(19), prompt, GenerationType::SingleFile)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UpstreamModel);
    }

    let requests = chat.requests.lock().unwrap();
    let roles: Vec<ChatRole> = requests[1].messages.iter().map(|m| m.role).collect();
    assert_eq!(roles, vec![ChatRole::User, ChatRole::Ai, ChatRole::User]);
    assert!(requests[1].messages[1]
        .content
        .starts_with(AI_FAILURE_PREFIX));
}

#[tokio::test]
async fn blank_single_file_reply_is_validation_error_without_directory() {
    let h = Harness::new(Arc::new(ScriptedModel::replying("```html\n   \n```")), None).await;
    let err = h
        .facade
        .generate(AppId(20), "empty page", GenerationType::SingleFile)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(!h.root.path().join("html_20").exists());
}

#[tokio::test]
async fn truncated_reply_still_saves_its_markup() {
    let reply = "Here it is:\n```html\n<main>cut off by the token limit";
    let h = Harness::new(Arc::new(ScriptedModel::replying(reply)), None).await;
    let dir = h
        .facade
        .generate(AppId(21), "long page", GenerationType::MultiFile)
        .await
        .unwrap();
    assert_eq!(
        read(&dir, "index.html").as_deref(),
        Some("<main>cut off by the token limit")
    );
}
