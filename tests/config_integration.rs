use inline_chat::config::{AppConfig, DEFAULT_SUGGESTED_PROMPTS, DialogMode};
use inline_chat::stream::LineBuffering;
use serial_test::serial;
use std::env;
use std::fs;
use std::io::Write;

// Clear environment variables that would leak into the layered config
fn clear_env_vars() {
    unsafe {
        env::remove_var("CONFIG_FILE");
        env::remove_var("CHAT_BASE_URL");
        env::remove_var("CHAT_MODEL");
        env::remove_var("INLINE_CHAT_CHAT__MODEL_ID");
        env::remove_var("INLINE_CHAT_CHAT__LINE_BUFFERING");
        env::remove_var("INLINE_CHAT_DIALOG__RECENT_MESSAGE");
    }
}

#[test]
#[serial]
fn test_default_config() {
    clear_env_vars();

    let config = AppConfig::load_from_args(["inline-chat"]).expect("defaults load");

    assert_eq!(config.mode, DialogMode::Search);
    assert_eq!(config.chat.base_url, "http://127.0.0.1:3000");
    assert_eq!(config.chat.chat_endpoint, "/api/chat");
    assert_eq!(config.chat.search_endpoint, "/api/search-chat");
    assert_eq!(config.chat.model_id, "gpt-3.5-turbo");
    assert_eq!(config.chat.line_buffering, LineBuffering::Buffered);
    assert_eq!(config.dialog.placeholder, "Search...");
    assert_eq!(config.dialog.prompt_placeholder, "Ask a question...");
    assert!(config.dialog.recent_message.is_empty());
    assert_eq!(config.dialog.suggested_prompts, DEFAULT_SUGGESTED_PROMPTS.to_vec());
}

#[test]
#[serial]
fn test_env_override() {
    clear_env_vars();
    unsafe {
        env::set_var("INLINE_CHAT_CHAT__MODEL_ID", "gpt-4o");
        env::set_var("INLINE_CHAT_CHAT__LINE_BUFFERING", "per_chunk");
        env::set_var("INLINE_CHAT_DIALOG__RECENT_MESSAGE", "How do I center a div?");
    }

    let config = AppConfig::load_from_args(["inline-chat"]).expect("Failed to load config");
    assert_eq!(config.chat.model_id, "gpt-4o");
    assert_eq!(config.chat.line_buffering, LineBuffering::PerChunk);
    assert_eq!(config.dialog.recent_message, "How do I center a div?");

    clear_env_vars();
}

#[test]
#[serial]
fn test_file_load() {
    clear_env_vars();

    let mut file = tempfile::Builder::new()
        .suffix(".yaml")
        .tempfile()
        .expect("temp file");
    write!(
        file,
        r#"
mode: inline
chat:
  base_url: "http://chat.internal:8080"
dialog:
  initial_value: "Summarize this page"
"#
    )
    .unwrap();

    let path = file.path().to_str().unwrap().to_string();
    let config = AppConfig::load_from_args(["inline-chat", "--config", &path])
        .expect("Failed to load config from file");

    assert_eq!(config.mode, DialogMode::Inline);
    assert_eq!(config.chat.base_url, "http://chat.internal:8080");
    assert_eq!(config.chat.chat_endpoint, "/api/chat");
    assert_eq!(config.dialog.initial_value, "Summarize this page");
}

#[test]
#[serial]
fn test_missing_explicit_file_is_an_error() {
    clear_env_vars();

    let result = AppConfig::load_from_args(["inline-chat", "--config", "/nonexistent/chat.yaml"]);
    assert!(result.is_err());
}

#[test]
#[serial]
fn test_cli_overrides_env() {
    clear_env_vars();
    unsafe {
        env::set_var("INLINE_CHAT_CHAT__MODEL_ID", "from-env");
    }

    let config = AppConfig::load_from_args([
        "inline-chat",
        "--model",
        "from-cli",
        "--mode",
        "inline",
        "--base-url",
        "http://localhost:4000",
    ])
    .unwrap();

    assert_eq!(config.chat.model_id, "from-cli");
    assert_eq!(config.chat.search_model_id, "from-cli");
    assert_eq!(config.mode, DialogMode::Inline);
    assert_eq!(config.chat.base_url, "http://localhost:4000");

    clear_env_vars();
}

#[test]
#[serial]
fn test_cwd_config_fallback() {
    clear_env_vars();

    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("inline-chat.yaml"),
        "dialog:\n  placeholder: \"Find anything\"\n",
    )
    .unwrap();

    let original = env::current_dir().unwrap();
    env::set_current_dir(dir.path()).unwrap();
    let config = AppConfig::load_from_args(["inline-chat"]);
    env::set_current_dir(original).unwrap();

    assert_eq!(config.unwrap().dialog.placeholder, "Find anything");
}
