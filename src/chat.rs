use anyhow::{Context, Result};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::gateway::{ApiBackend, ChatRequest};
use crate::model::{Message, MessageRole};

const CONVERSATIONS_DIR: &str = "conversations";
const PREVIOUS_CONVERSATION_FILE: &str = "prev_query.json";

pub fn previous_conversation_path(config_dir: &Path) -> PathBuf {
    config_dir
        .join(CONVERSATIONS_DIR)
        .join(PREVIOUS_CONVERSATION_FILE)
}

/// Everything needed to send one chat query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatQuerier {
    pub url: String,
    pub model: String,
    pub system_prompt: String,
    pub raw: bool,
    pub reply_mode: bool,
    pub conversation_path: PathBuf,
}

impl ChatQuerier {
    pub async fn query(
        &self,
        backend: &impl ApiBackend,
        prompt: &str,
        out: &mut impl Write,
    ) -> Result<String> {
        let mut messages = self.build_messages(prompt)?;

        let completion = backend
            .chat(ChatRequest {
                url: &self.url,
                model: &self.model,
                messages: &messages,
            })
            .await?;

        if let Some(usage) = completion.usage {
            info!(
                model = %self.model,
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                total_tokens = usage.total_tokens,
                "chat token usage"
            );
        }

        messages.push(Message::assistant(completion.content.clone()));
        self.save_conversation(&messages)?;

        let written = if self.raw {
            write!(out, "{}", completion.content)
        } else {
            writeln!(out, "{}", completion.content.trim())
        };
        written.context("Failed to write chat response")?;
        out.flush().context("Failed to flush stdout")?;

        Ok(completion.content)
    }

    fn build_messages(&self, prompt: &str) -> Result<Vec<Message>> {
        let mut messages = Vec::new();
        if !self.system_prompt.trim().is_empty() {
            messages.push(Message::system(self.system_prompt.clone()));
        }
        if self.reply_mode {
            messages.extend(
                self.load_previous_conversation()?
                    .into_iter()
                    .filter(|msg| msg.role != MessageRole::System),
            );
        }
        messages.push(Message::user(prompt));
        Ok(messages)
    }

    fn load_previous_conversation(&self) -> Result<Vec<Message>> {
        let raw = match fs::read_to_string(&self.conversation_path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                warn!(
                    path = %self.conversation_path.display(),
                    "no previous conversation to reply to, starting a new one"
                );
                return Ok(Vec::new());
            }
            Err(err) => {
                return Err(err).with_context(|| {
                    format!(
                        "Failed to read previous conversation '{}'",
                        self.conversation_path.display()
                    )
                });
            }
        };

        let messages: Vec<Message> = serde_json::from_str(&raw).with_context(|| {
            format!(
                "Failed to parse previous conversation '{}'",
                self.conversation_path.display()
            )
        })?;
        debug!(message_count = messages.len(), "loaded previous conversation");
        Ok(messages)
    }

    fn save_conversation(&self, messages: &[Message]) -> Result<()> {
        if let Some(dir) = self.conversation_path.parent() {
            fs::create_dir_all(dir).with_context(|| {
                format!("Failed to create conversation directory '{}'", dir.display())
            })?;
        }
        let json = serde_json::to_string_pretty(messages).context("Failed to encode conversation")?;
        fs::write(&self.conversation_path, json).with_context(|| {
            format!(
                "Failed to save conversation '{}'",
                self.conversation_path.display()
            )
        })?;
        debug!(
            path = %self.conversation_path.display(),
            message_count = messages.len(),
            "saved conversation"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::io;
    use std::path::Path;

    use super::{ChatQuerier, previous_conversation_path};
    use crate::gateway::stub::StubBackend;
    use crate::model::{Message, MessageRole};

    fn querier(config_dir: &Path, raw: bool, reply_mode: bool) -> ChatQuerier {
        ChatQuerier {
            url: "http://api/v1/chat/completions".to_string(),
            model: "gpt-4o".to_string(),
            system_prompt: "be brief".to_string(),
            raw,
            reply_mode,
            conversation_path: previous_conversation_path(config_dir),
        }
    }

    #[tokio::test]
    async fn query_sends_system_and_user_messages() {
        let dir = tempfile::tempdir().expect("temp dir should be created");
        let backend = StubBackend::chat_reply("  hello there \n");
        let mut out = Vec::new();

        let reply = querier(dir.path(), false, false)
            .query(&backend, "hi", &mut out)
            .await
            .expect("query should succeed");

        assert_eq!(reply, "  hello there \n");
        assert_eq!(String::from_utf8(out).unwrap(), "hello there\n");

        let chats = backend.chats.borrow();
        assert_eq!(chats.len(), 1);
        assert_eq!(chats[0].url, "http://api/v1/chat/completions");
        assert_eq!(chats[0].model, "gpt-4o");
        assert_eq!(
            chats[0].messages,
            vec![Message::system("be brief"), Message::user("hi")]
        );
    }

    #[tokio::test]
    async fn raw_mode_prints_content_verbatim() {
        let dir = tempfile::tempdir().expect("temp dir should be created");
        let backend = StubBackend::chat_reply("**bold**  ");
        let mut out = Vec::new();

        querier(dir.path(), true, false)
            .query(&backend, "hi", &mut out)
            .await
            .expect("query should succeed");

        assert_eq!(String::from_utf8(out).unwrap(), "**bold**  ");
    }

    #[tokio::test]
    async fn query_saves_conversation_including_reply() {
        let dir = tempfile::tempdir().expect("temp dir should be created");
        let backend = StubBackend::chat_reply("4");
        let chat = querier(dir.path(), false, false);

        chat.query(&backend, "2+2?", &mut io::sink())
            .await
            .expect("query should succeed");

        let saved: Vec<Message> = serde_json::from_str(
            &fs::read_to_string(&chat.conversation_path).expect("conversation should exist"),
        )
        .expect("conversation should parse");
        assert_eq!(
            saved,
            vec![
                Message::system("be brief"),
                Message::user("2+2?"),
                Message::assistant("4"),
            ]
        );
    }

    #[tokio::test]
    async fn reply_mode_includes_previous_conversation() {
        let dir = tempfile::tempdir().expect("temp dir should be created");
        let first = StubBackend::chat_reply("4");
        querier(dir.path(), false, false)
            .query(&first, "2+2?", &mut io::sink())
            .await
            .expect("first query should succeed");

        let second = StubBackend::chat_reply("8");
        querier(dir.path(), false, true)
            .query(&second, "times two?", &mut io::sink())
            .await
            .expect("reply should succeed");

        let chats = second.chats.borrow();
        let sent = &chats[0].messages;
        assert_eq!(
            sent,
            &vec![
                Message::system("be brief"),
                Message::user("2+2?"),
                Message::assistant("4"),
                Message::user("times two?"),
            ]
        );
        assert_eq!(
            sent.iter()
                .filter(|msg| msg.role == MessageRole::System)
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn reply_mode_without_history_starts_fresh() {
        let dir = tempfile::tempdir().expect("temp dir should be created");
        let backend = StubBackend::chat_reply("hi");

        querier(dir.path(), false, true)
            .query(&backend, "hello", &mut io::sink())
            .await
            .expect("reply without history should succeed");

        assert_eq!(backend.chats.borrow()[0].messages.len(), 2);
    }

    #[tokio::test]
    async fn reply_mode_reports_corrupt_history() {
        let dir = tempfile::tempdir().expect("temp dir should be created");
        let chat = querier(dir.path(), false, true);
        fs::create_dir_all(chat.conversation_path.parent().unwrap()).unwrap();
        fs::write(&chat.conversation_path, "not json").unwrap();
        let backend = StubBackend::chat_reply("unused");

        let err = chat
            .query(&backend, "hello", &mut io::sink())
            .await
            .expect_err("corrupt history should fail");

        assert!(format!("{err:#}").contains("Failed to parse previous conversation"));
        assert!(backend.chats.borrow().is_empty());
    }

    #[tokio::test]
    async fn backend_errors_do_not_overwrite_history() {
        let dir = tempfile::tempdir().expect("temp dir should be created");
        let backend = StubBackend::err("quota exceeded");
        let chat = querier(dir.path(), false, false);

        let err = chat
            .query(&backend, "hello", &mut io::sink())
            .await
            .expect_err("backend failure should propagate");

        assert!(format!("{err:#}").contains("quota exceeded"));
        assert!(!chat.conversation_path.exists());
    }
}
