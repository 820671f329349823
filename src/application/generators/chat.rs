//! 写作助手对话（流式）

use serde::Deserialize;
use std::sync::Arc;
use tokio::time::Instant;
use uuid::Uuid;

use super::prompts;
use super::{GenerationPipeline, GeneratorSettings};
use crate::application::context::ContextAssembler;
use crate::application::error::ApplicationError;
use crate::application::ports::{ChatMessage, CompletionStream, LanguageModelPort, Role};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChatRequest {
    pub novel_id: Option<Uuid>,
    pub messages: Vec<ChatMessage>,
}

pub struct ChatGenerator {
    pipeline: GenerationPipeline,
    context: Arc<ContextAssembler>,
}

impl ChatGenerator {
    pub fn new(
        llm: Arc<dyn LanguageModelPort>,
        settings: GeneratorSettings,
        context: Arc<ContextAssembler>,
    ) -> Self {
        Self {
            pipeline: GenerationPipeline::new("chat", llm, settings),
            context,
        }
    }

    /// 指定的小说不存在时直接返回 NotFound
    pub async fn stream(
        &self,
        request: ChatRequest,
        deadline: Instant,
    ) -> Result<CompletionStream, ApplicationError> {
        if !request.messages.iter().any(|m| m.role == Role::User) {
            return Err(ApplicationError::validation("conversation has no user message"));
        }

        let mut conversation = vec![ChatMessage::system(prompts::CHAT_SYSTEM)];
        conversation.extend(request.messages);

        let messages = match request.novel_id {
            Some(novel_id) => self.context.with_context(novel_id, conversation).await?,
            None => conversation,
        };
        self.pipeline.stream(messages, deadline).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::generators::test_support::{context_assembler, far_deadline, scripted};

    #[tokio::test]
    async fn test_unknown_novel_is_fatal() {
        let model = scripted(&["hello"]);
        let generator = ChatGenerator::new(model.clone(), GeneratorSettings::default(), context_assembler().await);
        let result = generator
            .stream(
                ChatRequest {
                    novel_id: Some(Uuid::new_v4()),
                    messages: vec![ChatMessage::user("Who is Mira?")],
                },
                far_deadline(),
            )
            .await;
        assert!(matches!(result, Err(ApplicationError::NotFound { .. })));
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn test_requires_user_message() {
        let generator = ChatGenerator::new(scripted(&[]), GeneratorSettings::default(), context_assembler().await);
        let result = generator
            .stream(
                ChatRequest {
                    novel_id: None,
                    messages: vec![ChatMessage::assistant("Hi")],
                },
                far_deadline(),
            )
            .await;
        assert!(matches!(result, Err(ApplicationError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_system_prompt_leads_conversation() {
        let model = scripted(&["Sure."]);
        let generator = ChatGenerator::new(model.clone(), GeneratorSettings::default(), context_assembler().await);
        let _stream = generator
            .stream(
                ChatRequest {
                    novel_id: None,
                    messages: vec![ChatMessage::user("Name a villain")],
                },
                far_deadline(),
            )
            .await
            .unwrap();

        let sent = model.last_messages();
        assert_eq!(sent[0].role, Role::System);
        assert_eq!(sent[1].content, "Name a villain");
    }
}
