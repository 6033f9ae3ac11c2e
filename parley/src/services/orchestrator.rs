use std::sync::Arc;

use async_stream::try_stream;
use futures::StreamExt;

use crate::error::Result;
use crate::knowledge::KnowledgeRetriever;
use crate::llm::{ChatCompletion, ChatOptions, InferenceConnector, TokenStream};
use crate::models::ConversationTurn;
use crate::services::ConversationStateStore;

/// One user prompt headed into a conversation.
#[derive(Debug, Clone)]
pub struct ExchangeRequest {
    pub conversation_id: String,
    pub prompt: String,
    pub system_override: Option<String>,
    pub options: Option<ChatOptions>,
}

/// Drives a single exchange through its phases: load history, optionally
/// augment with retrieved context, stream the model response while
/// checkpointing partial state, then persist the completed pair.
///
/// Callers are expected to serialize writes per conversation id; the
/// orchestrator itself takes no locks.
#[derive(Clone)]
pub struct ChatOrchestrator {
    state_store: ConversationStateStore,
    connector: Arc<dyn InferenceConnector>,
    retriever: Option<Arc<KnowledgeRetriever>>,
    checkpoint_every: usize,
}

impl ChatOrchestrator {
    pub fn new(
        state_store: ConversationStateStore,
        connector: Arc<dyn InferenceConnector>,
        retriever: Option<Arc<KnowledgeRetriever>>,
        checkpoint_every: usize,
    ) -> Self {
        Self {
            state_store,
            connector,
            retriever,
            checkpoint_every,
        }
    }

    /// Streams one exchange. Token deltas are yielded as they arrive; a
    /// mid-stream failure still checkpoints the partial assistant turn to
    /// cache before the error reaches the caller. The durable write of the
    /// prompt/response pair is spawned after a successful stream and never
    /// awaited here.
    pub fn stream_exchange(&self, request: ExchangeRequest) -> TokenStream {
        let this = self.clone();

        Box::pin(try_stream! {
            let ExchangeRequest {
                conversation_id,
                prompt,
                system_override,
                options,
            } = request;

            let mut turns = this.state_store.load(&conversation_id).await?;
            this.augment(&mut turns, &conversation_id, &prompt).await;

            if let Some(instruction) = system_override.filter(|s| !s.trim().is_empty()) {
                turns.push(ConversationTurn::system(instruction));
            }

            let prompt_turn = ConversationTurn::user(prompt);
            turns.push(prompt_turn.clone());

            let mut inner = this
                .connector
                .stream_chat(&turns, options.as_ref())
                .await?;

            let mut assistant_content = String::new();
            let mut token_count: usize = 0;
            let mut stream_error = None;
            let mut checkpoint: Option<tokio::task::JoinHandle<()>> = None;

            while let Some(item) = inner.next().await {
                match item {
                    Ok(delta) => {
                        assistant_content.push_str(&delta.content);
                        token_count += 1;

                        if this.checkpoint_every > 0 && token_count % this.checkpoint_every == 0 {
                            checkpoint = Some(this.spawn_checkpoint(
                                &conversation_id,
                                &turns,
                                &assistant_content,
                                checkpoint.take(),
                            ));
                        }

                        yield delta;
                    }
                    Err(error) => {
                        stream_error = Some(error);
                        break;
                    }
                }
            }

            let response_turn = ConversationTurn::assistant(assistant_content);
            let mut full_sequence = turns;
            full_sequence.push(response_turn.clone());

            // A checkpoint still in flight must land before the final save,
            // or a slow cache write would overwrite the complete sequence
            // with a stale partial one.
            if let Some(handle) = checkpoint.take() {
                let _ = handle.await;
            }

            if let Err(error) = this.state_store.save(&conversation_id, &full_sequence).await {
                tracing::warn!(conversation_id, %error, "Final state checkpoint failed");
            }

            if let Some(error) = stream_error {
                tracing::warn!(conversation_id, %error, "Stream ended with error after {token_count} tokens");
                Err(error)?;
            } else {
                this.spawn_persist(&conversation_id, prompt_turn, response_turn);
            }
        })
    }

    /// Non-streaming variant: one chat call instead of a token stream, same
    /// surrounding phases.
    pub async fn complete_exchange(&self, request: ExchangeRequest) -> Result<ChatCompletion> {
        let ExchangeRequest {
            conversation_id,
            prompt,
            system_override,
            options,
        } = request;

        let mut turns = self.state_store.load(&conversation_id).await?;
        self.augment(&mut turns, &conversation_id, &prompt).await;

        if let Some(instruction) = system_override.filter(|s| !s.trim().is_empty()) {
            turns.push(ConversationTurn::system(instruction));
        }

        let prompt_turn = ConversationTurn::user(prompt);
        turns.push(prompt_turn.clone());

        let completion = self.connector.chat(&turns, options.as_ref()).await?;

        let response_turn = ConversationTurn::assistant(completion.content.clone());
        let mut full_sequence = turns;
        full_sequence.push(response_turn.clone());

        if let Err(error) = self.state_store.save(&conversation_id, &full_sequence).await {
            tracing::warn!(conversation_id, %error, "Final state checkpoint failed");
        }

        self.spawn_persist(&conversation_id, prompt_turn, response_turn);

        Ok(completion)
    }

    /// Retrieval is policy controlled and best effort. No matches, or a
    /// disabled retriever, leaves the turn sequence untouched.
    async fn augment(&self, turns: &mut Vec<ConversationTurn>, conversation_id: &str, prompt: &str) {
        let Some(retriever) = &self.retriever else {
            return;
        };

        let matches = retriever.retrieve(conversation_id, prompt).await;
        if let Some(context) = KnowledgeRetriever::format_context(&matches) {
            tracing::debug!(
                conversation_id,
                matches = matches.len(),
                "Augmenting with retrieved context"
            );
            turns.push(ConversationTurn::system(context));
        }
    }

    /// Best-effort cache checkpoint on a spawned task so the token loop is
    /// never delayed by cache latency. Each task waits for the previous
    /// checkpoint, keeping cache writes in dispatch order.
    fn spawn_checkpoint(
        &self,
        conversation_id: &str,
        turns: &[ConversationTurn],
        partial: &str,
        previous: Option<tokio::task::JoinHandle<()>>,
    ) -> tokio::task::JoinHandle<()> {
        let state_store = self.state_store.clone();
        let conversation_id = conversation_id.to_string();
        let mut snapshot = turns.to_vec();
        snapshot.push(ConversationTurn::assistant(partial));

        tokio::spawn(async move {
            if let Some(previous) = previous {
                let _ = previous.await;
            }
            if let Err(error) = state_store.save(&conversation_id, &snapshot).await {
                tracing::warn!(conversation_id, %error, "Stream checkpoint failed");
            }
        })
    }

    /// Fire-and-forget durable write of one completed exchange. The caller's
    /// stream has already finished; failures here are logged, not surfaced.
    fn spawn_persist(
        &self,
        conversation_id: &str,
        prompt_turn: ConversationTurn,
        response_turn: ConversationTurn,
    ) {
        let state_store = self.state_store.clone();
        let conversation_id = conversation_id.to_string();

        tokio::spawn(async move {
            let user_id = match state_store.get_conversation(&conversation_id).await {
                Ok(Some(conversation)) => conversation.user_id,
                Ok(None) => {
                    tracing::warn!(conversation_id, "Conversation vanished before persistence");
                    return;
                }
                Err(error) => {
                    tracing::error!(conversation_id, %error, "Failed to load conversation for persistence");
                    return;
                }
            };

            if let Err(error) = state_store
                .save_exchange(&conversation_id, &user_id, &prompt_turn, &response_turn)
                .await
            {
                tracing::error!(conversation_id, %error, "Durable exchange persistence failed");
            }
        });
    }
}
