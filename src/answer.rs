//! Answering-service boundary.
//!
//! The service turns (table snapshot, question) into a natural-language
//! answer. The HTTP implementation speaks the chat-completions protocol with
//! an explicit timeout; every failure comes back as a [`ServiceError`] so the
//! caller can show it and carry on.

use std::time::Duration;

use log::debug;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{config::ServiceConfig, frame::SurveyTable};

const SYSTEM_PROMPT: &str = "Você é um assistente que analisa os dados da pesquisa com produtores de \
mandioca e macaxeira de Juruti (projeto Maniva Tapajós). Responda em português, de forma objetiva, \
usando apenas os dados fornecidos. Se os dados não permitirem responder, diga que não há dados.";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("no credential provided; pass --api-key or set {env}")]
    MissingCredential { env: String },
    #[error("the answering service did not respond within {secs}s")]
    Timeout { secs: u64 },
    #[error("the answering service rejected the request ({status}): {body}")]
    Http { status: u16, body: String },
    #[error("could not reach the answering service: {0}")]
    Transport(String),
    #[error("unexpected answering service response: {0}")]
    MalformedResponse(String),
    #[error("could not prepare the survey context: {0}")]
    Context(String),
}

pub trait AnsweringService {
    fn answer(&self, table: &SurveyTable, question: &str) -> Result<String, ServiceError>;
}

/// `--api-key` wins over the configured environment variable; blank values
/// count as absent.
pub fn resolve_credential(
    provided: Option<&str>,
    config: &ServiceConfig,
) -> Result<String, ServiceError> {
    provided
        .map(str::to_string)
        .or_else(|| std::env::var(&config.credential_env).ok())
        .map(|key| key.trim().to_string())
        .filter(|key| !key.is_empty())
        .ok_or_else(|| ServiceError::MissingCredential {
            env: config.credential_env.clone(),
        })
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: String,
    pub content: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f64,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: ChatMessage,
}

pub fn build_request(
    table: &SurveyTable,
    question: &str,
    config: &ServiceConfig,
) -> Result<CompletionRequest, ServiceError> {
    let context = table
        .to_csv_string(b',', Some(config.max_context_rows))
        .map_err(|err| ServiceError::Context(format!("{err:#}")))?;
    let shown = table.row_count().min(config.max_context_rows);
    let user = format!(
        "Dados da pesquisa em CSV ({shown} de {} produtores):\n{context}\nPergunta: {}",
        table.row_count(),
        question.trim()
    );
    Ok(CompletionRequest {
        model: config.model.clone(),
        messages: vec![
            ChatMessage {
                role: "system".to_string(),
                content: Some(SYSTEM_PROMPT.to_string()),
            },
            ChatMessage {
                role: "user".to_string(),
                content: Some(user),
            },
        ],
        temperature: 0.0,
    })
}

pub fn parse_completion(body: &str) -> Result<String, ServiceError> {
    let response: CompletionResponse = serde_json::from_str(body)
        .map_err(|err| ServiceError::MalformedResponse(err.to_string()))?;
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .map(|content| content.trim().to_string())
        .filter(|content| !content.is_empty())
        .ok_or_else(|| ServiceError::MalformedResponse("no answer in response".to_string()))
}

#[derive(Debug, Clone)]
pub struct HttpAnsweringService {
    client: Client,
    credential: String,
    config: ServiceConfig,
}

impl HttpAnsweringService {
    pub fn new(config: &ServiceConfig, credential: &str) -> Result<Self, ServiceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("maniva-survey/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| ServiceError::Transport(err.to_string()))?;
        Ok(Self {
            client,
            credential: credential.to_string(),
            config: config.clone(),
        })
    }

    fn classify(&self, err: reqwest::Error) -> ServiceError {
        if err.is_timeout() {
            ServiceError::Timeout {
                secs: self.config.timeout_secs,
            }
        } else {
            ServiceError::Transport(err.to_string())
        }
    }
}

impl AnsweringService for HttpAnsweringService {
    fn answer(&self, table: &SurveyTable, question: &str) -> Result<String, ServiceError> {
        let request = build_request(table, question, &self.config)?;
        debug!(
            "Sending question to {} with model {}",
            self.config.endpoint, self.config.model
        );
        let response = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(&self.credential)
            .json(&request)
            .send()
            .map_err(|err| self.classify(err))?;
        let status = response.status();
        let body = response.text().map_err(|err| self.classify(err))?;
        if !status.is_success() {
            return Err(ServiceError::Http {
                status: status.as_u16(),
                body: body.chars().take(300).collect(),
            });
        }
        parse_completion(&body)
    }
}
