//! Interaction session: caches plus chat history, passed explicitly to every
//! handler instead of living in process-wide state.
//!
//! The latest prepared table is cached by the SHA-256 of the raw bytes
//! together with the configuration fingerprint, so editing either reloads and
//! replaces it. Answering-service
//! clients are cached by a hash of the credential; a new credential builds a
//! new client.

use std::{collections::HashMap, path::Path, sync::Arc};

use anyhow::{Context, Result};
use encoding_rs::Encoding;
use log::{debug, info, warn};
use serde::Serialize;

use crate::{
    answer::{self, AnsweringService, HttpAnsweringService, ServiceError},
    chart::{self, Chart},
    config::{ServiceConfig, SurveyConfig, hex_digest},
    filter::SurveyFilter,
    frame::SurveyTable,
    inference::{self, Inference},
    io_utils, preprocess,
};

pub type ServiceFactory =
    Box<dyn Fn(&ServiceConfig, &str) -> Result<Arc<dyn AnsweringService>, ServiceError>>;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Reply {
    Answered { text: String },
    Failed { message: String },
    Offline,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatTurn {
    pub question: String,
    pub reply: Reply,
    pub inference: Inference,
    pub chart: Option<Chart>,
    /// One-line notices for units of work that failed without aborting the turn.
    pub notices: Vec<String>,
}

pub struct Session {
    config: SurveyConfig,
    filter: SurveyFilter,
    credential: Option<String>,
    offline: bool,
    table: Option<(String, Arc<SurveyTable>)>,
    clients: HashMap<String, Arc<dyn AnsweringService>>,
    factory: ServiceFactory,
    history: Vec<ChatTurn>,
}

fn http_factory(
    config: &ServiceConfig,
    credential: &str,
) -> Result<Arc<dyn AnsweringService>, ServiceError> {
    Ok(Arc::new(HttpAnsweringService::new(config, credential)?))
}

impl Session {
    pub fn new(config: SurveyConfig) -> Self {
        Self {
            config,
            filter: SurveyFilter::default(),
            credential: None,
            offline: false,
            table: None,
            clients: HashMap::new(),
            factory: Box::new(http_factory),
            history: Vec::new(),
        }
    }

    pub fn with_service_factory(mut self, factory: ServiceFactory) -> Self {
        self.factory = factory;
        self.clients.clear();
        self
    }

    pub fn config(&self) -> &SurveyConfig {
        &self.config
    }

    pub fn set_filter(&mut self, filter: SurveyFilter) {
        self.filter = filter;
    }

    pub fn set_credential(&mut self, credential: Option<String>) {
        self.credential = credential;
    }

    pub fn set_offline(&mut self, offline: bool) {
        self.offline = offline;
    }

    pub fn history(&self) -> &[ChatTurn] {
        &self.history
    }

    pub fn cached_tables(&self) -> usize {
        usize::from(self.table.is_some())
    }

    pub fn cached_clients(&self) -> usize {
        self.clients.len()
    }

    pub fn load_bytes(
        &mut self,
        bytes: &[u8],
        delimiter: u8,
        encoding: &'static Encoding,
    ) -> Result<Arc<SurveyTable>> {
        let key = format!("{}:{}", hex_digest(bytes), self.config.fingerprint());
        if let Some((cached, table)) = &self.table {
            if *cached == key {
                debug!("Reusing cached survey table {}", &key[..12]);
                return Ok(Arc::clone(table));
            }
        }
        let (table, report) =
            preprocess::load_survey_bytes(bytes, delimiter, encoding, &self.config)?;
        info!(
            "Prepared {} producer(s); {} field(s) renamed, {} unparsed value(s)",
            table.row_count(),
            report.renames.applied.len(),
            report.unparsed_cells()
        );
        let table = Arc::new(table);
        self.table = Some((key, Arc::clone(&table)));
        Ok(table)
    }

    pub fn load_path(
        &mut self,
        path: &Path,
        delimiter: Option<u8>,
        encoding: &'static Encoding,
    ) -> Result<Arc<SurveyTable>> {
        let delimiter = io_utils::resolve_input_delimiter(path, delimiter);
        let bytes = io_utils::read_input_bytes(path)?;
        self.load_bytes(&bytes, delimiter, encoding)
            .with_context(|| format!("Loading survey from {path:?}"))
    }

    fn service(&mut self) -> Result<Arc<dyn AnsweringService>, ServiceError> {
        let credential =
            answer::resolve_credential(self.credential.as_deref(), &self.config.service)?;
        let key = hex_digest(credential.as_bytes());
        if let Some(client) = self.clients.get(&key) {
            return Ok(Arc::clone(client));
        }
        debug!("Building answering-service client");
        let client = (self.factory)(&self.config.service, &credential)?;
        self.clients.insert(key, Arc::clone(&client));
        Ok(client)
    }

    /// One interaction: filter, infer, draw, answer. Never fails; failures of
    /// the chart or of the service are recorded on the returned turn.
    pub fn ask(&mut self, table: &SurveyTable, question: &str) -> &ChatTurn {
        let view = self.filter.apply(table, &self.config.fields);
        let inference = inference::infer(question, &view, &self.config.inference);
        let mut notices = Vec::new();

        let chart = inference
            .intent
            .as_ref()
            .and_then(|intent| match chart::render(&view, intent, &self.config) {
                Ok(chart) => Some(chart),
                Err(err) => {
                    warn!("Chart for '{}' failed: {err}", intent.title);
                    notices.push(format!("Não foi possível gerar o gráfico: {err}"));
                    None
                }
            });

        let reply = if self.offline {
            Reply::Offline
        } else {
            match self.service().and_then(|svc| svc.answer(&view, question)) {
                Ok(text) => Reply::Answered { text },
                Err(err) => {
                    warn!("Answering service failed: {err}");
                    Reply::Failed {
                        message: err.to_string(),
                    }
                }
            }
        };

        self.history.push(ChatTurn {
            question: question.to_string(),
            reply,
            inference,
            chart,
            notices,
        });
        let last = self.history.len() - 1;
        &self.history[last]
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::Cell, rc::Rc};

    use encoding_rs::UTF_8;

    use super::*;

    const CSV: &[u8] = b"Comunidade,Idade\nCastanhal,45\nMaravilha,38\n";

    struct Echo(String);

    impl AnsweringService for Echo {
        fn answer(&self, table: &SurveyTable, question: &str) -> Result<String, ServiceError> {
            Ok(format!("{}:{}:{question}", self.0, table.row_count()))
        }
    }

    fn counting_session(builds: Rc<Cell<usize>>) -> Session {
        let factory = move |_: &ServiceConfig, key: &str| {
            builds.set(builds.get() + 1);
            Ok::<_, ServiceError>(Arc::new(Echo(key.to_string())) as Arc<dyn AnsweringService>)
        };
        Session::new(SurveyConfig::default()).with_service_factory(Box::new(factory))
    }

    #[test]
    fn table_cache_keeps_only_the_latest_survey() {
        let mut session = Session::new(SurveyConfig::default());
        let first = session.load_bytes(CSV, b',', UTF_8).unwrap();
        let second = session.load_bytes(CSV, b',', UTF_8).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        let other = session
            .load_bytes(b"Comunidade,Idade\nCastanhal,46\n", b',', UTF_8)
            .unwrap();
        assert!(!Arc::ptr_eq(&first, &other));
        assert_eq!(session.cached_tables(), 1);
        let reloaded = session.load_bytes(CSV, b',', UTF_8).unwrap();
        assert!(!Arc::ptr_eq(&first, &reloaded));
        assert_eq!(session.cached_tables(), 1);
    }

    #[test]
    fn client_is_rebuilt_only_when_credential_changes() {
        let builds = Rc::new(Cell::new(0));
        let mut session = counting_session(Rc::clone(&builds));
        let table = session.load_bytes(CSV, b',', UTF_8).unwrap();
        session.set_credential(Some("sk-a".into()));
        session.ask(&table, "Qual a distribuição de Idade?");
        session.ask(&table, "Quantos produtores?");
        assert_eq!(builds.get(), 1);
        session.set_credential(Some("sk-b".into()));
        let turn = session.ask(&table, "oi");
        assert_eq!(
            turn.reply,
            Reply::Answered {
                text: "sk-b:2:oi".into()
            }
        );
        assert_eq!(builds.get(), 2);
        assert_eq!(session.history().len(), 3);
    }

    #[test]
    fn service_failure_keeps_the_chart() {
        let mut session = Session::new(SurveyConfig::default()).with_service_factory(Box::new(
            |_: &ServiceConfig, _: &str| Err(ServiceError::Transport("connection refused".into())),
        ));
        let table = session.load_bytes(CSV, b',', UTF_8).unwrap();
        session.set_credential(Some("sk".into()));
        let turn = session.ask(&table, "Qual a distribuição de Idade?");
        assert!(matches!(turn.reply, Reply::Failed { .. }));
        assert!(turn.chart.is_some());
        assert!(turn.notices.is_empty());
    }

    #[test]
    fn offline_turns_skip_the_service() {
        let builds = Rc::new(Cell::new(0));
        let mut session = counting_session(Rc::clone(&builds));
        session.set_offline(true);
        let table = session.load_bytes(CSV, b',', UTF_8).unwrap();
        let turn = session.ask(&table, "");
        assert_eq!(turn.reply, Reply::Offline);
        assert!(turn.inference.intent.is_none());
        assert_eq!(builds.get(), 0);
    }

    #[test]
    fn filter_narrows_the_snapshot_sent_to_the_service() {
        let builds = Rc::new(Cell::new(0));
        let mut session = counting_session(builds);
        session.set_credential(Some("k".into()));
        session.set_filter(SurveyFilter {
            communities: vec!["Castanhal".into()],
            ..SurveyFilter::default()
        });
        let table = session.load_bytes(CSV, b',', UTF_8).unwrap();
        let turn = session.ask(&table, "q");
        assert_eq!(turn.reply, Reply::Answered { text: "k:1:q".into() });
    }
}
