mod common;

use std::sync::Arc;

use encoding_rs::UTF_8;

use common::{fixture_path, SURVEY_FIXTURE};
use maniva_survey::{
    answer::{AnsweringService, ServiceError},
    config::{ServiceConfig, SurveyConfig},
    filter::SurveyFilter,
    frame::SurveyTable,
    session::{Reply, Session},
};

struct Scripted(Result<String, ServiceError>);

impl AnsweringService for Scripted {
    fn answer(&self, _table: &SurveyTable, _question: &str) -> Result<String, ServiceError> {
        self.0.clone()
    }
}

fn session_with(reply: Result<String, ServiceError>) -> Session {
    let factory = move |_: &ServiceConfig, _: &str| {
        Ok::<_, ServiceError>(Arc::new(Scripted(reply.clone())) as Arc<dyn AnsweringService>)
    };
    let mut session = Session::new(SurveyConfig::default()).with_service_factory(Box::new(factory));
    session.set_credential(Some("sk-test".into()));
    session
}

#[test]
fn answer_and_chart_arrive_together() {
    let mut session = session_with(Ok("São 5 produtores.".into()));
    let table = session
        .load_path(&fixture_path(SURVEY_FIXTURE), None, UTF_8)
        .unwrap();
    let turn = session.ask(&table, "Qual a distribuição de Idade?");
    assert_eq!(
        turn.reply,
        Reply::Answered {
            text: "São 5 produtores.".into()
        }
    );
    assert_eq!(turn.inference.rule, "numeric-distribution");
    assert!(turn.chart.is_some());
    assert!(turn.notices.is_empty());
}

#[test]
fn service_failure_keeps_the_chart() {
    let mut session = session_with(Err(ServiceError::Timeout { secs: 60 }));
    let table = session
        .load_path(&fixture_path(SURVEY_FIXTURE), None, UTF_8)
        .unwrap();
    let turn = session.ask(&table, "Quais Dificuldades_Cultivo aparecem?");
    let Reply::Failed { message } = &turn.reply else {
        panic!("expected failed reply, got {:?}", turn.reply);
    };
    assert!(message.contains("60s"));
    assert!(turn.chart.is_some());
}

#[test]
fn chart_failure_keeps_the_answer() {
    let mut session = session_with(Ok("ok".into()));
    let csv = b"Data_Entrevista,Preco_Farinha\n10/03/2025 09:00:00,\n,\"6,5\"\n";
    let table = session.load_bytes(csv, b',', UTF_8).unwrap();
    let turn = session.ask(&table, "Qual a tendência ao longo do tempo?");
    assert_eq!(turn.inference.rule, "cue-trend");
    assert!(turn.chart.is_none());
    assert_eq!(turn.notices.len(), 1);
    assert!(turn.notices[0].contains("Preco_Farinha"));
    assert_eq!(turn.reply, Reply::Answered { text: "ok".into() });
}

#[test]
fn missing_credential_is_reported_on_the_turn() {
    let mut config = SurveyConfig::default();
    config.service.credential_env = "MANIVA_TEST_KEY_THAT_IS_NEVER_SET".into();
    let mut session = Session::new(config);
    let table = session
        .load_path(&fixture_path(SURVEY_FIXTURE), None, UTF_8)
        .unwrap();
    let turn = session.ask(&table, "Como se divide o Sexo?");
    let Reply::Failed { message } = &turn.reply else {
        panic!("expected failed reply");
    };
    assert!(message.contains("MANIVA_TEST_KEY_THAT_IS_NEVER_SET"));
    assert!(turn.chart.is_some());
    assert_eq!(session.cached_clients(), 0);
}

#[test]
fn offline_session_never_builds_a_client() {
    let mut session = session_with(Ok("unused".into()));
    session.set_offline(true);
    let table = session
        .load_path(&fixture_path(SURVEY_FIXTURE), None, UTF_8)
        .unwrap();
    let turn = session.ask(&table, "Olá");
    assert_eq!(turn.reply, Reply::Offline);
    assert_eq!(session.cached_clients(), 0);
}

#[test]
fn filter_applies_before_inference_and_answer() {
    let factory = |_: &ServiceConfig, _: &str| {
        Ok::<_, ServiceError>(Arc::new(RowCounter) as Arc<dyn AnsweringService>)
    };
    let mut session = Session::new(SurveyConfig::default()).with_service_factory(Box::new(factory));
    session.set_credential(Some("sk".into()));
    session.set_filter(SurveyFilter {
        communities: vec!["Santa Rita".into()],
        ..SurveyFilter::default()
    });
    let table = session
        .load_path(&fixture_path(SURVEY_FIXTURE), None, UTF_8)
        .unwrap();
    let turn = session.ask(&table, "Quantos produtores?");
    assert_eq!(turn.reply, Reply::Answered { text: "2".into() });
    assert_eq!(session.history().len(), 1);
}

struct RowCounter;

impl AnsweringService for RowCounter {
    fn answer(&self, table: &SurveyTable, _question: &str) -> Result<String, ServiceError> {
        Ok(table.row_count().to_string())
    }
}
