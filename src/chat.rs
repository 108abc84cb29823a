//! `ask` and `chat` commands.
//!
//! `ask` is a single interaction. `chat` reads one question per stdin line and
//! keeps one [`Session`] for the whole conversation, so the table and the
//! service client are built once.

use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};
use log::info;

use crate::{
    chart,
    cli::{AskArgs, ChatArgs, FilterArgs, InputArgs, ServiceArgs},
    config::SurveyConfig,
    filter::SurveyFilter,
    io_utils,
    session::{ChatTurn, Reply, Session},
};

const EXIT_WORDS: &[&str] = &["sair", "exit", "quit"];

fn open_session(
    input: &InputArgs,
    filters: &FilterArgs,
    service: &ServiceArgs,
) -> Result<Session> {
    let config = SurveyConfig::load_or_default(input.config.as_deref())?;
    let mut session = Session::new(config);
    session.set_filter(SurveyFilter::from_args(filters));
    session.set_credential(service.api_key.clone());
    session.set_offline(service.offline);
    Ok(session)
}

pub fn render_turn(turn: &ChatTurn) -> String {
    let mut out = String::new();
    match &turn.reply {
        Reply::Answered { text } => {
            out.push_str(text);
            out.push('\n');
        }
        Reply::Failed { message } => out.push_str(&format!("Erro do assistente: {message}\n")),
        Reply::Offline => {}
    }
    if let Some(chart) = &turn.chart {
        out.push('\n');
        out.push_str(&chart::render_text(chart));
    }
    for notice in &turn.notices {
        out.push_str(&format!("Aviso: {notice}\n"));
    }
    out
}

pub fn execute_ask(args: &AskArgs) -> Result<()> {
    let mut session = open_session(&args.input, &args.filters, &args.service)?;
    let encoding = io_utils::resolve_encoding(args.input.input_encoding.as_deref())?;
    let table = session.load_path(&args.input.input, args.input.delimiter, encoding)?;
    let turn = session.ask(&table, &args.question);
    if args.json {
        println!("{}", serde_json::to_string_pretty(turn)?);
    } else {
        print!("{}", render_turn(turn));
    }
    info!("Answered with inference rule '{}'", turn.inference.rule);
    Ok(())
}

pub fn execute_chat(args: &ChatArgs) -> Result<()> {
    let mut session = open_session(&args.input, &args.filters, &args.service)?;
    let encoding = io_utils::resolve_encoding(args.input.input_encoding.as_deref())?;
    let table = session.load_path(&args.input.input, args.input.delimiter, encoding)?;

    let stdin = io::stdin();
    let mut stdout = io::stdout().lock();
    for line in stdin.lock().lines() {
        let line = line.context("Reading question from stdin")?;
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if EXIT_WORDS.contains(&question.to_lowercase().as_str()) {
            break;
        }
        let turn = session.ask(&table, question);
        writeln!(stdout, "> {question}\n{}", render_turn(turn)).context("Writing answer")?;
        stdout.flush().context("Flushing stdout")?;
    }
    info!("Chat ended after {} question(s)", session.history().len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::Inference;

    #[test]
    fn failed_reply_and_notices_are_rendered() {
        let turn = ChatTurn {
            question: "q".into(),
            reply: Reply::Failed {
                message: "timeout".into(),
            },
            inference: Inference {
                rule: "fallback",
                intent: None,
            },
            chart: None,
            notices: vec!["sem gráfico".into()],
        };
        let text = render_turn(&turn);
        assert!(text.contains("Erro do assistente: timeout"));
        assert!(text.contains("Aviso: sem gráfico"));
    }
}
