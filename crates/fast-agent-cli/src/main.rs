//! Terminal chat front end: reads prompts from stdin and streams the agent's
//! transcript to stdout.

mod commands;
mod config;
mod demo;
mod interrupts;
mod render;

use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::Parser as _;
use fast_agent_ui::prelude::*;
use fast_agent_ui::{Script, ScriptedAgent, init_observability};
use futures::StreamExt as _;
use tokio::io::{AsyncBufReadExt as _, AsyncWriteExt as _, BufReader, Stdout};
use tracing::info;

use crate::commands::{HELP_TEXT, SlashCommand, files_report, parse_slash_command, tools_report};
use crate::config::{Cli, Settings};
use crate::interrupts::listen_for_interrupts;
use crate::render::{TerminalRenderer, json_line};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    config::init_env();
    let settings = Settings::from_cli(Cli::parse());
    let log_sink = init_observability(&settings.log);

    let script = match &settings.script {
        Some(path) => Script::from_path(path)
            .with_context(|| format!("loading agent script {}", path.display()))?,
        None => demo::demo_script().context("loading demo script")?,
    };
    let interface = build_interface(&settings, script)?;
    let mut session = interface.open_session()?;
    info!(
        event = "cli.started",
        domain = "cli",
        session_id = %session.id(),
        json = settings.json,
        reset_memory_each_turn = session.reset_memory_each_turn(),
        uploads = interface.uploads_enabled(),
        log_sink = ?log_sink
    );

    let mut stdout = tokio::io::stdout();
    let mut renderer = TerminalRenderer::new();
    if !settings.json {
        write_out(
            &mut stdout,
            &format!("{}\n{}\nType /help for commands.\n", interface.title(), interface.description()),
        )
        .await?;
    }

    let mut interrupts = listen_for_interrupts();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        if !settings.json {
            write_out(&mut stdout, "> ").await?;
        }
        let line = tokio::select! {
            line = lines.next_line() => line?,
            Some(()) = interrupts.recv() => {
                write_out(&mut stdout, "\n").await?;
                break;
            }
        };
        let Some(line) = line else {
            break;
        };

        let Some(command) = parse_slash_command(&line) else {
            let Some(mut turn) = interface.submit(&mut session, &line) else {
                continue;
            };
            loop {
                tokio::select! {
                    next = turn.next() => {
                        let Some(snapshot) = next else { break };
                        let out = if settings.json {
                            json_line(&snapshot)?
                        } else {
                            renderer.render(&snapshot)
                        };
                        write_out(&mut stdout, &out).await?;
                    }
                    Some(()) = interrupts.recv() => {
                        write_out(&mut stdout, "\n(turn cancelled)\n").await?;
                        break;
                    }
                }
            }
            continue;
        };

        let reply = match command {
            SlashCommand::Quit => break,
            SlashCommand::Help => HELP_TEXT.to_string(),
            SlashCommand::Upload(path) => {
                let file = path.map(UploadedFile::from_path);
                interface.upload(&mut session, file.as_ref()).to_string()
            }
            SlashCommand::Files => files_report(&interface, &session),
            SlashCommand::Tools => tools_report(&interface),
            SlashCommand::Clear => {
                interface.reset(&mut session).await;
                renderer.reset();
                "Conversation cleared.".to_string()
            }
            SlashCommand::Unknown(name) => format!("Unknown command: {name} (try /help)"),
        };
        write_out(&mut stdout, &format!("{reply}\n")).await?;
    }

    Ok(())
}

fn build_interface(settings: &Settings, script: Script) -> Result<ChatInterface> {
    let mut builder = ChatInterface::builder(Arc::new(ScriptedAgent::new(script)))
        .allowed_file_types(settings.allowed_file_types.clone())
        .reset_agent_memory(settings.reset_memory);
    if let Some(name) = &settings.name {
        builder = builder.name(name);
    }
    if let Some(description) = &settings.description {
        builder = builder.description(description);
    }
    if let Some(folder) = &settings.upload_folder {
        builder = builder.upload_folder(folder);
    }
    Ok(builder.build()?)
}

async fn write_out(stdout: &mut Stdout, text: &str) -> Result<()> {
    stdout.write_all(text.as_bytes()).await?;
    stdout.flush().await?;
    Ok(())
}
