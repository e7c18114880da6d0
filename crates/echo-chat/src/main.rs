//! Terminal front-end for a chat session.

#[macro_use]
extern crate tracing;

use std::process::ExitCode;

use echo_chat::core::Submission;
use echo_chat::terminal::{self, TerminalView};
use echo_chat::{Backend, Config};
use echo_chat_openai_model::OpenAIProvider;
use owo_colors::OwoColorize;
use tokio::io::{self, AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::select;
use tokio::signal;
use tokio::sync::mpsc;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };

    let model_lister = match &config.backend {
        Backend::OpenAI(openai) => {
            println!(
                "{}",
                format!(
                    "Chatting with {} at {}.",
                    openai.model(),
                    openai.base_url()
                )
                .dimmed()
            );
            Some(OpenAIProvider::new(openai.clone()))
        }
        Backend::Simulated { .. } => {
            println!(
                "{}",
                "OPENAI_API_KEY is not set, replies are simulated.".dimmed()
            );
            None
        }
    };
    println!(
        "{}",
        "Type /quit to leave, Ctrl-C cancels a pending reply.".dimmed()
    );

    let (idle_tx, mut idle_rx) = mpsc::unbounded_channel();
    let controller = config
        .controller_builder()
        .with_view(TerminalView::new(config.width))
        .on_idle(move || {
            idle_tx.send(()).ok();
        })
        .build();

    let mut lines = BufReader::new(io::stdin()).lines();
    terminal::print_prompt();

    loop {
        let line = select! {
            line = read_line(&mut lines) => line,
            _ = signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            break;
        };

        match line.trim() {
            "/quit" => break,
            "/models" => {
                list_models(model_lister.as_ref()).await;
                terminal::print_prompt();
                continue;
            }
            _ => {}
        }

        match controller.submit(line).await {
            Ok(Submission::Accepted) => {}
            Ok(Submission::Empty | Submission::Busy) => {
                terminal::print_prompt();
                continue;
            }
            Err(err) => {
                error!("{err}");
                break;
            }
        }

        select! {
            _ = idle_rx.recv() => {}
            _ = signal::ctrl_c() => {
                if controller.cancel().is_err() {
                    break;
                }
                idle_rx.recv().await;
            }
        }
    }

    controller.shutdown();
    ExitCode::SUCCESS
}

async fn read_line(lines: &mut Lines<BufReader<Stdin>>) -> Option<String> {
    match lines.next_line().await {
        Ok(line) => line,
        Err(err) => {
            error!("error reading input: {}", err);
            None
        }
    }
}

async fn list_models(provider: Option<&OpenAIProvider>) {
    let Some(provider) = provider else {
        println!("{}", "Listing models needs OPENAI_API_KEY.".yellow());
        return;
    };
    match provider.list_models().await {
        Ok(models) => {
            for model in models {
                println!("  {model}");
            }
        }
        Err(err) => {
            println!("{}", format!("Could not list models: {err}").red())
        }
    }
}
