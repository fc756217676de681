//! Interactive chat with Anne from the terminal.
//!
//! This binary is a REPL front end for a single session: each line you type
//! is posted to the chat endpoint and the reply, or a fallback message if the
//! endpoint is unavailable, is printed below it.
//!
//! # Usage
//!
//! ```bash
//! # Talk to a backend on the default local endpoint
//! anne-chat
//!
//! # Point at another endpoint and forward earlier questions
//! anne-chat --endpoint https://anne.example.com/api/chat --include-history
//!
//! # Load settings from a YAML file (flags still win)
//! anne-chat --config anne.yaml
//! ```
//!
//! # Commands
//!
//! - `/history on|off` - Forward earlier questions with each message
//! - `/transcript` - Print the conversation so far
//! - `/stats` - Show session statistics
//! - `/config` - Show current configuration
//! - `/help` - Show available commands
//! - `/quit` - Exit the application

use std::sync::Arc;

use arrrg::CommandLine;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tokio::sync::Notify;

use anne::chat::{
    ChatArgs, ChatCommand, ChatConfig, PlainTextRenderer, Renderer, SessionController,
    SessionDriver, SessionHandle, help_text, parse_command,
};
use anne::{HttpResponseClient, InputBuffer, Sender, StderrLogger};

/// Main entry point for the anne-chat application.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (args, _) = ChatArgs::from_command_line_relaxed("anne-chat [OPTIONS]");
    let mut config = ChatConfig::try_from(args)?;

    let mut client = HttpResponseClient::with_options(&config.endpoint, Some(config.timeout))?;
    if config.log_requests {
        client = client.with_logger(Arc::new(StderrLogger::new()));
    }
    let controller = SessionController::new(&config);
    let (mut handle, _driver) =
        SessionDriver::new(controller, Arc::new(client), config.timeout).spawn();

    let mut renderer = PlainTextRenderer::with_color(config.persona.clone(), config.use_color);
    let mut buffer = InputBuffer::new();
    let mut rl = DefaultEditor::new()?;

    // Ctrl+C while waiting for a reply leaves the chat.
    let interrupt = Arc::new(Notify::new());
    let interrupt_clone = Arc::clone(&interrupt);
    ctrlc::set_handler(move || {
        interrupt_clone.notify_waiters();
    })?;

    println!("Chatting with {} at {}", config.persona, config.endpoint);
    println!("Type /help for commands, /quit to exit\n");

    let mut printed = 0;
    for turn in handle.snapshot().turns {
        renderer.print_turn(&turn);
        printed += 1;
    }

    loop {
        let readline = rl.readline("You: ");

        match readline {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line.as_str());

                if let Some(cmd) = parse_command(&line) {
                    match cmd {
                        ChatCommand::Quit => {
                            println!("Goodbye!");
                            break;
                        }
                        ChatCommand::Help => {
                            for line in help_text().lines() {
                                println!("    {}", line);
                            }
                        }
                        ChatCommand::History(enabled) => {
                            if handle.set_include_history(enabled) {
                                config.include_history = enabled;
                                if enabled {
                                    renderer.print_info("Earlier questions will be sent.");
                                } else {
                                    renderer.print_info("Only the latest message will be sent.");
                                }
                            } else {
                                renderer.print_error("session has stopped");
                            }
                        }
                        ChatCommand::Transcript => {
                            for turn in handle.snapshot().turns {
                                renderer.print_turn(&turn);
                            }
                        }
                        ChatCommand::Stats => print_stats(&handle).await,
                        ChatCommand::ShowConfig => print_config(&config),
                        ChatCommand::Invalid(message) => {
                            renderer.print_error(&message);
                        }
                    }
                    continue;
                }

                buffer.set(line);
                let Some(submission) = handle.submit(buffer.draft()).await else {
                    renderer.print_error("session has stopped");
                    break;
                };
                buffer.acknowledge(&submission);
                if !submission.is_dispatched() {
                    continue;
                }
                // The user turn was echoed by the prompt.
                printed += 1;

                renderer.print_typing();
                let snapshot = tokio::select! {
                    snapshot = handle.wait_idle() => snapshot,
                    _ = interrupt.notified() => {
                        println!("\nGoodbye!");
                        break;
                    }
                };
                buffer.sync(snapshot.state);
                for turn in &snapshot.turns[printed..] {
                    if turn.sender == Sender::Assistant {
                        renderer.print_turn(turn);
                    }
                }
                printed = snapshot.turns.len();
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl+C at prompt - soft interrupt
                println!();
                continue;
            }
            Err(ReadlineError::Eof) => {
                // Ctrl+D - exit
                println!("\nGoodbye!");
                break;
            }
            Err(err) => {
                renderer.print_error(&format!("Input error: {}", err));
                break;
            }
        }
    }

    Ok(())
}

async fn print_stats(handle: &SessionHandle) {
    let Some(stats) = handle.stats().await else {
        println!("    Session has stopped.");
        return;
    };
    println!("    Session Statistics:");
    println!("      Turns: {}", stats.turn_count);
    println!(
        "      Messages sent: {} ({} blank, {} while waiting ignored)",
        stats.submits_accepted, stats.ignored_empty, stats.ignored_busy
    );
    println!("      Replies: {}", stats.replies);
    println!(
        "      Fallbacks: {} offline, {} error status, {} unreadable",
        stats.network_failures, stats.bad_status, stats.malformed_bodies
    );
}

fn print_config(config: &ChatConfig) {
    println!("    Current Configuration:");
    println!("      Endpoint: {}", config.endpoint);
    println!("      Persona: {}", config.persona);
    println!(
        "      History: {}",
        if config.include_history {
            "forwarded"
        } else {
            "latest message only"
        }
    );
    println!("      Timeout: {}s", config.timeout.as_secs());
    println!(
        "      Request logging: {}",
        if config.log_requests { "on" } else { "off" }
    );
}
