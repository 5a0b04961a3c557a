//! The live console: a single event loop that owns the coordinator.
//!
//! Operator commands, gateway responses, stream events, health polls and
//! frame ticks are multiplexed with `tokio::select!`, so the coordinator is
//! only ever touched from this task. Gateway calls run concurrently in a
//! `FuturesUnordered` and are applied in completion order.

use std::io::Write;
use std::time::Duration;

use anyhow::{Context, Result};
use futures_util::StreamExt;
use futures_util::future::BoxFuture;
use futures_util::stream::FuturesUnordered;
use nexus_core::{
    AudioEngine, AudioScheduler, ConnectionState, Coordinator, Emotion, HealthResponse,
    ProcessResponse, RequestFailure, StreamEffect, Submission, Ticket,
};
use nexus_link::{ConsoleConfig, Gateway, StreamClient, StreamEvent};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::render::{self, SessionView};
use crate::tone::TraceEngine;

/// Frame interval for animation and timer ticks.
const FRAME: Duration = Duration::from_millis(50);

type QueryCall = BoxFuture<'static, (Ticket, Result<ProcessResponse, RequestFailure>)>;
type HealthCall = BoxFuture<'static, Result<HealthResponse, RequestFailure>>;

#[derive(Clone, Copy, Debug)]
pub struct WatchOptions {
    pub stream: bool,
    pub audio: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    Submit(String),
    Emotion(Emotion),
    Goal(String),
    Select(String),
    Reset,
    Dismiss,
    Reconnect,
    Quit,
}

/// Parse one input line. Blank lines yield `Ok(None)`.
pub fn parse_command(line: &str) -> std::result::Result<Option<Command>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let Some(rest) = line.strip_prefix(':') else {
        return Ok(Some(Command::Submit(line.to_string())));
    };

    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };
    let command = match name {
        "emotion" => Command::Emotion(arg.parse().map_err(|e| format!("{e}"))?),
        "goal" => Command::Goal(arg.to_string()),
        "select" if !arg.is_empty() => Command::Select(arg.to_string()),
        "select" => return Err("usage: :select UNIT_ID".to_string()),
        "reset" => Command::Reset,
        "dismiss" => Command::Dismiss,
        "reconnect" => Command::Reconnect,
        "quit" | "q" => Command::Quit,
        other => return Err(format!("unknown command ':{other}'")),
    };
    Ok(Some(command))
}

pub async fn run(config: ConsoleConfig, options: WatchOptions) -> Result<()> {
    let gateway = Gateway::from_config(&config).context("failed to create gateway")?;

    let engine: Option<Box<dyn AudioEngine>> = if options.audio {
        Some(Box::new(TraceEngine::default()))
    } else {
        None
    };
    let mut coordinator = Coordinator::new(
        config.coordinator(),
        AudioScheduler::new(config.audio(), engine),
    );

    let mut stream_config = config.stream();
    stream_config.enabled &= options.stream;
    let (mut stream, mut stream_events) = StreamClient::new(stream_config);
    let mut stream_state = stream.subscribe();
    stream.connect();

    let started = Instant::now();
    let elapsed = || started.elapsed();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut requests: FuturesUnordered<QueryCall> = FuturesUnordered::new();
    let mut health_checks: FuturesUnordered<HealthCall> = FuturesUnordered::new();

    let mut frame = tokio::time::interval(FRAME);
    frame.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut health_poll = tokio::time::interval(config.health_poll());
    health_poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut session = SessionView::default();
    let mut rendered = None;
    let mut stdout = std::io::stdout();
    info!(api = %gateway.base_url(), "console started");

    loop {
        tokio::select! {
            line = lines.next_line(), if stdin_open => {
                match line {
                    Ok(Some(line)) => match parse_command(&line) {
                        Ok(Some(Command::Quit)) => break,
                        Ok(Some(Command::Submit(query))) => {
                            let submission = Submission::new(query)
                                .with_emotion(session.emotion)
                                .with_goal(session.goal.clone());
                            if let Some(pending) = coordinator.begin(elapsed(), &submission) {
                                debug!(ticket = pending.ticket.0, "query submitted");
                                let gw = gateway.clone();
                                requests.push(Box::pin(async move {
                                    let result = gw
                                        .submit_query(&pending.request)
                                        .await
                                        .map_err(|e| e.to_failure());
                                    (pending.ticket, result)
                                }));
                            }
                        }
                        Ok(Some(Command::Emotion(emotion))) => {
                            session.emotion = emotion;
                            rendered = None;
                        }
                        Ok(Some(Command::Goal(goal))) => {
                            session.goal = goal;
                            rendered = None;
                        }
                        Ok(Some(Command::Select(id))) => {
                            if !coordinator.select_unit(elapsed(), &id) {
                                eprintln!("unknown unit '{id}'");
                            }
                        }
                        Ok(Some(Command::Reset)) => coordinator.reset_view(elapsed()),
                        Ok(Some(Command::Dismiss)) => coordinator.dismiss_error(),
                        Ok(Some(Command::Reconnect)) => {
                            info!("manual stream reconnect");
                            stream.connect();
                        }
                        Ok(None) => {}
                        Err(msg) => eprintln!("{msg}"),
                    },
                    Ok(None) => stdin_open = false,
                    Err(e) => {
                        warn!(error = %e, "stdin read failed");
                        stdin_open = false;
                    }
                }
            }
            Some((ticket, result)) = requests.next() => {
                if let Err(failure) = &result {
                    warn!(%failure, "query failed");
                }
                coordinator.complete(elapsed(), ticket, result);
            }
            Some(event) = stream_events.recv() => {
                handle_stream_event(&mut coordinator, elapsed(), event);
            }
            Ok(()) = stream_state.changed() => {
                let state = *stream_state.borrow_and_update();
                let attempt = match state {
                    ConnectionState::Open => 0,
                    _ => coordinator.link().reconnect_attempt,
                };
                coordinator.record_stream_state(state, attempt);
            }
            _ = health_poll.tick() => {
                let gw = gateway.clone();
                health_checks.push(Box::pin(async move {
                    gw.health().await.map_err(|e| e.to_failure())
                }));
            }
            Some(result) = health_checks.next() => coordinator.record_health(result),
            _ = frame.tick() => {
                coordinator.tick(elapsed());
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
        }

        if rendered != Some(coordinator.revision()) {
            rendered = Some(coordinator.revision());
            let text = render::snapshot(&coordinator.snapshot(), Some(&session));
            let _ = writeln!(stdout, "{text}");
            let _ = stdout.flush();
        }

        // piped input: leave once stdin is drained and every answer is in
        if !stdin_open && !coordinator.is_processing() {
            break;
        }
    }

    stream.disconnect();
    info!("console stopped");
    Ok(())
}

fn handle_stream_event(coordinator: &mut Coordinator, now: Duration, event: StreamEvent) {
    match event {
        StreamEvent::Opened => coordinator.record_stream_state(ConnectionState::Open, 0),
        StreamEvent::Message(message) => match coordinator.on_stream_message(now, &message) {
            Ok(StreamEffect::Observed) => debug!(kind = %message.kind, "stream event observed"),
            Ok(effect) => debug!(?effect, "stream event applied"),
            Err(e) => {
                warn!(kind = %message.kind, error = %e, "dropping undecodable stream payload")
            }
        },
        StreamEvent::Error(e) => debug!(error = %e, "stream error"),
        StreamEvent::Closed { attempt, .. } => {
            coordinator.record_stream_state(ConnectionState::Closed, attempt);
        }
        StreamEvent::GaveUp { attempts } => {
            warn!(attempts, "stream disconnected, use :reconnect to retry");
            coordinator.record_stream_gave_up();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_submits() {
        assert_eq!(
            parse_command("  why did it fail? ").unwrap(),
            Some(Command::Submit("why did it fail?".to_string()))
        );
        assert_eq!(parse_command("   ").unwrap(), None);
    }

    #[test]
    fn test_colon_commands() {
        assert_eq!(
            parse_command(":emotion Curious").unwrap(),
            Some(Command::Emotion(Emotion::Curious))
        );
        assert_eq!(
            parse_command(":goal find the regression").unwrap(),
            Some(Command::Goal("find the regression".to_string()))
        );
        assert_eq!(
            parse_command(":select LAB_009").unwrap(),
            Some(Command::Select("LAB_009".to_string()))
        );
        assert_eq!(parse_command(":reset").unwrap(), Some(Command::Reset));
        assert_eq!(parse_command(":q").unwrap(), Some(Command::Quit));
    }

    #[test]
    fn test_bad_commands() {
        assert!(parse_command(":emotion angry").unwrap_err().contains("unknown emotion"));
        assert!(parse_command(":select").is_err());
        assert!(parse_command(":launch").unwrap_err().contains(":launch"));
    }
}
