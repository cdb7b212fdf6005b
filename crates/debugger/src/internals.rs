use std::sync::Arc;

use config::UnmatchedBreakPolicy;
use crossbeam_channel::Sender;
use transport::{Bridge, Command, Line, MessageHandler, ProtocolMessage, ScriptIndex};

use crate::registry::BreakpointRegistry;
use crate::resolver::FileResolver;
use crate::state::{Event, RunState, SessionState, SuspendContext};
use crate::types::SourcePosition;

/// Reacts to messages from the attached process
///
/// Runs on the bridge's receive loop. Nothing here blocks: commands are
/// single line writes and events go through an unbounded channel.
pub(crate) struct SessionController {
    bridge: Bridge,
    registry: BreakpointRegistry,
    resolver: Arc<dyn FileResolver>,
    state: SessionState,
    publisher: Sender<Event>,
    unmatched_break: UnmatchedBreakPolicy,
}

impl SessionController {
    pub(crate) fn new(
        bridge: Bridge,
        registry: BreakpointRegistry,
        resolver: Arc<dyn FileResolver>,
        state: SessionState,
        publisher: Sender<Event>,
        unmatched_break: UnmatchedBreakPolicy,
    ) -> Self {
        Self {
            bridge,
            registry,
            resolver,
            state,
            publisher,
            unmatched_break,
        }
    }

    fn on_info(&self, message: Option<String>) {
        match message {
            Some(text) => {
                tracing::debug!(%text, "info from target");
                emit(&self.publisher, Event::Output(text));
            }
            None => tracing::trace!("empty info from target"),
        }
    }

    #[tracing::instrument(skip(self))]
    fn on_script_loaded(&self, name: &str, index: ScriptIndex) {
        match self.resolver.resolve(name) {
            Some(file) => {
                // recorded before reading the registry, see AttachSession::register_breakpoint
                self.state.script_loaded(file.clone(), index);
                for line in self.registry.lines_in(&file) {
                    tracing::debug!(line, "arming breakpoint");
                    self.send(Command::SetBreakpoint {
                        script: index,
                        line,
                    });
                }
            }
            None => tracing::debug!("script not found locally"),
        }

        // the target waits for this whether or not anything was armed
        self.send(Command::Done);
    }

    #[tracing::instrument(skip(self))]
    fn on_break_hit(&self, name: &str, line: Line) {
        let Some(file) = self.resolver.resolve(name) else {
            tracing::warn!("break in a script that is not found locally");
            self.unmatched_break(name, line, None);
            return;
        };

        match self.registry.find(&file, line) {
            Some(breakpoint) => {
                if !self.state.suspend() {
                    tracing::debug!("session ended, not suspending");
                    return;
                }
                let context = SuspendContext {
                    breakpoint,
                    position: SourcePosition::new(file, line),
                    script: name.to_string(),
                };
                tracing::debug!(%context.breakpoint, %context.position, "suspended");
                emit(&self.publisher, Event::Suspended(context));
            }
            None => {
                tracing::warn!(file = %file.display(), "break without a registered breakpoint");
                self.unmatched_break(name, line, Some(file));
            }
        }
    }

    fn unmatched_break(&self, name: &str, line: Line, file: Option<std::path::PathBuf>) {
        if self.unmatched_break == UnmatchedBreakPolicy::Notify {
            emit(
                &self.publisher,
                Event::UnmatchedBreak {
                    name: name.to_string(),
                    line,
                    file,
                },
            );
        }
    }

    fn send(&self, command: Command) {
        if let Err(e) = self.bridge.execute(command) {
            tracing::warn!(error = %e, %command, "sending command");
        }
    }
}

impl MessageHandler for SessionController {
    fn handle(&mut self, message: ProtocolMessage) {
        match message {
            ProtocolMessage::Info { message } => self.on_info(message),
            ProtocolMessage::ScriptLoaded { name, index } => self.on_script_loaded(&name, index),
            ProtocolMessage::SessionEnded => {
                tracing::debug!("target ended the session");
                end_session(&self.state, &self.bridge, &self.publisher);
            }
            ProtocolMessage::BreakHit { name, line } => self.on_break_hit(&name, line),
        }
    }
}

/// Move to `Ended`, release the connection and tell the front end once
pub(crate) fn end_session(state: &SessionState, bridge: &Bridge, publisher: &Sender<Event>) {
    let ended = state.transition(RunState::Ended);
    if let Err(e) = bridge.stop() {
        tracing::warn!(error = %e, "stopping bridge");
    }
    if ended {
        emit(publisher, Event::Ended);
    }
}

pub(crate) fn emit(publisher: &Sender<Event>, event: Event) {
    tracing::trace!(?event, "emitting event");
    if publisher.send(event).is_err() {
        tracing::trace!("no event receivers");
    }
}

#[cfg(test)]
mod tests {
    use std::io::{BufRead, BufReader};
    use std::path::{Path, PathBuf};
    use std::time::Duration;

    use crossbeam_channel::Receiver;
    use transport::io::{InMemoryReader, InMemoryWriter};
    use transport::{InMemoryTransport, Transport};

    use super::*;
    use crate::types::BreakpointHandle;

    struct Fixture {
        controller: SessionController,
        events: Receiver<Event>,
        registry: BreakpointRegistry,
        state: SessionState,
        target_reader: BufReader<InMemoryReader>,
        _target_writer: InMemoryWriter,
    }

    impl Fixture {
        fn new(policy: UnmatchedBreakPolicy) -> Self {
            let (client, target) = InMemoryTransport::pair();
            let (target_reader, target_writer, _) = target.split().unwrap();

            let bridge = Bridge::new(client).unwrap();
            // the receive loop is not used, messages are handed to the controller directly
            bridge.start(|_: ProtocolMessage| {}).unwrap();

            let registry = BreakpointRegistry::new();
            let state = SessionState::new();
            let (tx, events) = crossbeam_channel::unbounded();
            let resolver = |name: &str| -> Option<PathBuf> {
                name.strip_prefix('@').map(|name| Path::new("/src").join(name))
            };

            let controller = SessionController::new(
                bridge,
                registry.clone(),
                Arc::new(resolver),
                state.clone(),
                tx,
                policy,
            );

            Self {
                controller,
                events,
                registry,
                state,
                target_reader: BufReader::new(target_reader),
                _target_writer: target_writer,
            }
        }

        fn next_line(&mut self) -> String {
            let mut line = String::new();
            self.target_reader.read_line(&mut line).unwrap();
            line
        }
    }

    #[test]
    fn info_text_becomes_output() {
        let mut fixture = Fixture::new(UnmatchedBreakPolicy::Notify);

        fixture.controller.handle(ProtocolMessage::Info { message: None });
        fixture.controller.handle(ProtocolMessage::Info {
            message: Some("hello".to_string()),
        });

        assert_eq!(
            fixture.events.try_recv().unwrap(),
            Event::Output("hello".to_string())
        );
        assert!(fixture.events.try_recv().is_err());
    }

    #[test]
    fn script_loaded_arms_breakpoints_in_line_order() {
        let mut fixture = Fixture::new(UnmatchedBreakPolicy::Notify);
        fixture
            .registry
            .register(SourcePosition::new("/src/main.lua", 20), BreakpointHandle(1));
        fixture
            .registry
            .register(SourcePosition::new("/src/main.lua", 4), BreakpointHandle(2));
        fixture
            .registry
            .register(SourcePosition::new("/src/other.lua", 9), BreakpointHandle(3));

        fixture.controller.handle(ProtocolMessage::ScriptLoaded {
            name: "@main.lua".to_string(),
            index: 7,
        });

        assert_eq!(fixture.next_line(), "setb 7 4\n");
        assert_eq!(fixture.next_line(), "setb 7 20\n");
        assert_eq!(fixture.next_line(), "done\n");
        assert_eq!(
            fixture.state.script_index(&PathBuf::from("/src/main.lua")),
            Some(7)
        );
    }

    #[test]
    fn unresolved_script_is_still_acknowledged() {
        let mut fixture = Fixture::new(UnmatchedBreakPolicy::Notify);
        fixture
            .registry
            .register(SourcePosition::new("/src/main.lua", 4), BreakpointHandle(1));

        fixture.controller.handle(ProtocolMessage::ScriptLoaded {
            name: "=stdin".to_string(),
            index: 0,
        });

        assert_eq!(fixture.next_line(), "done\n");
        assert!(fixture.state.loaded_scripts().is_empty());
    }

    #[test]
    fn break_at_registered_breakpoint_suspends() {
        let mut fixture = Fixture::new(UnmatchedBreakPolicy::Notify);
        fixture
            .registry
            .register(SourcePosition::new("/src/main.lua", 12), BreakpointHandle(5));

        fixture.controller.handle(ProtocolMessage::BreakHit {
            name: "@main.lua".to_string(),
            line: 12,
        });

        assert_eq!(fixture.state.run_state(), RunState::Suspended);
        assert_eq!(
            fixture.events.recv_timeout(Duration::from_secs(1)).unwrap(),
            Event::Suspended(SuspendContext {
                breakpoint: BreakpointHandle(5),
                position: SourcePosition::new("/src/main.lua", 12),
                script: "@main.lua".to_string(),
            })
        );
    }

    #[test]
    fn breaks_after_the_session_ended_are_dropped() {
        let mut fixture = Fixture::new(UnmatchedBreakPolicy::Notify);
        fixture
            .registry
            .register(SourcePosition::new("/src/main.lua", 12), BreakpointHandle(5));

        fixture.controller.handle(ProtocolMessage::SessionEnded);
        fixture.controller.handle(ProtocolMessage::BreakHit {
            name: "@main.lua".to_string(),
            line: 12,
        });

        assert_eq!(fixture.events.try_recv().unwrap(), Event::Ended);
        assert!(fixture.events.try_recv().is_err());
        assert_eq!(fixture.state.run_state(), RunState::Ended);
    }

    #[test]
    fn unmatched_break_is_reported() {
        let mut fixture = Fixture::new(UnmatchedBreakPolicy::Notify);

        fixture.controller.handle(ProtocolMessage::BreakHit {
            name: "@main.lua".to_string(),
            line: 3,
        });
        fixture.controller.handle(ProtocolMessage::BreakHit {
            name: "=stdin".to_string(),
            line: 1,
        });

        assert_eq!(fixture.state.run_state(), RunState::Running);
        assert_eq!(
            fixture.events.try_recv().unwrap(),
            Event::UnmatchedBreak {
                name: "@main.lua".to_string(),
                line: 3,
                file: Some(PathBuf::from("/src/main.lua")),
            }
        );
        assert_eq!(
            fixture.events.try_recv().unwrap(),
            Event::UnmatchedBreak {
                name: "=stdin".to_string(),
                line: 1,
                file: None,
            }
        );
    }

    #[test]
    fn unmatched_break_can_be_ignored() {
        let mut fixture = Fixture::new(UnmatchedBreakPolicy::Ignore);

        fixture.controller.handle(ProtocolMessage::BreakHit {
            name: "@main.lua".to_string(),
            line: 3,
        });

        assert_eq!(fixture.state.run_state(), RunState::Running);
        assert!(fixture.events.try_recv().is_err());
    }

    #[test]
    fn session_ended_is_reported_once() {
        let mut fixture = Fixture::new(UnmatchedBreakPolicy::Notify);

        fixture.controller.handle(ProtocolMessage::SessionEnded);
        fixture.controller.handle(ProtocolMessage::SessionEnded);

        assert_eq!(fixture.state.run_state(), RunState::Ended);
        assert_eq!(fixture.events.try_recv().unwrap(), Event::Ended);
        assert!(fixture.events.try_recv().is_err());
        assert!(fixture.controller.bridge.is_stopped());
    }
}
