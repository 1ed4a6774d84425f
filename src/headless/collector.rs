//=========================================================================
// Command Collector
//=========================================================================
//
// Per-tick collection of engine commands with bounded draining and
// shutdown detection.
//
// Architecture:
//   Receiver<EngineCommand> → collect_tick() → scene requests → TickControl
//
//=========================================================================

//=== External Dependencies ===============================================

use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError};
use log::warn;

//=== Internal Dependencies ===============================================

use super::scene::EngineCommand;

//=== TickControl =========================================================

/// Update loop control signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum TickControl {
    Continue,
    Exit,
}

//=== CommandCollector ====================================================

pub(super) struct CommandCollector {
    receiver: Receiver<EngineCommand>,
    requests: Vec<String>,
}

impl CommandCollector {
    const MAX_COMMANDS_PER_TICK: usize = 100;

    pub(super) fn new(receiver: Receiver<EngineCommand>) -> Self {
        Self {
            receiver,
            requests: Vec::with_capacity(4),
        }
    }

    /// Waits up to `budget` for the first command, then drains what is
    /// queued (bounded to prevent starvation).
    pub(super) fn collect_tick(&mut self, budget: Duration) -> TickControl {
        self.requests.clear();

        match self.receiver.recv_timeout(budget) {
            Ok(command) => {
                if self.handle_command(command) == TickControl::Exit {
                    return TickControl::Exit;
                }
            }
            Err(RecvTimeoutError::Timeout) => return TickControl::Continue,
            Err(RecvTimeoutError::Disconnected) => return TickControl::Exit,
        }

        let mut drained = 1;
        while drained < Self::MAX_COMMANDS_PER_TICK {
            match self.receiver.try_recv() {
                Ok(command) => {
                    if self.handle_command(command) == TickControl::Exit {
                        return TickControl::Exit;
                    }
                    drained += 1;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => return TickControl::Exit,
            }
        }

        if drained >= Self::MAX_COMMANDS_PER_TICK {
            warn!("Command backlog: drained {} commands this tick", drained);
        }

        TickControl::Continue
    }

    /// Takes the scene requests collected this tick, oldest first.
    pub(super) fn take_requests(&mut self) -> Vec<String> {
        std::mem::take(&mut self.requests)
    }

    fn handle_command(&mut self, command: EngineCommand) -> TickControl {
        match command {
            EngineCommand::StartScene(key) => {
                self.requests.push(key);
                TickControl::Continue
            }
            EngineCommand::Shutdown => TickControl::Exit,
        }
    }
}

//=========================================================================
// Unit Tests
//=========================================================================
