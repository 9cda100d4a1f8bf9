// Rivet - RISC-V Directed Test Generator
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Host-side model of how the harts of a generated test are activated and how
//! their individual verdicts combine into one.
//!
//! Each hart moves `Idle -> Running -> Completed | Faulted`. The discipline
//! decides how a hart may leave `Idle`:
//!
//! * parallel: any hart, at any time;
//! * simultaneous: all harts together, through [`HartSet::release_barrier`];
//! * round-robin: only the holder of the token, which moves to the next hart
//!   when the holder finishes.

use crate::simulator::TohostWrite;
use rivet_config::SchedulingMode;
use serde::Serialize;
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum HartState {
    Idle,
    Running,
    Completed,
    Faulted { code: u64 },
}

impl HartState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, HartState::Completed | HartState::Faulted { .. })
    }

    fn label(&self) -> &'static str {
        match self {
            HartState::Idle => "idle",
            HartState::Running => "running",
            HartState::Completed => "completed",
            HartState::Faulted { .. } => "faulted",
        }
    }
}

impl fmt::Display for HartState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchedulingError {
    #[error("hart {hart} does not exist ({num_harts} harts)")]
    UnknownHart { hart: u32, num_harts: u32 },
    #[error("hart {hart} cannot move from {from} to {to}")]
    IllegalTransition {
        hart: u32,
        from: HartState,
        to: &'static str,
    },
    #[error("hart {hart} cannot start before the barrier is released")]
    BarrierHeld { hart: u32 },
    #[error("hart {hart} cannot start while hart {holder} holds the token")]
    NotTokenHolder { hart: u32, holder: u32 },
}

/// Combined verdict of every hart that has finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Verdict {
    Pass,
    Fail { hart: u32, code: u64 },
}

#[derive(Debug, Clone)]
pub struct HartSet {
    mode: SchedulingMode,
    states: Vec<HartState>,
    token: u32,
    first_fault: Option<(u32, u64)>,
}

impl HartSet {
    /// A single hart always behaves as parallel.
    pub fn new(num_harts: u32, mode: SchedulingMode) -> Self {
        let num_harts = num_harts.max(1);
        Self {
            mode: if num_harts == 1 {
                SchedulingMode::Parallel
            } else {
                mode
            },
            states: vec![HartState::Idle; num_harts as usize],
            token: 0,
            first_fault: None,
        }
    }

    pub fn num_harts(&self) -> u32 {
        self.states.len() as u32
    }

    pub fn mode(&self) -> SchedulingMode {
        self.mode
    }

    pub fn state(&self, hart: u32) -> Option<HartState> {
        self.states.get(hart as usize).copied()
    }

    pub fn states(&self) -> &[HartState] {
        &self.states
    }

    pub fn token_holder(&self) -> Option<u32> {
        (self.mode == SchedulingMode::RoundRobin).then_some(self.token)
    }

    fn check(&self, hart: u32) -> Result<HartState, SchedulingError> {
        self.state(hart).ok_or(SchedulingError::UnknownHart {
            hart,
            num_harts: self.num_harts(),
        })
    }

    fn start(&mut self, hart: u32) -> Result<(), SchedulingError> {
        match self.check(hart)? {
            HartState::Idle => {
                self.states[hart as usize] = HartState::Running;
                Ok(())
            }
            from => Err(SchedulingError::IllegalTransition {
                hart,
                from,
                to: "running",
            }),
        }
    }

    pub fn activate(&mut self, hart: u32) -> Result<(), SchedulingError> {
        self.check(hart)?;
        match self.mode {
            SchedulingMode::Parallel => {}
            SchedulingMode::Simultaneous => return Err(SchedulingError::BarrierHeld { hart }),
            SchedulingMode::RoundRobin if self.token != hart => {
                return Err(SchedulingError::NotTokenHolder {
                    hart,
                    holder: self.token,
                })
            }
            SchedulingMode::RoundRobin => {}
        }
        self.start(hart)
    }

    /// Starts every hart at once. Only legal while all harts are idle.
    pub fn release_barrier(&mut self) -> Result<(), SchedulingError> {
        if let Some((hart, from)) = self
            .states
            .iter()
            .enumerate()
            .find(|(_, s)| **s != HartState::Idle)
        {
            return Err(SchedulingError::IllegalTransition {
                hart: hart as u32,
                from: *from,
                to: "running",
            });
        }
        self.states.fill(HartState::Running);
        Ok(())
    }

    /// Ends a running hart with the value it reported.
    pub fn finish(&mut self, hart: u32, value: u64, pass: u64) -> Result<HartState, SchedulingError> {
        let from = self.check(hart)?;
        let to = if value == pass {
            HartState::Completed
        } else {
            HartState::Faulted { code: value }
        };
        if from != HartState::Running {
            return Err(SchedulingError::IllegalTransition {
                hart,
                from,
                to: to.label(),
            });
        }
        self.states[hart as usize] = to;
        if let HartState::Faulted { code } = to {
            self.first_fault.get_or_insert((hart, code));
        }
        if self.mode == SchedulingMode::RoundRobin && self.token == hart {
            self.token = (hart + 1) % self.num_harts();
        }
        debug!(hart, state = %to, "hart finished");
        Ok(to)
    }

    /// Applies an observed tohost write, starting the hart the way the
    /// discipline allows. Under round-robin every hart ahead of the writer
    /// has already yielded its turn.
    pub fn record(&mut self, write: TohostWrite, pass: u64) -> Result<HartState, SchedulingError> {
        let hart = write.hart;
        self.check(hart)?;
        match self.mode {
            SchedulingMode::Parallel => {
                if self.check(hart)? == HartState::Idle {
                    self.start(hart)?;
                }
            }
            SchedulingMode::Simultaneous => {
                if self.states.iter().all(|s| *s == HartState::Idle) {
                    self.release_barrier()?;
                }
            }
            SchedulingMode::RoundRobin => {
                for _ in 0..self.num_harts() {
                    if self.token == hart {
                        break;
                    }
                    let holder = self.token;
                    if self.check(holder)? == HartState::Idle {
                        self.start(holder)?;
                    }
                    self.finish(holder, pass, pass)?;
                }
                if self.check(hart)? == HartState::Idle {
                    self.activate(hart)?;
                }
            }
        }
        self.finish(hart, write.value, pass)
    }

    /// First observed fault wins; otherwise pass once any hart completed.
    pub fn aggregate(&self) -> Option<Verdict> {
        if let Some((hart, code)) = self.first_fault {
            return Some(Verdict::Fail { hart, code });
        }
        self.states
            .iter()
            .any(|s| *s == HartState::Completed)
            .then_some(Verdict::Pass)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(hart: u32, value: u64) -> TohostWrite {
        TohostWrite { hart, value }
    }

    #[test]
    fn test_parallel_first_fault_wins() {
        let mut harts = HartSet::new(3, SchedulingMode::Parallel);
        harts.record(write(2, 0x1), 0x1).unwrap();
        harts.record(write(0, 0xdead), 0x1).unwrap();
        harts.record(write(1, 0xbeef), 0x1).unwrap();
        assert_eq!(harts.aggregate(), Some(Verdict::Fail { hart: 0, code: 0xdead }));
        assert_eq!(harts.state(1), Some(HartState::Faulted { code: 0xbeef }));
    }

    #[test]
    fn test_all_pass() {
        let mut harts = HartSet::new(2, SchedulingMode::Parallel);
        assert_eq!(harts.aggregate(), None);
        harts.record(write(0, 0x1), 0x1).unwrap();
        harts.record(write(1, 0x1), 0x1).unwrap();
        assert_eq!(harts.aggregate(), Some(Verdict::Pass));
    }

    #[test]
    fn test_simultaneous_requires_barrier() {
        let mut harts = HartSet::new(2, SchedulingMode::Simultaneous);
        assert_eq!(harts.activate(1), Err(SchedulingError::BarrierHeld { hart: 1 }));
        harts.release_barrier().unwrap();
        assert_eq!(harts.states(), &[HartState::Running, HartState::Running]);
        assert!(harts.release_barrier().is_err());
    }

    #[test]
    fn test_round_robin_token_moves_on_finish() {
        let mut harts = HartSet::new(3, SchedulingMode::RoundRobin);
        assert_eq!(
            harts.activate(1),
            Err(SchedulingError::NotTokenHolder { hart: 1, holder: 0 })
        );
        harts.activate(0).unwrap();
        harts.finish(0, 1, 1).unwrap();
        assert_eq!(harts.token_holder(), Some(1));
        harts.activate(1).unwrap();
    }

    #[test]
    fn test_round_robin_write_implies_earlier_turns() {
        let mut harts = HartSet::new(3, SchedulingMode::RoundRobin);
        harts.record(write(2, 0x3), 0x1).unwrap();
        assert_eq!(harts.state(0), Some(HartState::Completed));
        assert_eq!(harts.state(1), Some(HartState::Completed));
        assert_eq!(harts.aggregate(), Some(Verdict::Fail { hart: 2, code: 0x3 }));
    }

    #[test]
    fn test_illegal_transitions() {
        let mut harts = HartSet::new(2, SchedulingMode::Parallel);
        assert!(matches!(
            harts.finish(0, 1, 1),
            Err(SchedulingError::IllegalTransition { hart: 0, .. })
        ));
        harts.record(write(0, 1), 1).unwrap();
        assert!(harts.record(write(0, 1), 1).is_err());
        assert_eq!(
            harts.activate(5),
            Err(SchedulingError::UnknownHart { hart: 5, num_harts: 2 })
        );
    }

    #[test]
    fn test_single_hart_ignores_mode() {
        let mut harts = HartSet::new(1, SchedulingMode::Simultaneous);
        assert_eq!(harts.mode(), SchedulingMode::Parallel);
        harts.activate(0).unwrap();
    }
}
