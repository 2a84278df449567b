//! Driver navigation stepper
//!
//! Turns the instruction tokens returned by the route endpoint into a
//! single-pass sequence the driver walks one "continue" at a time.
//!
//! ```text
//! Loading ──fetch ok, non-empty──▶ Active(0) ──continue──▶ … ──▶ Terminal
//!    │                                                          ▲
//!    └──fetch ok, empty / fetch failed──────────────────────────┘
//! ```
//!
//! A session is bound to one target spot. Navigating somewhere else means
//! building a new session.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::client::{RouteRequest, RouteSource};
use crate::error::Result;

/// One step of guidance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instruction {
    Up,
    Forward,
    Down,
    Right,
    Left,
    Arrived,
    Error,
    /// Token the client does not know; shown as "go straight"
    Unknown(String),
}

/// How an instruction is presented to the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstructionDisplay {
    pub label: &'static str,
    pub icon: &'static str,
}

impl Instruction {
    pub fn parse(token: &str) -> Self {
        match token {
            "UP" => Instruction::Up,
            "FORWARD" => Instruction::Forward,
            "DOWN" => Instruction::Down,
            "RIGHT" => Instruction::Right,
            "LEFT" => Instruction::Left,
            "ARRIVED" => Instruction::Arrived,
            "ERROR" => Instruction::Error,
            other => Instruction::Unknown(other.to_string()),
        }
    }

    pub fn token(&self) -> &str {
        match self {
            Instruction::Up => "UP",
            Instruction::Forward => "FORWARD",
            Instruction::Down => "DOWN",
            Instruction::Right => "RIGHT",
            Instruction::Left => "LEFT",
            Instruction::Arrived => "ARRIVED",
            Instruction::Error => "ERROR",
            Instruction::Unknown(token) => token,
        }
    }

    /// `ARRIVED` and `ERROR` end a sequence
    pub fn is_terminal(&self) -> bool {
        matches!(self, Instruction::Arrived | Instruction::Error)
    }

    pub fn display(&self) -> InstructionDisplay {
        match self {
            Instruction::Up | Instruction::Forward | Instruction::Unknown(_) => InstructionDisplay {
                label: "Go Straight",
                icon: "arrow-up",
            },
            Instruction::Down => InstructionDisplay {
                label: "Go Straight",
                icon: "arrow-down",
            },
            Instruction::Right => InstructionDisplay {
                label: "Turn Right",
                icon: "arrow-right",
            },
            Instruction::Left => InstructionDisplay {
                label: "Turn Left",
                icon: "arrow-left",
            },
            Instruction::Arrived => InstructionDisplay {
                label: "You've Arrived!",
                icon: "check-circle",
            },
            Instruction::Error => InstructionDisplay {
                label: "Route Error",
                icon: "alert-triangle",
            },
        }
    }
}

impl std::fmt::Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.token())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepperState {
    /// Route not fetched yet
    Loading,
    /// Showing the instruction at this index
    Active(usize),
    /// On the last instruction (`ARRIVED` or `ERROR`); further input is ignored
    Terminal,
}

/// "Step n of m" while the driver is still moving
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepProgress {
    pub step: usize,
    pub total: usize,
}

#[derive(Debug, Clone)]
pub struct NavigationSession {
    target_spot_id: i64,
    instructions: Vec<Instruction>,
    state: StepperState,
}

impl NavigationSession {
    /// A session waiting for its route
    pub fn new(target_spot_id: i64) -> Self {
        Self {
            target_spot_id,
            instructions: Vec::new(),
            state: StepperState::Loading,
        }
    }

    /// Build a session and fetch its route exactly once.
    ///
    /// Fetch failures never escape; they become the `ERROR` terminal step.
    pub async fn load(source: &dyn RouteSource, request: RouteRequest) -> Self {
        let mut session = Self::new(request.target_spot_id);
        let fetched = source.fetch_route(&request).await.map(|route| {
            if let Some(reason) = route.error {
                debug!(target_spot_id = request.target_spot_id, reason = %reason, "Route endpoint returned no path");
            }
            route.instructions
        });
        session.resolve(fetched);
        session
    }

    /// Leave `Loading` with the outcome of the route fetch.
    ///
    /// Returns `false` (and changes nothing) if the session already resolved.
    pub fn resolve(&mut self, fetched: Result<Vec<String>>) -> bool {
        if self.state != StepperState::Loading {
            return false;
        }

        self.instructions = match fetched {
            Ok(tokens) => terminated(tokens.iter().map(|t| Instruction::parse(t))),
            Err(e) => {
                warn!(target_spot_id = self.target_spot_id, error = %e, "Route fetch failed");
                vec![Instruction::Error]
            }
        };
        self.state = self.state_at(0);
        true
    }

    /// The driver's "continue" action. Returns whether the step changed.
    pub fn advance(&mut self) -> bool {
        match self.state {
            StepperState::Active(index) => {
                self.state = self.state_at(index + 1);
                true
            }
            StepperState::Loading | StepperState::Terminal => false,
        }
    }

    fn state_at(&self, index: usize) -> StepperState {
        if index + 1 >= self.instructions.len() {
            StepperState::Terminal
        } else {
            StepperState::Active(index)
        }
    }

    pub fn target_spot_id(&self) -> i64 {
        self.target_spot_id
    }

    pub fn state(&self) -> StepperState {
        self.state
    }

    /// Index of the current instruction (0 while loading)
    pub fn index(&self) -> usize {
        match self.state {
            StepperState::Loading => 0,
            StepperState::Active(index) => index,
            StepperState::Terminal => self.instructions.len().saturating_sub(1),
        }
    }

    /// `None` only while loading
    pub fn current(&self) -> Option<&Instruction> {
        self.instructions.get(self.index())
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn is_loading(&self) -> bool {
        self.state == StepperState::Loading
    }

    pub fn is_terminal(&self) -> bool {
        self.state == StepperState::Terminal
    }

    pub fn progress(&self) -> Option<StepProgress> {
        match self.current() {
            Some(instruction) if !instruction.is_terminal() => Some(StepProgress {
                step: self.index() + 1,
                total: self.instructions.len() - 1,
            }),
            _ => None,
        }
    }
}

/// Cut at the first terminal marker, or append `ARRIVED` if there is none.
fn terminated(instructions: impl Iterator<Item = Instruction>) -> Vec<Instruction> {
    let mut sequence = Vec::new();
    for instruction in instructions {
        let terminal = instruction.is_terminal();
        sequence.push(instruction);
        if terminal {
            return sequence;
        }
    }
    sequence.push(Instruction::Arrived);
    sequence
}
