//! Live capacity control for a running pipeline.
//!
//! Commands are typed ([`ControlCommand`]) and applied to the shared
//! limiter. The CLI feeds them from a Unix control socket, one command per
//! line: `set <n>`, `halve`, `grow <n>`.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

use crate::limiter::ConcurrencyLimiter;

/// Capacity change requested while the pipeline runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    /// Set capacity to exactly `n` (at least 1).
    SetCapacity(usize),
    /// Halve capacity, never below 1.
    Halve,
    /// Add `n` slots.
    Grow(usize),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ControlParseError {
    #[error("empty control command")]
    Empty,
    #[error("unknown control command: {0}")]
    Unknown(String),
    #[error("`{command}` needs a positive integer argument, got {arg:?}")]
    BadArgument { command: String, arg: String },
}

impl FromStr for ControlCommand {
    type Err = ControlParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut parts = line.split_whitespace();
        let command = parts.next().ok_or(ControlParseError::Empty)?;
        let arg = parts.next();
        let number = |arg: Option<&str>| -> Result<usize, ControlParseError> {
            let raw = arg.unwrap_or("");
            match raw.parse::<usize>() {
                Ok(n) if n > 0 => Ok(n),
                _ => Err(ControlParseError::BadArgument {
                    command: command.to_string(),
                    arg: raw.to_string(),
                }),
            }
        };
        match command.to_ascii_lowercase().as_str() {
            "set" => Ok(ControlCommand::SetCapacity(number(arg)?)),
            "grow" => Ok(ControlCommand::Grow(number(arg)?)),
            "halve" => Ok(ControlCommand::Halve),
            other => Err(ControlParseError::Unknown(other.to_string())),
        }
    }
}

impl std::fmt::Display for ControlCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ControlCommand::SetCapacity(n) => write!(f, "set {}", n),
            ControlCommand::Halve => write!(f, "halve"),
            ControlCommand::Grow(n) => write!(f, "grow {}", n),
        }
    }
}

/// Applies control commands to the pipeline's limiter.
#[derive(Debug, Clone)]
pub struct CapacityControl {
    limiter: Arc<ConcurrencyLimiter>,
}

impl CapacityControl {
    pub fn new(limiter: Arc<ConcurrencyLimiter>) -> Self {
        Self { limiter }
    }

    /// Apply `cmd` and return the new capacity.
    pub fn apply(&self, cmd: ControlCommand) -> usize {
        let (previous, capacity) = self.limiter.update(|current| match cmd {
            ControlCommand::SetCapacity(n) => n,
            ControlCommand::Halve => current / 2,
            ControlCommand::Grow(n) => current.saturating_add(n),
        });
        tracing::info!(command = %cmd, previous, capacity, "capacity changed");
        capacity
    }
}

/// Default path for the control socket (XDG state dir).
pub fn default_control_socket_path() -> std::io::Result<PathBuf> {
    let dir = xdg::BaseDirectories::with_prefix("pfetch")?.get_state_home();
    Ok(dir.join("control.sock"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_commands() {
        assert_eq!("set 8".parse::<ControlCommand>(), Ok(ControlCommand::SetCapacity(8)));
        assert_eq!("  halve \n".parse::<ControlCommand>(), Ok(ControlCommand::Halve));
        assert_eq!("GROW 10".parse::<ControlCommand>(), Ok(ControlCommand::Grow(10)));
    }

    #[test]
    fn parse_rejects_bad_input() {
        assert_eq!("".parse::<ControlCommand>(), Err(ControlParseError::Empty));
        assert!(matches!(
            "pause 1".parse::<ControlCommand>(),
            Err(ControlParseError::Unknown(_))
        ));
        assert!(matches!(
            "set".parse::<ControlCommand>(),
            Err(ControlParseError::BadArgument { .. })
        ));
        assert!(matches!(
            "grow 0".parse::<ControlCommand>(),
            Err(ControlParseError::BadArgument { .. })
        ));
        assert!(matches!(
            "set -2".parse::<ControlCommand>(),
            Err(ControlParseError::BadArgument { .. })
        ));
    }

    #[test]
    fn display_roundtrips_through_parse() {
        for cmd in [
            ControlCommand::SetCapacity(3),
            ControlCommand::Halve,
            ControlCommand::Grow(10),
        ] {
            assert_eq!(cmd.to_string().parse::<ControlCommand>(), Ok(cmd));
        }
    }

    #[test]
    fn apply_halve_grow_set() {
        let limiter = Arc::new(ConcurrencyLimiter::new(10));
        let control = CapacityControl::new(Arc::clone(&limiter));
        assert_eq!(control.apply(ControlCommand::Halve), 5);
        assert_eq!(control.apply(ControlCommand::Grow(10)), 15);
        assert_eq!(control.apply(ControlCommand::SetCapacity(2)), 2);
        assert_eq!(control.apply(ControlCommand::Halve), 1);
        assert_eq!(control.apply(ControlCommand::Halve), 1);
        assert_eq!(limiter.capacity(), 1);
    }

    #[test]
    fn concurrent_grows_are_not_lost() {
        let limiter = Arc::new(ConcurrencyLimiter::new(1));
        let control = CapacityControl::new(Arc::clone(&limiter));
        let threads: Vec<_> = (0..4)
            .map(|_| {
                let control = control.clone();
                std::thread::spawn(move || {
                    for _ in 0..250 {
                        control.apply(ControlCommand::Grow(1));
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }
        assert_eq!(limiter.capacity(), 1001);
    }
}
