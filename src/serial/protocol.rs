use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Result, SerialError};
use crate::catalog::{DispenserId, OrderId};

/// Line rate of the dispensing rig's controller.
pub const BAUD_RATE: u32 = 115200;
/// Minimum spacing between two transmitted lines; the controller drops
/// commands that arrive faster than this.
pub const COMMAND_DELAY: Duration = Duration::from_millis(10);
/// Rail position the carriage returns to after every order.
pub const HOME_POSITION: i32 = 0;
pub const LINE_TERMINATOR: char = '\n';

/// One instruction of the Barbot line protocol.
///
/// Each command is sent as a single ASCII line: the opcode letter followed by
/// its operands, separated by single spaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Command {
    /// `C`: discard any instructions still pending on the device.
    Clear,
    /// `M <position>`: move the rail to an absolute position.
    Move { position: i32 },
    /// `D <dispenser> <param>`: dispense. `param` is a duration for
    /// time-based dispensers and a pulse size for count-based ones.
    Dispense { dispenser: DispenserId, param: u64 },
    /// `G`: execute the queued instruction set.
    Go,
    /// `R`: full device reset.
    Reset,
    /// `Z`: zero/calibrate the rail position.
    Zero,
}

impl Command {
    pub fn opcode(&self) -> char {
        match self {
            Command::Clear => 'C',
            Command::Move { .. } => 'M',
            Command::Dispense { .. } => 'D',
            Command::Go => 'G',
            Command::Reset => 'R',
            Command::Zero => 'Z',
        }
    }

    /// Wire form including the line terminator.
    pub fn to_line(&self) -> String {
        format!("{}{}", self, LINE_TERMINATOR)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Move { position } => write!(f, "M {}", position),
            Command::Dispense { dispenser, param } => write!(f, "D {} {}", dispenser, param),
            other => write!(f, "{}", other.opcode()),
        }
    }
}

impl FromStr for Command {
    type Err = SerialError;

    fn from_str(line: &str) -> Result<Self> {
        let mut parts = line.trim_end_matches(['\r', '\n']).split(' ');
        let opcode = parts.next().unwrap_or_default();

        let mut operand = |name: &str| -> Result<&str> {
            parts
                .next()
                .filter(|s| !s.is_empty())
                .ok_or_else(|| SerialError::ProtocolError(format!("Missing {} in '{}'", name, line)))
        };

        let command = match opcode {
            "C" => Command::Clear,
            "G" => Command::Go,
            "R" => Command::Reset,
            "Z" => Command::Zero,
            "M" => Command::Move {
                position: operand("position")?
                    .parse()
                    .map_err(|_| SerialError::ProtocolError(format!("Invalid position in '{}'", line)))?,
            },
            "D" => {
                let dispenser = operand("dispenser id")?
                    .parse()
                    .map_err(|_| SerialError::ProtocolError(format!("Invalid dispenser id in '{}'", line)))?;
                let param = operand("parameter")?
                    .parse()
                    .map_err(|_| SerialError::ProtocolError(format!("Invalid parameter in '{}'", line)))?;
                Command::Dispense { dispenser, param }
            }
            _ => return Err(SerialError::ProtocolError(format!("Unknown opcode in '{}'", line))),
        };

        if parts.next().is_some() {
            return Err(SerialError::ProtocolError(format!("Unexpected operand in '{}'", line)));
        }
        Ok(command)
    }
}

/// Administrative actions that bypass the order compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlAction {
    Reset,
    Zero,
}

impl ControlAction {
    pub fn command(&self) -> Command {
        match self {
            ControlAction::Reset => Command::Reset,
            ControlAction::Zero => Command::Zero,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchKind {
    Order(OrderId),
    Control(ControlAction),
}

/// The complete command sequence for one order or one control action.
/// A batch is the unit of transmission: it is never split or interleaved
/// with another batch on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandBatch {
    id: Uuid,
    kind: BatchKind,
    commands: Vec<Command>,
}

impl CommandBatch {
    pub fn for_order(order_id: OrderId, commands: Vec<Command>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: BatchKind::Order(order_id),
            commands,
        }
    }

    pub fn control(action: ControlAction) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: BatchKind::Control(action),
            commands: vec![action.command()],
        }
    }

    pub fn reset() -> Self {
        Self::control(ControlAction::Reset)
    }

    pub fn zero() -> Self {
        Self::control(ControlAction::Zero)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn kind(&self) -> BatchKind {
        self.kind
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Wire lines without terminators, in transmission order.
    pub fn lines(&self) -> Vec<String> {
        self.commands.iter().map(|c| c.to_string()).collect()
    }
}

impl fmt::Display for BatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchKind::Order(id) => write!(f, "order {:05}", id),
            BatchKind::Control(ControlAction::Reset) => write!(f, "reset"),
            BatchKind::Control(ControlAction::Zero) => write!(f, "zero"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_wire_lines() {
        assert_eq!(Command::Clear.to_line(), "C\n");
        assert_eq!(Command::Move { position: 5 }.to_string(), "M 5");
        assert_eq!(Command::Move { position: -12 }.to_string(), "M -12");
        assert_eq!(Command::Dispense { dispenser: 3, param: 3000 }.to_line(), "D 3 3000\n");
        assert_eq!(Command::Go.to_string(), "G");
        assert_eq!(Command::Reset.to_string(), "R");
        assert_eq!(Command::Zero.to_string(), "Z");
    }

    #[test]
    fn parses_wire_lines() {
        assert_eq!("M 9\n".parse::<Command>().unwrap(), Command::Move { position: 9 });
        assert_eq!(
            "D 4 100\r\n".parse::<Command>().unwrap(),
            Command::Dispense { dispenser: 4, param: 100 }
        );
        assert_eq!("G".parse::<Command>().unwrap(), Command::Go);
    }

    #[test]
    fn rejects_malformed_lines() {
        for line in ["", "X", "M", "M five", "D 4", "D 4 -1", "C 1", "M  5"] {
            assert!(line.parse::<Command>().is_err(), "accepted '{}'", line);
        }
    }

    #[test]
    fn control_batches_hold_a_single_opcode() {
        let reset = CommandBatch::reset();
        assert_eq!(reset.lines(), vec!["R"]);
        assert_eq!(reset.kind(), BatchKind::Control(ControlAction::Reset));

        let zero = CommandBatch::zero();
        assert_eq!(zero.lines(), vec!["Z"]);
        assert_ne!(reset.id(), zero.id());
    }

    #[test]
    fn batch_kind_formats_order_reference() {
        assert_eq!(BatchKind::Order(42).to_string(), "order 00042");
    }
}
