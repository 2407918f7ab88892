use std::fmt;
use std::str::FromStr;

/// Where the node is in its install → init → configure → daemon sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    /// No daemon is tracked
    Stopped,
    /// Installing the binary or running `init`
    Initializing,
    /// Patching the node config
    Configuring,
    /// A daemon process is tracked
    Running,
}

impl NodeState {
    pub fn is_running(&self) -> bool {
        matches!(self, NodeState::Running)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeState::Stopped => "stopped",
            NodeState::Initializing => "initializing",
            NodeState::Configuring => "configuring",
            NodeState::Running => "running",
        }
    }
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot for whatever presents the node to a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeStatus {
    pub state: NodeState,
    /// Daemon PID if one is tracked
    pub pid: Option<u32>,
    /// Raw exit code of the most recent `init` run; never validated
    pub last_init_exit: Option<i32>,
    pub log_lines: usize,
}

/// Lifecycle requests arriving from outside, one action string each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleCommand {
    Start,
    Stop,
    Restart,
    Exit,
}

impl LifecycleCommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleCommand::Start => "start",
            LifecycleCommand::Stop => "stop",
            LifecycleCommand::Restart => "restart",
            LifecycleCommand::Exit => "exit",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCommand(pub String);

impl fmt::Display for UnknownCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown lifecycle action: {}", self.0)
    }
}

impl std::error::Error for UnknownCommand {}

impl FromStr for LifecycleCommand {
    type Err = UnknownCommand;

    fn from_str(action: &str) -> Result<Self, Self::Err> {
        match action.trim() {
            "start" => Ok(LifecycleCommand::Start),
            "stop" => Ok(LifecycleCommand::Stop),
            "restart" => Ok(LifecycleCommand::Restart),
            "exit" => Ok(LifecycleCommand::Exit),
            other => Err(UnknownCommand(other.to_string())),
        }
    }
}

/// What the host should do after a command was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Continue,
    /// Terminate the hosting process
    Exit,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        for cmd in [
            LifecycleCommand::Start,
            LifecycleCommand::Stop,
            LifecycleCommand::Restart,
            LifecycleCommand::Exit,
        ] {
            assert_eq!(cmd.as_str().parse::<LifecycleCommand>().unwrap(), cmd);
        }
        assert_eq!(" stop\n".parse::<LifecycleCommand>().unwrap(), LifecycleCommand::Stop);
    }

    #[test]
    fn test_unknown_command() {
        let err = "reboot".parse::<LifecycleCommand>().unwrap_err();
        assert_eq!(err, UnknownCommand("reboot".to_string()));
        assert!("START".parse::<LifecycleCommand>().is_err());
    }

    #[test]
    fn test_state_strings() {
        assert_eq!(NodeState::Running.to_string(), "running");
        assert!(NodeState::Running.is_running());
        assert!(!NodeState::Configuring.is_running());
        assert_eq!(NodeState::Initializing.as_str(), "initializing");
    }
}
