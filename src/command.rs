/// Operator commands, one keystroke each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    PrintStats,
    ResetCounters,
    NewSession,
    Help,
}

impl Command {
    /// Map a keystroke to a command. Case-insensitive; unknown keys give `None`.
    pub fn from_key(key: char) -> Option<Self> {
        match key.to_ascii_uppercase() {
            'S' => Some(Command::PrintStats),
            'R' => Some(Command::ResetCounters),
            'N' => Some(Command::NewSession),
            'H' | '?' => Some(Command::Help),
            _ => None,
        }
    }

    /// Every command found in a line of terminal input, in order.
    pub fn parse_line(line: &str) -> Vec<Self> {
        line.chars().filter_map(Command::from_key).collect()
    }
}
