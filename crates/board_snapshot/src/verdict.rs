use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Closed judge outcome taxonomy. Declaration order is the judge's status code order,
/// which is also the iteration order of verdict-keyed maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "&'static str")]
pub enum Verdict {
    Waiting,
    Accepted,
    WrongAnswer,
    TimeLimitExceeded,
    MemoryLimitExceeded,
    OutputLimitExceeded,
    RuntimeError,
    CompileError,
    SystemError,
    Canceled,
    UnknownError,
    Hacked,
    Running,
    Compiling,
}

/// A verdict label outside the closed taxonomy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVerdict(pub String);

impl fmt::Display for UnknownVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown verdict: {:?}", self.0)
    }
}

impl std::error::Error for UnknownVerdict {}

impl Verdict {
    pub const ALL: [Verdict; 14] = [
        Verdict::Waiting,
        Verdict::Accepted,
        Verdict::WrongAnswer,
        Verdict::TimeLimitExceeded,
        Verdict::MemoryLimitExceeded,
        Verdict::OutputLimitExceeded,
        Verdict::RuntimeError,
        Verdict::CompileError,
        Verdict::SystemError,
        Verdict::Canceled,
        Verdict::UnknownError,
        Verdict::Hacked,
        Verdict::Running,
        Verdict::Compiling,
    ];

    /// Verdicts with a short alias, in the order they are listed in report text.
    pub const ALIASED: [Verdict; 8] = [
        Verdict::Accepted,
        Verdict::WrongAnswer,
        Verdict::TimeLimitExceeded,
        Verdict::MemoryLimitExceeded,
        Verdict::OutputLimitExceeded,
        Verdict::RuntimeError,
        Verdict::CompileError,
        Verdict::SystemError,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::Waiting => "Waiting",
            Verdict::Accepted => "Accepted",
            Verdict::WrongAnswer => "Wrong Answer",
            Verdict::TimeLimitExceeded => "Time Limit Exceeded",
            Verdict::MemoryLimitExceeded => "Memory Limit Exceeded",
            Verdict::OutputLimitExceeded => "Output Limit Exceeded",
            Verdict::RuntimeError => "Runtime Error",
            Verdict::CompileError => "Compile Error",
            Verdict::SystemError => "System Error",
            Verdict::Canceled => "Canceled",
            Verdict::UnknownError => "Unknown Error",
            Verdict::Hacked => "Hacked",
            Verdict::Running => "Running",
            Verdict::Compiling => "Compiling",
        }
    }

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(code as usize).copied()
    }

    pub fn alias(self) -> Option<&'static str> {
        match self {
            Verdict::Accepted => Some("AC"),
            Verdict::WrongAnswer => Some("WA"),
            Verdict::TimeLimitExceeded => Some("TLE"),
            Verdict::MemoryLimitExceeded => Some("MLE"),
            Verdict::OutputLimitExceeded => Some("OLE"),
            Verdict::RuntimeError => Some("RE"),
            Verdict::CompileError => Some("CE"),
            Verdict::SystemError => Some("SE"),
            _ => None,
        }
    }

    /// Short label for titles, falling back to the full name for unaliased verdicts.
    pub fn short_label(self) -> &'static str {
        self.alias().unwrap_or_else(|| self.as_str())
    }

    /// Parses a short alias (`AC`, `WA`, ...), case-insensitively.
    pub fn from_alias(alias: &str) -> Result<Self, UnknownVerdict> {
        let wanted = alias.trim();
        Self::ALIASED
            .into_iter()
            .find(|verdict| {
                verdict
                    .alias()
                    .is_some_and(|a| a.eq_ignore_ascii_case(wanted))
            })
            .ok_or_else(|| UnknownVerdict(alias.to_string()))
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Verdict {
    type Err = UnknownVerdict;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|verdict| verdict.as_str() == s)
            .ok_or_else(|| UnknownVerdict(s.to_string()))
    }
}

impl TryFrom<String> for Verdict {
    type Error = UnknownVerdict;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Verdict> for &'static str {
    fn from(value: Verdict) -> Self {
        value.as_str()
    }
}
