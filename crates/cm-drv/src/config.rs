//! Driver-wide configuration resolved from CLI flags (spec §6).

use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitTarget {
    Mir,
    Js,
}

impl std::str::FromStr for EmitTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mir" => Ok(EmitTarget::Mir),
            "js" => Ok(EmitTarget::Js),
            other => Err(format!("unknown emit target `{other}`, expected `mir` or `js`")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub fixture: String,
    pub opt_level: u8,
    pub emit: EmitTarget,
    pub out: Option<PathBuf>,
    pub verbose: bool,
}
