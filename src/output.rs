use std::io::{self, Write};

use serde::Serialize;

use crate::mapping::Resolution;
use crate::policy::RefreshOutcome;
use crate::timer::TimerReport;

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_refresh(result: &RefreshOutcome) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_convert(result: &Resolution) -> io::Result<()> {
        Self::print_json(result)
    }

    /// Phase tree goes to stderr so stdout stays machine-readable.
    pub fn print_timings(report: &TimerReport) -> io::Result<()> {
        Self::write_timings(&mut io::stderr(), report)
    }

    pub fn write_timings<W: Write>(out: &mut W, report: &TimerReport) -> io::Result<()> {
        write!(out, "{report}")?;
        out.flush()
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}
