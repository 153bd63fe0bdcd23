//! Line-oriented what-if session over a loaded [`Dashboard`].
//!
//! Each command changes one piece of state (entity, an input value, a wage
//! band) and re-prints the prediction. Missing inputs are reported and the
//! session keeps going.

use std::io::{BufRead, Write};
use std::sync::Arc;

use anyhow::Result;
use pl_core::{Error, Variable};
use pl_inference::{EntityResolution, Inputs, Prediction};

use crate::dashboard::Dashboard;

const HELP: &str = "\
commands:
  entity <id or name>   select an entity
  set <variable> <x>    set an input value
  unset <variable>      clear an input value
  band <label>          set minimum wage from a preset band
  bands                 list wage bands
  entities              list entities
  reload                re-read the data and refit
  show                  print the current prediction
  help                  this text
  quit                  leave";

pub struct Session {
    dash: Arc<Dashboard>,
    entity: String,
    inputs: Inputs,
}

enum Step {
    Continue,
    Quit,
}

impl Session {
    /// Session on the first entity with every exposed input at its observed mean.
    pub fn new(dash: Arc<Dashboard>) -> Self {
        let entity = dash.default_entity().to_string();
        let inputs = dash.default_inputs();
        Self { dash, entity, inputs }
    }

    pub fn run<R: BufRead, W: Write>(&mut self, input: R, out: &mut W) -> Result<()> {
        writeln!(out, "{HELP}")?;
        self.show(out)?;
        for line in input.lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if let Step::Quit = self.apply(line, out)? {
                break;
            }
        }
        Ok(())
    }

    fn apply<W: Write>(&mut self, line: &str, out: &mut W) -> Result<Step> {
        let (cmd, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let rest = rest.trim();
        match cmd.to_ascii_lowercase().as_str() {
            "quit" | "exit" | "q" => return Ok(Step::Quit),
            "help" | "?" => writeln!(out, "{HELP}")?,
            "show" => self.show(out)?,
            // Keeps the selected entity and inputs; only the fit is replaced.
            "reload" => match self.dash.reload() {
                Ok(dash) => {
                    self.dash = dash;
                    writeln!(out, "reloaded {}", self.dash.config().data.path.display())?;
                    self.show(out)?;
                }
                Err(e) => writeln!(out, "error: reload failed: {e}")?,
            },
            "entity" if !rest.is_empty() => {
                self.entity = rest.to_string();
                self.show(out)?;
            }
            "set" => match parse_assignment(rest) {
                Ok((v, x)) => {
                    self.inputs.insert(v, x);
                    self.show(out)?;
                }
                Err(msg) => writeln!(out, "error: {msg}")?,
            },
            "unset" => match rest.parse::<Variable>() {
                Ok(v) => {
                    self.inputs.remove(&v);
                    self.show(out)?;
                }
                Err(e) => writeln!(out, "error: {e}")?,
            },
            "band" => match self.dash.config().simulation.wage_band(rest) {
                Some(band) => {
                    self.inputs.insert(Variable::MinimumWage, band.value);
                    self.show(out)?;
                }
                None => writeln!(out, "error: unknown wage band '{rest}' (see `bands`)")?,
            },
            "bands" => {
                for band in &self.dash.config().simulation.wage_bands {
                    writeln!(out, "  {:<14} {:>12.0}", band.label, band.value)?;
                }
            }
            "entities" => {
                for e in self.dash.intercepts().entries() {
                    writeln!(out, "  {:<8} {}", e.entity_id, e.display_name)?;
                }
            }
            _ => writeln!(out, "error: unrecognized command '{line}' (try `help`)")?,
        }
        Ok(Step::Continue)
    }

    fn show<W: Write>(&self, out: &mut W) -> Result<()> {
        match self.dash.predict(&self.entity, &self.inputs) {
            Ok(p) => write_prediction(out, &p)?,
            Err(e @ Error::Input { .. }) => writeln!(out, "validation: {e}")?,
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }
}

/// Parse `<variable> <value>` or `<variable>=<value>`.
pub fn parse_assignment(s: &str) -> std::result::Result<(Variable, f64), String> {
    let (name, value) = s
        .split_once('=')
        .or_else(|| s.trim().split_once(char::is_whitespace))
        .ok_or_else(|| format!("expected '<variable> <value>', got '{s}'"))?;
    let variable: Variable = name.trim().parse().map_err(|e: Error| e.to_string())?;
    let value: f64 =
        value.trim().parse().map_err(|_| format!("'{}' is not a number", value.trim()))?;
    if !value.is_finite() {
        return Err(format!("{variable} must be finite"));
    }
    Ok((variable, value))
}

pub fn write_prediction<W: Write>(out: &mut W, p: &Prediction) -> std::io::Result<()> {
    match &p.entity {
        EntityResolution::Known { entity_id, display_name } => {
            writeln!(out, "entity: {display_name} ({entity_id})")?
        }
        EntityResolution::Fallback { selector } => {
            writeln!(out, "entity: '{selector}' not found; using mean intercept")?
        }
    }
    writeln!(out, "{p}")
}
