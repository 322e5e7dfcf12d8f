// src/io/xml_pop.rs

//! Reading and writing population XML documents.
//!
//! The document shape is a `<states>` root carrying an `<itno>` and a
//! sequence of `<xagent>` elements, each with a `<name>` and one child
//! element per variable:
//!
//! ```xml
//! <states>
//!   <itno>1</itno>
//!   <xagent>
//!     <name>Circle</name>
//!     <x>0.25</x>
//!   </xagent>
//! </states>
//! ```

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::debug;

use crate::errors::{SimError, SimResult};
use crate::model::{Model, Value};

/// One agent instance as read from a population document.
#[derive(Debug, Clone, PartialEq)]
pub struct PopRow {
    pub agent: String,
    pub values: BTreeMap<String, Value>,
}

/// A parsed population document.
#[derive(Debug, Clone, PartialEq)]
pub struct Population {
    pub itno: usize,
    pub rows: Vec<PopRow>,
}

/// Write the population document for iteration `itno` to
/// `<prefix><itno>.xml` and return the written path.
///
/// `columns` maps `(agent, variable)` to the column captured by the data
/// tasks; agents without variables produce no `<xagent>` entries.
pub fn write_population(
    prefix: &Path,
    itno: usize,
    model: &Model,
    columns: &BTreeMap<(String, String), Vec<Value>>,
) -> SimResult<PathBuf> {
    let path = PathBuf::from(format!("{}{}.xml", prefix.display(), itno));

    let mut doc = String::new();
    doc.push_str("<states>\n");
    let _ = writeln!(doc, "  <itno>{itno}</itno>");

    for agent in model.agents() {
        let Some(first_var) = agent.variables.first() else {
            continue;
        };
        let rows = columns
            .get(&(agent.name.clone(), first_var.name.clone()))
            .map_or(0, Vec::len);

        for row in 0..rows {
            doc.push_str("  <xagent>\n");
            let _ = writeln!(doc, "    <name>{}</name>", escape_text(&agent.name));
            for var in &agent.variables {
                let column = columns
                    .get(&(agent.name.clone(), var.name.clone()))
                    .ok_or_else(|| {
                        SimError::InvalidPopulation(format!(
                            "no persisted column for '{}/{}'",
                            agent.name, var.name
                        ))
                    })?;
                let _ = writeln!(
                    doc,
                    "    <{name}>{value}</{name}>",
                    name = var.name,
                    value = escape_text(&column[row].to_string())
                );
            }
            doc.push_str("  </xagent>\n");
        }
    }

    doc.push_str("</states>\n");
    fs::write(&path, doc)?;
    debug!(path = %path.display(), "population document written");
    Ok(path)
}

fn escape_text(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

/// Parse a population document against `model`.
///
/// # Errors
/// `InvalidPopulation` on malformed XML, unknown agent or variable names,
/// or values that cannot be cast to the declared variable type.
pub fn read_population(path: &Path, model: &Model) -> SimResult<Population> {
    let content = fs::read_to_string(path)?;
    let mut reader = Reader::from_str(&content);

    let mut itno = 0usize;
    let mut rows = Vec::new();

    // Per-element accumulation state.
    let mut path_stack: Vec<String> = Vec::new();
    let mut text = String::new();
    // Raw (element, text) pairs of the xagent being read.
    let mut fields: Vec<(String, String)> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) => {
                let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
                path_stack.push(name);
                text.clear();
            }
            Ok(Event::Text(t)) => {
                let raw = t
                    .unescape()
                    .map_err(|e| SimError::InvalidPopulation(e.to_string()))?;
                text.push_str(&raw);
            }
            Ok(Event::End(_)) => {
                let name = path_stack.pop().unwrap_or_default();
                match (path_stack.len(), name.as_str()) {
                    // Closing a child of <states>.
                    (1, "itno") => {
                        itno = text.trim().parse().map_err(|_| {
                            SimError::InvalidPopulation(format!(
                                "itno is not a number: '{}'",
                                text.trim()
                            ))
                        })?;
                    }
                    (1, "xagent") => {
                        rows.push(finish_row(model, std::mem::take(&mut fields))?);
                    }
                    // Closing a field inside <xagent>.
                    (2, field) => {
                        fields.push((field.to_string(), std::mem::take(&mut text)));
                    }
                    _ => {}
                }
                text.clear();
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(SimError::InvalidPopulation(format!(
                    "malformed population XML: {e}"
                )))
            }
        }
    }

    debug!(itno, rows = rows.len(), "population document parsed");
    Ok(Population { itno, rows })
}

fn finish_row(model: &Model, fields: Vec<(String, String)>) -> SimResult<PopRow> {
    let agent_name = fields
        .iter()
        .find(|(k, _)| k == "name")
        .map(|(_, v)| v.trim().to_string())
        .ok_or_else(|| SimError::InvalidPopulation("xagent without a <name>".to_string()))?;

    let agent = model.agent(&agent_name).ok_or_else(|| {
        SimError::InvalidPopulation(format!("unknown agent '{agent_name}'"))
    })?;

    let mut values = BTreeMap::new();
    for (field, raw) in fields {
        if field == "name" {
            continue;
        }
        let var = agent.variable(&field).ok_or_else(|| {
            SimError::InvalidPopulation(format!(
                "agent '{agent_name}' has no variable '{field}'"
            ))
        })?;
        let value = var.ty.parse_value(&raw).ok_or_else(|| {
            SimError::InvalidPopulation(format!(
                "value '{raw}' of '{agent_name}/{field}' is not a valid {:?}",
                var.ty
            ))
        })?;
        values.insert(field, value);
    }

    Ok(PopRow {
        agent: agent_name,
        values,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_escaping_round_trips() {
        assert_eq!(escape_text("a < b && c > d"), "a &lt; b &amp;&amp; c &gt; d");
        assert_eq!(escape_text("plain"), "plain");
    }
}
