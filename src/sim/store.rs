// src/sim/store.rs

//! Columnar agent memory.
//!
//! One store per agent kind: a typed column per declared variable plus a
//! death-flag column. Workers never touch columns directly; they stage the
//! rows of their assigned range out of the store, run the callback against
//! the staged copies, and merge results back under the store lock. Staging
//! keeps the lock hold times short while the disjoint-range guarantee from
//! levelisation and the splitter keeps merges conflict-free.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::engine::backend::{RowRange, RowVerdict};
use crate::errors::{SimError, SimResult};
use crate::model::{Agent, Value, VarDecl};

/// One variable as exposed to a callback, with its writability.
#[derive(Debug, Clone)]
pub(crate) struct ViewVar {
    pub name: String,
    pub ty: crate::model::VarType,
    pub writable: bool,
}

/// The memory window an agent-function callback sees for one row:
/// the declared variables, nothing else.
pub struct MemoryView {
    vars: Arc<Vec<ViewVar>>,
    values: Vec<Value>,
}

impl MemoryView {
    pub(crate) fn new(vars: Arc<Vec<ViewVar>>, values: Vec<Value>) -> Self {
        Self { vars, values }
    }

    fn position(&self, var: &str) -> SimResult<usize> {
        self.vars
            .iter()
            .position(|v| v.name == var)
            .ok_or_else(|| {
                SimError::InvalidArgument(format!(
                    "variable '{var}' is not declared by this function"
                ))
            })
    }

    pub fn get(&self, var: &str) -> SimResult<&Value> {
        let idx = self.position(var)?;
        Ok(&self.values[idx])
    }

    pub fn get_int(&self, var: &str) -> SimResult<i64> {
        self.get(var)?.as_int().ok_or_else(|| {
            SimError::InvalidArgument(format!("variable '{var}' is not an int"))
        })
    }

    pub fn get_double(&self, var: &str) -> SimResult<f64> {
        self.get(var)?.as_double().ok_or_else(|| {
            SimError::InvalidArgument(format!("variable '{var}' is not a double"))
        })
    }

    pub fn set(&mut self, var: &str, value: Value) -> SimResult<()> {
        let idx = self.position(var)?;
        let decl = &self.vars[idx];
        if !decl.writable {
            return Err(SimError::InvalidArgument(format!(
                "variable '{var}' is read-only for this function"
            )));
        }
        if value.var_type() != decl.ty {
            return Err(SimError::InvalidArgument(format!(
                "variable '{var}' cannot hold a {:?}",
                value.var_type()
            )));
        }
        self.values[idx] = value;
        Ok(())
    }

    pub fn set_int(&mut self, var: &str, value: i64) -> SimResult<()> {
        self.set(var, Value::Int(value))
    }

    pub fn set_double(&mut self, var: &str, value: f64) -> SimResult<()> {
        self.set(var, Value::Double(value))
    }

    pub(crate) fn into_values(self) -> Vec<Value> {
        self.values
    }
}

struct StoreInner {
    vars: Vec<VarDecl>,
    columns: BTreeMap<String, Vec<Value>>,
    alive: Vec<bool>,
}

/// Columnar memory for one agent kind.
pub struct AgentStore {
    name: String,
    inner: Mutex<StoreInner>,
}

impl AgentStore {
    pub fn new(agent: &Agent) -> Self {
        let columns = agent
            .variables
            .iter()
            .map(|v| (v.name.clone(), Vec::new()))
            .collect();
        Self {
            name: agent.name.clone(),
            inner: Mutex::new(StoreInner {
                vars: agent.variables.clone(),
                columns,
                alive: Vec::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().expect("agent store mutex poisoned")
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current row count, including rows flagged dead but not yet compacted.
    pub fn rows(&self) -> usize {
        self.lock().alive.len()
    }

    pub fn var_decls(&self) -> Vec<VarDecl> {
        self.lock().vars.clone()
    }

    /// Append one row. Missing variables default per their type.
    pub fn push_row(&self, values: &BTreeMap<String, Value>) -> SimResult<()> {
        let mut inner = self.lock();
        for var in &inner.vars.clone() {
            let value = match values.get(&var.name) {
                Some(v) if v.var_type() == var.ty => v.clone(),
                Some(v) => {
                    return Err(SimError::InvalidPopulation(format!(
                        "agent '{}' variable '{}' expects {:?}, got {:?}",
                        self.name,
                        var.name,
                        var.ty,
                        v.var_type()
                    )))
                }
                None => var.ty.default_value(),
            };
            inner
                .columns
                .get_mut(&var.name)
                .expect("column missing for declared variable")
                .push(value);
        }
        inner.alive.push(true);
        Ok(())
    }

    /// Drop every row; used when (re)loading a population.
    pub fn clear(&self) {
        let mut inner = self.lock();
        for column in inner.columns.values_mut() {
            column.clear();
        }
        inner.alive.clear();
    }

    /// Stage the given variables for every row in `range`, in range order.
    pub(crate) fn read_rows(&self, range: RowRange, vars: &[ViewVar]) -> Vec<Vec<Value>> {
        let inner = self.lock();
        range
            .iter()
            .map(|row| {
                vars.iter()
                    .map(|v| inner.columns[&v.name][row].clone())
                    .collect()
            })
            .collect()
    }

    /// Merge staged rows back: writable variables are stored, dead verdicts
    /// flip the row's death flag. A row never comes back to life.
    pub(crate) fn write_rows(
        &self,
        range: RowRange,
        vars: &[ViewVar],
        rows: Vec<(Vec<Value>, RowVerdict)>,
    ) {
        debug_assert_eq!(range.len(), rows.len());
        let mut inner = self.lock();
        for (offset, (values, verdict)) in rows.into_iter().enumerate() {
            let row = range.start + offset;
            for (var, value) in vars.iter().zip(values) {
                if var.writable {
                    *inner
                        .columns
                        .get_mut(&var.name)
                        .expect("column missing for declared variable")
                        .get_mut(row)
                        .expect("row index out of range") = value;
                }
            }
            if verdict == RowVerdict::Dead {
                inner.alive[row] = false;
            }
        }
    }

    /// Snapshot one column, including rows flagged dead but not yet
    /// compacted, so columns persisted at different levels stay aligned.
    pub fn column(&self, var: &str) -> Option<Vec<Value>> {
        self.lock().columns.get(var).cloned()
    }

    /// Remove rows flagged dead. Runs single-threaded at iteration end.
    pub fn compact(&self) {
        let mut inner = self.lock();
        if inner.alive.iter().all(|&a| a) {
            return;
        }
        let alive = std::mem::take(&mut inner.alive);
        for column in inner.columns.values_mut() {
            let mut keep = alive.iter();
            column.retain(|_| *keep.next().expect("alive flags shorter than column"));
        }
        inner.alive = alive.into_iter().filter(|&a| a).collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AgentSpec, FunctionSpec, ModelBuilder, VarType};

    fn store() -> AgentStore {
        let model = ModelBuilder::new()
            .agent(
                AgentSpec::new("A")
                    .variable("x", VarType::Int)
                    .variable("label", VarType::String)
                    .function(FunctionSpec::new("f", "s", "t").read_write("x")),
            )
            .build()
            .unwrap();
        AgentStore::new(model.agent("A").unwrap())
    }

    fn row(x: i64) -> BTreeMap<String, Value> {
        BTreeMap::from([("x".to_string(), Value::Int(x))])
    }

    #[test]
    fn missing_variables_default() {
        let store = store();
        store.push_row(&row(3)).unwrap();
        assert_eq!(store.rows(), 1);
        assert_eq!(
            store.column("label").unwrap(),
            vec![Value::String(String::new())]
        );
    }

    #[test]
    fn type_mismatch_is_invalid_population() {
        let store = store();
        let bad = BTreeMap::from([("x".to_string(), Value::Double(1.5))]);
        assert!(matches!(
            store.push_row(&bad),
            Err(SimError::InvalidPopulation(_))
        ));
    }

    #[test]
    fn staged_writes_and_deaths_round_trip() {
        let store = store();
        for x in 0..4 {
            store.push_row(&row(x)).unwrap();
        }
        let vars = vec![ViewVar {
            name: "x".to_string(),
            ty: VarType::Int,
            writable: true,
        }];
        let range = RowRange::new(1, 3);
        let staged = store.read_rows(range, &vars);
        assert_eq!(staged, vec![vec![Value::Int(1)], vec![Value::Int(2)]]);

        store.write_rows(
            range,
            &vars,
            vec![
                (vec![Value::Int(10)], RowVerdict::Alive),
                (vec![Value::Int(20)], RowVerdict::Dead),
            ],
        );
        assert_eq!(
            store.column("x").unwrap(),
            vec![
                Value::Int(0),
                Value::Int(10),
                Value::Int(20),
                Value::Int(3)
            ]
        );

        store.compact();
        assert_eq!(store.rows(), 3);
        assert_eq!(
            store.column("x").unwrap(),
            vec![Value::Int(0), Value::Int(10), Value::Int(3)]
        );
    }

    #[test]
    fn memory_view_enforces_declarations() {
        let vars = Arc::new(vec![
            ViewVar {
                name: "x".to_string(),
                ty: VarType::Int,
                writable: true,
            },
            ViewVar {
                name: "y".to_string(),
                ty: VarType::Int,
                writable: false,
            },
        ]);
        let mut view = MemoryView::new(vars, vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(view.get_int("x").unwrap(), 1);
        view.set_int("x", 5).unwrap();
        assert!(view.set_int("y", 9).is_err());
        assert!(view.get("z").is_err());
        assert!(view.set("x", Value::Double(0.5)).is_err());
        assert_eq!(view.into_values(), vec![Value::Int(5), Value::Int(2)]);
    }
}
