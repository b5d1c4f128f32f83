use crate::eval::VariableTable;

/// Where a run's visible side effects go.
pub trait Output {
    /// Called once per evaluated `print`.
    fn print(&mut self, value: i64);

    /// Called once, after a successful run, with the final bindings.
    fn snapshot(&mut self, variables: &VariableTable);
}

impl<O: Output + ?Sized> Output for &mut O {
    fn print(&mut self, value: i64) {
        (**self).print(value);
    }

    fn snapshot(&mut self, variables: &VariableTable) {
        (**self).snapshot(variables);
    }
}

/// Writes each value, then the table, on its own line of standard output.
#[derive(Debug, Default, Clone, Copy)]
pub struct Stdout;

impl Output for Stdout {
    fn print(&mut self, value: i64) {
        println!("{value}");
    }

    fn snapshot(&mut self, variables: &VariableTable) {
        println!("{variables}");
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Emitted {
    Value(i64),
    Snapshot(VariableTable),
}

/// Keeps everything a run emits, in order.
#[derive(Debug, Default, Clone)]
pub struct Recorder {
    pub emitted: Vec<Emitted>,
}

impl Recorder {
    /// Printed values, without the final snapshot.
    pub fn values(&self) -> Vec<i64> {
        self.emitted
            .iter()
            .filter_map(|entry| match entry {
                Emitted::Value(value) => Some(*value),
                Emitted::Snapshot(_) => None,
            })
            .collect()
    }

    /// Everything as the lines [`Stdout`] would have written.
    pub fn lines(&self) -> Vec<String> {
        self.emitted
            .iter()
            .map(|entry| match entry {
                Emitted::Value(value) => value.to_string(),
                Emitted::Snapshot(variables) => variables.to_string(),
            })
            .collect()
    }
}

impl Output for Recorder {
    fn print(&mut self, value: i64) {
        self.emitted.push(Emitted::Value(value));
    }

    fn snapshot(&mut self, variables: &VariableTable) {
        self.emitted.push(Emitted::Snapshot(variables.clone()));
    }
}
