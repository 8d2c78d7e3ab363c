//! # Parsing of MPS files
//!
//! Reads the Mathematical Programming System format, free-form: NAME,
//! OBJSENSE, ROWS, COLUMNS, RHS, RANGES, BOUNDS and ENDATA sections.
//! Integer markers in the COLUMNS section are accepted and ignored (the
//! continuous relaxation is read).
use std::collections::HashMap;

use crate::data::linear_program::elements::{ConstraintType, Objective, INF};
use crate::data::linear_program::model::LpProblem;
use crate::io::error::{Import, Inconsistency, Parse};

/// MPS files are divided into sections.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Section {
    Start,
    ObjSense,
    Rows,
    Columns,
    Rhs,
    Ranges,
    Bounds,
    Endata,
}

/// What a name in the ROWS section refers to.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum RowKind {
    Objective,
    Constraint(usize),
    /// Non-objective N rows carry no constraint; their entries are
    /// dropped.
    Ignored,
}

#[derive(Debug, Default)]
struct Builder {
    model_name: String,
    objective: Objective,

    row_kinds: HashMap<String, RowKind>,
    row_names: Vec<String>,
    row_types: Vec<ConstraintType>,
    rhs: Vec<f64>,
    range: Vec<Option<f64>>,

    col_index: HashMap<String, usize>,
    col_names: Vec<String>,
    col_entries: Vec<Vec<(usize, f64)>>,
    col_cost: Vec<f64>,
    col_lower: Vec<f64>,
    col_upper: Vec<f64>,
    /// Whether an explicit lower bound was given; the negative-upper-bound
    /// convention only applies to the default lower bound of zero.
    col_lower_given: Vec<bool>,

    offset: f64,
    has_objective_row: bool,
}

/// Parse an MPS program in string form.
pub fn parse(program: &str) -> Result<LpProblem, Import> {
    let mut builder = Builder::default();
    let mut section = Section::Start;

    for (number, raw_line) in program.lines().enumerate() {
        let line_number = number + 1;
        let line = raw_line.trim_end();
        if line.is_empty() || line.starts_with('*') {
            continue;
        }

        let is_section_header = !raw_line.starts_with(' ') && !raw_line.starts_with('\t');
        let fields: Vec<&str> = line.split_whitespace().collect();
        if is_section_header {
            section = match fields[0] {
                "NAME" => {
                    builder.model_name = fields.get(1).unwrap_or(&"").to_string();
                    continue;
                }
                "OBJSENSE" => Section::ObjSense,
                "ROWS" => Section::Rows,
                "COLUMNS" => Section::Columns,
                "RHS" => Section::Rhs,
                "RANGES" => Section::Ranges,
                "BOUNDS" => Section::Bounds,
                "ENDATA" => Section::Endata,
                other => {
                    return Err(Import::Parse(Parse::at_line(
                        format!("unknown section \"{}\"", other),
                        line_number,
                    )))
                }
            };
            if section == Section::Endata {
                break;
            }
            continue;
        }

        match section {
            Section::Start => {
                return Err(Import::Parse(Parse::at_line(
                    "data before the first section header",
                    line_number,
                )))
            }
            Section::ObjSense => match fields[0] {
                "MAX" | "MAXIMIZE" => builder.objective = Objective::Maximize,
                "MIN" | "MINIMIZE" => builder.objective = Objective::Minimize,
                other => {
                    return Err(Import::Parse(Parse::at_line(
                        format!("unknown objective sense \"{}\"", other),
                        line_number,
                    )))
                }
            },
            Section::Rows => builder.row_line(&fields, line_number)?,
            Section::Columns => builder.column_line(&fields, line_number)?,
            Section::Rhs => builder.rhs_line(&fields, line_number)?,
            Section::Ranges => builder.ranges_line(&fields, line_number)?,
            Section::Bounds => builder.bounds_line(&fields, line_number)?,
            Section::Endata => unreachable!(),
        }
    }

    builder.finish()
}

fn parse_value(field: &str, line_number: usize) -> Result<f64, Import> {
    field.parse::<f64>().map_err(|_| {
        Import::Parse(Parse::at_line(
            format!("could not parse \"{}\" as a number", field),
            line_number,
        ))
    })
}

impl Builder {
    fn row_line(&mut self, fields: &[&str], line_number: usize) -> Result<(), Import> {
        let [kind, name] = fields else {
            return Err(Import::Parse(Parse::at_line(
                "expected a row type and a row name",
                line_number,
            )));
        };
        let kind = match *kind {
            "N" => {
                if self.has_objective_row {
                    RowKind::Ignored
                } else {
                    self.has_objective_row = true;
                    RowKind::Objective
                }
            }
            "L" | "G" | "E" => {
                let index = self.row_names.len();
                self.row_names.push(name.to_string());
                self.row_types.push(match *kind {
                    "L" => ConstraintType::Less,
                    "G" => ConstraintType::Greater,
                    _ => ConstraintType::Equal,
                });
                self.rhs.push(0.0);
                self.range.push(None);
                RowKind::Constraint(index)
            }
            other => {
                return Err(Import::Parse(Parse::at_line(
                    format!("unknown row type \"{}\"", other),
                    line_number,
                )))
            }
        };
        if self.row_kinds.insert(name.to_string(), kind).is_some() {
            return Err(Import::Inconsistency(Inconsistency::new(format!(
                "row \"{}\" defined twice",
                name
            ))));
        }
        Ok(())
    }

    fn column_line(&mut self, fields: &[&str], line_number: usize) -> Result<(), Import> {
        // Integer markers delimit integer columns; the relaxation reads
        // through them.
        if fields.len() >= 3 && fields[1] == "'MARKER'" {
            return Ok(());
        }
        let (name, pairs) = fields.split_first().ok_or_else(|| {
            Import::Parse(Parse::at_line("empty column line", line_number))
        })?;
        if pairs.is_empty() || pairs.len() % 2 != 0 {
            return Err(Import::Parse(Parse::at_line(
                "expected (row, value) pairs after the column name",
                line_number,
            )));
        }

        let col = match self.col_index.get(*name) {
            Some(&col) => col,
            None => {
                let col = self.col_names.len();
                self.col_index.insert(name.to_string(), col);
                self.col_names.push(name.to_string());
                self.col_entries.push(Vec::new());
                self.col_cost.push(0.0);
                self.col_lower.push(0.0);
                self.col_upper.push(INF);
                self.col_lower_given.push(false);
                col
            }
        };

        for pair in pairs.chunks(2) {
            let value = parse_value(pair[1], line_number)?;
            match self.row_kinds.get(pair[0]) {
                Some(RowKind::Objective) => self.col_cost[col] += value,
                Some(&RowKind::Constraint(row)) => self.col_entries[col].push((row, value)),
                Some(RowKind::Ignored) => {}
                None => {
                    return Err(Import::Inconsistency(Inconsistency::new(format!(
                        "column \"{}\" references unknown row \"{}\"",
                        name, pair[0]
                    ))))
                }
            }
        }
        Ok(())
    }

    fn rhs_line(&mut self, fields: &[&str], line_number: usize) -> Result<(), Import> {
        // The first field names the rhs vector; a single one is supported.
        let pairs = &fields[1..];
        if pairs.is_empty() || pairs.len() % 2 != 0 {
            return Err(Import::Parse(Parse::at_line(
                "expected (row, value) pairs after the rhs name",
                line_number,
            )));
        }
        for pair in pairs.chunks(2) {
            let value = parse_value(pair[1], line_number)?;
            match self.row_kinds.get(pair[0]) {
                // An objective-row entry is the negated constant term.
                Some(RowKind::Objective) => self.offset = -value,
                Some(&RowKind::Constraint(row)) => self.rhs[row] = value,
                Some(RowKind::Ignored) => {}
                None => {
                    return Err(Import::Inconsistency(Inconsistency::new(format!(
                        "rhs references unknown row \"{}\"",
                        pair[0]
                    ))))
                }
            }
        }
        Ok(())
    }

    fn ranges_line(&mut self, fields: &[&str], line_number: usize) -> Result<(), Import> {
        let pairs = &fields[1..];
        if pairs.is_empty() || pairs.len() % 2 != 0 {
            return Err(Import::Parse(Parse::at_line(
                "expected (row, value) pairs after the range name",
                line_number,
            )));
        }
        for pair in pairs.chunks(2) {
            let value = parse_value(pair[1], line_number)?;
            match self.row_kinds.get(pair[0]) {
                Some(&RowKind::Constraint(row)) => self.range[row] = Some(value),
                Some(_) => {
                    return Err(Import::Inconsistency(Inconsistency::new(
                        "range on the objective row",
                    )))
                }
                None => {
                    return Err(Import::Inconsistency(Inconsistency::new(format!(
                        "range references unknown row \"{}\"",
                        pair[0]
                    ))))
                }
            }
        }
        Ok(())
    }

    fn bounds_line(&mut self, fields: &[&str], line_number: usize) -> Result<(), Import> {
        let bound_type = fields[0];
        // fields[1] names the bound set; a single one is supported.
        let Some(&name) = fields.get(2) else {
            return Err(Import::Parse(Parse::at_line(
                "expected a bound type, set name and column name",
                line_number,
            )));
        };
        let &col = self.col_index.get(name).ok_or_else(|| {
            Import::Inconsistency(Inconsistency::new(format!(
                "bound on unknown column \"{}\"",
                name
            )))
        })?;

        let value = || -> Result<f64, Import> {
            let field = fields.get(3).ok_or_else(|| {
                Import::Parse(Parse::at_line("bound type requires a value", line_number))
            })?;
            parse_value(field, line_number)
        };

        match bound_type {
            "LO" => {
                self.col_lower[col] = value()?;
                self.col_lower_given[col] = true;
            }
            "UP" => {
                let value = value()?;
                self.col_upper[col] = value;
                // A negative upper bound on a default-nonnegative column
                // frees the lower bound.
                if value < 0.0 && !self.col_lower_given[col] {
                    self.col_lower[col] = -INF;
                }
            }
            "FX" => {
                let value = value()?;
                self.col_lower[col] = value;
                self.col_upper[col] = value;
                self.col_lower_given[col] = true;
            }
            "FR" => {
                self.col_lower[col] = -INF;
                self.col_upper[col] = INF;
                self.col_lower_given[col] = true;
            }
            "MI" => {
                self.col_lower[col] = -INF;
                self.col_lower_given[col] = true;
            }
            "PL" => self.col_upper[col] = INF,
            "BV" => {
                self.col_lower[col] = 0.0;
                self.col_upper[col] = 1.0;
                self.col_lower_given[col] = true;
            }
            other => {
                return Err(Import::Parse(Parse::at_line(
                    format!("unknown bound type \"{}\"", other),
                    line_number,
                )))
            }
        }
        Ok(())
    }

    fn finish(self) -> Result<LpProblem, Import> {
        let num_col = self.col_names.len();
        let num_row = self.row_names.len();

        let mut a_start = Vec::with_capacity(num_col + 1);
        let mut a_index = Vec::new();
        let mut a_value = Vec::new();
        for entries in &self.col_entries {
            a_start.push(a_index.len());
            for &(row, value) in entries {
                a_index.push(row);
                a_value.push(value);
            }
        }
        a_start.push(a_index.len());

        let mut row_lower = vec![0.0; num_row];
        let mut row_upper = vec![0.0; num_row];
        for row in 0..num_row {
            let rhs = self.rhs[row];
            let (lower, upper) = match self.row_types[row] {
                ConstraintType::Less => (-INF, rhs),
                ConstraintType::Greater => (rhs, INF),
                ConstraintType::Equal => (rhs, rhs),
            };
            row_lower[row] = lower;
            row_upper[row] = upper;
            if let Some(range) = self.range[row] {
                // RANGES turns a one-sided row into an interval of width
                // |range| around the existing bound.
                match self.row_types[row] {
                    ConstraintType::Less => row_lower[row] = rhs - range.abs(),
                    ConstraintType::Greater => row_upper[row] = rhs + range.abs(),
                    ConstraintType::Equal => {
                        if range >= 0.0 {
                            row_upper[row] = rhs + range;
                        } else {
                            row_lower[row] = rhs + range;
                        }
                    }
                }
            }
        }

        for col in 0..num_col {
            if self.col_lower[col] > self.col_upper[col] {
                return Err(Import::Inconsistency(Inconsistency::new(format!(
                    "column \"{}\" has crossing bounds",
                    self.col_names[col]
                ))));
            }
        }

        Ok(LpProblem {
            num_col,
            num_row,
            a_start,
            a_index,
            a_value,
            col_cost: self.col_cost,
            col_lower: self.col_lower,
            col_upper: self.col_upper,
            row_lower,
            row_upper,
            objective: self.objective,
            offset: self.offset,
            model_name: self.model_name,
            col_names: self.col_names,
            row_names: self.row_names,
        })
    }
}
