// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Runtime values the interpreter produces and consumes.

use std::fmt;

use ember_rt::{Channel, Priority, TaskHandle};

/// A value flowing through an Ember program.
///
/// `Channel` and `Task` wrap the real `ember-rt` handles directly — there
/// is no separate "handle" layer, so `send`/`recv`/`select`/`cancel` in
/// user code are the runtime's own operations, not a reimplementation of
/// them.
#[derive(Clone)]
pub enum Value {
    Int(i64),
    Bool(bool),
    Str(String),
    Unit,
    Channel(Channel<Value>),
    Task(TaskHandle<Value>),
    Tuple(Vec<Value>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Bool(_) => "bool",
            Value::Str(_) => "string",
            Value::Unit => "unit",
            Value::Channel(_) => "channel",
            Value::Task(_) => "task",
            Value::Tuple(_) => "tuple",
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_channel(&self) -> Option<&Channel<Value>> {
        match self {
            Value::Channel(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_task(&self) -> Option<&TaskHandle<Value>> {
        match self {
            Value::Task(t) => Some(t),
            _ => None,
        }
    }

    /// Truthiness used by `if`/`while` conditions.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Unit => false,
            _ => true,
        }
    }

    /// Interpret an identifier like `High`/`Normal`/`Low` as a spawn priority.
    pub fn as_priority(&self) -> Option<Priority> {
        match self {
            Value::Str(s) => priority_from_name(s),
            _ => None,
        }
    }
}

pub(crate) fn priority_from_name(name: &str) -> Option<Priority> {
    match name {
        "High" => Some(Priority::High),
        "Normal" => Some(Priority::Normal),
        "Low" => Some(Priority::Low),
        _ => None,
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Str(v) => write!(f, "{v}"),
            Value::Unit => write!(f, "()"),
            Value::Channel(c) => write!(f, "<channel {:?}>", c.id()),
            Value::Task(t) => write!(f, "<task {}>", t.id()),
            Value::Tuple(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, ")")
            }
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Value({self})")
    }
}
