// format.rs - Token helpers and the synthesized command line

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Display;

use super::value::{bool_token, format_float};

/// An external invocation: executable, argv tail and extra environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandLine {
    pub executable: String,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
}

impl CommandLine {
    pub fn new(executable: &str, args: Vec<String>) -> Self {
        Self {
            executable: executable.to_string(),
            args,
            env: BTreeMap::new(),
        }
    }

    pub fn with_env(mut self, key: &str, value: impl Into<String>) -> Self {
        self.env.insert(key.to_string(), value.into());
        self
    }

    /// Full argv, executable first
    pub fn argv(&self) -> Vec<String> {
        let mut argv = Vec::with_capacity(self.args.len() + 1);
        argv.push(self.executable.clone());
        argv.extend(self.args.iter().cloned());
        argv
    }

    /// Single line suitable for a POSIX shell
    pub fn to_shell_string(&self) -> String {
        let mut parts: Vec<String> = self
            .env
            .iter()
            .map(|(k, v)| format!("{}={}", k, shell_words::quote(v)))
            .collect();
        parts.push(shell_words::join(self.argv()));
        parts.join(" ")
    }
}

/// `100x70x50`
pub fn join_x<T: Display>(items: &[T]) -> String {
    join(items, "x")
}

/// `1,0,0`
pub fn join_comma<T: Display>(items: &[T]) -> String {
    join(items, ",")
}

fn join<T: Display>(items: &[T], sep: &str) -> String {
    items
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(sep)
}

/// Floats joined with `sep` using ANTs number rendering
pub fn join_floats(items: &[f64], sep: &str) -> String {
    items
        .iter()
        .map(|f| format_float(*f))
        .collect::<Vec<_>>()
        .join(sep)
}

/// `[a,b,c]`
pub fn bracket<S: AsRef<str>>(items: &[S]) -> String {
    let inner: Vec<&str> = items.iter().map(AsRef::as_ref).collect();
    format!("[{}]", inner.join(","))
}

/// `Name[a,b]`, or bare `Name` when there are no parameters
pub fn call<S: AsRef<str>>(name: &str, params: &[S]) -> String {
    if params.is_empty() {
        name.to_string()
    } else {
        format!("{}{}", name, bracket(params))
    }
}

/// Accumulates argv tokens in order
#[derive(Debug, Default, Clone)]
pub struct ArgBuilder {
    args: Vec<String>,
}

impl ArgBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arg(&mut self, token: impl Into<String>) -> &mut Self {
        self.args.push(token.into());
        self
    }

    /// Flag followed by its value
    pub fn opt(&mut self, flag: &str, value: impl Into<String>) -> &mut Self {
        self.args.push(flag.to_string());
        self.args.push(value.into());
        self
    }

    /// Flag with a value only when the value is present
    pub fn opt_if(&mut self, flag: &str, value: Option<impl Into<String>>) -> &mut Self {
        if let Some(v) = value {
            self.opt(flag, v);
        }
        self
    }

    /// Flag with a `0`/`1` value
    pub fn opt_bool(&mut self, flag: &str, value: bool) -> &mut Self {
        self.opt(flag, bool_token(value))
    }

    /// Flag with a `0`/`1` value only when the boolean is bound
    pub fn opt_bool_if(&mut self, flag: &str, value: Option<bool>) -> &mut Self {
        if let Some(v) = value {
            self.opt_bool(flag, v);
        }
        self
    }

    pub fn extend(&mut self, tokens: impl IntoIterator<Item = String>) -> &mut Self {
        self.args.extend(tokens);
        self
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    pub fn build(self) -> Vec<String> {
        self.args
    }
}
