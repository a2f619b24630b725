// filename.rs - Compound-extension aware file names and output templates

use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::error::{Result, TaskError};
use super::params::Bindings;

/// Multi-dot extensions that must be kept whole
pub const COMPOUND_EXTENSIONS: &[&str] = &[".nii.gz", ".tar.gz", ".niml.dset"];

/// Split a path into directory, base name and extension.
///
/// `/data/subject.nii.gz` gives `("/data", "subject", ".nii.gz")`.
pub fn split_filename(path: &str) -> (String, String, String) {
    let (dir, fname) = match path.rfind('/') {
        Some(i) => (&path[..i], &path[i + 1..]),
        None => ("", path),
    };

    let lower = fname.to_ascii_lowercase();
    for ext in COMPOUND_EXTENSIONS {
        if lower.ends_with(ext) && fname.len() > ext.len() {
            let cut = fname.len() - ext.len();
            return (dir.to_string(), fname[..cut].to_string(), fname[cut..].to_string());
        }
    }

    // A leading dot marks a hidden file, not an extension
    match fname.rfind('.') {
        Some(i) if i > 0 => (dir.to_string(), fname[..i].to_string(), fname[i..].to_string()),
        _ => (dir.to_string(), fname.to_string(), String::new()),
    }
}

/// Base name with directory and extension removed
pub fn base_name(path: &str) -> String {
    split_filename(path).1
}

/// Join a tool-relative output name with the working directory
pub fn resolve_output(work_dir: &Path, name: &str) -> PathBuf {
    let path = Path::new(name);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        work_dir.join(path)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Piece {
    Literal(String),
    Field(String),
}

/// Output name template such as `{input_image}_corrected`
#[derive(Debug, Clone, PartialEq)]
pub struct OutputTemplate {
    source: String,
    pieces: Vec<Piece>,
}

impl OutputTemplate {
    pub fn new(source: &str) -> Self {
        let mut pieces = Vec::new();
        let mut rest = source;
        while let Some(open) = rest.find('{') {
            match rest[open..].find('}') {
                Some(len) => {
                    if open > 0 {
                        pieces.push(Piece::Literal(rest[..open].to_string()));
                    }
                    pieces.push(Piece::Field(rest[open + 1..open + len].to_string()));
                    rest = &rest[open + len + 1..];
                }
                None => break,
            }
        }
        if !rest.is_empty() {
            pieces.push(Piece::Literal(rest.to_string()));
        }
        Self {
            source: source.to_string(),
            pieces,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Placeholder names in order of appearance
    pub fn placeholders(&self) -> Vec<&str> {
        self.pieces
            .iter()
            .filter_map(|p| match p {
                Piece::Field(name) => Some(name.as_str()),
                Piece::Literal(_) => None,
            })
            .collect()
    }

    fn has_own_extension(&self) -> bool {
        match self.pieces.last() {
            Some(Piece::Literal(tail)) => !split_filename(tail).2.is_empty(),
            _ => false,
        }
    }

    /// Substitute every placeholder from the bindings.
    ///
    /// File-valued placeholders contribute their base name; the first one also
    /// lends its extension when the template carries none.
    pub fn render(&self, bindings: &Bindings) -> Result<String> {
        let mut out = String::new();
        let mut inherited_ext: Option<String> = None;

        for piece in &self.pieces {
            match piece {
                Piece::Literal(text) => out.push_str(text),
                Piece::Field(name) => {
                    let unresolved = || TaskError::UnresolvableTemplate {
                        template: self.source.clone(),
                        placeholder: name.clone(),
                    };
                    let value = bindings.get(name).ok_or_else(unresolved)?;
                    if bindings.is_file(name) {
                        let path = match value.as_list() {
                            Some(items) => items.first().and_then(|v| v.as_str()),
                            None => value.as_str(),
                        }
                        .ok_or_else(unresolved)?;
                        let (_, base, ext) = split_filename(path);
                        out.push_str(&base);
                        if inherited_ext.is_none() {
                            inherited_ext = Some(ext);
                        }
                    } else {
                        out.push_str(&value.render());
                    }
                }
            }
        }

        if !self.has_own_extension() {
            if let Some(ext) = inherited_ext {
                out.push_str(&ext);
            }
        }
        Ok(out)
    }

    /// Recover placeholder values from a rendered name.
    ///
    /// Repeated placeholders are captured at their first occurrence only.
    pub fn match_path(&self, rendered: &str) -> Option<BTreeMap<String, String>> {
        let mut pattern = String::from("^");
        let mut seen = Vec::new();
        for piece in &self.pieces {
            match piece {
                Piece::Literal(text) => pattern.push_str(&regex::escape(text)),
                Piece::Field(name) if !seen.contains(name) => {
                    pattern.push_str(&format!("(?P<{}>.+?)", name));
                    seen.push(name.clone());
                }
                Piece::Field(_) => pattern.push_str(".+?"),
            }
        }
        pattern.push('$');

        // An inherited extension is not part of any placeholder value
        let subject = if self.has_own_extension() {
            rendered
        } else {
            let ext_len = split_filename(rendered).2.len();
            &rendered[..rendered.len() - ext_len]
        };

        let re = Regex::new(&pattern).ok()?;
        let caps = re.captures(subject)?;
        Some(
            seen.into_iter()
                .filter_map(|name| caps.name(&name).map(|m| (name.clone(), m.as_str().to_string())))
                .collect(),
        )
    }
}
