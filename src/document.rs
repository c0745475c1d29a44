//! PromptML documents.
//!
//! A document is a tree of `@name ... @end` blocks. Leaf blocks hold text;
//! a top-level `@vars` block defines `$name` substitutions. The tree is
//! rendered to XML, JSON or YAML before being sent to a provider, and the
//! providers never look inside the result.

use anyhow::{anyhow, bail, Context};
use serde_json::{Map, Value};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Textual encoding of the payload sent to the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Serializer {
    #[default]
    Xml,
    Json,
    Yaml,
}

impl fmt::Display for Serializer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Serializer::Xml => "xml",
            Serializer::Json => "json",
            Serializer::Yaml => "yaml",
        })
    }
}

impl FromStr for Serializer {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "xml" => Ok(Serializer::Xml),
            "json" => Ok(Serializer::Json),
            "yaml" | "yml" => Ok(Serializer::Yaml),
            other => Err(anyhow!("unknown serializer: {other} (expected xml, json or yaml)")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Block {
    pub name: String,
    pub text: String,
    pub children: Vec<Block>,
}

impl Block {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn child(&self, name: &str) -> Option<&Block> {
        self.children.iter().find(|c| c.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptDocument {
    root: Block,
}

impl PromptDocument {
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let src = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read prompt file: {}", path.display()))?;
        Self::parse(&src).with_context(|| format!("failed to parse prompt file: {}", path.display()))
    }

    pub fn parse(src: &str) -> anyhow::Result<Self> {
        // Bottom of the stack collects the top-level blocks.
        let mut stack: Vec<(Block, usize)> = vec![(Block::new(""), 0)];

        for (idx, line) in src.lines().enumerate() {
            let lineno = idx + 1;
            if line.trim_start().starts_with('#') {
                continue;
            }

            let mut rest = line;
            while let Some((pos, name)) = next_directive(rest) {
                push_text(&mut stack, &rest[..pos], lineno)?;
                rest = &rest[pos + 1 + name.len()..];

                if name == "end" {
                    if stack.len() == 1 {
                        bail!("line {lineno}: `@end` without an open block");
                    }
                    let Some((mut block, _)) = stack.pop() else {
                        unreachable!("stack always holds the document level");
                    };
                    block.text = normalize_text(&block.text);
                    if let Some((parent, _)) = stack.last_mut() {
                        parent.children.push(block);
                    }
                } else {
                    stack.push((Block::new(name), lineno));
                }
            }
            push_text(&mut stack, rest, lineno)?;
            if let Some((top, _)) = stack.last_mut() {
                top.text.push('\n');
            }
        }

        if stack.len() > 1 {
            let (block, opened) = &stack[stack.len() - 1];
            bail!("line {opened}: block `@{}` is never closed with `@end`", block.name);
        }

        let Some((top, _)) = stack.pop() else {
            bail!("empty prompt document");
        };

        let mut vars = Vec::new();
        let mut roots = Vec::new();
        for block in top.children {
            if block.name == "vars" {
                vars.extend(parse_vars(&block.text)?);
            } else {
                roots.push(block);
            }
        }

        let mut root = match roots.len() {
            0 => bail!("prompt document has no blocks"),
            1 => roots.remove(0),
            n => bail!("prompt document must have a single top-level block, found {n}"),
        };

        // Longest names first so `$ab` is not consumed by `$a`.
        vars.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        substitute(&mut root, &vars);

        Ok(Self { root })
    }

    pub fn root(&self) -> &Block {
        &self.root
    }

    pub fn serialize(&self, serializer: Serializer) -> anyhow::Result<String> {
        match serializer {
            Serializer::Xml => Ok(self.to_xml()),
            Serializer::Json => self.to_json(),
            Serializer::Yaml => self.to_yaml(),
        }
    }

    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        write_xml(&self.root, &mut out);
        out
    }

    pub fn to_json(&self) -> anyhow::Result<String> {
        serde_json::to_string_pretty(&self.to_value()).context("failed to serialize prompt as JSON")
    }

    pub fn to_yaml(&self) -> anyhow::Result<String> {
        serde_yaml::to_string(&self.to_value()).context("failed to serialize prompt as YAML")
    }

    fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert(self.root.name.clone(), block_value(&self.root));
        Value::Object(map)
    }
}

/// Block names the parser recognizes. Any other `@word` is plain text, so
/// prose such as "ask @john" cannot open a block.
const SECTIONS: &[&str] = &[
    "prompt",
    "context",
    "objective",
    "task",
    "role",
    "audience",
    "instructions",
    "step",
    "examples",
    "example",
    "input",
    "output",
    "format",
    "constraints",
    "length",
    "tone",
    "style",
    "difficulty",
    "category",
    "metadata",
    "domain",
    "temperature",
    "top_p",
    "max_tokens",
    "vars",
    "end",
];

/// Find the next `@name` token that starts a word and names a section.
fn next_directive(s: &str) -> Option<(usize, &str)> {
    let bytes = s.as_bytes();
    let mut from = 0;
    while let Some(off) = s[from..].find('@') {
        let pos = from + off;
        let at_word_start = pos == 0 || bytes[pos - 1].is_ascii_whitespace();
        let name_len = s[pos + 1..]
            .bytes()
            .take_while(|b| b.is_ascii_alphanumeric() || *b == b'_' || *b == b'-')
            .count();
        let starts_alpha = bytes.get(pos + 1).is_some_and(|b| b.is_ascii_alphabetic());
        let name = &s[pos + 1..pos + 1 + name_len];
        if at_word_start && starts_alpha && SECTIONS.contains(&name) {
            return Some((pos, name));
        }
        from = pos + 1;
    }
    None
}

fn push_text(stack: &mut [(Block, usize)], text: &str, lineno: usize) -> anyhow::Result<()> {
    let Some((top, _)) = stack.last_mut() else {
        return Ok(());
    };
    if top.name.is_empty() && !text.trim().is_empty() {
        bail!("line {lineno}: text outside of any block: {:?}", text.trim());
    }
    top.text.push_str(text);
    Ok(())
}

/// Trim every line and drop blank lines at either end.
fn normalize_text(raw: &str) -> String {
    let lines: Vec<&str> = raw.lines().map(str::trim).collect();
    let start = lines.iter().position(|l| !l.is_empty());
    let end = lines.iter().rposition(|l| !l.is_empty());
    match (start, end) {
        (Some(s), Some(e)) => lines[s..=e].join("\n"),
        _ => String::new(),
    }
}

fn parse_vars(text: &str) -> anyhow::Result<Vec<(String, String)>> {
    let mut vars = Vec::new();
    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let (name, value) = line
            .split_once('=')
            .ok_or_else(|| anyhow!("malformed variable definition: {line:?} (expected `$name = \"value\"`)"))?;
        let name = name.trim().trim_start_matches('$');
        if name.is_empty() {
            bail!("variable definition without a name: {line:?}");
        }
        let value = value.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
            .unwrap_or(value);
        vars.push((name.to_string(), value.to_string()));
    }
    Ok(vars)
}

fn substitute(block: &mut Block, vars: &[(String, String)]) {
    for (name, value) in vars {
        block.text = block.text.replace(&format!("${name}"), value);
    }
    for child in &mut block.children {
        substitute(child, vars);
    }
}

fn write_xml(block: &Block, out: &mut String) {
    out.push('<');
    out.push_str(&block.name);
    out.push('>');
    for c in block.text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            c => out.push(c),
        }
    }
    for child in &block.children {
        write_xml(child, out);
    }
    out.push_str("</");
    out.push_str(&block.name);
    out.push('>');
}

fn block_value(block: &Block) -> Value {
    if block.children.is_empty() {
        return Value::String(block.text.clone());
    }

    let mut map = Map::new();
    if !block.text.is_empty() {
        map.insert("text".to_string(), Value::String(block.text.clone()));
    }
    for child in &block.children {
        let value = block_value(child);
        // Child values are strings or maps, so an array here is a group
        // started by an earlier repeat.
        match map.get_mut(&child.name) {
            Some(Value::Array(items)) => items.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                map.insert(child.name.clone(), value);
            }
        }
    }
    Value::Object(map)
}
