//! Placeholder substitution for task arguments.
//!
//! Task arguments in the configuration file may reference values that are
//! only known after the configure step:
//!
//! - `$${name}` - project name
//! - `$${version}` - project version
//! - `$${target}` - target name
//! - `$${srcdir}` / `$${builddir}` - absolute source and build directories
//!
//! Single `$` characters pass through unchanged, so shell variables like
//! `$HOME` survive for task scripts. Use `$$${` to produce a literal `$${`.
//!
//! ```
//! use distrun_lib::context::{Context, Project};
//! use distrun_lib::placeholder::expand;
//!
//! let ctx = Context::new("dist-linux-amd64", "/src/tool", "/src/tool/build");
//! let proj = Project::new("tool", "1.0");
//! assert_eq!(expand("--prefix=/opt/$${name}-$${version}", &ctx, &proj).unwrap(), "--prefix=/opt/tool-1.0");
//! ```

use thiserror::Error;

use crate::context::{Context, Project};

/// A value a task argument can reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
  Name,
  Version,
  Target,
  SrcDir,
  BuildDir,
}

/// A segment of parsed text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
  Literal(String),
  Placeholder(Placeholder),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaceholderError {
  #[error("unclosed placeholder at position {0}")]
  Unclosed(usize),

  #[error("unknown placeholder: {0}")]
  Unknown(String),
}

/// Parse a string into literal and placeholder segments.
pub fn parse(input: &str) -> Result<Vec<Segment>, PlaceholderError> {
  let mut segments = Vec::new();
  let mut literal = String::new();
  let mut chars = input.char_indices().peekable();

  while let Some((pos, ch)) = chars.next() {
    if ch != '$' {
      literal.push(ch);
      continue;
    }

    if chars.next_if(|(_, c)| *c == '$').is_none() {
      literal.push('$');
      continue;
    }

    // "$$" seen
    if chars.next_if(|(_, c)| *c == '$').is_some() {
      if chars.next_if(|(_, c)| *c == '{').is_some() {
        literal.push_str("$${");
      } else {
        literal.push_str("$$$");
      }
      continue;
    }

    if chars.next_if(|(_, c)| *c == '{').is_none() {
      literal.push_str("$$");
      continue;
    }

    if !literal.is_empty() {
      segments.push(Segment::Literal(std::mem::take(&mut literal)));
    }

    let mut content = String::new();
    let mut closed = false;
    for (_, c) in chars.by_ref() {
      if c == '}' {
        closed = true;
        break;
      }
      content.push(c);
    }
    if !closed {
      return Err(PlaceholderError::Unclosed(pos));
    }

    segments.push(Segment::Placeholder(parse_name(&content)?));
  }

  if !literal.is_empty() {
    segments.push(Segment::Literal(literal));
  }

  Ok(segments)
}

fn parse_name(content: &str) -> Result<Placeholder, PlaceholderError> {
  match content {
    "name" => Ok(Placeholder::Name),
    "version" => Ok(Placeholder::Version),
    "target" => Ok(Placeholder::Target),
    "srcdir" => Ok(Placeholder::SrcDir),
    "builddir" => Ok(Placeholder::BuildDir),
    other => Err(PlaceholderError::Unknown(other.to_string())),
  }
}

/// A parsed argument, ready to render once the project is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template(Vec<Segment>);

impl Template {
  pub fn parse(input: &str) -> Result<Self, PlaceholderError> {
    parse(input).map(Template)
  }

  pub fn render(&self, ctx: &Context, proj: &Project) -> String {
    let mut result = String::new();
    for segment in &self.0 {
      match segment {
        Segment::Literal(s) => result.push_str(s),
        Segment::Placeholder(p) => match p {
          Placeholder::Name => result.push_str(&proj.name),
          Placeholder::Version => result.push_str(&proj.version),
          Placeholder::Target => result.push_str(&ctx.target),
          Placeholder::SrcDir => result.push_str(&ctx.src_dir.to_string_lossy()),
          Placeholder::BuildDir => result.push_str(&ctx.build_dir.to_string_lossy()),
        },
      }
    }
    result
  }
}

/// Substitute every placeholder in `input`.
pub fn expand(input: &str, ctx: &Context, proj: &Project) -> Result<String, PlaceholderError> {
  Ok(Template::parse(input)?.render(ctx, proj))
}

/// Parse a whole argument list. Fails on the first malformed argument.
pub fn parse_all(args: &[String]) -> Result<Vec<Template>, PlaceholderError> {
  args.iter().map(|a| Template::parse(a)).collect()
}

pub fn render_all(templates: &[Template], ctx: &Context, proj: &Project) -> Vec<String> {
  templates.iter().map(|t| t.render(ctx, proj)).collect()
}
