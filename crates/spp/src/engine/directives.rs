//! Directive parsing and dispatch

use super::Preprocessor;
use crate::common::{Location, PreprocessError, PreprocessResult};
use crate::include::IncludeError;
use crate::macros::{Expander, MacroDef};
use crate::source::{is_ident_continue, is_ident_start, CharStream, Source};

/// What a skip scan stopped at (always at the skip's own nesting depth).
enum Branch {
    Elif(String),
    Else,
    Endif,
}

enum IfKind {
    If,
    Ifdef,
    Ifndef,
}

impl Preprocessor<'_> {
    /// Dispatch a directive; the cursor sits on `#`.
    pub(super) fn directive(&mut self) -> PreprocessResult<()> {
        let at = self.input.location().clone();
        self.input.advance()?; // '#'
        let name = self.directive_name()?;
        match name.as_str() {
            "include" => self.directive_include(&at),
            "define" => self.directive_define(&at),
            "undef" => self.directive_undef(&at),
            "if" => self.directive_if(&at, IfKind::If),
            "ifdef" => self.directive_if(&at, IfKind::Ifdef),
            "ifndef" => self.directive_if(&at, IfKind::Ifndef),
            "elif" | "else" => self.directive_later_branch(&name, &at),
            "endif" => self.directive_endif(&at),
            "eval" => self.directive_eval(&at),
            "lit" => self.directive_lit(&at),
            "embedded" => self.directive_embedded(&at),
            "pragma" | "line" | "warning" => {
                self.read_logical_line()?;
                Ok(())
            }
            "error" => self.directive_error(&at),
            _ => Err(PreprocessError::unknown_command(name, at)),
        }
    }

    /// Directive command name, with optional whitespace after the `#`.
    fn directive_name(&mut self) -> PreprocessResult<String> {
        while matches!(self.input.peek()?, Some(' ' | '\t')) {
            self.input.advance()?;
        }
        self.input.read_identifier()
    }

    fn directive_include(&mut self, at: &Location) -> PreprocessResult<()> {
        let line = self.read_logical_line()?;
        let spec = line.trim();
        let (name, angled) = parse_include_spec(spec).ok_or_else(|| {
            PreprocessError::invalid_include(format!("malformed include spec '{spec}'"), at.clone())
        })?;
        let Some(resolver) = self.resolver.as_mut() else {
            return Err(PreprocessError::invalid_include(
                "no include resolver configured",
                at.clone(),
            ));
        };
        match resolver.resolve(name, at, angled) {
            Ok(Some(source)) => {
                self.input.push_source(source);
                Ok(())
            }
            Ok(None) => Ok(()),
            Err(IncludeError::Missing { spec }) => Err(PreprocessError::MissingInclude {
                spec,
                at: at.clone(),
            }),
            Err(IncludeError::Invalid { message }) => {
                Err(PreprocessError::invalid_include(message, at.clone()))
            }
            Err(IncludeError::Io(err)) => Err(err.into()),
        }
    }

    fn directive_define(&mut self, at: &Location) -> PreprocessResult<()> {
        let line = self.read_logical_line()?;
        let def = MacroDef::parse(&line, at)?;
        self.macros.define(def)
    }

    fn directive_undef(&mut self, at: &Location) -> PreprocessResult<()> {
        let line = self.read_logical_line()?;
        let name = line.trim();
        if !is_identifier(name) {
            return Err(PreprocessError::invalid_identifier(
                format!("'{name}' is not a valid macro name"),
                at.clone(),
            ));
        }
        self.macros.undef(name);
        Ok(())
    }

    fn directive_if(&mut self, at: &Location, kind: IfKind) -> PreprocessResult<()> {
        let line = self.read_logical_line()?;
        let truth = match kind {
            IfKind::If => self.eval_condition(&line, at)?,
            IfKind::Ifdef | IfKind::Ifndef => {
                let name = line.trim();
                if !is_identifier(name) {
                    return Err(PreprocessError::invalid_identifier(
                        format!("'{name}' is not a valid macro name"),
                        at.clone(),
                    ));
                }
                let defined = self.macros.is_defined(name);
                match kind {
                    IfKind::Ifdef => defined,
                    _ => !defined,
                }
            }
        };
        self.conds.push(truth);
        if !truth {
            self.scan_skipped_branches(at)?;
        }
        Ok(())
    }

    /// `#elif`/`#else` reached by the scanner, i.e. the branch being emitted
    /// just ended. The remaining branches are discarded; only one branch
    /// ever fires.
    fn directive_later_branch(&mut self, directive: &str, at: &Location) -> PreprocessResult<()> {
        if self.conds.top_taken().is_none() {
            return Err(PreprocessError::unmatched(directive, at.clone()));
        }
        self.read_logical_line()?;
        self.scan_skipped_branches(at)
    }

    fn directive_endif(&mut self, at: &Location) -> PreprocessResult<()> {
        if self.conds.pop().is_none() {
            return Err(PreprocessError::unmatched("endif", at.clone()));
        }
        self.read_logical_line()?;
        Ok(())
    }

    /// Discard input until the innermost conditional chain either fires a
    /// branch (frame marked taken, emission resumes) or closes (frame
    /// popped).
    fn scan_skipped_branches(&mut self, at: &Location) -> PreprocessResult<()> {
        loop {
            match self.skip_to_branch(at)? {
                Branch::Elif(cond) => {
                    if self.conds.top_taken() == Some(false) && self.eval_condition(&cond, at)? {
                        self.conds.mark_taken();
                        return Ok(());
                    }
                }
                Branch::Else => {
                    if self.conds.top_taken() == Some(false) {
                        self.conds.mark_taken();
                        return Ok(());
                    }
                }
                Branch::Endif => {
                    self.conds.pop();
                    return Ok(());
                }
            }
        }
    }

    /// Scan-and-discard forward to the next `#elif`/`#else`/`#endif` at the
    /// skip's own nesting depth. Literal- and comment-blind, and `#lit`
    /// blocks are skipped whole so their content cannot unbalance the
    /// depth count.
    fn skip_to_branch(&mut self, at: &Location) -> PreprocessResult<Branch> {
        let mut depth = 0usize;
        loop {
            let Some(ch) = self.input.peek()? else {
                return Err(PreprocessError::unexpected_eof(
                    "unterminated conditional directive",
                    at.clone(),
                ));
            };
            match ch {
                '"' => {
                    self.input.read_string_literal()?;
                }
                '\'' => {
                    self.input.read_char_literal()?;
                }
                '/' if self.input.starts_with("//")? => {
                    self.input.read_line_comment()?;
                }
                '/' if self.input.starts_with("/*")? => {
                    self.input.read_block_comment()?;
                }
                '#' => {
                    self.input.advance()?;
                    let name = self.directive_name()?;
                    match name.as_str() {
                        "if" | "ifdef" | "ifndef" => {
                            depth += 1;
                            self.read_logical_line()?;
                        }
                        "elif" => {
                            let cond = self.read_logical_line()?;
                            if depth == 0 {
                                return Ok(Branch::Elif(cond));
                            }
                        }
                        "else" => {
                            self.read_logical_line()?;
                            if depth == 0 {
                                return Ok(Branch::Else);
                            }
                        }
                        "endif" => {
                            self.read_logical_line()?;
                            if depth == 0 {
                                return Ok(Branch::Endif);
                            }
                            depth -= 1;
                        }
                        "lit" => {
                            self.capture_block(at)?;
                        }
                        "embedded" => {
                            self.read_embedded_lang(at)?;
                            self.capture_block(at)?;
                        }
                        // other directives are inert inside skipped branches
                        _ => {}
                    }
                }
                _ => self.input.advance()?,
            }
        }
    }

    fn eval_condition(&mut self, text: &str, at: &Location) -> PreprocessResult<bool> {
        let expanded = Expander::new(&self.macros).expand_condition(text, at)?;
        self.evaluator
            .eval_bool(&expanded)
            .map_err(|err| PreprocessError::expression_syntax(err.to_string(), at.clone()))
    }

    fn directive_eval(&mut self, at: &Location) -> PreprocessResult<()> {
        while matches!(self.input.peek()?, Some(' ' | '\t')) {
            self.input.advance()?;
        }
        if self.input.peek()? != Some('{') {
            return Err(PreprocessError::expression_syntax(
                "expected '{' after #eval",
                at.clone(),
            ));
        }
        let expr = self.read_braced(at)?;
        let value = self.eval_expression_text(&expr, at)?;
        self.input
            .push_source(Source::expansion(format_number(value), at.clone()));
        Ok(())
    }

    /// Brace-balanced `{...}` body, delimiters consumed but not captured.
    fn read_braced(&mut self, at: &Location) -> PreprocessResult<String> {
        self.input.advance()?; // '{'
        let mut depth = 1usize;
        let mut text = String::new();
        loop {
            let Some(ch) = self.input.bump()? else {
                return Err(PreprocessError::unexpected_eof("missing '}'", at.clone()));
            };
            match ch {
                '{' => {
                    depth += 1;
                    text.push('{');
                }
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(text);
                    }
                    text.push('}');
                }
                _ => text.push(ch),
            }
        }
    }

    fn eval_expression_text(&mut self, expr: &str, at: &Location) -> PreprocessResult<f64> {
        let collapsed = self.collapse_nested_evals(expr, at)?;
        let expanded = Expander::new(&self.macros).expand_text(&collapsed, at)?;
        self.evaluator
            .eval_number(&expanded)
            .map_err(|err| PreprocessError::expression_syntax(err.to_string(), at.clone()))
    }

    /// Replace nested `#eval{...}` occurrences with their numeric results,
    /// innermost first.
    fn collapse_nested_evals(&mut self, text: &str, at: &Location) -> PreprocessResult<String> {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;
        while let Some(start) = rest.find("#eval") {
            let after = &rest[start + "#eval".len()..];
            let trimmed = after.trim_start_matches([' ', '\t']);
            if !trimmed.starts_with('{') {
                out.push_str(&rest[..start + "#eval".len()]);
                rest = after;
                continue;
            }
            let mut depth = 0usize;
            let mut close = None;
            for (i, ch) in trimmed.char_indices() {
                match ch {
                    '{' => depth += 1,
                    '}' => {
                        depth -= 1;
                        if depth == 0 {
                            close = Some(i);
                            break;
                        }
                    }
                    _ => {}
                }
            }
            let Some(close) = close else {
                return Err(PreprocessError::unexpected_eof("missing '}'", at.clone()));
            };
            let value = self.eval_expression_text(&trimmed[1..close], at)?;
            out.push_str(&rest[..start]);
            out.push_str(&format_number(value));
            rest = &trimmed[close + 1..];
        }
        out.push_str(rest);
        Ok(out)
    }

    fn directive_lit(&mut self, at: &Location) -> PreprocessResult<()> {
        let text = self.capture_block(at)?;
        // verbatim blocks bypass the scanner entirely
        self.emit_str(&text);
        Ok(())
    }

    fn directive_embedded(&mut self, at: &Location) -> PreprocessResult<()> {
        let lang = self.read_embedded_lang(at)?;
        let code = self.capture_block(at)?;
        let expanded = Expander::new(&self.macros).expand_text(&code, at)?;
        let Some(executor) = self.executor.as_mut() else {
            return Err(PreprocessError::EmbeddedCodeNotSupported {
                lang,
                at: at.clone(),
            });
        };
        let result = executor
            .execute(&lang, &expanded, at)
            .map_err(|err| PreprocessError::EmbeddedCodeSyntax {
                message: err.to_string(),
                at: at.clone(),
            })?;
        self.input.push_source(Source::expansion(result, at.clone()));
        Ok(())
    }

    /// The `(lang)` part of `#embedded(lang)`.
    fn read_embedded_lang(&mut self, at: &Location) -> PreprocessResult<String> {
        while matches!(self.input.peek()?, Some(' ' | '\t')) {
            self.input.advance()?;
        }
        if self.input.peek()? != Some('(') {
            return Err(embedded_syntax_error(at));
        }
        self.input.advance()?;
        while matches!(self.input.peek()?, Some(' ' | '\t')) {
            self.input.advance()?;
        }
        let lang = self.input.read_identifier()?;
        while matches!(self.input.peek()?, Some(' ' | '\t')) {
            self.input.advance()?;
        }
        if lang.is_empty() || self.input.bump()? != Some(')') {
            return Err(embedded_syntax_error(at));
        }
        Ok(lang)
    }

    /// Capture verbatim text up to the matching `#end` marker.
    ///
    /// Block-opening directives nest; the marker is the exact word `end`,
    /// so `#endif` inside a block is plain content.
    fn capture_block(&mut self, at: &Location) -> PreprocessResult<String> {
        let mut depth = 0usize;
        let mut text = String::new();
        loop {
            let Some(ch) = self.input.peek()? else {
                return Err(PreprocessError::unexpected_eof("missing #end", at.clone()));
            };
            if ch != '#' {
                text.push(ch);
                self.input.advance()?;
                continue;
            }
            self.input.advance()?;
            let name = self.input.read_identifier()?;
            match name.as_str() {
                "end" if depth == 0 => return Ok(text),
                "end" => depth -= 1,
                "if" | "ifdef" | "ifndef" | "lit" | "embedded" => depth += 1,
                _ => {}
            }
            text.push('#');
            text.push_str(&name);
        }
    }

    fn directive_error(&mut self, at: &Location) -> PreprocessResult<()> {
        let line = self.read_logical_line()?;
        let message = line.trim();
        let message = message
            .strip_prefix('"')
            .and_then(|m| m.strip_suffix('"'))
            .unwrap_or(message);
        Err(PreprocessError::ErrorDirective {
            message: message.to_string(),
            at: at.clone(),
        })
    }
}

/// Integral results print without a fractional part, so `#eval{2*21}`
/// splices `42` rather than `42.0`.
fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

fn embedded_syntax_error(at: &Location) -> PreprocessError {
    PreprocessError::EmbeddedCodeSyntax {
        message: "expected '(lang)' after #embedded".into(),
        at: at.clone(),
    }
}

fn parse_include_spec(spec: &str) -> Option<(&str, bool)> {
    if let Some(rest) = spec.strip_prefix('"') {
        let end = rest.find('"')?;
        Some((&rest[..end], false))
    } else if let Some(rest) = spec.strip_prefix('<') {
        let end = rest.find('>')?;
        Some((&rest[..end], true))
    } else {
        None
    }
}

fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    chars.next().is_some_and(is_ident_start) && chars.all(is_ident_continue)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_include_spec() {
        assert_eq!(parse_include_spec("\"a.spp\""), Some(("a.spp", false)));
        assert_eq!(parse_include_spec("<sys/a.spp>"), Some(("sys/a.spp", true)));
        assert_eq!(parse_include_spec("a.spp"), None);
        assert_eq!(parse_include_spec("\"open"), None);
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(42.0), "42");
        assert_eq!(format_number(-3.0), "-3");
        assert_eq!(format_number(2.5), "2.5");
    }

    #[test]
    fn test_is_identifier() {
        assert!(is_identifier("foo_1"));
        assert!(is_identifier("_x"));
        assert!(!is_identifier("1x"));
        assert!(!is_identifier(""));
        assert!(!is_identifier("a b"));
    }
}
