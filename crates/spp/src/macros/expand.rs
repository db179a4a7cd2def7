//! Recursive macro substitution

use string_interner::DefaultSymbol;

use super::{MacroDef, MacroTable};
use crate::common::{Location, PreprocessError, PreprocessResult};
use crate::source::{is_ident_continue, is_ident_start};

/// Expands macro invocations found in buffered text.
///
/// Expansion is eager and recursive: parameter substitution first, then the
/// substituted body is re-scanned for further invocations. The ancestor
/// chain carries every macro currently being expanded down the descent; a
/// macro already on the chain is emitted literally instead of expanded,
/// which is the cycle breaker for self-referential macro sets.
pub struct Expander<'t> {
    table: &'t MacroTable,
}

impl<'t> Expander<'t> {
    pub fn new(table: &'t MacroTable) -> Self {
        Self { table }
    }

    /// Expand one invocation found by the streaming scanner.
    ///
    /// `args` is `None` for object-like macros and the parsed argument list
    /// for function-like ones.
    pub fn expand_invocation(
        &self,
        def: &MacroDef,
        args: Option<Vec<String>>,
        at: &Location,
    ) -> PreprocessResult<String> {
        let mut ancestors = Vec::new();
        self.apply(def, args.as_deref(), at, &mut ancestors)
    }

    /// Expand every macro invocation in a piece of text (condition text,
    /// `#eval` expressions, embedded code blocks).
    pub fn expand_text(&self, text: &str, at: &Location) -> PreprocessResult<String> {
        let mut ancestors = Vec::new();
        self.expand_in(text, at, &mut ancestors)
    }

    /// Expand an `#if`/`#elif` condition: `defined(NAME)` and `defined NAME`
    /// collapse to `1`/`0` first, so the tested name itself is never
    /// macro-expanded.
    pub fn expand_condition(&self, text: &str, at: &Location) -> PreprocessResult<String> {
        let replaced = self.replace_defined(text, at)?;
        self.expand_text(&replaced, at)
    }

    fn apply(
        &self,
        def: &MacroDef,
        args: Option<&[String]>,
        at: &Location,
        ancestors: &mut Vec<DefaultSymbol>,
    ) -> PreprocessResult<String> {
        let substituted = substitute(def, args, at)?;
        let Some(sym) = self.table.symbol(&def.name) else {
            return Ok(substituted);
        };
        ancestors.push(sym);
        let result = self.expand_in(&substituted, at, ancestors);
        ancestors.pop();
        result
    }

    fn expand_in(
        &self,
        text: &str,
        at: &Location,
        ancestors: &mut Vec<DefaultSymbol>,
    ) -> PreprocessResult<String> {
        let mut scan = TextScan::new(text);
        let mut out = String::with_capacity(text.len());
        while let Some(ch) = scan.peek() {
            match ch {
                '"' | '\'' => out.push_str(scan.take_literal(ch)),
                '/' if scan.rest().starts_with("//") => out.push_str(scan.take_line_comment()),
                '/' if scan.rest().starts_with("/*") => out.push_str(scan.take_block_comment()),
                c if is_ident_start(c) => {
                    let name = scan.take_identifier();
                    let def = self.table.lookup(name);
                    match def {
                        Some(def) if !self.is_ancestor(name, ancestors) => {
                            if def.is_function_like() {
                                let mut probe = scan.clone();
                                probe.skip_whitespace();
                                if probe.peek() == Some('(') {
                                    if let Some(args) = parse_args(&mut probe) {
                                        out.push_str(&self.apply(
                                            def,
                                            Some(&args),
                                            at,
                                            ancestors,
                                        )?);
                                        scan = probe;
                                        continue;
                                    }
                                }
                                // no argument list follows; not an invocation
                                out.push_str(name);
                            } else {
                                out.push_str(&self.apply(def, None, at, ancestors)?);
                            }
                        }
                        _ => out.push_str(name),
                    }
                }
                c => {
                    out.push(c);
                    scan.bump();
                }
            }
        }
        Ok(out)
    }

    fn is_ancestor(&self, name: &str, ancestors: &[DefaultSymbol]) -> bool {
        self.table
            .symbol(name)
            .is_some_and(|sym| ancestors.contains(&sym))
    }

    fn replace_defined(&self, text: &str, at: &Location) -> PreprocessResult<String> {
        let mut scan = TextScan::new(text);
        let mut out = String::with_capacity(text.len());
        while let Some(ch) = scan.peek() {
            match ch {
                '"' | '\'' => out.push_str(scan.take_literal(ch)),
                c if is_ident_start(c) => {
                    let name = scan.take_identifier();
                    if name != "defined" {
                        out.push_str(name);
                        continue;
                    }
                    let mut probe = scan.clone();
                    probe.skip_whitespace();
                    let target = if probe.peek() == Some('(') {
                        probe.bump();
                        probe.skip_whitespace();
                        let target = probe.take_identifier();
                        probe.skip_whitespace();
                        if target.is_empty() || probe.bump() != Some(')') {
                            return Err(PreprocessError::expression_syntax(
                                "malformed defined()",
                                at.clone(),
                            ));
                        }
                        target
                    } else {
                        let target = probe.take_identifier();
                        if target.is_empty() {
                            return Err(PreprocessError::expression_syntax(
                                "expected a name after 'defined'",
                                at.clone(),
                            ));
                        }
                        target
                    };
                    out.push(if self.table.is_defined(target) { '1' } else { '0' });
                    scan = probe;
                }
                c => {
                    out.push(c);
                    scan.bump();
                }
            }
        }
        Ok(out)
    }
}

/// Substitute bound arguments into a macro body.
///
/// `##param` pastes the raw argument text with the `##` removed (token
/// pasting by adjacency); `#param` substitutes the argument as a quoted
/// string; a bare parameter substitutes the raw argument text. The one or
/// two characters immediately preceding the parameter name decide the form.
fn substitute(
    def: &MacroDef,
    args: Option<&[String]>,
    at: &Location,
) -> PreprocessResult<String> {
    let Some(params) = &def.params else {
        return Ok(def.body.clone());
    };
    let mut args: Vec<&str> = args.unwrap_or(&[]).iter().map(String::as_str).collect();
    if params.is_empty() && args.len() == 1 && args[0].trim().is_empty() {
        args.clear();
    }
    if args.len() != params.len() {
        return Err(PreprocessError::ParameterCountMismatch {
            name: def.name.clone(),
            expected: params.len(),
            found: args.len(),
            at: at.clone(),
        });
    }

    let param_index = |name: &str| params.iter().position(|p| p == name);
    let mut scan = TextScan::new(&def.body);
    let mut out = String::with_capacity(def.body.len());
    while let Some(ch) = scan.peek() {
        match ch {
            '"' | '\'' => out.push_str(scan.take_literal(ch)),
            '#' => {
                let hashes = scan.take_hash_run();
                let name = scan.take_identifier();
                match param_index(name) {
                    // paste: the stripped hashes leave the argument adjacent
                    // to the preceding text
                    Some(i) if hashes >= 2 => {
                        for _ in 2..hashes {
                            out.push('#');
                        }
                        out.push_str(args[i]);
                    }
                    Some(i) => out.push_str(&stringize(args[i])),
                    // hash runs not followed by a parameter are body text
                    None => {
                        for _ in 0..hashes {
                            out.push('#');
                        }
                        out.push_str(name);
                    }
                }
            }
            c if is_ident_start(c) => {
                let name = scan.take_identifier();
                match param_index(name) {
                    Some(i) => out.push_str(args[i]),
                    None => out.push_str(name),
                }
            }
            c => {
                out.push(c);
                scan.bump();
            }
        }
    }
    Ok(out)
}

/// Quote argument text as a string literal, escaping `"` and `\`.
fn stringize(arg: &str) -> String {
    let mut text = String::with_capacity(arg.len() + 2);
    text.push('"');
    for ch in arg.chars() {
        if ch == '"' || ch == '\\' {
            text.push('\\');
        }
        text.push(ch);
    }
    text.push('"');
    text
}

/// Parse a parenthesized, comma-separated argument list from buffered text.
///
/// Nested parentheses inside an argument do not terminate it; string and
/// character literals are carried whole. `None` means the list never closed
/// within the buffer.
fn parse_args(scan: &mut TextScan<'_>) -> Option<Vec<String>> {
    scan.bump(); // '('
    let mut depth = 1usize;
    let mut args = Vec::new();
    let mut cur = String::new();
    loop {
        let ch = scan.peek()?;
        match ch {
            '"' | '\'' => cur.push_str(scan.take_literal(ch)),
            '(' => {
                depth += 1;
                cur.push('(');
                scan.bump();
            }
            ')' => {
                scan.bump();
                depth -= 1;
                if depth == 0 {
                    args.push(cur.trim().to_string());
                    return Some(args);
                }
                cur.push(')');
            }
            ',' if depth == 1 => {
                scan.bump();
                args.push(cur.trim().to_string());
                cur.clear();
            }
            _ => {
                cur.push(ch);
                scan.bump();
            }
        }
    }
}

/// In-buffer scanning cursor for macro bodies and condition text.
#[derive(Clone)]
struct TextScan<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> TextScan<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.text[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn rest(&self) -> &'a str {
        &self.text[self.pos..]
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn take_identifier(&mut self) -> &'a str {
        let start = self.pos;
        if self.peek().is_some_and(is_ident_start) {
            while self.peek().is_some_and(is_ident_continue) {
                self.bump();
            }
        }
        &self.text[start..self.pos]
    }

    /// A quoted literal including both quotes; runs to the end of the buffer
    /// if unterminated.
    fn take_literal(&mut self, quote: char) -> &'a str {
        let start = self.pos;
        self.bump();
        while let Some(ch) = self.bump() {
            if ch == '\\' {
                self.bump();
            } else if ch == quote {
                break;
            }
        }
        &self.text[start..self.pos]
    }

    fn take_line_comment(&mut self) -> &'a str {
        let start = self.pos;
        while self.peek().is_some_and(|ch| ch != '\n') {
            self.bump();
        }
        &self.text[start..self.pos]
    }

    fn take_block_comment(&mut self) -> &'a str {
        let start = self.pos;
        self.bump();
        self.bump();
        while let Some(ch) = self.bump() {
            if ch == '/' && self.pos >= start + 4 && self.text[..self.pos].ends_with("*/") {
                break;
            }
        }
        &self.text[start..self.pos]
    }

    fn take_hash_run(&mut self) -> usize {
        let mut count = 0;
        while self.peek() == Some('#') {
            self.bump();
            count += 1;
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(defs: &[&str]) -> MacroTable {
        let mut table = MacroTable::new();
        let at = Location::start_of("test.spp");
        for line in defs {
            table.define(MacroDef::parse(line, &at).unwrap()).unwrap();
        }
        table
    }

    fn expand(table: &MacroTable, text: &str) -> String {
        Expander::new(table)
            .expand_text(text, &Location::start_of("test.spp"))
            .unwrap()
    }

    #[test]
    fn test_object_like_substitution() {
        let table = table(&["FOO 42"]);
        assert_eq!(expand(&table, "x = FOO;"), "x = 42;");
    }

    #[test]
    fn test_function_like_substitution() {
        let table = table(&["ADD(a,b) a+b"]);
        assert_eq!(expand(&table, "ADD(1, 2)"), "1+2");
    }

    #[test]
    fn test_nested_call_in_argument() {
        let table = table(&["ADD(a,b) a+b", "DBL(x) ADD(x,x)"]);
        assert_eq!(expand(&table, "DBL(3)"), "3+3");
    }

    #[test]
    fn test_stringize() {
        let table = table(&["STR(x) #x"]);
        assert_eq!(expand(&table, "STR(hi there)"), "\"hi there\"");
    }

    #[test]
    fn test_stringize_escapes_quotes() {
        let table = table(&["STR(x) #x"]);
        assert_eq!(expand(&table, r#"STR(say "hi")"#), r#""say \"hi\"""#);
    }

    #[test]
    fn test_paste() {
        let table = table(&["GLUE(x) pre_##x"]);
        assert_eq!(expand(&table, "GLUE(fix)"), "pre_fix");
    }

    #[test]
    fn test_hashes_before_non_parameter_pass_through() {
        let table = table(&["F(p) p ## q"]);
        assert_eq!(expand(&table, "F(1)"), "1 ## q");
    }

    #[test]
    fn test_hashes_adjacent_to_non_parameter_kept() {
        let table = table(&["M 9", "GLUE(x) x##M"]);
        assert_eq!(expand(&table, "GLUE(x)"), "x##9");
    }

    #[test]
    fn test_parameter_count_mismatch() {
        let table = table(&["ADD(a,b) a+b"]);
        let result = Expander::new(&table)
            .expand_text("ADD(1)", &Location::start_of("test.spp"));
        assert!(matches!(
            result,
            Err(PreprocessError::ParameterCountMismatch { .. })
        ));
    }

    #[test]
    fn test_zero_arg_call() {
        let table = table(&["NOW() tick"]);
        assert_eq!(expand(&table, "NOW()"), "tick");
    }

    #[test]
    fn test_function_like_without_parens_left_alone() {
        let table = table(&["F(x) x"]);
        assert_eq!(expand(&table, "F + 1"), "F + 1");
    }

    #[test]
    fn test_self_reference_left_literal() {
        let table = table(&["A(x) B(x)", "B(x) C(x)", "C(x) A(x) B(x) C(x)"]);
        assert_eq!(expand(&table, "A(1)"), "A(1) B(1) C(1)");
    }

    #[test]
    fn test_no_substitution_inside_string_literal() {
        let table = table(&["FOO 42"]);
        assert_eq!(expand(&table, "\"FOO\" FOO"), "\"FOO\" 42");
    }

    #[test]
    fn test_expand_condition_defined() {
        let table = table(&["FOO 1"]);
        let expander = Expander::new(&table);
        let at = Location::start_of("test.spp");
        assert_eq!(
            expander.expand_condition("defined(FOO) && defined BAR", &at).unwrap(),
            "1 && 0"
        );
    }

    #[test]
    fn test_expand_condition_expands_macros() {
        let table = table(&["LIMIT 10"]);
        let expander = Expander::new(&table);
        let at = Location::start_of("test.spp");
        assert_eq!(expander.expand_condition("LIMIT > 5", &at).unwrap(), "10 > 5");
    }

    #[test]
    fn test_malformed_defined() {
        let table = table(&[]);
        let expander = Expander::new(&table);
        let at = Location::start_of("test.spp");
        assert!(expander.expand_condition("defined(", &at).is_err());
    }
}
