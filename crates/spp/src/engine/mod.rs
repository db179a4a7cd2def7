//! Top-level preprocessor orchestration
//!
//! The consumer pulls characters from [`Preprocessor`] through the
//! [`CharStream`] contract. Each pull may transitively perform unbounded
//! internal work (directive handling, macro expansion, nested includes)
//! before one character of output becomes available.

mod directives;

use std::collections::VecDeque;

use crate::common::{Location, PreprocessError, PreprocessResult};
use crate::cond::ConditionalStack;
use crate::embedded::EmbeddedCodeExecutor;
use crate::eval::{DefaultEvaluator, ExpressionEvaluator};
use crate::include::IncludeResolver;
use crate::macros::{Expander, MacroDef, MacroTable};
use crate::source::{is_ident_start, CharStream, Lookahead, Source};

/// The streaming preprocessor.
///
/// Wraps a root character source and produces fully expanded,
/// directive-free text one character at a time. Collaborators for include
/// resolution, embedded-code execution and expression evaluation are
/// installed with the builder methods; a missing include resolver makes
/// `#include` fatal and a missing executor makes `#embedded` fatal.
pub struct Preprocessor<'src> {
    input: Lookahead<'src>,
    macros: MacroTable,
    conds: ConditionalStack,
    resolver: Option<Box<dyn IncludeResolver>>,
    executor: Option<Box<dyn EmbeddedCodeExecutor>>,
    evaluator: Box<dyn ExpressionEvaluator>,
    out: VecDeque<char>,
    finished: bool,
}

impl<'src> Preprocessor<'src> {
    pub fn new(root: Source<'src>) -> Self {
        Self {
            input: Lookahead::new(root),
            macros: MacroTable::new(),
            conds: ConditionalStack::new(),
            resolver: None,
            executor: None,
            evaluator: Box::new(DefaultEvaluator),
            out: VecDeque::new(),
            finished: false,
        }
    }

    pub fn with_resolver(mut self, resolver: impl IncludeResolver + 'static) -> Self {
        self.resolver = Some(Box::new(resolver));
        self
    }

    pub fn with_executor(mut self, executor: impl EmbeddedCodeExecutor + 'static) -> Self {
        self.executor = Some(Box::new(executor));
        self
    }

    pub fn with_evaluator(mut self, evaluator: impl ExpressionEvaluator + 'static) -> Self {
        self.evaluator = Box::new(evaluator);
        self
    }

    /// Register a macro before processing starts (command-line `-D`).
    ///
    /// `name` may carry a parameter list, e.g. `F(x)` with body `x*2`.
    pub fn predefine(&mut self, name: &str, body: &str) -> PreprocessResult<()> {
        let at = Location::start_of("<command line>");
        let def = MacroDef::parse(&format!("{name} {body}"), &at)?;
        self.macros.define(def)
    }

    pub fn macros(&self) -> &MacroTable {
        &self.macros
    }

    /// Drain the whole stream into a string.
    pub fn run_to_string(&mut self) -> PreprocessResult<String> {
        let mut out = String::new();
        while let Some(ch) = self.bump()? {
            out.push(ch);
        }
        Ok(out)
    }

    fn refill(&mut self) -> PreprocessResult<()> {
        while self.out.is_empty() && !self.finished {
            self.step()?;
        }
        Ok(())
    }

    /// Process one input unit: a literal, a comment, a directive, an
    /// identifier, or a single ordinary character.
    fn step(&mut self) -> PreprocessResult<()> {
        let Some(ch) = self.input.peek()? else {
            if !self.conds.is_empty() {
                return Err(PreprocessError::unexpected_eof(
                    "unterminated conditional directive",
                    self.input.location().clone(),
                ));
            }
            self.finished = true;
            return Ok(());
        };
        match ch {
            '"' => {
                let literal = self.input.read_string_literal()?;
                self.emit_str(&literal);
            }
            '\'' => {
                let literal = self.input.read_char_literal()?;
                self.emit_str(&literal);
            }
            '/' => {
                if self.input.starts_with("//")? {
                    let comment = self.input.read_line_comment()?;
                    self.emit_str(&comment);
                } else if self.input.starts_with("/*")? {
                    let comment = self.input.read_block_comment()?;
                    self.emit_str(&comment);
                } else {
                    self.input.advance()?;
                    self.emit('/');
                }
            }
            '#' => self.directive()?,
            c if is_ident_start(c) => self.identifier()?,
            c => {
                self.input.advance()?;
                self.emit(c);
            }
        }
        Ok(())
    }

    /// Handle one identifier: either a macro invocation or plain text.
    ///
    /// Identifiers coming out of macro-expansion sources are emitted as-is;
    /// the expander already expanded everything expandable, and what it left
    /// literal (blocked self-references) must stay literal.
    fn identifier(&mut self) -> PreprocessResult<()> {
        let in_expansion = self.input.in_expansion()?;
        let at = self.input.location().clone();
        let name = self.input.read_identifier()?;
        if in_expansion {
            self.emit_str(&name);
            return Ok(());
        }
        let Some(def) = self.macros.lookup(&name).cloned() else {
            self.emit_str(&name);
            return Ok(());
        };
        let args = if def.is_function_like() {
            // an invocation only if the next non-whitespace character is '('
            let mut skip = 0;
            loop {
                match self.input.peek_at(skip)? {
                    Some(c) if c.is_whitespace() => skip += 1,
                    Some('(') => break,
                    _ => {
                        self.emit_str(&name);
                        return Ok(());
                    }
                }
            }
            for _ in 0..skip {
                self.input.advance()?;
            }
            Some(self.read_call_args(&at)?)
        } else {
            None
        };
        let text = Expander::new(&self.macros).expand_invocation(&def, args, &at)?;
        self.input.push_source(Source::expansion(text, at));
        Ok(())
    }

    /// Parse a call-site argument list from the stream, starting at `(`.
    fn read_call_args(&mut self, at: &Location) -> PreprocessResult<Vec<String>> {
        self.input.advance()?; // '('
        let mut depth = 1usize;
        let mut args = Vec::new();
        let mut cur = String::new();
        loop {
            let Some(ch) = self.input.peek()? else {
                return Err(PreprocessError::unexpected_eof(
                    "unterminated macro argument list",
                    at.clone(),
                ));
            };
            match ch {
                '"' => cur.push_str(&self.input.read_string_literal()?),
                '\'' => cur.push_str(&self.input.read_char_literal()?),
                '(' => {
                    depth += 1;
                    cur.push('(');
                    self.input.advance()?;
                }
                ')' => {
                    self.input.advance()?;
                    depth -= 1;
                    if depth == 0 {
                        args.push(cur.trim().to_string());
                        return Ok(args);
                    }
                    cur.push(')');
                }
                ',' if depth == 1 => {
                    self.input.advance()?;
                    args.push(cur.trim().to_string());
                    cur.clear();
                }
                _ => {
                    cur.push(ch);
                    self.input.advance()?;
                }
            }
        }
    }

    /// Rest of the logical line, honoring `\`-newline continuation.
    /// The terminating newline is consumed: directive lines eat their
    /// newline.
    fn read_logical_line(&mut self) -> PreprocessResult<String> {
        let mut text = String::new();
        loop {
            match self.input.bump()? {
                None | Some('\n') => return Ok(text),
                Some('\\') => match self.input.peek()? {
                    Some('\n') => self.input.advance()?,
                    Some('\r') => {
                        self.input.advance()?;
                        if self.input.peek()? == Some('\n') {
                            self.input.advance()?;
                        }
                    }
                    _ => text.push('\\'),
                },
                Some(ch) => text.push(ch),
            }
        }
    }

    fn emit(&mut self, ch: char) {
        self.out.push_back(ch);
    }

    fn emit_str(&mut self, text: &str) {
        self.out.extend(text.chars());
    }
}

impl CharStream for Preprocessor<'_> {
    fn peek(&mut self) -> PreprocessResult<Option<char>> {
        self.refill()?;
        Ok(self.out.front().copied())
    }

    fn advance(&mut self) -> PreprocessResult<()> {
        self.refill()?;
        self.out.pop_front();
        Ok(())
    }

    fn location(&self) -> &Location {
        self.input.location()
    }
}

/// Preprocess in-memory text with the default collaborators: no include
/// resolver, no embedded-code executor, the stock expression evaluator.
pub fn preprocess(source: &str, name: &str) -> PreprocessResult<String> {
    Preprocessor::new(Source::str(source, name)).run_to_string()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::embedded::ExecError;
    use crate::include::IncludeError;

    fn run(source: &str) -> String {
        preprocess(source, "test.spp").unwrap()
    }

    /// Resolver over an in-memory file map.
    struct MapResolver(HashMap<String, String>);

    impl IncludeResolver for MapResolver {
        fn resolve(
            &mut self,
            spec: &str,
            _from: &Location,
            _angled: bool,
        ) -> Result<Option<Source<'static>>, IncludeError> {
            match self.0.get(spec) {
                Some(text) => Ok(Some(Source::buffer(
                    text.clone(),
                    Location::start_of(spec),
                ))),
                None => Err(IncludeError::Missing { spec: spec.into() }),
            }
        }
    }

    /// Executor that splices the block content back, trimmed.
    struct EchoExecutor;

    impl crate::embedded::EmbeddedCodeExecutor for EchoExecutor {
        fn execute(&mut self, _lang: &str, code: &str, _at: &Location) -> Result<String, ExecError> {
            Ok(code.trim().to_string())
        }
    }

    #[test]
    fn test_identity_without_directives() {
        let source = "plain text\nwith // a comment\nand /* block */ text\n";
        assert_eq!(run(source), source);
    }

    #[test]
    fn test_object_macro_expansion() {
        assert_eq!(run("#define FOO 42\nx = FOO;\n"), "x = 42;\n");
    }

    #[test]
    fn test_function_macro_expansion() {
        assert_eq!(run("#define F(a,b) a+b\nF(1,2)\n"), "1+2\n");
    }

    #[test]
    fn test_macro_name_inside_string_untouched() {
        assert_eq!(run("#define FOO 42\n\"FOO\" FOO\n"), "\"FOO\" 42\n");
    }

    #[test]
    fn test_function_macro_without_call_left_alone() {
        assert_eq!(run("#define F(x) x\nF + 1\n"), "F + 1\n");
    }

    #[test]
    fn test_self_referential_chain() {
        let source = "#define C(x) A(x) B(x) C(x)\n#define B(x) C(x)\n#define A(x) B(x)\nA(1)\n";
        assert_eq!(run(source), "A(1) B(1) C(1)\n");
    }

    #[test]
    fn test_expansion_boundary_does_not_leak_into_following_text() {
        // the lookahead for the comment check after A()'s '/' spans into
        // root text; FOO must still be expanded
        let source = "#define A() /\n#define FOO 42\nA()FOO\n";
        assert_eq!(run(source), "/42\n");
    }

    #[test]
    fn test_undef_then_plain() {
        assert_eq!(run("#define FOO 1\n#undef FOO\nFOO\n"), "FOO\n");
    }

    #[test]
    fn test_conditional_taken_branch_only() {
        let source = "#if 0\nno\n#elif 1\nstuff\n#else\nnope\n#endif\n";
        assert_eq!(run(source), "stuff\n");
    }

    #[test]
    fn test_ifdef() {
        let source = "#define FOO 1\n#ifdef FOO\nyes\n#endif\n#ifndef FOO\nno\n#endif\n";
        assert_eq!(run(source), "yes\n");
    }

    #[test]
    fn test_nested_conditionals_in_skipped_branch() {
        let source = "#if 0\n#if 1\ninner\n#endif\n#else\nouter\n#endif\n";
        assert_eq!(run(source), "outer\n");
    }

    #[test]
    fn test_only_first_true_branch_fires() {
        let source = "#if 1\na\n#elif 1\nb\n#else\nc\n#endif\n";
        assert_eq!(run(source), "a\n");
    }

    #[test]
    fn test_unmatched_else_is_fatal() {
        assert!(matches!(
            preprocess("#else\n", "test.spp"),
            Err(PreprocessError::UnmatchedPreprocessorDirective { .. })
        ));
    }

    #[test]
    fn test_unterminated_if_is_fatal() {
        assert!(matches!(
            preprocess("#if 1\nbody\n", "test.spp"),
            Err(PreprocessError::UnexpectedEndOfFile { .. })
        ));
    }

    #[test]
    fn test_eval() {
        assert_eq!(run("#eval{2*21}"), "42");
    }

    #[test]
    fn test_nested_eval() {
        assert_eq!(run("#eval{1+#eval{1+1}}"), "3");
    }

    #[test]
    fn test_eval_uses_macros() {
        assert_eq!(run("#define N 6\n#eval{N*7}"), "42");
    }

    #[test]
    fn test_eval_fractional_result() {
        assert_eq!(run("#eval{5/2}"), "2.5");
    }

    #[test]
    fn test_lit_block_verbatim() {
        assert_eq!(run("#lit X #if Y #end #end"), " X #if Y #end ");
    }

    #[test]
    fn test_lit_ignores_macros() {
        assert_eq!(run("#define FOO 1\n#lit FOO #end"), " FOO ");
    }

    #[test]
    fn test_pragma_line_warning_discarded() {
        assert_eq!(run("#pragma once\n#line 3\n#warning hi\nx\n"), "x\n");
    }

    #[test]
    fn test_error_directive() {
        assert!(matches!(
            preprocess("#error \"boom\"\n", "test.spp"),
            Err(PreprocessError::ErrorDirective { message, .. }) if message == "boom"
        ));
    }

    #[test]
    fn test_unknown_command() {
        assert!(matches!(
            preprocess("#frobnicate\n", "test.spp"),
            Err(PreprocessError::UnknownPreprocessorCommand { .. })
        ));
    }

    #[test]
    fn test_embedded_without_executor_is_fatal() {
        assert!(matches!(
            preprocess("#embedded(lua) x #end", "test.spp"),
            Err(PreprocessError::EmbeddedCodeNotSupported { .. })
        ));
    }

    #[test]
    fn test_line_continuation_in_define() {
        assert_eq!(run("#define FOO a \\\nb\nFOO\n"), "a b\n");
    }

    #[test]
    fn test_idempotence_on_expanded_output() {
        let expanded = run("#define FOO 42\nx = FOO;\n");
        assert_eq!(run(&expanded), expanded);
    }

    #[test]
    fn test_predefine() {
        let mut pp = Preprocessor::new(Source::str("VALUE\n", "test.spp"));
        pp.predefine("VALUE", "7").unwrap();
        assert_eq!(pp.run_to_string().unwrap(), "7\n");
    }

    #[test]
    fn test_defined_in_condition() {
        let source = "#define FOO 1\n#if defined(FOO) && !defined(BAR)\nyes\n#endif\n";
        assert_eq!(run(source), "yes\n");
    }

    #[test]
    fn test_include_defines_macros() {
        let files = HashMap::from([("defs.spp".to_string(), "#define FOO 9\n".to_string())]);
        let mut pp = Preprocessor::new(Source::str("#include \"defs.spp\"\nFOO\n", "main.spp"))
            .with_resolver(MapResolver(files));
        assert_eq!(pp.run_to_string().unwrap(), "9\n");
    }

    #[test]
    fn test_include_content_is_processed() {
        let files = HashMap::from([("body.spp".to_string(), "#if 1\nhi\n#endif\n".to_string())]);
        let mut pp = Preprocessor::new(Source::str("#include <body.spp>\nx\n", "main.spp"))
            .with_resolver(MapResolver(files));
        assert_eq!(pp.run_to_string().unwrap(), "hi\nx\n");
    }

    #[test]
    fn test_missing_include_is_fatal() {
        let mut pp = Preprocessor::new(Source::str("#include \"nope.spp\"\n", "main.spp"))
            .with_resolver(MapResolver(HashMap::new()));
        assert!(matches!(
            pp.run_to_string(),
            Err(PreprocessError::MissingInclude { .. })
        ));
    }

    #[test]
    fn test_include_without_resolver_is_fatal() {
        assert!(matches!(
            preprocess("#include \"a.spp\"\n", "test.spp"),
            Err(PreprocessError::InvalidInclude { .. })
        ));
    }

    #[test]
    fn test_embedded_block_expands_then_executes() {
        let source = "#define N 9\n#embedded(calc) N+1 #end!\n";
        let mut pp =
            Preprocessor::new(Source::str(source, "main.spp")).with_executor(EchoExecutor);
        assert_eq!(pp.run_to_string().unwrap(), "9+1!\n");
    }

    #[test]
    fn test_embedded_block_malformed_lang() {
        let mut pp = Preprocessor::new(Source::str("#embedded lua x #end", "main.spp"))
            .with_executor(EchoExecutor);
        assert!(matches!(
            pp.run_to_string(),
            Err(PreprocessError::EmbeddedCodeSyntax { .. })
        ));
    }

    #[test]
    fn test_location_reported_in_errors() {
        let err = preprocess("ok\n#bogus\n", "test.spp").unwrap_err();
        let at = err.location().expect("location");
        assert_eq!(at.line, 2);
    }
}
