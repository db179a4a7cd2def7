//! Macro definition storage

use std::collections::HashMap;

use string_interner::backend::StringBackend;
use string_interner::{DefaultSymbol, StringInterner};

use crate::common::{Location, PreprocessError, PreprocessResult};
use crate::source::{is_ident_continue, is_ident_start};

/// One macro definition.
///
/// `params: None` is an object-like macro substituted verbatim;
/// `params: Some(vec![])` is a function-like macro taking zero arguments but
/// requiring `()` at the call site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacroDef {
    pub name: String,
    pub params: Option<Vec<String>>,
    pub body: String,
    pub defined_at: Location,
}

impl MacroDef {
    pub fn is_function_like(&self) -> bool {
        self.params.is_some()
    }

    /// Parse the text following `#define`: an identifier, an optional
    /// parenthesized parameter list (only when the `(` is adjacent to the
    /// name), then the trimmed remainder as the body.
    pub fn parse(line: &str, at: &Location) -> PreprocessResult<Self> {
        let text = line.trim_start();
        let name_len = ident_len(text);
        if name_len == 0 {
            return Err(PreprocessError::invalid_identifier(
                format!("'{}' is not a valid macro name", text.trim()),
                at.clone(),
            ));
        }
        let name = text[..name_len].to_string();
        let rest = &text[name_len..];

        if let Some(param_text) = rest.strip_prefix('(') {
            let close = param_text.find(')').ok_or_else(|| {
                PreprocessError::invalid_macro_definition(
                    format!("missing ')' in parameter list of '{name}'"),
                    at.clone(),
                )
            })?;
            let params = parse_params(&param_text[..close], &name, at)?;
            let body = param_text[close + 1..].trim().to_string();
            Ok(Self {
                name,
                params: Some(params),
                body,
                defined_at: at.clone(),
            })
        } else {
            Ok(Self {
                name,
                params: None,
                body: rest.trim().to_string(),
                defined_at: at.clone(),
            })
        }
    }
}

fn ident_len(text: &str) -> usize {
    let mut chars = text.chars();
    match chars.next() {
        Some(ch) if is_ident_start(ch) => {}
        _ => return 0,
    }
    text.chars()
        .take_while(|&ch| is_ident_continue(ch))
        .map(char::len_utf8)
        .sum()
}

fn parse_params(text: &str, name: &str, at: &Location) -> PreprocessResult<Vec<String>> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    let mut params = Vec::new();
    for piece in text.split(',') {
        let param = piece.trim();
        if ident_len(param) != param.len() || param.is_empty() {
            return Err(PreprocessError::invalid_macro_definition(
                format!("invalid parameter '{param}' in definition of '{name}'"),
                at.clone(),
            ));
        }
        params.push(param.to_string());
    }
    Ok(params)
}

/// Mapping from interned macro name to definition.
///
/// Interner symbols are cheap to compare and unique per name; the ancestor
/// chain in the expander compares symbols, not strings.
pub struct MacroTable {
    interner: StringInterner<StringBackend>,
    macros: HashMap<DefaultSymbol, MacroDef>,
}

impl MacroTable {
    pub fn new() -> Self {
        Self {
            interner: StringInterner::new(),
            macros: HashMap::new(),
        }
    }

    /// Add a definition. Redefinition with an identical body and parameter
    /// list is a no-op; anything else is rejected.
    pub fn define(&mut self, def: MacroDef) -> PreprocessResult<()> {
        let sym = self.interner.get_or_intern(&def.name);
        if let Some(existing) = self.macros.get(&sym) {
            if existing.params == def.params && existing.body == def.body {
                return Ok(());
            }
            return Err(PreprocessError::MacroAlreadyDefined {
                name: def.name,
                at: def.defined_at,
                first: existing.defined_at.clone(),
            });
        }
        self.macros.insert(sym, def);
        Ok(())
    }

    /// Remove a definition; absent names are silently ignored.
    pub fn undef(&mut self, name: &str) {
        if let Some(sym) = self.interner.get(name) {
            self.macros.remove(&sym);
        }
    }

    pub fn lookup(&self, name: &str) -> Option<&MacroDef> {
        self.interner.get(name).and_then(|sym| self.macros.get(&sym))
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    /// Symbol for a name that has been interned (i.e. defined at some point).
    pub fn symbol(&self, name: &str) -> Option<DefaultSymbol> {
        self.interner.get(name)
    }
}

impl Default for MacroTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at() -> Location {
        Location::start_of("test.spp")
    }

    #[test]
    fn test_parse_object_like() {
        let def = MacroDef::parse(" FOO  1 + 2 ", &at()).unwrap();
        assert_eq!(def.name, "FOO");
        assert_eq!(def.params, None);
        assert_eq!(def.body, "1 + 2");
    }

    #[test]
    fn test_parse_function_like() {
        let def = MacroDef::parse("ADD(a, b) a + b", &at()).unwrap();
        assert_eq!(def.params, Some(vec!["a".into(), "b".into()]));
        assert_eq!(def.body, "a + b");
    }

    #[test]
    fn test_parse_zero_arg_function_like() {
        let def = MacroDef::parse("NOW() time()", &at()).unwrap();
        assert_eq!(def.params, Some(vec![]));
        assert!(def.is_function_like());
    }

    #[test]
    fn test_space_before_paren_is_object_like() {
        let def = MacroDef::parse("FOO (x)", &at()).unwrap();
        assert_eq!(def.params, None);
        assert_eq!(def.body, "(x)");
    }

    #[test]
    fn test_parse_bad_name() {
        assert!(matches!(
            MacroDef::parse("1BAD x", &at()),
            Err(PreprocessError::InvalidIdentifier { .. })
        ));
    }

    #[test]
    fn test_parse_bad_params() {
        assert!(matches!(
            MacroDef::parse("F(a, 1b) x", &at()),
            Err(PreprocessError::InvalidMacroDefinition { .. })
        ));
        assert!(matches!(
            MacroDef::parse("F(a, b x", &at()),
            Err(PreprocessError::InvalidMacroDefinition { .. })
        ));
    }

    #[test]
    fn test_define_and_lookup() {
        let mut table = MacroTable::new();
        table
            .define(MacroDef::parse("FOO 1", &at()).unwrap())
            .unwrap();
        assert!(table.is_defined("FOO"));
        assert_eq!(table.lookup("FOO").unwrap().body, "1");
        assert!(!table.is_defined("BAR"));
    }

    #[test]
    fn test_identical_redefinition_is_ok() {
        let mut table = MacroTable::new();
        table
            .define(MacroDef::parse("FOO 1", &at()).unwrap())
            .unwrap();
        table
            .define(MacroDef::parse("FOO 1", &at()).unwrap())
            .unwrap();
    }

    #[test]
    fn test_conflicting_redefinition_rejected() {
        let mut table = MacroTable::new();
        table
            .define(MacroDef::parse("FOO 1", &at()).unwrap())
            .unwrap();
        assert!(matches!(
            table.define(MacroDef::parse("FOO 2", &at()).unwrap()),
            Err(PreprocessError::MacroAlreadyDefined { .. })
        ));
    }

    #[test]
    fn test_undef_absent_is_noop() {
        let mut table = MacroTable::new();
        table.undef("NOPE");
        table
            .define(MacroDef::parse("FOO 1", &at()).unwrap())
            .unwrap();
        table.undef("FOO");
        assert!(!table.is_defined("FOO"));
        table
            .define(MacroDef::parse("FOO 2", &at()).unwrap())
            .unwrap();
    }
}
