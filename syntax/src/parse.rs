use anyhow::Result;

#[derive(Debug, thiserror::Error)]
#[error("ParseError on line '{line}': {msg}")]
pub struct Error {
    msg: String,
    pos: usize,
    line: String,
}

/// Parse definition text into a list of top-level sections.
pub fn parse(text: &str) -> Result<Vec<crate::ast::Item<'_>>> {
    use combine::EasyParser;
    match deffile::items().easy_parse(text) {
        Ok((items, remainder)) => {
            if remainder.is_empty() {
                Ok(items)
            } else {
                let pos = text.len() - remainder.len();
                Err(error_at(text, pos, "expected a section header or assignment".to_owned())
                    .into())
            }
        }
        Err(e) => {
            let pos = e.position.translate_position(text);
            // converting combine's errors directly is a lifetime nightmare,
            // so we stringify the error before returning it:
            Err(error_at(text, pos, format!("{}", e)).into())
        }
    }
}

/// Isolate the line containing `pos` so the error message can show it.
fn error_at(text: &str, pos: usize, msg: String) -> Error {
    let before = &text[0..pos];
    let after = &text[pos..text.len()];
    let prefix: String = before.chars().rev().take_while(|&c| c != '\n').collect();
    let prefix: String = prefix.chars().rev().collect();
    let suffix: String = after.chars().take_while(|&c| c != '\n').collect();
    let line = prefix + &suffix;
    Error { msg, pos, line }
}

pub mod prelude {
    pub use combine::parser::char::{char, string};
    pub use combine::parser::range::recognize;
    pub use combine::*;
}

pub mod util {

    use super::prelude::*;
    use combine::parser::char::{alpha_num, letter, space};

    p! {
        ident_start() -> char, {
            char('_').or(letter())
        }
    }

    p! {
        ident_rest() -> Vec<char>, {
            many(char('_').or(alpha_num()))
        }
    }

    p! {
        ident() -> &'a str, {
            recognize(ident_start().and(ident_rest()))
        }
    }

    p! {
        comment() -> &'a str, {
            // a comment on the file's last line may end at eof
            // instead of a newline:
            recognize(
                char('#')
                .and(skip_many(none_of("\n".chars())))
                .and(char('\n').map(|_| ()).or(eof()))
            )
        }
    }

    p! {
        whitespace() -> (), {
            skip_many1(
                space().map(|_| ()).or(comment().map(|_| ()))
            )
        }
    }

    wrapper! {
        lex(parser), {
            optional(whitespace()).with(parser).skip(optional(whitespace()))
        }
    }

    p! {
        line_internal_whitespace() -> (), {
            skip_many1(satisfy(|c: char| c.is_whitespace() && c != '\n'))
        }
    }

    wrapper! {
        lex_inline(parser), {
            optional(line_internal_whitespace())
                .with(parser)
                .skip(optional(line_internal_whitespace()))
        }
    }

    wrapper! {
        brackets(parser), {
            char('[').with(parser).skip(char(']'))
        }
    }

    p! {
        eol() -> (), {
            eof().or(char('\n').and(optional(whitespace())).map(|_| ()))
        }
    }

    wrapper! {
        line(parser), {
            lex_inline(parser).skip(eol())
        }
    }

    // comma-delimited words on a single line
    repeater! {
        comma_delim(parser), {
            sep_by1(lex_inline(parser), char(','))
        }
    }

    #[cfg(test)]
    mod test {
        use anyhow::Result;
        use combine::parser::char::char;
        use combine::EasyParser;
        #[test]
        fn test_ident() -> Result<()> {
            assert_eq!("fillcf", super::ident().easy_parse("fillcf").unwrap().0);
            assert_eq!(
                "_stage_2",
                super::ident().easy_parse("_stage_2").unwrap().0
            );
            assert!(super::ident().easy_parse("2stage").is_err());
            Ok(())
        }
        #[test]
        fn test_whitespace() -> Result<()> {
            assert_eq!(
                ((), "and more"),
                super::whitespace().easy_parse(" and more").unwrap()
            );
            assert_eq!(
                ((), "x"),
                super::whitespace().easy_parse(" # skip me\n  x").unwrap()
            );
            assert!(super::whitespace().easy_parse("x").is_err());
            Ok(())
        }
        #[test]
        fn test_line() -> Result<()> {
            assert_eq!('x', super::line(char('x')).easy_parse(" x").unwrap().0);
            assert_eq!('x', super::line(char('x')).easy_parse(" x\n").unwrap().0);
            assert!(super::line(char('x')).easy_parse(" x y\n").is_err());
            Ok(())
        }
        #[test]
        fn test_comma_delim() -> Result<()> {
            assert_eq!(
                vec!["a", "b", "c"],
                super::comma_delim(super::ident()).easy_parse("a, b ,c").unwrap().0
            );
            Ok(())
        }
    }
}

mod literal {

    use super::prelude::*;

    // '=' would make `key = a=b` ambiguous; the rest delimit other syntax.
    const FORBID_UNQUOTED: [char; 6] = ['[', ']', '=', ',', '#', '"'];

    wrapper! {
        double_quotes(parser), {
            char('"').with(parser).skip(char('"'))
        }
    }

    p! {
        double_quoted_literal() -> &'a str, {
            double_quotes(recognize(skip_many(none_of("\"".chars()))))
        }
    }

    p! {
        unquoted_literal_char() -> char, {
            satisfy(|c: char|
                !c.is_whitespace() && !FORBID_UNQUOTED.iter().any(|&forbidden| forbidden == c)
            )
        }
    }

    p! {
        unquoted_literal() -> &'a str, {
            recognize(skip_many1(unquoted_literal_char()))
        }
    }

    #[cfg(test)]
    mod test {
        use anyhow::Result;
        use combine::EasyParser;
        #[test]
        fn test_literal() -> Result<()> {
            assert_eq!(
                "4:00:00",
                super::unquoted_literal().easy_parse("4:00:00").unwrap().0
            );
            assert_eq!(
                "0-15",
                super::unquoted_literal().easy_parse("0-15 trailing").unwrap().0
            );
            assert_eq!(
                "two words ok",
                super::double_quoted_literal().easy_parse("\"two words ok\"").unwrap().0
            );
            assert!(super::unquoted_literal().easy_parse("=nope").is_err());
            Ok(())
        }
    }
}

mod value {

    use super::literal::{double_quoted_literal, unquoted_literal};
    use super::prelude::*;
    use super::util::comma_delim;
    use crate::ast::Value;

    p! {
        value() -> Value<'a>, {
            double_quoted_literal()
                .map(|val| Value::Literal { val })
                .or(comma_delim(unquoted_literal()).map(|items: Vec<&'a str>| {
                    if items.len() == 1 {
                        Value::Literal { val: items[0] }
                    } else {
                        Value::List { items }
                    }
                }))
        }
    }

    #[cfg(test)]
    mod test {
        use crate::ast::Value;
        use anyhow::Result;
        use combine::EasyParser;
        #[test]
        fn test_single_word() -> Result<()> {
            assert_eq!(
                Value::literal("8GB"),
                super::value().easy_parse("8GB").unwrap().0
            );
            Ok(())
        }
        #[test]
        fn test_quoted() -> Result<()> {
            assert_eq!(
                Value::literal("19:59:58.5 +40.40.00.0 J2000"),
                super::value().easy_parse("\"19:59:58.5 +40.40.00.0 J2000\"").unwrap().0
            );
            Ok(())
        }
        #[test]
        fn test_list() -> Result<()> {
            assert_eq!(
                Value::list(vec!["prep", "convolve"]),
                super::value().easy_parse("prep, convolve").unwrap().0
            );
            Ok(())
        }
    }
}

mod assignment {

    use super::prelude::*;
    use super::util::{ident, lex_inline};
    use super::value::value;
    use crate::ast::{Assignment, Value};

    p! {
        assignment() -> Assignment<'a>, {
            ident()
                .skip(lex_inline(char('=')))
                .and(optional(value()))
                .map(|(key, value)| Assignment {
                    key,
                    // `key =` with nothing after is an explicitly empty value
                    // (the original format allowed e.g. `field = `):
                    value: value.unwrap_or(Value::Literal { val: "" }),
                })
        }
    }

}

mod section {

    use super::assignment::assignment;
    use super::prelude::*;
    use super::util::{brackets, ident, lex_inline, line, line_internal_whitespace};
    use crate::ast::{Assignment, Item, StageBlock};

    p! {
        defaults_header() -> (), {
            brackets(lex_inline(string("defaults"))).map(|_| ())
        }
    }

    p! {
        limits_header() -> (), {
            brackets(lex_inline(string("limits"))).map(|_| ())
        }
    }

    p! {
        stage_header() -> &'a str, {
            brackets(
                lex_inline(string("stage"))
                    .with(ident())
                    .skip(optional(line_internal_whitespace()))
            )
        }
    }

    p! {
        body() -> Vec<Assignment<'a>>, {
            many(line(assignment()))
        }
    }

    p! {
        defaults() -> Item<'a>, {
            line(defaults_header())
                .with(body())
                .map(Item::Defaults)
        }
    }

    p! {
        limits() -> Item<'a>, {
            line(limits_header())
                .with(body())
                .map(Item::Limits)
        }
    }

    p! {
        stage() -> Item<'a>, {
            line(stage_header())
                .and(body())
                .map(|(name, assignments)| Item::Stage(StageBlock { name, assignments }))
        }
    }

    #[cfg(test)]
    mod test {
        use crate::ast::{Assignment, Item};
        use anyhow::Result;
        use combine::EasyParser;
        #[test]
        fn test_headers() -> Result<()> {
            assert_eq!((), super::defaults_header().easy_parse("[defaults]").unwrap().0);
            assert_eq!(
                "fillcf",
                super::stage_header().easy_parse("[stage fillcf]").unwrap().0
            );
            assert!(super::stage_header().easy_parse("[stage]").is_err());
            Ok(())
        }
        #[test]
        fn test_defaults_section() -> Result<()> {
            let item = super::defaults()
                .easy_parse("[defaults]\nmem = 8GB\ncpus = 1\n")
                .unwrap()
                .0;
            assert_eq!(
                Item::Defaults(vec![
                    Assignment::literal("mem", "8GB"),
                    Assignment::literal("cpus", "1"),
                ]),
                item
            );
            Ok(())
        }
        #[test]
        fn test_stage_stops_at_next_header() -> Result<()> {
            let (item, rest) = super::stage()
                .easy_parse("[stage prep]\ntype = single\n[stage next]\n")
                .unwrap();
            match item {
                Item::Stage(block) => {
                    assert_eq!("prep", block.name);
                    assert_eq!(1, block.assignments.len());
                }
                _ => panic!("expected stage"),
            }
            assert_eq!("[stage next]\n", rest);
            Ok(())
        }
    }
}

mod deffile {
    use super::{
        section,
        prelude::*,
        util::{lex, whitespace},
    };
    use crate::ast::Item;

    p! {
        item() -> Item<'a>, {
            choice!(
                attempt(section::defaults()),
                attempt(section::limits()),
                section::stage()
            )
        }
    }

    // leading whitespace/comments are consumed up front so that `many`
    // terminates cleanly at eof instead of failing mid-lex:
    p! {
        items() -> Vec<Item<'a>>, {
            optional(whitespace()).with(many(lex(item())))
        }
    }
}

#[cfg(test)]
mod test {
    use crate::ast::Item;
    use anyhow::Result;

    const BASIC: &str = "\
# pipeline definition
[defaults]
partition = standard
walltime  = 4:00:00

[stage dryrun]
type = single
app  = coyote
vis  = test.ms

[stage fillcf]
type  = array
app   = coyote
after = dryrun
array = 0-15
";

    #[test]
    fn test_parse_basic() -> Result<()> {
        let items = super::parse(BASIC)?;
        assert_eq!(3, items.len());
        assert!(matches!(items[0], Item::Defaults(_)));
        assert!(matches!(items[1], Item::Stage(_)));
        Ok(())
    }

    #[test]
    fn test_parse_limits_section() -> Result<()> {
        let items = super::parse("[limits]\nmax_cpus = 64\npartitions = batch, gpu\n")?;
        assert_eq!(1, items.len());
        match &items[0] {
            Item::Limits(assignments) => assert_eq!(2, assignments.len()),
            other => panic!("expected limits section, got {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn test_parse_empty() -> Result<()> {
        assert!(super::parse("")?.is_empty());
        assert!(super::parse("# only a comment\n")?.is_empty());
        Ok(())
    }

    #[test]
    fn test_trailing_comment_without_newline() -> Result<()> {
        let items = super::parse("[stage a]\ntype = single\napp = coyote\n# done")?;
        assert_eq!(1, items.len());
        assert!(super::parse("# no newline")?.is_empty());
        Ok(())
    }

    #[test]
    fn test_parse_error_names_line() {
        let e = super::parse("[stage ok]\ntype = single\n!!! garbage\n").unwrap_err();
        let msg = format!("{e}");
        assert!(msg.contains("!!! garbage"), "got: {msg}");
    }
}
