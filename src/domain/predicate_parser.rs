//! Predicate DSL parser.
//!
//! Recursive descent parser for the selection grammar. Converts text to AST with
//! meaningful error messages including character offset, expected/found tokens.

use crate::domain::error::ParseError;
use crate::domain::predicate::{Literal, Predicate};

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn remaining(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn error(&self, message: String) -> ParseError {
        ParseError {
            message,
            position: self.pos,
        }
    }

    fn expect_char(&mut self, expected: char) -> Result<(), ParseError> {
        self.skip_whitespace();
        match self.peek() {
            Some(ch) if ch == expected => {
                self.advance();
                Ok(())
            }
            Some(ch) => Err(self.error(format!("expected '{}', found '{}'", expected, ch))),
            None => Err(self.error(format!("expected '{}', found end of input", expected))),
        }
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        let remaining = self.remaining();
        remaining.starts_with(keyword)
            && !remaining[keyword.len()..]
                .chars()
                .next()
                .is_some_and(|c| c.is_alphanumeric() || c == '_')
    }

    fn consume_keyword(&mut self, keyword: &str) -> bool {
        if self.peek_keyword(keyword) {
            self.pos += keyword.len();
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<(), ParseError> {
        if self.consume_keyword(keyword) {
            Ok(())
        } else {
            let found = self.peek_word();
            Err(self.error(format!("expected '{}', found '{}'", keyword, found)))
        }
    }

    fn peek_word(&self) -> String {
        let word: String = self
            .remaining()
            .chars()
            .take_while(|ch| ch.is_alphanumeric() || *ch == '_')
            .collect();
        if word.is_empty() {
            self.peek()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "end of input".to_string())
        } else {
            word
        }
    }

    fn parse_number(&mut self) -> Result<f64, ParseError> {
        self.skip_whitespace();
        let start = self.pos;
        let mut has_dot = false;
        let mut digits = 0;

        if self.peek() == Some('-') {
            self.advance();
        }

        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                digits += 1;
                self.advance();
            } else if ch == '.' && !has_dot {
                has_dot = true;
                self.advance();
            } else {
                break;
            }
        }

        if digits == 0 {
            return Err(ParseError {
                message: "expected number".to_string(),
                position: start,
            });
        }

        let num_str = &self.input[start..self.pos];
        num_str.parse::<f64>().map_err(|_| ParseError {
            message: format!("invalid number: {}", num_str),
            position: start,
        })
    }

    fn parse_identifier(&mut self) -> Result<&'a str, ParseError> {
        let start = self.pos;
        while let Some(ch) = self.peek() {
            if ch.is_alphanumeric() || ch == '_' {
                self.advance();
            } else {
                break;
            }
        }
        if self.pos == start {
            return Err(self.error(format!("expected field name, found '{}'", self.peek_word())));
        }
        Ok(&self.input[start..self.pos])
    }

    fn parse_path(&mut self) -> Result<String, ParseError> {
        self.skip_whitespace();
        let start = self.pos;
        self.parse_identifier()?;
        while self.peek() == Some('.') {
            self.advance();
            self.parse_identifier()?;
        }
        Ok(self.input[start..self.pos].to_string())
    }

    fn parse_text(&mut self) -> Result<String, ParseError> {
        let start = self.pos;
        self.expect_char('\'')?;
        let body_start = self.pos;
        while let Some(ch) = self.peek() {
            if ch == '\'' {
                let text = self.input[body_start..self.pos].to_string();
                self.advance();
                return Ok(text);
            }
            self.advance();
        }
        Err(ParseError {
            message: "unterminated text literal".to_string(),
            position: start,
        })
    }

    fn parse_literal(&mut self) -> Result<Literal, ParseError> {
        self.skip_whitespace();
        if self.peek() == Some('\'') {
            return Ok(Literal::Text(self.parse_text()?));
        }
        if self.consume_keyword("true") {
            return Ok(Literal::Bool(true));
        }
        if self.consume_keyword("false") {
            return Ok(Literal::Bool(false));
        }
        if self
            .peek()
            .is_some_and(|ch| ch.is_ascii_digit() || ch == '-' || ch == '.')
        {
            return Ok(Literal::Number(self.parse_number()?));
        }
        Err(self.error(format!(
            "expected number, 'text', true or false, found '{}'",
            self.peek_word()
        )))
    }

    fn parse_comparison(&mut self, keyword: &str) -> Result<Predicate, ParseError> {
        self.expect_keyword(keyword)?;
        self.expect_char('(')?;
        let path = self.parse_path()?;
        self.expect_char(',')?;
        let value = self.parse_number()?;
        self.expect_char(')')?;

        match keyword {
            "ABOVE" => Ok(Predicate::Above { path, value }),
            "BELOW" => Ok(Predicate::Below { path, value }),
            "AT_LEAST" => Ok(Predicate::AtLeast { path, value }),
            "AT_MOST" => Ok(Predicate::AtMost { path, value }),
            _ => unreachable!(),
        }
    }

    fn parse_between(&mut self) -> Result<Predicate, ParseError> {
        self.expect_keyword("BETWEEN")?;
        self.expect_char('(')?;
        let path = self.parse_path()?;
        self.expect_char(',')?;
        let lower = self.parse_number()?;
        self.expect_char(',')?;
        let upper = self.parse_number()?;
        self.expect_char(')')?;

        Ok(Predicate::Between { path, lower, upper })
    }

    fn parse_equals(&mut self) -> Result<Predicate, ParseError> {
        self.expect_keyword("EQUALS")?;
        self.expect_char('(')?;
        let path = self.parse_path()?;
        self.expect_char(',')?;
        let value = self.parse_literal()?;
        self.expect_char(')')?;
        Ok(Predicate::Equals { path, value })
    }

    fn parse_exists(&mut self) -> Result<Predicate, ParseError> {
        self.expect_keyword("EXISTS")?;
        self.expect_char('(')?;
        let path = self.parse_path()?;
        self.expect_char(')')?;
        Ok(Predicate::Exists(path))
    }

    fn parse_list(&mut self, keyword: &str) -> Result<Vec<Predicate>, ParseError> {
        self.expect_keyword(keyword)?;
        self.expect_char('(')?;

        let mut items = vec![self.parse_predicate()?];
        loop {
            self.skip_whitespace();
            if self.peek() == Some(')') {
                self.advance();
                break;
            }
            self.expect_char(',')?;
            items.push(self.parse_predicate()?);
        }

        if items.len() < 2 {
            return Err(self.error(format!("{} requires at least 2 predicates", keyword)));
        }
        Ok(items)
    }

    fn parse_not(&mut self) -> Result<Predicate, ParseError> {
        self.expect_keyword("NOT")?;
        self.expect_char('(')?;
        let inner = self.parse_predicate()?;
        self.expect_char(')')?;
        Ok(Predicate::Not(Box::new(inner)))
    }

    fn parse_quantifier(&mut self, keyword: &str) -> Result<Predicate, ParseError> {
        self.expect_keyword(keyword)?;
        self.expect_char('(')?;
        let path = self.parse_path()?;
        self.expect_char(',')?;
        let predicate = Box::new(self.parse_predicate()?);
        self.expect_char(')')?;
        match keyword {
            "ANY" => Ok(Predicate::AnyOf { path, predicate }),
            "NONE" => Ok(Predicate::NoneOf { path, predicate }),
            _ => unreachable!(),
        }
    }

    fn parse_predicate(&mut self) -> Result<Predicate, ParseError> {
        self.skip_whitespace();

        for keyword in ["ABOVE", "BELOW", "AT_LEAST", "AT_MOST"] {
            if self.peek_keyword(keyword) {
                return self.parse_comparison(keyword);
            }
        }
        if self.peek_keyword("BETWEEN") {
            return self.parse_between();
        }
        if self.peek_keyword("EQUALS") {
            return self.parse_equals();
        }
        if self.peek_keyword("EXISTS") {
            return self.parse_exists();
        }
        if self.peek_keyword("AND") {
            return self.parse_list("AND").map(Predicate::And);
        }
        if self.peek_keyword("OR") {
            return self.parse_list("OR").map(Predicate::Or);
        }
        if self.peek_keyword("NOT") {
            return self.parse_not();
        }
        if self.peek_keyword("ANY") {
            return self.parse_quantifier("ANY");
        }
        if self.peek_keyword("NONE") {
            return self.parse_quantifier("NONE");
        }

        let word = self.peek_word();
        Err(self.error(format!("expected predicate, found '{}'", word)))
    }

    fn parse(&mut self) -> Result<Predicate, ParseError> {
        let predicate = self.parse_predicate()?;
        self.skip_whitespace();
        if self.pos < self.input.len() {
            return Err(self.error(format!(
                "unexpected input after predicate: '{}'",
                self.remaining()
            )));
        }
        Ok(predicate)
    }
}

pub fn parse(input: &str) -> Result<Predicate, ParseError> {
    let mut parser = Parser::new(input);
    parser.parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_above() {
        let p = parse("ABOVE(holders.avgCostToCurrentRatio, 1)").unwrap();
        assert_eq!(
            p,
            Predicate::Above {
                path: "holders.avgCostToCurrentRatio".into(),
                value: 1.0
            }
        );
    }

    #[test]
    fn parse_inclusive_comparisons() {
        assert!(matches!(
            parse("AT_LEAST(price, 5)").unwrap(),
            Predicate::AtLeast { .. }
        ));
        assert!(matches!(
            parse("AT_MOST(price, 5)").unwrap(),
            Predicate::AtMost { .. }
        ));
    }

    #[test]
    fn parse_between() {
        match parse("BETWEEN(anal.strongBuy, 10.5, 99.99)").unwrap() {
            Predicate::Between { path, lower, upper } => {
                assert_eq!(path, "anal.strongBuy");
                assert!((lower - 10.5).abs() < f64::EPSILON);
                assert!((upper - 99.99).abs() < f64::EPSILON);
            }
            other => panic!("expected Between, got {other:?}"),
        }
    }

    #[test]
    fn parse_equals_literals() {
        assert_eq!(
            parse("EQUALS(anal.consensus, 'strong buy')").unwrap(),
            Predicate::Equals {
                path: "anal.consensus".into(),
                value: Literal::Text("strong buy".into())
            }
        );
        assert_eq!(
            parse("EQUALS(flags.hasDividends, true)").unwrap(),
            Predicate::Equals {
                path: "flags.hasDividends".into(),
                value: Literal::Bool(true)
            }
        );
        assert_eq!(
            parse("EQUALS(rank, -3)").unwrap(),
            Predicate::Equals {
                path: "rank".into(),
                value: Literal::Number(-3.0)
            }
        );
    }

    #[test]
    fn parse_exists() {
        assert_eq!(
            parse("EXISTS(short)").unwrap(),
            Predicate::Exists("short".into())
        );
    }

    #[test]
    fn parse_variadic_and_or() {
        match parse("AND(ABOVE(a, 1), BELOW(b, 2), EXISTS(c))").unwrap() {
            Predicate::And(items) => assert_eq!(items.len(), 3),
            other => panic!("expected And, got {other:?}"),
        }
        match parse("OR(ABOVE(a, 1), BELOW(b, 2))").unwrap() {
            Predicate::Or(items) => assert_eq!(items.len(), 2),
            other => panic!("expected Or, got {other:?}"),
        }
    }

    #[test]
    fn parse_quantifiers() {
        let p = parse("ANY(options, AND(EQUALS(direction, 'up'), ABOVE(ratio, 1)))").unwrap();
        assert!(matches!(p, Predicate::AnyOf { ref path, .. } if path == "options"));
        let p = parse("NONE(options, BELOW(expectedCostToCurrentRatio, 1))").unwrap();
        assert!(matches!(p, Predicate::NoneOf { .. }));
    }

    #[test]
    fn parse_whitespace_handling() {
        let p = parse("  NOT ( ABOVE (  price ,  100 ) )  ").unwrap();
        assert!(matches!(p, Predicate::Not(_)));
    }

    #[test]
    fn display_output_parses_back() {
        let text = "AND(ABOVE(trend.costTrend1Y, 0.5), NOT(EXISTS(short)), EQUALS(anal.consensus, 'buy'))";
        let p = parse(text).unwrap();
        assert_eq!(parse(&p.to_string()).unwrap(), p);
    }

    #[test]
    fn error_missing_number() {
        let err = parse("ABOVE(price, )").unwrap_err();
        assert!(err.message.contains("expected number"));
        assert_eq!(err.position, 13);
    }

    #[test]
    fn error_missing_paren() {
        let err = parse("ABOVE(price, 100").unwrap_err();
        assert!(err.message.contains("expected ')'"));
    }

    #[test]
    fn error_unknown_keyword() {
        let err = parse("GREATER(price, 100)").unwrap_err();
        assert!(err.message.contains("expected predicate"));
        assert_eq!(err.position, 0);
    }

    #[test]
    fn error_trailing_input() {
        let err = parse("EXISTS(price) garbage").unwrap_err();
        assert!(err.message.contains("unexpected input"));
    }

    #[test]
    fn error_single_item_and() {
        let err = parse("AND(EXISTS(price))").unwrap_err();
        assert!(err.message.contains("AND requires at least 2 predicates"));
    }

    #[test]
    fn error_bad_path() {
        let err = parse("EXISTS(holders.)").unwrap_err();
        assert!(err.message.contains("expected field name"));
    }

    #[test]
    fn error_unterminated_text() {
        let err = parse("EQUALS(name, 'abc)").unwrap_err();
        assert!(err.message.contains("unterminated"));
    }

    #[test]
    fn keywords_are_case_sensitive() {
        let err = parse("above(price, 1)").unwrap_err();
        assert!(err.message.contains("expected predicate"));
    }

    #[test]
    fn error_empty_input() {
        let err = parse("   ").unwrap_err();
        assert!(err.message.contains("expected predicate"));
    }
}
