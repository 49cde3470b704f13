//! Lightweight Cypher token scan used for transaction-mode detection.
//!
//! This is not a Cypher parser; it only needs to see keywords *outside* of
//! string literals and backtick-quoted identifiers, so a statement like
//! ``MATCH (`USING PERIODIC COMMIT`) RETURN 1`` never flags. Cypher only
//! allows `//` and `/* */` comments between tokens, so there is no separate
//! comment-stripping pass: the tokenizer consumes them as trivia, and quote
//! handling lives entirely in the literal/identifier parsers. The resulting
//! token stream is then walked for the two auto-commit constructs.

use nom::{
    branch::alt,
    bytes::complete::{is_not, tag, take_till, take_until, take_while1},
    character::complete::{anychar, char, multispace1},
    combinator::{opt, recognize},
    multi::{many0, many1_count},
    sequence::delimited,
    IResult, Parser,
};

/// Flags raised by [`scan_statement`]; either one forces an implicit
/// (auto-commit) transaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatementFlags {
    pub call_in_transactions: bool,
    pub periodic_commit: bool,
}

impl StatementFlags {
    pub fn any(&self) -> bool {
        self.call_in_transactions || self.periodic_commit
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token<'a> {
    Word(&'a str),
    BacktickIdent(&'a str),
    StringLiteral(&'a str),
    LBrace,
    RBrace,
    LParen,
    RParen,
    Symbol(char),
}

/// Scans a statement for the implicit-transaction constructs. Returns `None`
/// when the input cannot be tokenized; callers treat that as "no flags".
pub fn scan_statement(input: &str) -> Option<StatementFlags> {
    let tokens = tokenize(input)?;
    Some(detect(&tokens))
}

fn line_comment(input: &str) -> IResult<&str, &str> {
    recognize((tag("//"), take_till(|c| c == '\n'))).parse(input)
}

fn block_comment(input: &str) -> IResult<&str, &str> {
    recognize((tag("/*"), take_until("*/"), tag("*/"))).parse(input)
}

/// Whitespace and comments between tokens. A `/*` without its `*/` is not
/// trivia; [`tokenize`] treats the leftover as a scan failure.
fn trivia(input: &str) -> IResult<&str, &str> {
    recognize(many0(alt((multispace1, line_comment, block_comment)))).parse(input)
}

fn backtick_ident(input: &str) -> IResult<&str, Token<'_>> {
    // Doubled backticks escape a literal backtick, so a quoted identifier is
    // one or more adjacent `…` spans.
    recognize(many1_count(delimited(
        char('`'),
        opt(is_not("`")),
        char('`'),
    )))
    .map(Token::BacktickIdent)
    .parse(input)
}

fn string_literal(input: &str) -> IResult<&str, Token<'_>> {
    alt((
        delimited(
            char('\''),
            recognize(many0(alt((
                recognize((char('\\'), anychar)),
                recognize(is_not("'\\")),
            )))),
            char('\''),
        ),
        delimited(
            char('"'),
            recognize(many0(alt((
                recognize((char('\\'), anychar)),
                recognize(is_not("\"\\")),
            )))),
            char('"'),
        ),
    ))
    .map(Token::StringLiteral)
    .parse(input)
}

fn word(input: &str) -> IResult<&str, Token<'_>> {
    take_while1(|c: char| c.is_alphanumeric() || c == '_')
        .map(Token::Word)
        .parse(input)
}

fn symbol(input: &str) -> IResult<&str, Token<'_>> {
    // A bare quote character only reaches this parser when its literal was
    // unterminated; reject it so the scan as a whole fails.
    nom::combinator::verify(anychar, |c: &char| !matches!(c, '\'' | '"' | '`'))
        .map(|c| match c {
            '{' => Token::LBrace,
            '}' => Token::RBrace,
            '(' => Token::LParen,
            ')' => Token::RParen,
            other => Token::Symbol(other),
        })
        .parse(input)
}

fn token(input: &str) -> IResult<&str, Token<'_>> {
    alt((backtick_ident, string_literal, word, symbol)).parse(input)
}

/// Tokenizes a statement. Every character is consumed (unknown characters
/// become symbol tokens), so this only fails on unterminated quotes or an
/// unterminated block comment.
pub fn tokenize(input: &str) -> Option<Vec<Token<'_>>> {
    let mut tokens = Vec::new();
    let mut rest = input;
    loop {
        let (after_trivia, _) = trivia(rest).ok()?;
        if after_trivia.starts_with("/*") {
            // Only an unterminated block comment survives the trivia pass.
            return None;
        }
        if after_trivia.is_empty() {
            return Some(tokens);
        }
        match token(after_trivia) {
            Ok((next, tok)) => {
                tokens.push(tok);
                rest = next;
            }
            Err(_) => return None,
        }
    }
}

fn is_word(token: Option<&Token<'_>>, expected: &str) -> bool {
    matches!(token, Some(Token::Word(w)) if w.eq_ignore_ascii_case(expected))
}

fn detect(tokens: &[Token<'_>]) -> StatementFlags {
    let mut flags = StatementFlags::default();

    for window in tokens.windows(3) {
        if is_word(window.first(), "USING")
            && is_word(window.get(1), "PERIODIC")
            && is_word(window.get(2), "COMMIT")
        {
            flags.periodic_commit = true;
        }
    }

    let mut i = 0;
    while i < tokens.len() {
        if is_word(tokens.get(i), "CALL") {
            let mut j = i + 1;
            // Optional variable-scope group: CALL (a, b) { … }
            if matches!(tokens.get(j), Some(Token::LParen)) {
                if let Some(close) = matching(tokens, j, Token::LParen, Token::RParen) {
                    j = close + 1;
                }
            }
            if matches!(tokens.get(j), Some(Token::LBrace)) {
                if let Some(close) = matching(tokens, j, Token::LBrace, Token::RBrace) {
                    if is_word(tokens.get(close + 1), "IN")
                        && is_word(tokens.get(close + 2), "TRANSACTIONS")
                    {
                        flags.call_in_transactions = true;
                    }
                }
            }
        }
        i += 1;
    }

    flags
}

fn matching(tokens: &[Token<'_>], open_idx: usize, open: Token<'_>, close: Token<'_>) -> Option<usize> {
    let mut depth = 0usize;
    for (idx, token) in tokens.iter().enumerate().skip(open_idx) {
        if *token == open {
            depth += 1;
        } else if *token == close {
            depth -= 1;
            if depth == 0 {
                return Some(idx);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flags(q: &str) -> StatementFlags {
        scan_statement(q).unwrap()
    }

    #[test]
    fn test_plain_query_has_no_flags() {
        assert!(!flags("MATCH (n) RETURN n").any());
        assert!(!flags("CREATE (n:Hello {name:'World'}) RETURN n").any());
    }

    #[test]
    fn test_periodic_commit_detected() {
        let f = flags("USING PERIODIC COMMIT 500 LOAD CSV FROM 'file:///x.csv' AS l CREATE (:N)");
        assert!(f.periodic_commit);
        assert!(!f.call_in_transactions);
        assert!(flags("using periodic commit LOAD CSV ...").periodic_commit);
    }

    #[test]
    fn test_call_in_transactions_detected() {
        let f = flags("MATCH (n) CALL { WITH n DETACH DELETE n } IN TRANSACTIONS");
        assert!(f.call_in_transactions);
        let f = flags("MATCH (n) CALL { WITH n DETACH DELETE n } IN TRANSACTIONS OF 2 ROWS");
        assert!(f.call_in_transactions);
    }

    #[test]
    fn test_call_with_scope_clause() {
        let f = flags("MATCH (n) CALL (n) { DETACH DELETE n } IN TRANSACTIONS");
        assert!(f.call_in_transactions);
    }

    #[test]
    fn test_nested_braces() {
        let f = flags("CALL { WITH 1 AS x CALL { RETURN 2 AS y } RETURN x } IN TRANSACTIONS");
        assert!(f.call_in_transactions);
        let f = flags("CALL { WITH 1 AS x CALL { RETURN 2 AS y } IN TRANSACTIONS RETURN x }");
        assert!(f.call_in_transactions);
    }

    #[test]
    fn test_plain_subquery_is_not_flagged() {
        let f = flags("CALL { MATCH (n) RETURN n } RETURN 1");
        assert!(!f.any());
        let f = flags("CALL db.labels()");
        assert!(!f.any());
    }

    #[test]
    fn test_backticked_keywords_do_not_flag() {
        let f = flags("MATCH (`USING PERIODIC COMMIT`) RETURN `USING PERIODIC COMMIT`");
        assert!(!f.any());
        let f = flags("RETURN `CALL { } IN TRANSACTIONS` AS x");
        assert!(!f.any());
    }

    #[test]
    fn test_string_literals_do_not_flag() {
        let f = flags("RETURN 'USING PERIODIC COMMIT' AS x");
        assert!(!f.any());
        let f = flags("RETURN \"CALL { } IN TRANSACTIONS\" AS x");
        assert!(!f.any());
    }

    #[test]
    fn test_comments_are_ignored() {
        let f = flags("MATCH (n) // USING PERIODIC COMMIT\nRETURN n");
        assert!(!f.any());
        let f = flags("/* CALL { } IN TRANSACTIONS */ MATCH (n) RETURN n");
        assert!(!f.any());
        let f = flags("USING /* inline */ PERIODIC COMMIT LOAD CSV FROM 'f' AS l CREATE (:N)");
        assert!(f.periodic_commit);
    }

    #[test]
    fn test_comment_markers_inside_strings_are_text() {
        let f = flags("RETURN 'http://example.com' AS url");
        assert!(!f.any());
        let f = flags("RETURN 'not /* a comment */' AS x");
        assert!(!f.any());
    }

    #[test]
    fn test_unterminated_block_comment_fails_scan() {
        assert!(scan_statement("MATCH (n) /* RETURN n").is_none());
    }

    #[test]
    fn test_unterminated_quote_fails_scan() {
        assert!(scan_statement("RETURN 'oops").is_none());
    }

    #[test]
    fn test_escaped_backtick_in_identifier() {
        let f = flags("RETURN `weird``name` AS x");
        assert!(!f.any());
    }
}
