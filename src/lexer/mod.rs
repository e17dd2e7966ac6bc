use logos::Logos;

/// Raw token from logos. `lex()` maps this into [`Token`], which adds the
/// `Illegal` and `Eof` kinds the scanner itself never matches.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
enum RawToken {
    // Keywords
    #[token("and")]
    And,
    #[token("or")]
    Or,
    #[token("in")]
    In,
    #[token("regexp")]
    Regexp,
    #[token("fn")]
    Function,

    // Boolean literals
    #[token("true")]
    True,
    #[token("false")]
    False,

    // Multi-char operators (greedy — must win over single-char)
    #[token("==")]
    Eq,
    #[token("!=")]
    NotEq,
    #[token("<=")]
    LessEq,
    #[token(">=")]
    GreaterEq,
    #[token("..")]
    DotDot,

    // Single-char operators
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("<")]
    Less,
    #[token(">")]
    Greater,
    #[token("=")]
    Assign,
    #[token("!")]
    Bang,

    // Punctuation
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token(",")]
    Comma,
    #[token(";")]
    Semi,
    #[token(":")]
    Colon,
    #[token(".")]
    Dot,

    // Literals. Number literals are kept verbatim; the parser converts them.
    #[regex(r"[0-9]+", |lex| lex.slice().to_string())]
    Number(String),

    // Strings take their body literally (no escape processing). A missing
    // closing quote silently ends the literal at end of input.
    #[regex(r#""[^"]*"?"#, |lex| strip_quotes(lex.slice()))]
    #[regex(r"'[^']*'?", |lex| strip_quotes(lex.slice()))]
    Str(String),

    #[regex(r"[\p{L}_][\p{L}0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Keywords
    And,
    Or,
    In,
    Regexp,
    Function,

    // Boolean literals
    True,
    False,

    // Operators
    Eq,
    NotEq,
    LessEq,
    GreaterEq,
    DotDot,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Less,
    Greater,
    Assign,
    Bang,

    // Punctuation
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Semi,
    Colon,
    Dot,

    // Literals
    Number(String),
    Str(String),
    Ident(String),

    /// A character no rule matches.
    Illegal,
    /// End of input; always the final token of a stream.
    Eof,
}

impl From<RawToken> for Token {
    fn from(raw: RawToken) -> Token {
        match raw {
            RawToken::And => Token::And,
            RawToken::Or => Token::Or,
            RawToken::In => Token::In,
            RawToken::Regexp => Token::Regexp,
            RawToken::Function => Token::Function,
            RawToken::True => Token::True,
            RawToken::False => Token::False,
            RawToken::Eq => Token::Eq,
            RawToken::NotEq => Token::NotEq,
            RawToken::LessEq => Token::LessEq,
            RawToken::GreaterEq => Token::GreaterEq,
            RawToken::DotDot => Token::DotDot,
            RawToken::Plus => Token::Plus,
            RawToken::Minus => Token::Minus,
            RawToken::Star => Token::Star,
            RawToken::Slash => Token::Slash,
            RawToken::Percent => Token::Percent,
            RawToken::Less => Token::Less,
            RawToken::Greater => Token::Greater,
            RawToken::Assign => Token::Assign,
            RawToken::Bang => Token::Bang,
            RawToken::LParen => Token::LParen,
            RawToken::RParen => Token::RParen,
            RawToken::LBracket => Token::LBracket,
            RawToken::RBracket => Token::RBracket,
            RawToken::LBrace => Token::LBrace,
            RawToken::RBrace => Token::RBrace,
            RawToken::Comma => Token::Comma,
            RawToken::Semi => Token::Semi,
            RawToken::Colon => Token::Colon,
            RawToken::Dot => Token::Dot,
            RawToken::Number(n) => Token::Number(n),
            RawToken::Str(s) => Token::Str(s),
            RawToken::Ident(i) => Token::Ident(i),
        }
    }
}

fn strip_quotes(slice: &str) -> String {
    let quote = slice.as_bytes()[0] as char;
    let body = &slice[1..];
    body.strip_suffix(quote).unwrap_or(body).to_string()
}

/// Lex source code into a stream of tokens with byte positions, always
/// terminated by `Token::Eof`. Characters no rule matches become one
/// `Token::Illegal` each, so every input yields a finite stream.
pub fn lex(source: &str) -> Vec<(Token, usize)> {
    let mut lexer = RawToken::lexer(source);
    let mut tokens = Vec::new();

    while let Some(result) = lexer.next() {
        match result {
            Ok(token) => tokens.push((token.into(), lexer.span().start)),
            Err(()) => tokens.push((Token::Illegal, lexer.span().start)),
        }
    }
    tokens.push((Token::Eof, source.len()));

    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Token> {
        lex(source).into_iter().map(|(t, _)| t).collect()
    }

    #[test]
    fn lex_operators() {
        assert_eq!(kinds("== != <= >= < > = !"), vec![
            Token::Eq, Token::NotEq, Token::LessEq, Token::GreaterEq,
            Token::Less, Token::Greater, Token::Assign, Token::Bang,
            Token::Eof,
        ]);
    }

    #[test]
    fn lex_arithmetic_and_punctuation() {
        assert_eq!(kinds("+-*/%()[]{},;:."), vec![
            Token::Plus, Token::Minus, Token::Star, Token::Slash, Token::Percent,
            Token::LParen, Token::RParen, Token::LBracket, Token::RBracket,
            Token::LBrace, Token::RBrace, Token::Comma, Token::Semi,
            Token::Colon, Token::Dot, Token::Eof,
        ]);
    }

    #[test]
    fn lex_dotdot_before_dot() {
        assert_eq!(kinds(".. ."), vec![Token::DotDot, Token::Dot, Token::Eof]);
    }

    #[test]
    fn lex_keywords_vs_idents() {
        assert_eq!(kinds("and or in regexp fn true false android"), vec![
            Token::And, Token::Or, Token::In, Token::Regexp, Token::Function,
            Token::True, Token::False,
            Token::Ident("android".to_string()),
            Token::Eof,
        ]);
    }

    #[test]
    fn lex_number_keeps_literal() {
        assert_eq!(kinds("42 007"), vec![
            Token::Number("42".to_string()),
            Token::Number("007".to_string()),
            Token::Eof,
        ]);
    }

    #[test]
    fn lex_number_stops_at_letters() {
        assert_eq!(kinds("123abc"), vec![
            Token::Number("123".to_string()),
            Token::Ident("abc".to_string()),
            Token::Eof,
        ]);
    }

    #[test]
    fn lex_strings_both_quote_styles() {
        assert_eq!(kinds(r#""foo" 'bar'"#), vec![
            Token::Str("foo".to_string()),
            Token::Str("bar".to_string()),
            Token::Eof,
        ]);
    }

    #[test]
    fn lex_string_no_escape_processing() {
        assert_eq!(kinds(r#""a\nb""#), vec![
            Token::Str(r"a\nb".to_string()),
            Token::Eof,
        ]);
    }

    #[test]
    fn lex_unterminated_string_ends_at_eof() {
        assert_eq!(kinds(r#""abc"#), vec![
            Token::Str("abc".to_string()),
            Token::Eof,
        ]);
    }

    #[test]
    fn lex_positions_are_byte_offsets() {
        let tokens = lex("ab + 'xy'");
        assert_eq!(tokens[0], (Token::Ident("ab".to_string()), 0));
        assert_eq!(tokens[1], (Token::Plus, 3));
        assert_eq!(tokens[2], (Token::Str("xy".to_string()), 5));
        assert_eq!(tokens[3], (Token::Eof, 9));
    }

    #[test]
    fn lex_unknown_char_is_illegal_and_advances() {
        assert_eq!(kinds("$#1"), vec![
            Token::Illegal,
            Token::Illegal,
            Token::Number("1".to_string()),
            Token::Eof,
        ]);
    }

    #[test]
    fn lex_unicode_identifier() {
        assert_eq!(kinds("héllo_1"), vec![
            Token::Ident("héllo_1".to_string()),
            Token::Eof,
        ]);
    }

    #[test]
    fn lex_empty_input_is_just_eof() {
        assert_eq!(kinds(""), vec![Token::Eof]);
    }
}
