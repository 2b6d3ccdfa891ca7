//! 렉서 — 규칙 문자열을 토큰 스트림으로 변환
//!
//! 공백(스페이스, 탭, CR, LF)은 건너뜁니다. 식별자는
//! `[A-Za-z][A-Za-z0-9_]*`, 숫자는 십진 `[0-9]+`입니다. 식별자는
//! 키워드 테이블과 대소문자 무시로 대조되며, 키워드가 아니면
//! [`TokenKind::Ident`]가 됩니다. `src`/`dst`/`dest`는 방향 키워드의
//! 별칭이고 `!`는 `not`의 별칭입니다.

use crate::error::FilterError;

/// 토큰 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// 입력 끝
    Eof,
    /// 키워드가 아닌 식별자
    Ident,
    /// 십진 숫자
    Number,
    Comma,
    Dash,
    Slash,
    Colon,
    Dot,
    LParen,
    RParen,
    And,
    Or,
    Not,
    Log,
    Drop,
    /// `type` 키워드 (이벤트 타입 술어)
    Type,
    Protocol,
    Source,
    Destination,
    Address,
    Network,
    Port,
    On,
    Any,
}

/// 렉심과 위치를 포함한 토큰
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// 토큰 종류
    pub kind: TokenKind,
    /// 원문 조각 (EOF는 빈 문자열)
    pub lexeme: String,
    /// 입력 내 바이트 위치
    pub pos: usize,
}

impl Token {
    fn new(kind: TokenKind, lexeme: impl Into<String>, pos: usize) -> Self {
        Self {
            kind,
            lexeme: lexeme.into(),
            pos,
        }
    }
}

/// 요청 시 토큰을 생성하는 렉서
///
/// 규칙 문자열은 ASCII를 전제로 하며, 그 밖의 바이트는
/// [`FilterError::UnexpectedCharacter`]로 보고됩니다.
pub struct Lexer<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    /// 입력 문자열에 대한 렉서를 생성합니다.
    pub fn new(input: &'a str) -> Self {
        Self {
            input: input.as_bytes(),
            pos: 0,
        }
    }

    fn peek_byte(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while let Some(b) = self.peek_byte() {
            if b == b' ' || b == b'\t' || b == b'\r' || b == b'\n' {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    fn read_identifier(&mut self) -> &'a str {
        let start = self.pos;
        while let Some(b) = self.peek_byte() {
            if b.is_ascii_alphanumeric() || b == b'_' {
                self.pos += 1;
            } else {
                break;
            }
        }
        // ASCII 영숫자만 소비했으므로 항상 유효한 UTF-8
        std::str::from_utf8(&self.input[start..self.pos]).unwrap_or_default()
    }

    fn read_number(&mut self) -> &'a str {
        let start = self.pos;
        while let Some(b) = self.peek_byte() {
            if b.is_ascii_digit() {
                self.pos += 1;
            } else {
                break;
            }
        }
        std::str::from_utf8(&self.input[start..self.pos]).unwrap_or_default()
    }

    /// 다음 토큰을 반환합니다.
    ///
    /// 입력이 끝나면 [`TokenKind::Eof`]를 반환하며, 이후 호출에도
    /// 계속 EOF를 반환합니다. 패닉하지 않습니다.
    pub fn next_token(&mut self) -> Result<Token, FilterError> {
        self.skip_whitespace();

        let pos = self.pos;
        let Some(b) = self.peek_byte() else {
            return Ok(Token::new(TokenKind::Eof, "", pos));
        };

        let single = |kind: TokenKind, lexeme: &'static str| Token::new(kind, lexeme, pos);

        let token = match b {
            b',' => single(TokenKind::Comma, ","),
            b'-' => single(TokenKind::Dash, "-"),
            b'/' => single(TokenKind::Slash, "/"),
            b':' => single(TokenKind::Colon, ":"),
            b'.' => single(TokenKind::Dot, "."),
            b'(' => single(TokenKind::LParen, "("),
            b')' => single(TokenKind::RParen, ")"),
            b'!' => single(TokenKind::Not, "!"),
            _ if b.is_ascii_alphabetic() => {
                let lexeme = self.read_identifier();
                return Ok(Token::new(lookup_keyword(lexeme), lexeme, pos));
            }
            _ if b.is_ascii_digit() => {
                let lexeme = self.read_number();
                return Ok(Token::new(TokenKind::Number, lexeme, pos));
            }
            _ => {
                // 멀티바이트 문자도 위치와 함께 통째로 보고
                let rest = &self.input[self.pos..];
                let ch = std::str::from_utf8(rest)
                    .ok()
                    .and_then(|s| s.chars().next())
                    .unwrap_or(b as char);
                return Err(FilterError::UnexpectedCharacter { ch, pos });
            }
        };

        self.pos += 1;
        Ok(token)
    }
}

/// 식별자를 키워드 테이블과 대조합니다 (대소문자 무시).
fn lookup_keyword(ident: &str) -> TokenKind {
    // 키워드 수가 적어 선형 비교로 충분
    match ident.to_ascii_lowercase().as_str() {
        "and" => TokenKind::And,
        "or" => TokenKind::Or,
        "not" => TokenKind::Not,
        "log" => TokenKind::Log,
        "drop" => TokenKind::Drop,
        "type" => TokenKind::Type,
        "protocol" => TokenKind::Protocol,
        "source" | "src" => TokenKind::Source,
        "destination" | "dst" | "dest" => TokenKind::Destination,
        "address" => TokenKind::Address,
        "network" => TokenKind::Network,
        "port" => TokenKind::Port,
        "on" => TokenKind::On,
        "any" => TokenKind::Any,
        _ => TokenKind::Ident,
    }
}
