//! 파서 — 토큰 스트림을 규칙 AST로 변환
//!
//! 두 토큰 선읽기(two-token lookahead)를 갖는 하향식 재귀 하강
//! 파서입니다. 우선순위는 괄호/NOT > AND > OR이며, 최상위의 쉼표는
//! `or` 키워드와 동일하게 OR 노드를 만듭니다. 이항 연산은 좌결합입니다.
//!
//! 열거형 값(이벤트 타입, 프로토콜, 네트워크 분류)과 포트는 파싱
//! 시점에 검증하며, 주소 리터럴은 인접 토큰을 이어 붙인 뒤 컴파일
//! 단계에서 IP/CIDR로 파싱합니다.

use conntrackd_core::event::EventKind;
use conntrackd_core::net::NetClass;

use crate::ast::{Action, BinaryOp, Direction, Expr, PortDirection, Proto, Rule, UnaryOp};
use crate::error::FilterError;
use crate::lexer::{Lexer, Token, TokenKind};

/// 규칙 파서
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
    peek: Token,
}

impl<'a> Parser<'a> {
    /// 입력 문자열에 대한 파서를 생성합니다.
    ///
    /// current와 peek를 채우기 위해 토큰 두 개를 미리 읽습니다.
    pub fn new(input: &'a str) -> Result<Self, FilterError> {
        let mut lexer = Lexer::new(input);
        let current = lexer.next_token()?;
        let peek = lexer.next_token()?;
        Ok(Self {
            lexer,
            current,
            peek,
        })
    }

    fn advance(&mut self) -> Result<(), FilterError> {
        self.current = std::mem::replace(&mut self.peek, self.lexer.next_token()?);
        Ok(())
    }

    fn expect(&mut self, kind: TokenKind, expected: &str) -> Result<(), FilterError> {
        if self.current.kind != kind {
            return Err(FilterError::UnexpectedToken {
                expected: expected.to_owned(),
                found: self.current.lexeme.clone(),
                pos: self.current.pos,
            });
        }
        self.advance()
    }

    /// 완전한 규칙을 파싱합니다: `action expression EOF`
    pub fn parse_rule(&mut self) -> Result<Rule, FilterError> {
        let action = match self.current.kind {
            TokenKind::Log => Action::Log,
            TokenKind::Drop => Action::Drop,
            _ => {
                return Err(FilterError::UnexpectedToken {
                    expected: "'log' or 'drop'".to_owned(),
                    found: self.current.lexeme.clone(),
                    pos: self.current.pos,
                });
            }
        };
        self.advance()?;

        let expr = self.parse_expression()?;

        if self.current.kind != TokenKind::Eof {
            return Err(FilterError::TrailingInput {
                lexeme: self.current.lexeme.clone(),
                pos: self.current.pos,
            });
        }

        Ok(Rule { action, expr })
    }

    /// `expression := or`
    fn parse_expression(&mut self) -> Result<Expr, FilterError> {
        self.parse_or()
    }

    /// `or := and { ("or" | ",") and }`
    fn parse_or(&mut self) -> Result<Expr, FilterError> {
        let mut left = self.parse_and()?;

        while matches!(self.current.kind, TokenKind::Or | TokenKind::Comma) {
            self.advance()?;
            let right = self.parse_and()?;
            left = Expr::Binary {
                op: BinaryOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    /// `and := not { "and" not }`
    fn parse_and(&mut self) -> Result<Expr, FilterError> {
        let mut left = self.parse_not()?;

        while self.current.kind == TokenKind::And {
            self.advance()?;
            let right = self.parse_not()?;
            left = Expr::Binary {
                op: BinaryOp::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    /// `not := ["not" | "!"] primary`
    fn parse_not(&mut self) -> Result<Expr, FilterError> {
        if self.current.kind == TokenKind::Not {
            self.advance()?;
            let inner = self.parse_primary()?;
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                inner: Box::new(inner),
            });
        }
        self.parse_primary()
    }

    /// `primary := predicate | "(" expression ")"`
    fn parse_primary(&mut self) -> Result<Expr, FilterError> {
        if self.current.kind == TokenKind::LParen {
            self.advance()?;
            let expr = self.parse_expression()?;
            self.expect(TokenKind::RParen, "')'")?;
            return Ok(expr);
        }
        self.parse_predicate()
    }

    /// 술어 하나를 파싱합니다.
    fn parse_predicate(&mut self) -> Result<Expr, FilterError> {
        match self.current.kind {
            TokenKind::Type => self.parse_type_predicate(),
            TokenKind::Protocol => self.parse_protocol_predicate(),
            TokenKind::Source => self.parse_directional(Direction::Source),
            TokenKind::Destination => self.parse_directional(Direction::Destination),
            TokenKind::On => self.parse_port_both(),
            TokenKind::Any => {
                self.advance()?;
                Ok(Expr::Any)
            }
            _ => Err(FilterError::UnexpectedToken {
                expected: "predicate keyword".to_owned(),
                found: self.current.lexeme.clone(),
                pos: self.current.pos,
            }),
        }
    }

    /// `typePred := "type" identList` — 값은 NEW/UPDATE/DESTROY로 정규화
    fn parse_type_predicate(&mut self) -> Result<Expr, FilterError> {
        self.advance()?;

        let idents = self.parse_ident_list()?;
        let mut kinds = Vec::with_capacity(idents.len());
        for (value, pos) in idents {
            let kind = match value.to_ascii_uppercase().as_str() {
                "NEW" => EventKind::New,
                "UPDATE" => EventKind::Update,
                "DESTROY" => EventKind::Destroy,
                _ => return Err(FilterError::InvalidEventType { value, pos }),
            };
            kinds.push(kind);
        }

        Ok(Expr::Type { kinds })
    }

    /// `protoPred := "protocol" identList` — 값은 TCP/UDP로 정규화
    fn parse_protocol_predicate(&mut self) -> Result<Expr, FilterError> {
        self.advance()?;

        let idents = self.parse_ident_list()?;
        let mut protocols = Vec::with_capacity(idents.len());
        for (value, pos) in idents {
            let proto = match value.to_ascii_uppercase().as_str() {
                "TCP" => Proto::Tcp,
                "UDP" => Proto::Udp,
                _ => return Err(FilterError::InvalidProtocol { value, pos }),
            };
            protocols.push(proto);
        }

        Ok(Expr::Protocol { protocols })
    }

    /// `directional := ("source"|"destination") ("network" .. | "address" .. | "port" ..)`
    fn parse_directional(&mut self, direction: Direction) -> Result<Expr, FilterError> {
        let direction_lexeme = self.current.lexeme.clone();
        self.advance()?;

        match self.current.kind {
            TokenKind::Network => self.parse_network_predicate(direction),
            TokenKind::Address => self.parse_address_predicate(direction),
            TokenKind::Port => {
                self.advance()?;
                let ports = self.parse_port_spec()?;
                let direction = match direction {
                    Direction::Source => PortDirection::Source,
                    Direction::Destination => PortDirection::Destination,
                };
                Ok(Expr::Port { direction, ports })
            }
            _ => Err(FilterError::UnexpectedToken {
                expected: format!("'network', 'address', or 'port' after '{direction_lexeme}'"),
                found: self.current.lexeme.clone(),
                pos: self.current.pos,
            }),
        }
    }

    /// `direction "network" identList` — 값은 네트워크 분류로 정규화
    fn parse_network_predicate(&mut self, direction: Direction) -> Result<Expr, FilterError> {
        self.advance()?;

        let idents = self.parse_ident_list()?;
        let mut classes = Vec::with_capacity(idents.len());
        for (value, pos) in idents {
            let class = match value.to_ascii_uppercase().as_str() {
                "LOCAL" => NetClass::Local,
                "PRIVATE" => NetClass::Private,
                "PUBLIC" => NetClass::Public,
                "MULTICAST" => NetClass::Multicast,
                _ => return Err(FilterError::InvalidNetwork { value, pos }),
            };
            classes.push(class);
        }

        Ok(Expr::Network { direction, classes })
    }

    /// `direction "address" addrList ["on" "port" portSpec]`
    fn parse_address_predicate(&mut self, direction: Direction) -> Result<Expr, FilterError> {
        self.advance()?;

        let addresses = self.parse_address_list()?;

        let mut ports = Vec::new();
        if self.current.kind == TokenKind::On {
            self.advance()?;
            self.expect(TokenKind::Port, "'port'")?;
            ports = self.parse_port_spec()?;
        }

        Ok(Expr::Address {
            direction,
            addresses,
            ports,
        })
    }

    /// `portBoth := "on" "port" portSpec` — 방향 없는 포트 술어
    fn parse_port_both(&mut self) -> Result<Expr, FilterError> {
        self.advance()?;
        self.expect(TokenKind::Port, "'port'")?;

        let ports = self.parse_port_spec()?;
        Ok(Expr::Port {
            direction: PortDirection::Both,
            ports,
        })
    }

    /// `identList := IDENT { "," IDENT }` — (값, 위치) 쌍을 반환
    fn parse_ident_list(&mut self) -> Result<Vec<(String, usize)>, FilterError> {
        let mut idents = Vec::new();

        if self.current.kind != TokenKind::Ident {
            return Err(FilterError::UnexpectedToken {
                expected: "identifier".to_owned(),
                found: self.current.lexeme.clone(),
                pos: self.current.pos,
            });
        }
        idents.push((self.current.lexeme.clone(), self.current.pos));
        self.advance()?;

        while self.current.kind == TokenKind::Comma {
            self.advance()?;
            if self.current.kind != TokenKind::Ident {
                return Err(FilterError::UnexpectedToken {
                    expected: "identifier after comma".to_owned(),
                    found: self.current.lexeme.clone(),
                    pos: self.current.pos,
                });
            }
            idents.push((self.current.lexeme.clone(), self.current.pos));
            self.advance()?;
        }

        Ok(idents)
    }

    /// `addrList := addr { "," addr }`
    fn parse_address_list(&mut self) -> Result<Vec<String>, FilterError> {
        let mut addresses = vec![self.parse_address()?];

        while self.current.kind == TokenKind::Comma {
            self.advance()?;
            addresses.push(self.parse_address()?);
        }

        Ok(addresses)
    }

    /// IP 또는 CIDR 리터럴 하나를 파싱합니다.
    ///
    /// 인접한 NUMBER/IDENT/DOT/COLON/SLASH 토큰을 이어 붙여 원문을
    /// 복원합니다. IPv6의 16진수 그룹이 렉서에서 숫자와 식별자로
    /// 쪼개지더라도 여기서 다시 합쳐집니다.
    fn parse_address(&mut self) -> Result<String, FilterError> {
        let mut glued = String::new();

        while matches!(
            self.current.kind,
            TokenKind::Number
                | TokenKind::Ident
                | TokenKind::Dot
                | TokenKind::Colon
                | TokenKind::Slash
        ) {
            glued.push_str(&self.current.lexeme);
            self.advance()?;
        }

        if glued.is_empty() {
            return Err(FilterError::UnexpectedToken {
                expected: "IP address".to_owned(),
                found: self.current.lexeme.clone(),
                pos: self.current.pos,
            });
        }

        Ok(glued)
    }

    /// `portSpec := NUMBER [ "-" NUMBER ] | NUMBER { "," NUMBER }`
    ///
    /// 범위 `A-B`는 닫힌 구간 `{A, A+1, ..., B}`로 전개되며,
    /// `A > B`는 에러입니다. 범위 뒤에는 쉼표 목록이 이어지지 않습니다.
    fn parse_port_spec(&mut self) -> Result<Vec<u16>, FilterError> {
        let mut ports = vec![self.parse_port_number()?];

        if self.current.kind == TokenKind::Dash {
            let range_pos = self.current.pos;
            self.advance()?;
            let end = self.parse_port_number()?;
            let start = ports[0];
            if start > end {
                return Err(FilterError::InvalidPortRange {
                    start,
                    end,
                    pos: range_pos,
                });
            }
            if start < end {
                ports.extend(start + 1..=end);
            }
            return Ok(ports);
        }

        while self.current.kind == TokenKind::Comma {
            self.advance()?;
            ports.push(self.parse_port_number()?);
        }

        Ok(ports)
    }

    /// NUMBER 토큰 하나를 u16 포트로 파싱합니다.
    fn parse_port_number(&mut self) -> Result<u16, FilterError> {
        if self.current.kind != TokenKind::Number {
            return Err(FilterError::UnexpectedToken {
                expected: "port number".to_owned(),
                found: self.current.lexeme.clone(),
                pos: self.current.pos,
            });
        }

        let port = self
            .current
            .lexeme
            .parse::<u16>()
            .map_err(|_| FilterError::InvalidPort {
                value: self.current.lexeme.clone(),
                pos: self.current.pos,
            })?;
        self.advance()?;
        Ok(port)
    }
}

/// 규칙 문자열 하나를 파싱하는 편의 함수입니다.
pub fn parse(input: &str) -> Result<Rule, FilterError> {
    Parser::new(input)?.parse_rule()
}
