//! Firewall rule grammar
//!
//! Parses the control plane's rule language,
//! `FROM <targets> TO <targets> ALLOW|BLOCK <protocol> PORT <n>`, into a
//! structured form, and evaluates which rules would apply to a machine
//! carrying a given tag set. The evaluation runs locally so the
//! machine-creation flow can preview applicable rules before the machine
//! exists.
//!
//! Rules are parsed from the raw string on every read; nothing structured
//! is stored.

use serde_json::{Map, Value};
use thiserror::Error;

/// A source or destination term of a rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// `ANY` or `ALL VMS`: matches every endpoint.
    Wildcard(Wildcard),
    Vm(String),
    Ip(String),
    Subnet(String),
    Tag {
        name: String,
        value: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wildcard {
    Any,
    AllVms,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Allow,
    Block,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Tcp,
    Udp,
    Icmp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ports {
    All,
    List(Vec<u16>),
}

/// Tag predicate extracted from a rule's terms. A predicate without a value
/// matches any value for that name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagPredicate {
    pub name: String,
    pub value: Option<String>,
}

/// Structured form of a rule string. Derived, never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRule {
    pub from: Vec<Target>,
    pub to: Vec<Target>,
    pub action: Action,
    pub protocol: Protocol,
    pub ports: Ports,
}

impl ParsedRule {
    /// A rule is a wildcard rule when a wildcard term exists on both sides.
    pub fn is_wildcard(&self) -> bool {
        let has_wildcard =
            |side: &[Target]| side.iter().any(|t| matches!(t, Target::Wildcard(_)));

        has_wildcard(&self.from) && has_wildcard(&self.to)
    }

    /// Deduplicated tag predicates from both sides.
    pub fn tags(&self) -> Vec<TagPredicate> {
        let mut tags: Vec<TagPredicate> = Vec::new();

        for target in self.from.iter().chain(self.to.iter()) {
            if let Target::Tag { name, value } = target {
                let predicate = TagPredicate {
                    name: name.clone(),
                    value: value.clone(),
                };
                if !tags.contains(&predicate) {
                    tags.push(predicate);
                }
            }
        }

        tags
    }

    /// Whether this rule would apply to a machine carrying `tags`: wildcard
    /// rules always apply; otherwise some tag predicate must be satisfied.
    /// A valueless predicate accepts any value for its name; a valued one
    /// requires an exact match.
    pub fn matches_tags(&self, tags: &Map<String, Value>) -> bool {
        if self.is_wildcard() {
            return true;
        }

        self.tags().iter().any(|predicate| {
            match (tags.get(&predicate.name), &predicate.value) {
                (None, _) => false,
                (Some(_), None) => true,
                (Some(Value::String(have)), Some(want)) => have == want,
                (Some(other), Some(want)) => &other.to_string() == want,
            }
        })
    }
}

/// Filter `rules` down to those applying to a machine with `tags`.
pub fn applicable_rules<'a>(
    rules: impl IntoIterator<Item = &'a ParsedRule>,
    tags: &Map<String, Value>,
) -> Vec<&'a ParsedRule> {
    rules
        .into_iter()
        .filter(|rule| rule.matches_tags(tags))
        .collect()
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("unexpected end of rule, expected {0}")]
    UnexpectedEnd(&'static str),
    #[error("expected {expected}, found \"{found}\"")]
    Unexpected {
        expected: &'static str,
        found: String,
    },
    #[error("invalid port \"{0}\"")]
    InvalidPort(String),
    #[error("unterminated quoted string")]
    UnterminatedQuote,
    #[error("trailing input after rule: \"{0}\"")]
    TrailingInput(String),
}

/// Parse a rule string into its structured form.
pub fn parse(rule: &str) -> Result<ParsedRule, ParseError> {
    let tokens = tokenize(rule)?;
    let mut cursor = Cursor::new(&tokens);

    cursor.expect_keyword("FROM")?;
    let from = cursor.parse_targets()?;
    cursor.expect_keyword("TO")?;
    let to = cursor.parse_targets()?;
    let action = cursor.parse_action()?;
    let protocol = cursor.parse_protocol()?;
    let ports = cursor.parse_ports()?;

    if let Some(token) = cursor.next() {
        return Err(ParseError::TrailingInput(token.text()));
    }

    Ok(ParsedRule {
        from,
        to,
        action,
        protocol,
        ports,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Word(String),
    Quoted(String),
    LParen,
    RParen,
    Eq,
}

impl Token {
    fn text(&self) -> String {
        match self {
            Token::Word(w) => w.clone(),
            Token::Quoted(q) => format!("\"{q}\""),
            Token::LParen => "(".to_string(),
            Token::RParen => ")".to_string(),
            Token::Eq => "=".to_string(),
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>, ParseError> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '=' => {
                chars.next();
                tokens.push(Token::Eq);
            }
            '"' => {
                chars.next();
                let mut quoted = String::new();
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some(c) => quoted.push(c),
                        None => return Err(ParseError::UnterminatedQuote),
                    }
                }
                tokens.push(Token::Quoted(quoted));
            }
            _ => {
                let mut word = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_whitespace() || matches!(c, '(' | ')' | '=' | '"') {
                        break;
                    }
                    word.push(c);
                    chars.next();
                }
                tokens.push(Token::Word(word));
            }
        }
    }

    Ok(tokens)
}

struct Cursor<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        Self { tokens, pos: 0 }
    }

    fn next(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Word(w)) if w.eq_ignore_ascii_case(keyword))
    }

    fn expect_keyword(&mut self, keyword: &'static str) -> Result<(), ParseError> {
        match self.next() {
            Some(Token::Word(w)) if w.eq_ignore_ascii_case(keyword) => Ok(()),
            Some(token) => Err(ParseError::Unexpected {
                expected: keyword,
                found: token.text(),
            }),
            None => Err(ParseError::UnexpectedEnd(keyword)),
        }
    }

    fn word(&mut self, expected: &'static str) -> Result<String, ParseError> {
        match self.next() {
            Some(Token::Word(w)) => Ok(w.clone()),
            Some(Token::Quoted(q)) => Ok(q.clone()),
            Some(token) => Err(ParseError::Unexpected {
                expected,
                found: token.text(),
            }),
            None => Err(ParseError::UnexpectedEnd(expected)),
        }
    }

    /// A target list: a single target or a parenthesized `OR` list.
    fn parse_targets(&mut self) -> Result<Vec<Target>, ParseError> {
        if matches!(self.peek(), Some(Token::LParen)) {
            self.next();
            let mut targets = vec![self.parse_target()?];

            while self.peek_keyword("OR") {
                self.next();
                targets.push(self.parse_target()?);
            }

            match self.next() {
                Some(Token::RParen) => Ok(targets),
                Some(token) => Err(ParseError::Unexpected {
                    expected: ")",
                    found: token.text(),
                }),
                None => Err(ParseError::UnexpectedEnd(")")),
            }
        } else {
            Ok(vec![self.parse_target()?])
        }
    }

    fn parse_target(&mut self) -> Result<Target, ParseError> {
        let kind = self.word("target")?;

        match kind.to_ascii_lowercase().as_str() {
            "any" => Ok(Target::Wildcard(Wildcard::Any)),
            "all" => {
                self.expect_keyword("VMS")?;
                Ok(Target::Wildcard(Wildcard::AllVms))
            }
            "vm" => Ok(Target::Vm(self.word("vm uuid")?)),
            "ip" => Ok(Target::Ip(self.word("ip address")?)),
            "subnet" => Ok(Target::Subnet(self.word("subnet cidr")?)),
            "tag" => {
                let name = self.word("tag name")?;
                let value = if matches!(self.peek(), Some(Token::Eq)) {
                    self.next();
                    Some(self.word("tag value")?)
                } else {
                    None
                };
                Ok(Target::Tag { name, value })
            }
            _ => Err(ParseError::Unexpected {
                expected: "target",
                found: kind,
            }),
        }
    }

    fn parse_action(&mut self) -> Result<Action, ParseError> {
        let word = self.word("ALLOW or BLOCK")?;
        match word.to_ascii_lowercase().as_str() {
            "allow" => Ok(Action::Allow),
            "block" => Ok(Action::Block),
            _ => Err(ParseError::Unexpected {
                expected: "ALLOW or BLOCK",
                found: word,
            }),
        }
    }

    fn parse_protocol(&mut self) -> Result<Protocol, ParseError> {
        let word = self.word("protocol")?;
        match word.to_ascii_lowercase().as_str() {
            "tcp" => Ok(Protocol::Tcp),
            "udp" => Ok(Protocol::Udp),
            "icmp" => Ok(Protocol::Icmp),
            _ => Err(ParseError::Unexpected {
                expected: "protocol",
                found: word,
            }),
        }
    }

    fn parse_ports(&mut self) -> Result<Ports, ParseError> {
        let keyword = self.word("PORT or PORTS")?;

        match keyword.to_ascii_lowercase().as_str() {
            "port" => {
                let port = self.word("port number")?;
                if port.eq_ignore_ascii_case("all") {
                    return Ok(Ports::All);
                }
                Ok(Ports::List(vec![parse_port(&port)?]))
            }
            "ports" => {
                let mut ports = vec![parse_port(&self.word("port number")?)?];
                while self.peek_keyword("AND") {
                    self.next();
                    ports.push(parse_port(&self.word("port number")?)?);
                }
                Ok(Ports::List(ports))
            }
            _ => Err(ParseError::Unexpected {
                expected: "PORT or PORTS",
                found: keyword,
            }),
        }
    }
}

fn parse_port(word: &str) -> Result<u16, ParseError> {
    word.parse()
        .map_err(|_| ParseError::InvalidPort(word.to_string()))
}
