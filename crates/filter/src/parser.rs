//! Hand-written lexer and recursive-descent parser for the filter
//! language.
//!
//! The lexer only distinguishes parentheses, quoted strings and bare
//! words; all further interpretation (numbers, ranges, addresses,
//! keywords) happens in the parser so that error messages can name the
//! match being parsed.

use std::net::IpAddr;

use flowline_flow::ValidationStatus;

use crate::ast::*;
use crate::error::FilterError;

#[cfg(test)]
#[path = "parser_test.rs"]
mod tests;

/// Parse a filter expression. The empty string (or all-whitespace)
/// yields the empty expression, which matches every flow.
pub fn parse(input: &str) -> Result<Expression, FilterError> {
    let tokens = lex(input)?;
    let mut parser = Parser { tokens, pos: 0 };
    if parser.at_end() {
        return Ok(Expression::default());
    }
    let expr = parser.expression()?;
    if let Some(token) = parser.peek() {
        return Err(FilterError::syntax(format!(
            "unexpected trailing input near '{token}'"
        )));
    }
    Ok(expr)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    LParen,
    RParen,
    Word(String),
    Quoted(String),
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::LParen => f.write_str("("),
            Token::RParen => f.write_str(")"),
            Token::Word(w) => f.write_str(w),
            Token::Quoted(w) => write!(f, "\"{w}\""),
        }
    }
}

fn lex(input: &str) -> Result<Vec<Token>, FilterError> {
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
            '"' | '\'' => {
                let quote = c;
                chars.next();
                let mut word = String::new();
                loop {
                    match chars.next() {
                        Some(c) if c == quote => break,
                        Some(c) => word.push(c),
                        None => return Err(FilterError::syntax("unterminated quoted string")),
                    }
                }
                tokens.push(Token::Quoted(word));
            }
            _ => {
                let mut word = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_whitespace() || c == '(' || c == ')' || c == '"' || c == '\'' {
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

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_word(&self) -> Option<&str> {
        match self.peek() {
            Some(Token::Word(w)) => Some(w.as_str()),
            _ => None,
        }
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn next_word(&mut self, context: &str) -> Result<String, FilterError> {
        match self.next() {
            Some(Token::Word(w)) => Ok(w),
            Some(Token::Quoted(w)) => Ok(w),
            Some(token) => Err(FilterError::syntax(format!(
                "expected {context}, got '{token}'"
            ))),
            None => Err(FilterError::syntax(format!(
                "expected {context}, got end of input"
            ))),
        }
    }

    fn eat_word(&mut self, word: &str) -> bool {
        if self.peek_word() == Some(word) {
            self.pos += 1;
            return true;
        }
        false
    }

    fn expression(&mut self) -> Result<Expression, FilterError> {
        let left = self.statement()?;
        let conjunction = if self.eat_word("and") {
            Some(Conjunction::And)
        } else if self.eat_word("or") {
            Some(Conjunction::Or)
        } else {
            None
        };
        let right = match conjunction {
            Some(_) => Some(Box::new(self.expression()?)),
            None => None,
        };
        Ok(Expression {
            left: Some(Box::new(left)),
            conjunction,
            right,
        })
    }

    fn statement(&mut self) -> Result<Statement, FilterError> {
        let negated = self.eat_word("not");

        if self.peek() == Some(&Token::LParen) {
            self.next();
            let sub = self.expression()?;
            match self.next() {
                Some(Token::RParen) => {}
                _ => return Err(FilterError::syntax("missing closing parenthesis")),
            }
            return Ok(Statement {
                negated,
                kind: StatementKind::Sub(Box::new(sub)),
            });
        }

        let direction = if self.eat_word("src") {
            Some(Direction::Src)
        } else if self.eat_word("dst") {
            Some(Direction::Dst)
        } else {
            None
        };

        let keyword = self.next_word("a match keyword")?;

        if let Some(matcher) = self.directional_matcher(&keyword)? {
            return Ok(Statement {
                negated,
                kind: StatementKind::Directional { direction, matcher },
            });
        }

        if direction.is_some() {
            return Err(FilterError::syntax(format!(
                "'{keyword}' cannot be qualified with src/dst"
            )));
        }

        let matcher = self.regular_matcher(&keyword)?;
        Ok(Statement {
            negated,
            kind: StatementKind::Regular(matcher),
        })
    }

    fn directional_matcher(
        &mut self,
        keyword: &str,
    ) -> Result<Option<DirectionalMatcher>, FilterError> {
        let matcher = match keyword {
            "address" | "host" => {
                let word = self.next_word("an address")?;
                let (address, prefix) = parse_address(&word)?;
                DirectionalMatcher::Address { address, prefix }
            }
            "iface" | "interface" => DirectionalMatcher::Interface(self.interface_matcher()?),
            "port" => DirectionalMatcher::Port(self.range("port")?),
            "asn" => DirectionalMatcher::Asn(self.range("asn")?),
            "netsize" => DirectionalMatcher::Netsize(self.range("netsize")?),
            "cid" => DirectionalMatcher::Cid(self.range("cid")?),
            "vrf" => DirectionalMatcher::Vrf(self.range("vrf")?),
            _ => return Ok(None),
        };
        Ok(Some(matcher))
    }

    fn interface_matcher(&mut self) -> Result<InterfaceMatcher, FilterError> {
        if self.eat_word("name") {
            return Ok(InterfaceMatcher::Name(self.next_word("an interface name")?));
        }
        if self.eat_word("desc") || self.eat_word("description") {
            return Ok(InterfaceMatcher::Description(
                self.next_word("an interface description")?,
            ));
        }
        if self.eat_word("speed") {
            return Ok(InterfaceMatcher::Speed(self.range("interface speed")?));
        }
        let word = self.next_word("an interface id")?;
        Ok(InterfaceMatcher::Id(parse_u32(&word, "interface id")?))
    }

    fn regular_matcher(&mut self, keyword: &str) -> Result<RegularMatcher, FilterError> {
        let matcher = match keyword {
            "router" => {
                let word = self.next_word("a router address")?;
                let (address, prefix) = parse_address(&word)?;
                if prefix.is_some() {
                    return Err(FilterError::syntax("router takes a plain address"));
                }
                RegularMatcher::Router(address)
            }
            "nexthop" => {
                let word = self.next_word("a next-hop address")?;
                let (address, prefix) = parse_address(&word)?;
                if prefix.is_some() {
                    return Err(FilterError::syntax("nexthop takes a plain address"));
                }
                RegularMatcher::NextHop(address)
            }
            "nexthopasn" => {
                let word = self.next_word("an asn")?;
                RegularMatcher::NextHopAsn(parse_u32(&word, "asn")?)
            }
            "bytes" => RegularMatcher::Bytes(self.range("bytes")?),
            "packets" => RegularMatcher::Packets(self.range("packets")?),
            "country" => {
                let word = self.next_word("a country code")?;
                RegularMatcher::RemoteCountry(word.to_ascii_uppercase())
            }
            "direction" => {
                let word = self.next_word("'incoming' or 'outgoing'")?;
                match word.as_str() {
                    "incoming" => RegularMatcher::FlowDirection(FlowDir::Incoming),
                    "outgoing" => RegularMatcher::FlowDirection(FlowDir::Outgoing),
                    other => {
                        return Err(FilterError::syntax(format!(
                            "unknown flow direction '{other}'"
                        )))
                    }
                }
            }
            "normalized" => RegularMatcher::Normalized,
            "duration" => RegularMatcher::Duration(self.range("duration")?),
            "etype" => {
                let word = self.next_word("an ethernet type")?;
                let etype = match word.as_str() {
                    "ipv4" => 0x0800,
                    "arp" => 0x0806,
                    "ipv6" => 0x86dd,
                    other => parse_u32(other, "ethernet type")?,
                };
                RegularMatcher::Etype(etype)
            }
            "proto" => {
                let word = self.next_word("a protocol")?;
                RegularMatcher::Proto(parse_proto(&word)?)
            }
            "status" => {
                let word = self.next_word("a forwarding status")?;
                let matcher = match word.as_str() {
                    "forwarded" => StatusMatcher::Key(0b0100_0000),
                    "dropped" => StatusMatcher::Key(0b1000_0000),
                    "consumed" => StatusMatcher::Key(0b1100_0000),
                    other => StatusMatcher::Value(parse_u32(other, "forwarding status")?),
                };
                RegularMatcher::Status(matcher)
            }
            "tcpflags" => {
                let word = self.next_word("tcp flags")?;
                let matcher = match word.as_str() {
                    "fin" => TcpFlagsMatcher::Key(0x01),
                    "syn" => TcpFlagsMatcher::Key(0x02),
                    "rst" => TcpFlagsMatcher::Key(0x04),
                    "psh" => TcpFlagsMatcher::Key(0x08),
                    "ack" => TcpFlagsMatcher::Key(0x10),
                    "urg" => TcpFlagsMatcher::Key(0x20),
                    "ece" => TcpFlagsMatcher::Key(0x40),
                    "cwr" => TcpFlagsMatcher::Key(0x80),
                    "synack" => TcpFlagsMatcher::Key(0x12),
                    other => TcpFlagsMatcher::Value(parse_u32(other, "tcp flags")?),
                };
                RegularMatcher::TcpFlags(matcher)
            }
            "iptos" => RegularMatcher::IpTos(self.range("iptos")?),
            "dscp" => {
                let word = self.next_word("a dscp value")?;
                let dscp = parse_u32(&word, "dscp")?;
                if dscp > 63 {
                    return Err(FilterError::syntax("dscp must be within 0-63"));
                }
                RegularMatcher::Dscp(dscp as u8)
            }
            "ecn" => {
                let word = self.next_word("an ecn value")?;
                let ecn = parse_u32(&word, "ecn")?;
                if ecn > 3 {
                    return Err(FilterError::syntax("ecn must be within 0-3"));
                }
                RegularMatcher::Ecn(ecn as u8)
            }
            "localpref" => RegularMatcher::LocalPref(self.range("localpref")?),
            "med" => RegularMatcher::Med(self.range("med")?),
            "samplingrate" => RegularMatcher::SamplingRate(self.range("samplingrate")?),
            "icmp" => {
                let word = self.next_word("'type' or 'code'")?;
                let value_word = self.next_word("a number")?;
                let value = parse_u32(&value_word, "icmp value")?;
                match word.as_str() {
                    "type" => RegularMatcher::Icmp(IcmpMatcher::Type(value)),
                    "code" => RegularMatcher::Icmp(IcmpMatcher::Code(value)),
                    other => {
                        return Err(FilterError::syntax(format!(
                            "icmp takes 'type' or 'code', got '{other}'"
                        )))
                    }
                }
            }
            "bps" => RegularMatcher::Bps(self.range("bps")?),
            "pps" => RegularMatcher::Pps(self.range("pps")?),
            "passes-through" => {
                let mut asns = Vec::new();
                loop {
                    let numeric = matches!(
                        self.peek_word(),
                        Some(word) if !word.is_empty() && word.chars().all(|c| c.is_ascii_digit())
                    );
                    if !numeric {
                        break;
                    }
                    let word = self.next_word("an asn")?;
                    asns.push(parse_u32(&word, "asn")?);
                }
                if asns.is_empty() {
                    return Err(FilterError::syntax("passes-through needs at least one asn"));
                }
                RegularMatcher::PassesThrough(asns)
            }
            "rpki" => {
                let word = self.next_word("an rpki status")?;
                let status = match word.as_str() {
                    "unknown" => ValidationStatus::ValidationUnknown,
                    "valid" => ValidationStatus::Valid,
                    "notfound" => ValidationStatus::NotFound,
                    "invalid" => ValidationStatus::Invalid,
                    other => {
                        return Err(FilterError::syntax(format!(
                            "unknown rpki status '{other}'"
                        )))
                    }
                };
                RegularMatcher::Rpki(status)
            }
            other => {
                return Err(FilterError::syntax(format!(
                    "unknown match keyword '{other}'"
                )))
            }
        };
        Ok(matcher)
    }

    /// A numeric position: `N`, `<N`, `>N` or `LOW-HIGH`. The comparison
    /// operator may be attached to the number or stand alone.
    fn range(&mut self, context: &str) -> Result<NumericRange, FilterError> {
        let word = self.next_word(context)?;

        if let Some(rest) = word.strip_prefix('<') {
            let number = if rest.is_empty() {
                self.next_word(context)?
            } else {
                rest.to_string()
            };
            return Ok(NumericRange::Below(parse_u64(&number, context)?));
        }
        if let Some(rest) = word.strip_prefix('>') {
            let number = if rest.is_empty() {
                self.next_word(context)?
            } else {
                rest.to_string()
            };
            return Ok(NumericRange::Above(parse_u64(&number, context)?));
        }
        if let Some((low, high)) = word.split_once('-') {
            if !low.is_empty() && !high.is_empty() {
                return Ok(NumericRange::Range {
                    lower: parse_u64(low, context)?,
                    upper: parse_u64(high, context)?,
                });
            }
        }
        Ok(NumericRange::Equal(parse_u64(&word, context)?))
    }
}

fn parse_u64(word: &str, context: &str) -> Result<u64, FilterError> {
    word.parse()
        .map_err(|_| FilterError::syntax(format!("expected a number for {context}, got '{word}'")))
}

fn parse_u32(word: &str, context: &str) -> Result<u32, FilterError> {
    word.parse()
        .map_err(|_| FilterError::syntax(format!("expected a number for {context}, got '{word}'")))
}

fn parse_address(word: &str) -> Result<(IpAddr, Option<u8>), FilterError> {
    let (addr_part, prefix_part) = match word.split_once('/') {
        Some((a, p)) => (a, Some(p)),
        None => (word, None),
    };
    let address: IpAddr = addr_part
        .parse()
        .map_err(|_| FilterError::syntax(format!("invalid address '{addr_part}'")))?;
    let prefix = match prefix_part {
        Some(p) => {
            let bits: u8 = p
                .parse()
                .map_err(|_| FilterError::syntax(format!("invalid prefix length '{p}'")))?;
            let max = if address.is_ipv4() { 32 } else { 128 };
            if bits > max {
                return Err(FilterError::syntax(format!(
                    "prefix length {bits} too long for {addr_part}"
                )));
            }
            Some(bits)
        }
        None => None,
    };
    Ok((address, prefix))
}

fn parse_proto(word: &str) -> Result<u32, FilterError> {
    let proto = match word {
        "icmp" => 1,
        "igmp" => 2,
        "tcp" => 6,
        "udp" => 17,
        "gre" => 47,
        "esp" => 50,
        "ah" => 51,
        "icmp6" => 58,
        "ospf" => 89,
        "sctp" => 132,
        other => parse_u32(other, "protocol")?,
    };
    Ok(proto)
}
