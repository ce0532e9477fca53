//! Memory trace input: one `<r|w> <hex address>` access per line.

use std::io::BufRead;

use nom::{
    bytes::complete::tag_no_case,
    character::complete::{hex_digit1, one_of, space0, space1},
    combinator::{all_consuming, map_res, opt},
    sequence::{preceded, terminated, tuple},
    IResult,
};
use thiserror::Error;

use crate::common::{AccessKind, Addr};

#[derive(Error, Debug)]
pub enum TraceError {
    #[error("failed to read trace: {0}")]
    Io(#[from] std::io::Error),
    #[error("line {line}: cannot parse {content:?} ({reason})")]
    Parse {
        line: usize,
        content: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Access {
    pub kind: AccessKind,
    pub addr: Addr,
}

fn kind(input: &str) -> IResult<&str, AccessKind> {
    let (input, c) = one_of("rRwW")(input)?;
    let kind = if c.eq_ignore_ascii_case(&'w') {
        AccessKind::Write
    } else {
        AccessKind::Read
    };
    Ok((input, kind))
}

fn address(input: &str) -> IResult<&str, u64> {
    map_res(preceded(opt(tag_no_case("0x")), hex_digit1), |digits: &str| {
        u64::from_str_radix(digits, 16)
    })(input)
}

fn access(input: &str) -> IResult<&str, Access> {
    let (input, (kind, _, addr)) = all_consuming(terminated(
        tuple((preceded(space0, kind), space1, address)),
        space0,
    ))(input)?;
    Ok((
        input,
        Access {
            kind,
            addr: Addr::new(addr),
        },
    ))
}

impl Access {
    /// `None` for blank and `#` comment lines.
    pub fn parse_line(line: &str) -> Option<Result<Self, String>> {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            return None;
        }
        Some(access(trimmed).map(|(_, a)| a).map_err(|e| e.to_string()))
    }
}

/// Streams accesses out of a reader, skipping blank and comment lines.
pub struct TraceReader<R> {
    inner: R,
    line: usize,
    buf: String,
}

impl<R: BufRead> TraceReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            line: 0,
            buf: String::new(),
        }
    }
}

impl<R: BufRead> Iterator for TraceReader<R> {
    type Item = Result<Access, TraceError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.buf.clear();
            match self.inner.read_line(&mut self.buf) {
                Ok(0) => return None,
                Ok(_) => self.line += 1,
                Err(e) => return Some(Err(e.into())),
            }
            if let Some(parsed) = Access::parse_line(&self.buf) {
                return Some(parsed.map_err(|reason| TraceError::Parse {
                    line: self.line,
                    content: self.buf.trim_end().to_owned(),
                    reason,
                }));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> Option<Result<(AccessKind, u64), String>> {
        Access::parse_line(line).map(|r| r.map(|a| (a.kind, a.addr.inner())))
    }

    #[test]
    fn test_parse_line() {
        assert_eq!(Some(Ok((AccessKind::Read, 0x7fff_5a3c))), parse("r 7fff5a3c"));
        assert_eq!(Some(Ok((AccessKind::Write, 0x10))), parse("w 0x10\n"));
        assert_eq!(Some(Ok((AccessKind::Write, 0xabc))), parse("  W\t0XABC  "));
        assert_eq!(None, parse(""));
        assert_eq!(None, parse("   \n"));
        assert_eq!(None, parse("# generated by pin"));
    }

    #[test]
    fn test_parse_line_rejects() {
        assert!(matches!(parse("x 0x10"), Some(Err(_))));
        assert!(matches!(parse("r"), Some(Err(_))));
        assert!(matches!(parse("r 0xzz"), Some(Err(_))));
        assert!(matches!(parse("r 10 20"), Some(Err(_))));
        assert!(matches!(parse("r10"), Some(Err(_))));
        // wider than 64 bits
        assert!(matches!(parse("r 1ffffffffffffffff"), Some(Err(_))));
    }

    #[test]
    fn test_reader() {
        let input = "# trace\nr 0\n\nw 4\nr 0x8\n";
        let accesses: Vec<_> = TraceReader::new(input.as_bytes())
            .collect::<Result<_, _>>()
            .unwrap();
        let addrs: Vec<_> = accesses.iter().map(|a| a.addr.inner()).collect();
        assert_eq!(vec![0, 4, 8], addrs);
        assert_eq!(AccessKind::Write, accesses[1].kind);
    }

    #[test]
    fn test_reader_reports_line() {
        let input = "r 0\n\nq 4\n";
        let err = TraceReader::new(input.as_bytes())
            .find_map(Result::err)
            .unwrap();
        match err {
            TraceError::Parse { line, content, .. } => {
                assert_eq!(3, line);
                assert_eq!("q 4", content);
            }
            e => panic!("unexpected error: {e}"),
        }
    }
}
