//! Reading DIMACS text: CNF formulas and the output of competition style SAT solvers.
//!
//! Writing is done by [`Cnf::write_dimacs`]. The CNF reader consumes its source in chunks and
//! reuses its buffers, so large files are not read into memory as a whole. It is not meant as a
//! validator; errors are not very detailed.
use std::io::BufRead;
use std::io::BufReader;
use std::io::Read;
use std::num::NonZeroI64;
use std::str::FromStr;

use thiserror::Error;

use super::Clause;
use super::Cnf;
use super::Literal;
use crate::basic_types::SatResult;

#[derive(Debug, Error)]
pub enum DimacsParseError {
    #[error("failed to read file")]
    Io(#[from] std::io::Error),

    #[error("missing dimacs header")]
    MissingHeader,

    #[error("'{0}' is an invalid header")]
    InvalidHeader(String),

    #[error("multiple dimacs headers found")]
    DuplicateHeader,

    #[error("unexpected character '{0}'")]
    UnexpectedCharacter(char),

    #[error("'{0}' is an invalid DIMACS literal")]
    InvalidLiteral(String),

    #[error("the last clause in the source is not terminated with a '0'")]
    UnterminatedClause,

    #[error("expected to parse {expected} clauses, but parsed {parsed}")]
    IncorrectClauseCount { expected: usize, parsed: usize },

    #[error("the solver output has no status line")]
    MissingStatus,

    #[error("'{0}' is not a known solver status")]
    UnknownStatus(String),
}

/// Reads a DIMACS CNF formula.
pub fn parse_cnf(source: impl Read) -> Result<Cnf, DimacsParseError> {
    let mut reader = BufReader::new(source);
    let mut parser = CnfParser::default();

    loop {
        let num_bytes = {
            let data = reader.fill_buf()?;

            if data.is_empty() {
                return parser.complete();
            }

            parser.parse_chunk(data)?;
            data.len()
        };

        reader.consume(num_bytes);
    }
}

#[derive(Debug, Default)]
struct CnfParser {
    header: Option<CnfHeader>,
    formula: Cnf,
    buffer: String,
    clause: Vec<Literal>,
    state: ParseState,
}

#[derive(Debug, Default)]
enum ParseState {
    #[default]
    StartLine,
    Header,
    Comment,
    Literal,
    NegativeLiteral,
    Clause,
}

impl CnfParser {
    /// Parse the next chunk of bytes. This may start in the middle of parsing a clause or file
    /// header, and may end in such a state as well.
    fn parse_chunk(&mut self, chunk: &[u8]) -> Result<(), DimacsParseError> {
        for &byte in chunk {
            match self.state {
                ParseState::StartLine => match byte {
                    b if b.is_ascii_whitespace() => {}

                    b'p' => {
                        self.state = ParseState::Header;
                        self.buffer.clear();
                        self.buffer.push('p');
                    }

                    b'c' => self.state = ParseState::Comment,

                    b @ b'1'..=b'9' => self.start_literal(b, true),

                    b'0' => self.finish_clause()?,

                    b'-' => self.start_literal(b'-', false),

                    b => return Err(DimacsParseError::UnexpectedCharacter(b as char)),
                },

                ParseState::Header => match byte {
                    b'\n' => {
                        self.init_formula()?;
                        self.state = ParseState::StartLine;
                    }

                    b => self.buffer.push(b as char),
                },

                ParseState::Comment => {
                    if byte == b'\n' {
                        self.state = ParseState::StartLine;
                    }
                }

                ParseState::Literal => match byte {
                    b if b.is_ascii_whitespace() => {
                        self.finish_literal()?;
                        if b == b'\n' {
                            self.state = ParseState::StartLine;
                        }
                    }

                    b @ b'0'..=b'9' => self.buffer.push(b as char),

                    b => return Err(DimacsParseError::UnexpectedCharacter(b as char)),
                },

                ParseState::NegativeLiteral => match byte {
                    b @ b'1'..=b'9' => {
                        self.buffer.push(b as char);
                        self.state = ParseState::Literal;
                    }

                    b => return Err(DimacsParseError::UnexpectedCharacter(b as char)),
                },

                // A new-line does not terminate a clause; the clause buffer is kept while
                // comments and leading whitespace of the next line are handled.
                ParseState::Clause => match byte {
                    b'0' => self.finish_clause()?,

                    b'\n' => self.state = ParseState::StartLine,
                    b if b.is_ascii_whitespace() => {}

                    b @ b'1'..=b'9' => self.start_literal(b, true),
                    b'-' => self.start_literal(b'-', false),

                    b => return Err(DimacsParseError::UnexpectedCharacter(b as char)),
                },
            }
        }

        Ok(())
    }

    fn start_literal(&mut self, b: u8, is_positive: bool) {
        self.state = if is_positive {
            ParseState::Literal
        } else {
            ParseState::NegativeLiteral
        };

        self.buffer.clear();
        self.buffer.push(b as char);
    }

    fn complete(mut self) -> Result<Cnf, DimacsParseError> {
        if matches!(self.state, ParseState::Literal) {
            self.finish_literal()?;
        }

        let header = self.header.ok_or(DimacsParseError::MissingHeader)?;

        if !self.clause.is_empty() {
            Err(DimacsParseError::UnterminatedClause)
        } else if header.num_clauses != self.formula.num_clauses() {
            Err(DimacsParseError::IncorrectClauseCount {
                expected: header.num_clauses,
                parsed: self.formula.num_clauses(),
            })
        } else {
            Ok(self.formula)
        }
    }

    fn init_formula(&mut self) -> Result<(), DimacsParseError> {
        if self.header.is_some() {
            return Err(DimacsParseError::DuplicateHeader);
        }

        self.header = Some(self.buffer.trim().parse::<CnfHeader>()?);
        Ok(())
    }

    fn finish_literal(&mut self) -> Result<(), DimacsParseError> {
        let code = self
            .buffer
            .parse::<i64>()
            .ok()
            .and_then(NonZeroI64::new)
            .ok_or_else(|| DimacsParseError::InvalidLiteral(self.buffer.clone()))?;

        self.clause.push(Literal::from_dimacs(code));
        self.state = ParseState::Clause;

        Ok(())
    }

    fn finish_clause(&mut self) -> Result<(), DimacsParseError> {
        if self.header.is_none() {
            return Err(DimacsParseError::MissingHeader);
        }

        self.formula.add_clause(Clause::new(self.clause.drain(..)));
        self.state = ParseState::Clause;

        Ok(())
    }
}

#[derive(Debug)]
struct CnfHeader {
    num_clauses: usize,
}

impl FromStr for CnfHeader {
    type Err = DimacsParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if !s.starts_with("p cnf ") {
            return Err(DimacsParseError::InvalidHeader(s.to_owned()));
        }

        let mut components = s.split_whitespace().skip(2);

        let _num_variables = next_header_component::<usize>(&mut components, s)?;
        let num_clauses = next_header_component::<usize>(&mut components, s)?;

        if components.next().is_some() {
            return Err(DimacsParseError::InvalidHeader(s.to_owned()));
        }

        Ok(Self { num_clauses })
    }
}

fn next_header_component<'a, Num: FromStr>(
    components: &mut impl Iterator<Item = &'a str>,
    header: &str,
) -> Result<Num, DimacsParseError> {
    components
        .next()
        .ok_or_else(|| DimacsParseError::InvalidHeader(header.to_owned()))?
        .parse::<Num>()
        .map_err(|_| DimacsParseError::InvalidHeader(header.to_owned()))
}

/// Reads the output of a SAT competition style solver: an `s` status line and, when satisfiable,
/// `v` lines listing the model terminated by `0`. Comment lines and anything else are skipped.
///
/// `s UNKNOWN` and `s INDETERMINATE` are reported as [`SatResult::Timeout`].
pub fn parse_solver_output(output: &str) -> Result<(SatResult, Vec<Literal>), DimacsParseError> {
    let mut status = None;
    let mut model = Vec::new();

    for line in output.lines() {
        let line = line.trim();

        if let Some(rest) = line.strip_prefix("s ") {
            let result = match rest.trim() {
                "SATISFIABLE" => SatResult::Sat,
                "UNSATISFIABLE" => SatResult::Unsat,
                "UNKNOWN" | "INDETERMINATE" => SatResult::Timeout,
                other => return Err(DimacsParseError::UnknownStatus(other.to_owned())),
            };
            status = Some(result);
        } else if let Some(rest) = line.strip_prefix('v') {
            for token in rest.split_whitespace() {
                let code = token
                    .parse::<i64>()
                    .map_err(|_| DimacsParseError::InvalidLiteral(token.to_owned()))?;
                if let Some(code) = NonZeroI64::new(code) {
                    model.push(Literal::from_dimacs(code));
                }
            }
        }
    }

    let status = status.ok_or(DimacsParseError::MissingStatus)?;
    if status != SatResult::Sat {
        model.clear();
    }

    Ok((status, model))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codes(cnf: &Cnf) -> Vec<Vec<i128>> {
        cnf.clauses()
            .iter()
            .map(|clause| clause.literals().iter().map(|l| l.to_dimacs()).collect())
            .collect()
    }

    #[test]
    fn reads_clauses_spanning_lines_and_comments() {
        let source = "c a comment\np cnf 3 2\n1 -2\nc inside\n 3 0\n-1 0\n";
        let cnf = parse_cnf(source.as_bytes()).unwrap();
        assert_eq!(codes(&cnf), vec![vec![1, -2, 3], vec![-1]]);
    }

    #[test]
    fn written_formulas_can_be_read_back() {
        let source = "p cnf 4 3\n1 2 0\n-3 4 0\n-1 0\n";
        let cnf = parse_cnf(source.as_bytes()).unwrap();
        assert_eq!(cnf.to_dimacs(), source);
    }

    #[test]
    fn header_problems_are_reported() {
        assert!(matches!(
            parse_cnf("1 2 0\n".as_bytes()),
            Err(DimacsParseError::MissingHeader)
        ));
        assert!(matches!(
            parse_cnf("p wcnf 1 1\n1 0\n".as_bytes()),
            Err(DimacsParseError::InvalidHeader(_))
        ));
        assert!(matches!(
            parse_cnf("p cnf 1 1\np cnf 1 1\n1 0\n".as_bytes()),
            Err(DimacsParseError::DuplicateHeader)
        ));
    }

    #[test]
    fn clause_problems_are_reported() {
        assert!(matches!(
            parse_cnf("p cnf 2 1\n1 2\n".as_bytes()),
            Err(DimacsParseError::UnterminatedClause)
        ));
        assert!(matches!(
            parse_cnf("p cnf 2 2\n1 2 0\n".as_bytes()),
            Err(DimacsParseError::IncorrectClauseCount {
                expected: 2,
                parsed: 1
            })
        ));
        assert!(matches!(
            parse_cnf("p cnf 2 1\n1 x 0\n".as_bytes()),
            Err(DimacsParseError::UnexpectedCharacter('x'))
        ));
    }

    #[test]
    fn reads_satisfiable_solver_output() {
        let output = "c some solver\ns SATISFIABLE\nv 1 -2\nv 3 0\n";
        let (status, model) = parse_solver_output(output).unwrap();
        assert_eq!(status, SatResult::Sat);
        assert_eq!(
            model.iter().map(|l| l.to_dimacs()).collect::<Vec<_>>(),
            vec![1, -2, 3]
        );
    }

    #[test]
    fn reads_other_solver_statuses() {
        assert_eq!(
            parse_solver_output("s UNSATISFIABLE\n").unwrap().0,
            SatResult::Unsat
        );
        assert_eq!(
            parse_solver_output("s UNKNOWN\n").unwrap().0,
            SatResult::Timeout
        );
        assert!(matches!(
            parse_solver_output("c nothing\n"),
            Err(DimacsParseError::MissingStatus)
        ));
        assert!(matches!(
            parse_solver_output("s MAYBE\n"),
            Err(DimacsParseError::UnknownStatus(_))
        ));
    }
}
