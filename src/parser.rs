use std::fmt;
use std::path::PathBuf;

use crate::types::*;

#[derive(Debug, PartialEq, Eq)]
pub enum ParseError {
	EmptyCommand,
	EmptyRedirect,
	TrailingAfterBackground(char),
}

impl fmt::Display for ParseError {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match *self {
			ParseError::EmptyCommand => write!(f, "syntax error: empty command"),
			ParseError::EmptyRedirect => write!(f, "syntax error: missing redirect target"),
			ParseError::TrailingAfterBackground(c) => write!(f, "syntax error: character after '&': '{}'", c),
		}
	}
}

impl std::error::Error for ParseError {}

pub type ParseResult<T> = Result<T, ParseError>;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
enum RedirectType { Input, Output }

struct Parser<'a> {
	line: &'a str,
	i: usize,
}

impl<'a> Parser<'a> {
	fn peek(&self) -> Option<u8> {
		self.line.as_bytes().get(self.i).copied()
	}

	fn proceed_while<F>(&mut self, f: F) where F: Fn(u8) -> bool {
		while let Some(c) = self.peek() {
			if !f(c) { break; }
			self.i += 1;
		}
	}

	fn is_whitespace(c: u8) -> bool {
		matches!(c, b' ' | b'\t' | b'\n' | b'\r')
	}

	// Only ASCII bytes stop a word, so slicing at the stop position stays on a char boundary.
	fn is_letter(c: u8) -> bool {
		match c {
			b'>' | b'<' | b'&' | b'|' => false,
			_ => !Parser::is_whitespace(c),
		}
	}

	fn skip_whitespaces(&mut self) {
		self.proceed_while(Parser::is_whitespace);
	}

	fn read_word(&mut self) -> &'a str {
		let orig = self.i;
		self.proceed_while(Parser::is_letter);
		&self.line[orig .. self.i]
	}

	fn parse_redirect(&mut self) -> ParseResult<Option<(RedirectType, PathBuf)>> {
		let typ = match self.peek() {
			Some(b'<') => {
				self.i += 1;
				RedirectType::Input
			},
			Some(b'>') => {
				self.i += 1;
				// '>>' and '>' both append.
				if self.peek() == Some(b'>') {
					self.i += 1;
				}
				RedirectType::Output
			},
			_ => { return Ok(None); },
		};

		self.skip_whitespaces();
		let target = self.read_word();
		if target.is_empty() {
			return Err(ParseError::EmptyRedirect);
		}
		Ok(Some((typ, PathBuf::from(target))))
	}

	fn parse_and_apply_redirects(&mut self, stage: &mut Stage) -> ParseResult<()> {
		while let Some((typ, target)) = self.parse_redirect()? {
			match typ {
				RedirectType::Input => stage.input_redirect = Some(target),
				RedirectType::Output => stage.output_redirect = Some(target),
			}
			self.skip_whitespaces();
		}
		Ok(())
	}

	fn parse_stage(&mut self, index: usize) -> ParseResult<Stage> {
		let mut stage = Stage { arguments: vec![], input_redirect: None, output_redirect: None, index };

		self.parse_and_apply_redirects(&mut stage)?;
		let name = self.read_word();
		if name.is_empty() {
			return Err(ParseError::EmptyCommand);
		}
		stage.arguments.push(name.to_owned());

		loop {
			self.skip_whitespaces();
			self.parse_and_apply_redirects(&mut stage)?;
			let word = self.read_word();
			if word.is_empty() {
				break;
			}
			stage.arguments.push(word.to_owned());
		}
		Ok(stage)
	}

	fn parse_pipeline(&mut self) -> ParseResult<Pipeline> {
		let mut stages: Vec<Stage> = vec![];
		let mut blocking = true;

		loop {
			self.skip_whitespaces();
			let stage = self.parse_stage(stages.len())?;
			stages.push(stage);
			match self.peek() {
				Some(b'|') => { self.i += 1; },
				Some(b'&') => {
					self.i += 1;
					blocking = false;
					self.skip_whitespaces();
					match self.line[self.i ..].chars().next() {
						Some(c) => { return Err(ParseError::TrailingAfterBackground(c)); },
						None => { break; },
					}
				},
				// parse_stage consumes everything up to a separator or the end of line
				_ => { break; },
			}
		}
		Ok(Pipeline { stages, blocking })
	}
}

/// Parses one input line. Blank lines yield `None`.
pub fn parse(line: &str) -> ParseResult<Option<Pipeline>> {
	if line.bytes().all(Parser::is_whitespace) {
		return Ok(None);
	}
	let mut parser = Parser { line, i: 0 };
	parser.parse_pipeline().map(Some)
}
