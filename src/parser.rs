use std::path::PathBuf;

use crate::error::UsageError;
use crate::expander;

/// A segment of a word, tagged with its quote context.
/// The expander uses this to decide what expansions to apply.
#[derive(Debug, Clone, PartialEq)]
pub enum WordSegment {
    /// Unquoted text; tilde and glob expansion apply
    Unquoted(String),
    /// Quoted or escaped text, taken literally
    Quoted(String),
}

/// A single word (argument) made up of one or more segments.
/// Mixed quoting like `he"llo"'world'` produces multiple segments in one word.
pub type Word = Vec<WordSegment>;

/// One lexical unit of a command line.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Word(Word),
    /// `|`
    Pipe,
    /// `<`
    Less,
    /// `>`
    Greater,
    /// `&`
    Amp,
}

/// A command line after tokenization, redirect extraction and expansion.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedCommand {
    /// Program name followed by its arguments; never empty.
    pub args: Vec<String>,
    pub input_redirect: Option<PathBuf>,
    pub output_redirect: Option<PathBuf>,
    /// False when the line ended in `&`.
    pub blocking: bool,
    /// Right-hand side of `|`, if any.
    pub next: Option<Box<ParsedCommand>>,
}

impl ParsedCommand {
    pub fn program(&self) -> &str {
        self.args.first().map(String::as_str).unwrap_or_default()
    }

    /// Arguments after the program name.
    pub fn operands(&self) -> &[String] {
        self.args.get(1..).unwrap_or_default()
    }
}

/// States for the tokenizer state machine.
enum State {
    /// Between tokens; whitespace is skipped
    Normal,
    /// Building a word outside quotes; whitespace or an operator ends it
    InWord,
    InDoubleQuote,
    InSingleQuote,
}

#[derive(Default)]
struct Lexer {
    tokens: Vec<Token>,
    word: Word,
    segment: String,
    /// A word is open even if all its segments are empty (`""`).
    word_open: bool,
}

impl Lexer {
    fn flush_unquoted(&mut self) {
        if !self.segment.is_empty() {
            self.word
                .push(WordSegment::Unquoted(std::mem::take(&mut self.segment)));
        }
    }

    fn flush_quoted(&mut self) {
        self.word
            .push(WordSegment::Quoted(std::mem::take(&mut self.segment)));
    }

    fn end_word(&mut self) {
        self.flush_unquoted();
        if self.word_open {
            self.tokens.push(Token::Word(std::mem::take(&mut self.word)));
            self.word_open = false;
        }
    }

    fn push_escaped(&mut self, ch: Option<char>) {
        self.flush_unquoted();
        let literal = ch.map(String::from).unwrap_or_else(|| "\\".to_string());
        self.word.push(WordSegment::Quoted(literal));
        self.word_open = true;
    }
}

fn operator(ch: char) -> Option<Token> {
    match ch {
        '|' => Some(Token::Pipe),
        '<' => Some(Token::Less),
        '>' => Some(Token::Greater),
        '&' => Some(Token::Amp),
        _ => None,
    }
}

/// Split a raw line into words and operators, preserving quote context.
pub fn tokenize(input: &str) -> Vec<Token> {
    let mut lx = Lexer::default();
    let mut state = State::Normal;
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        match (&state, ch) {
            (State::Normal | State::InWord, ' ' | '\t') => {
                lx.end_word();
                state = State::Normal;
            }
            (State::Normal | State::InWord, '"') => {
                lx.flush_unquoted();
                lx.word_open = true;
                state = State::InDoubleQuote;
            }
            (State::Normal | State::InWord, '\'') => {
                lx.flush_unquoted();
                lx.word_open = true;
                state = State::InSingleQuote;
            }
            (State::Normal | State::InWord, '\\') => {
                lx.push_escaped(chars.next());
                state = State::InWord;
            }
            (State::Normal | State::InWord, c) => match operator(c) {
                Some(token) => {
                    lx.end_word();
                    lx.tokens.push(token);
                    state = State::Normal;
                }
                None => {
                    lx.segment.push(c);
                    lx.word_open = true;
                    state = State::InWord;
                }
            },

            (State::InDoubleQuote, '"') => {
                lx.flush_quoted();
                state = State::InWord;
            }
            (State::InDoubleQuote, '\\') => match chars.peek().copied() {
                Some(next @ ('"' | '\\')) => {
                    chars.next();
                    lx.segment.push(next);
                }
                _ => lx.segment.push('\\'),
            },
            (State::InSingleQuote, '\'') => {
                lx.flush_quoted();
                state = State::InWord;
            }
            (State::InDoubleQuote | State::InSingleQuote, c) => lx.segment.push(c),
        }
    }

    // An unterminated quote keeps its literal content.
    if matches!(state, State::InDoubleQuote | State::InSingleQuote) && !lx.segment.is_empty() {
        lx.flush_quoted();
    }
    lx.end_word();
    lx.tokens
}

/// Parse one input line.
///
/// Returns `Ok(None)` for blank input. A pipe yields a two-stage command
/// linked through [`ParsedCommand::next`]; a trailing `&` clears
/// `blocking` on every stage.
pub fn parse(input: &str) -> Result<Option<ParsedCommand>, UsageError> {
    let mut tokens = tokenize(input);
    if tokens.is_empty() {
        return Ok(None);
    }

    let mut blocking = true;
    if tokens.last() == Some(&Token::Amp) {
        tokens.pop();
        blocking = false;
    }
    if tokens.contains(&Token::Amp) {
        return Err(UsageError::UnexpectedToken("&".into()));
    }
    if tokens.is_empty() {
        return Err(UsageError::UnexpectedToken("&".into()));
    }

    let stages: Vec<&[Token]> = tokens.split(|t| *t == Token::Pipe).collect();
    if stages.len() > 2 {
        return Err(UsageError::TooManyStages);
    }

    let piped = stages.len() > 1;
    let mut commands = Vec::with_capacity(stages.len());
    for stage in stages {
        if piped && stage.is_empty() {
            return Err(UsageError::UnexpectedToken("|".into()));
        }
        commands.push(parse_stage(stage, blocking)?);
    }

    let mut commands = commands.into_iter();
    let mut head = commands
        .next()
        .ok_or_else(|| UsageError::UnexpectedToken("|".into()))?;
    head.next = commands.next().map(Box::new);
    Ok(Some(head))
}

fn parse_stage(tokens: &[Token], blocking: bool) -> Result<ParsedCommand, UsageError> {
    let mut words = Vec::new();
    let mut input_redirect = None;
    let mut output_redirect = None;
    let mut iter = tokens.iter();

    while let Some(token) = iter.next() {
        match token {
            Token::Word(word) => words.push(word.clone()),
            Token::Less => input_redirect = Some(redirect_target(iter.next(), "<")?),
            Token::Greater => output_redirect = Some(redirect_target(iter.next(), ">")?),
            Token::Pipe | Token::Amp => {
                return Err(UsageError::UnexpectedToken(token_text(token).into()));
            }
        }
    }

    let args = expander::expand_words(&words);
    if args.is_empty() {
        return Err(UsageError::MissingCommand);
    }

    Ok(ParsedCommand {
        args,
        input_redirect,
        output_redirect,
        blocking,
        next: None,
    })
}

fn redirect_target(token: Option<&Token>, op: &'static str) -> Result<PathBuf, UsageError> {
    match token {
        Some(Token::Word(word)) => Ok(PathBuf::from(expander::expand_path(word))),
        _ => Err(UsageError::MissingRedirectTarget(op)),
    }
}

fn token_text(token: &Token) -> &'static str {
    match token {
        Token::Pipe => "|",
        Token::Less => "<",
        Token::Greater => ">",
        Token::Amp => "&",
        Token::Word(_) => "word",
    }
}
